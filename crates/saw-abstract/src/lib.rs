pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use config::{LossModel, SimConfig};
pub use error::ProtocolError;
pub use interface::{Disposition, NodeContext, ProtocolNode, TransferOutcome};
pub use packet::{Endpoint, Packet, PacketBody, PacketType, SEQ_END, SEQ_START};
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};
