pub mod engine;
pub mod relay;
pub mod scenario_runner;
pub mod session;
pub mod trace;

pub use engine::{LinkEventSummary, NodeId, Simulator, TraceRecord};
pub use relay::{NetworkRelay, RelayOutcome};
pub use session::{SessionHandle, start_transfer};
pub use trace::SessionReport;
