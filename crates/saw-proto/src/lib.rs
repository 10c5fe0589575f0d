pub mod receiver;
pub mod sender;

pub use receiver::{Receiver, ReceiverState};
pub use sender::{RETRANSMIT_TIMER, Sender, SenderState};

#[cfg(test)]
pub(crate) mod testutil;
