use serde::Serialize;
use thiserror::Error;

/// Errors that cross the protocol engine's boundary.
///
/// Duplicate/stale packets and relay drops are not errors: they are
/// absorbed where they are observed and surface only as trace
/// dispositions.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum ProtocolError {
    /// A packet construction request named a type code outside the
    /// known set (SOT=1, DATA=2, ACK=3, EOT=4).
    #[error("invalid packet type code: {0}")]
    InvalidPacketType(u8),

    /// The sender gave up after `retries` consecutive timeouts waiting
    /// for the acknowledgement of wire sequence number `seq`.
    #[error("retries exhausted after {retries} attempts waiting for ack of seq {seq}")]
    RetriesExhausted { seq: u32, retries: u32 },
}
