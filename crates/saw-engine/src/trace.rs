use bytes::Bytes;
use serde::Serialize;

use saw_abstract::{SimConfig, TransferOutcome};

use crate::engine::{LinkEventSummary, TraceRecord};

/// Serializable snapshot of a finished (or aborted) session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub config: SimConfig,
    /// `None` only when the session was aborted before a terminal
    /// outcome was reached.
    pub outcome: Option<TransferOutcome>,
    /// Payload units the receiver accepted, in order.
    pub delivered: Vec<Bytes>,
    pub duration_ms: u64,
    pub packets_sent: u64,
    pub packets_forwarded: u64,
    pub packets_dropped: u64,
    pub trace: Vec<TraceRecord>,
    pub link_events: Vec<LinkEventSummary>,
}

impl SessionReport {
    /// Delivered units as strings, for assertions and summaries.
    pub fn delivered_strings(&self) -> Vec<String> {
        self.delivered
            .iter()
            .map(|unit| String::from_utf8_lossy(unit).into_owned())
            .collect()
    }
}
