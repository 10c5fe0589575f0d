use bytes::Bytes;

use saw_abstract::{Disposition, NodeContext, Packet, PacketType, TransferOutcome};

/// Capturing `NodeContext` for state-machine tests.
pub(crate) struct RecordingContext {
    pub sent: Vec<Packet>,
    pub timers_started: Vec<(u64, u32)>,
    pub timers_cancelled: Vec<u32>,
    pub delivered: Vec<Bytes>,
    pub outcome: Option<TransferOutcome>,
    pub traces: Vec<(PacketType, u32, Disposition)>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            timers_started: Vec::new(),
            timers_cancelled: Vec::new(),
            delivered: Vec::new(),
            outcome: None,
            traces: Vec::new(),
        }
    }
}

impl NodeContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.timers_started.push((delay_ms, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.timers_cancelled.push(timer_id);
    }

    fn deliver_payload(&mut self, unit: Bytes) {
        self.delivered.push(unit);
    }

    fn complete(&mut self, outcome: TransferOutcome) {
        assert!(self.outcome.is_none(), "terminal outcome reported twice");
        self.outcome = Some(outcome);
    }

    fn trace(&mut self, kind: PacketType, number: u32, disposition: Disposition) {
        self.traces.push((kind, number, disposition));
    }

    fn now(&self) -> u64 {
        0
    }
}
