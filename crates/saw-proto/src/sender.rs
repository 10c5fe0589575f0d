use std::collections::VecDeque;

use bytes::Bytes;

use saw_abstract::{
    Disposition, Endpoint, NodeContext, Packet, PacketType, ProtocolError, ProtocolNode, SimConfig,
    TransferOutcome,
};

/// Timer id of the sender's single retransmission timer.
pub const RETRANSMIT_TIMER: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    AwaitingStartAck,
    AwaitingDataAck,
    AwaitingEndAck,
    Done,
    Failed,
}

impl SenderState {
    fn is_awaiting(&self) -> bool {
        matches!(
            self,
            SenderState::AwaitingStartAck | SenderState::AwaitingDataAck | SenderState::AwaitingEndAck
        )
    }
}

/// The sending side of the stop-and-wait exchange. Drives the START
/// handshake, sends one DATA unit at a time, retransmits the stored
/// pending packet on timeout, and closes with END.
pub struct Sender {
    state: SenderState,
    queue: VecDeque<Bytes>,
    next_seq: u32,
    /// The one unacknowledged packet, kept verbatim so a retransmission
    /// reuses the original sequence number.
    pending: Option<Packet>,
    retries: u32,
    timeout_ms: u64,
    max_retries: u32,
    window_size: u16,
    local: Endpoint,
    remote: Endpoint,
}

impl Sender {
    pub fn new(config: &SimConfig, payload: Vec<Bytes>) -> Self {
        Self {
            state: SenderState::Idle,
            queue: payload.into(),
            next_seq: 0,
            pending: None,
            retries: 0,
            timeout_ms: config.retransmit_timeout_ms,
            max_retries: config.max_retries,
            window_size: config.window_size,
            local: config.sender_endpoint.clone(),
            remote: config.receiver_endpoint.clone(),
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Send a fresh packet and arm the retransmission timer.
    fn transmit(&mut self, ctx: &mut dyn NodeContext, packet: Packet) {
        ctx.trace(packet.packet_type(), packet.trace_num(), Disposition::Sent);
        self.pending = Some(packet.clone());
        self.retries = 0;
        ctx.send_packet(packet);
        ctx.start_timer(self.timeout_ms, RETRANSMIT_TIMER);
    }

    /// Move on to the next data unit, or END when the queue is empty.
    fn advance(&mut self, ctx: &mut dyn NodeContext) {
        match self.queue.pop_front() {
            Some(unit) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                let packet = Packet::data(
                    seq,
                    unit,
                    self.window_size,
                    self.local.clone(),
                    self.remote.clone(),
                );
                self.state = SenderState::AwaitingDataAck;
                self.transmit(ctx, packet);
            }
            None => {
                let packet =
                    Packet::end(self.window_size, self.local.clone(), self.remote.clone());
                self.state = SenderState::AwaitingEndAck;
                self.transmit(ctx, packet);
            }
        }
    }
}

impl ProtocolNode for Sender {
    fn init(&mut self, ctx: &mut dyn NodeContext) {
        let packet = Packet::start(self.window_size, self.local.clone(), self.remote.clone());
        self.state = SenderState::AwaitingStartAck;
        self.transmit(ctx, packet);
    }

    fn on_packet(&mut self, ctx: &mut dyn NodeContext, packet: Packet) {
        let Some(ack) = packet.ack_num() else {
            // Only ACKs are meaningful to the sender.
            ctx.trace(packet.packet_type(), packet.trace_num(), Disposition::Ignored);
            return;
        };
        let expected = self.pending.as_ref().map(Packet::wire_seq);
        if !self.state.is_awaiting() || expected != Some(ack) {
            // Stale or duplicate acknowledgement.
            ctx.trace(PacketType::Ack, ack, Disposition::Ignored);
            return;
        }

        ctx.trace(PacketType::Ack, ack, Disposition::Received);
        ctx.cancel_timer(RETRANSMIT_TIMER);
        self.pending = None;
        self.retries = 0;
        if self.state == SenderState::AwaitingEndAck {
            self.state = SenderState::Done;
            ctx.complete(TransferOutcome::Completed);
        } else {
            self.advance(ctx);
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn NodeContext, timer_id: u32) {
        if timer_id != RETRANSMIT_TIMER || !self.state.is_awaiting() {
            return;
        }
        let Some(pending) = self.pending.clone() else {
            return;
        };
        if self.retries < self.max_retries {
            self.retries += 1;
            ctx.trace(pending.packet_type(), pending.trace_num(), Disposition::Resent);
            ctx.send_packet(pending);
            ctx.start_timer(self.timeout_ms, RETRANSMIT_TIMER);
        } else {
            let seq = pending.wire_seq();
            self.state = SenderState::Failed;
            self.pending = None;
            ctx.complete(TransferOutcome::Failed {
                reason: ProtocolError::RetriesExhausted {
                    seq,
                    retries: self.retries,
                },
                retries_exhausted: true,
                failed_seq: seq,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingContext;
    use saw_abstract::{PacketBody, SEQ_END, SEQ_START};

    fn config() -> SimConfig {
        SimConfig {
            retransmit_timeout_ms: 100,
            max_retries: 3,
            ..SimConfig::default()
        }
    }

    fn units(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    fn ack(num: u32, cfg: &SimConfig) -> Packet {
        Packet::ack(
            num,
            cfg.window_size,
            cfg.receiver_endpoint.clone(),
            cfg.sender_endpoint.clone(),
        )
    }

    #[test]
    fn init_sends_start_and_arms_timer() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, units(&["A"]));
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);

        assert_eq!(sender.state(), SenderState::AwaitingStartAck);
        assert_eq!(ctx.sent.len(), 1);
        assert_eq!(ctx.sent[0].wire_seq(), SEQ_START);
        assert_eq!(ctx.timers_started, vec![(100, RETRANSMIT_TIMER)]);
    }

    #[test]
    fn start_ack_advances_to_first_data_unit() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, units(&["A"]));
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        sender.on_packet(&mut ctx, ack(SEQ_START, &cfg));

        assert_eq!(sender.state(), SenderState::AwaitingDataAck);
        assert_eq!(ctx.timers_cancelled, vec![RETRANSMIT_TIMER]);
        let data = &ctx.sent[1];
        assert_eq!(data.wire_seq(), 0);
        assert_eq!(data.payload().unwrap().as_ref(), b"A");
    }

    #[test]
    fn stale_ack_is_ignored() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, units(&["A"]));
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        sender.on_packet(&mut ctx, ack(42, &cfg));

        assert_eq!(sender.state(), SenderState::AwaitingStartAck);
        assert_eq!(ctx.sent.len(), 1);
        assert!(ctx.timers_cancelled.is_empty());
        assert!(
            ctx.traces
                .iter()
                .any(|(k, n, d)| *k == PacketType::Ack && *n == 42 && *d == Disposition::Ignored)
        );
    }

    #[test]
    fn non_ack_packets_are_ignored() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, units(&["A"]));
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        let stray = Packet::data(
            0,
            Bytes::from_static(b"X"),
            1,
            cfg.receiver_endpoint.clone(),
            cfg.sender_endpoint.clone(),
        );
        sender.on_packet(&mut ctx, stray);

        assert_eq!(sender.state(), SenderState::AwaitingStartAck);
        assert_eq!(ctx.sent.len(), 1);
    }

    #[test]
    fn timeout_resends_identical_sequence_number() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, units(&["A"]));
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        sender.on_packet(&mut ctx, ack(SEQ_START, &cfg));
        sender.on_timer(&mut ctx, RETRANSMIT_TIMER);

        assert_eq!(sender.state(), SenderState::AwaitingDataAck);
        assert_eq!(ctx.sent.len(), 3);
        // Resend carries the exact original packet.
        assert_eq!(ctx.sent[2], ctx.sent[1]);
        assert!(
            ctx.traces
                .iter()
                .any(|(k, n, d)| *k == PacketType::Data && *n == 0 && *d == Disposition::Resent)
        );
    }

    #[test]
    fn fails_after_exactly_max_retries_retransmissions() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, units(&["A"]));
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        sender.on_packet(&mut ctx, ack(SEQ_START, &cfg));

        // max_retries expiries resend, the next one gives up.
        for _ in 0..cfg.max_retries {
            sender.on_timer(&mut ctx, RETRANSMIT_TIMER);
            assert_eq!(sender.state(), SenderState::AwaitingDataAck);
        }
        sender.on_timer(&mut ctx, RETRANSMIT_TIMER);

        assert_eq!(sender.state(), SenderState::Failed);
        let resends = ctx
            .traces
            .iter()
            .filter(|(_, _, d)| *d == Disposition::Resent)
            .count();
        assert_eq!(resends, cfg.max_retries as usize);
        match ctx.outcome.as_ref().unwrap() {
            TransferOutcome::Failed {
                reason,
                retries_exhausted,
                failed_seq,
            } => {
                assert!(retries_exhausted);
                assert_eq!(*failed_seq, 0);
                assert_eq!(
                    *reason,
                    ProtocolError::RetriesExhausted {
                        seq: 0,
                        retries: cfg.max_retries
                    }
                );
            }
            other => panic!("expected failure outcome, got {other:?}"),
        }
    }

    #[test]
    fn matching_ack_resets_retry_counter() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, units(&["A", "B"]));
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        sender.on_packet(&mut ctx, ack(SEQ_START, &cfg));
        sender.on_timer(&mut ctx, RETRANSMIT_TIMER);
        sender.on_packet(&mut ctx, ack(0, &cfg));

        // The second unit gets the full retry budget again.
        for _ in 0..cfg.max_retries {
            sender.on_timer(&mut ctx, RETRANSMIT_TIMER);
            assert_eq!(sender.state(), SenderState::AwaitingDataAck);
        }
        sender.on_timer(&mut ctx, RETRANSMIT_TIMER);
        assert_eq!(sender.state(), SenderState::Failed);
    }

    #[test]
    fn empty_payload_goes_straight_to_end() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, Vec::new());
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        sender.on_packet(&mut ctx, ack(SEQ_START, &cfg));

        assert_eq!(sender.state(), SenderState::AwaitingEndAck);
        assert_eq!(ctx.sent[1].wire_seq(), SEQ_END);
    }

    #[test]
    fn completes_on_end_ack() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, units(&["A", "B"]));
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        sender.on_packet(&mut ctx, ack(SEQ_START, &cfg));
        sender.on_packet(&mut ctx, ack(0, &cfg));
        sender.on_packet(&mut ctx, ack(1, &cfg));
        sender.on_packet(&mut ctx, ack(SEQ_END, &cfg));

        assert_eq!(sender.state(), SenderState::Done);
        assert_eq!(ctx.outcome, Some(TransferOutcome::Completed));
        let kinds: Vec<_> = ctx.sent.iter().map(Packet::packet_type).collect();
        assert_eq!(
            kinds,
            vec![
                PacketType::Start,
                PacketType::Data,
                PacketType::Data,
                PacketType::End
            ]
        );
        // Sequence numbers increase monotonically from 0.
        assert!(matches!(ctx.sent[1].body(), PacketBody::Data { seq: 0, .. }));
        assert!(matches!(ctx.sent[2].body(), PacketBody::Data { seq: 1, .. }));
    }

    #[test]
    fn timer_in_terminal_state_does_nothing() {
        let cfg = config();
        let mut sender = Sender::new(&cfg, Vec::new());
        let mut ctx = RecordingContext::new();
        sender.init(&mut ctx);
        sender.on_packet(&mut ctx, ack(SEQ_START, &cfg));
        sender.on_packet(&mut ctx, ack(SEQ_END, &cfg));
        let sent_before = ctx.sent.len();
        sender.on_timer(&mut ctx, RETRANSMIT_TIMER);

        assert_eq!(sender.state(), SenderState::Done);
        assert_eq!(ctx.sent.len(), sent_before);
    }
}
