use saw_abstract::{
    Disposition, Endpoint, NodeContext, Packet, PacketBody, PacketType, ProtocolNode, SEQ_END,
    SEQ_START, SimConfig, TransferOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Expecting,
    Done,
}

/// The receiving side: purely reactive, no timers. Accepts in-sequence
/// DATA, re-acknowledges duplicates without re-delivering them, and
/// discards anything out of order.
pub struct Receiver {
    state: ReceiverState,
    expected_seq: u32,
    window_size: u16,
    local: Endpoint,
    remote: Endpoint,
}

impl Receiver {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            state: ReceiverState::Idle,
            expected_seq: 0,
            window_size: config.window_size,
            local: config.receiver_endpoint.clone(),
            remote: config.sender_endpoint.clone(),
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    fn send_ack(&self, ctx: &mut dyn NodeContext, ack: u32, disposition: Disposition) {
        ctx.trace(PacketType::Ack, ack, disposition);
        ctx.send_packet(Packet::ack(
            ack,
            self.window_size,
            self.local.clone(),
            self.remote.clone(),
        ));
    }

    /// The ack number for out-of-order data: the last correctly
    /// received sequence number, or the START sentinel before any data
    /// has been accepted.
    fn last_good_seq(&self) -> u32 {
        if self.expected_seq == 0 {
            SEQ_START
        } else {
            self.expected_seq - 1
        }
    }
}

impl ProtocolNode for Receiver {
    fn on_packet(&mut self, ctx: &mut dyn NodeContext, packet: Packet) {
        let kind = packet.packet_type();
        let num = packet.trace_num();
        match (self.state, packet.into_body()) {
            (ReceiverState::Idle, PacketBody::Start) => {
                ctx.trace(PacketType::Start, SEQ_START, Disposition::Received);
                self.state = ReceiverState::Expecting;
                self.send_ack(ctx, SEQ_START, Disposition::Sent);
            }
            // The start ack was lost and the sender retransmitted.
            (ReceiverState::Expecting, PacketBody::Start) => {
                self.send_ack(ctx, SEQ_START, Disposition::Resent);
            }
            (ReceiverState::Expecting, PacketBody::Data { seq, payload }) => {
                if seq == self.expected_seq {
                    ctx.trace(PacketType::Data, seq, Disposition::Received);
                    ctx.deliver_payload(payload);
                    self.expected_seq += 1;
                    self.send_ack(ctx, seq, Disposition::Sent);
                } else if seq < self.expected_seq {
                    // Duplicate after a lost ACK: satisfy the sender's
                    // wait, never re-deliver.
                    ctx.trace(PacketType::Data, seq, Disposition::Ignored);
                    self.send_ack(ctx, seq, Disposition::Resent);
                } else {
                    // Out of order. Cannot happen with a single
                    // stop-and-wait path, handled anyway.
                    ctx.trace(PacketType::Data, seq, Disposition::Ignored);
                    self.send_ack(ctx, self.last_good_seq(), Disposition::Resent);
                }
            }
            (ReceiverState::Expecting, PacketBody::End) => {
                ctx.trace(PacketType::End, SEQ_END, Disposition::Received);
                self.state = ReceiverState::Done;
                self.send_ack(ctx, SEQ_END, Disposition::Sent);
                ctx.complete(TransferOutcome::Completed);
            }
            // The end ack was lost and the sender retransmitted.
            (ReceiverState::Done, PacketBody::End) => {
                self.send_ack(ctx, SEQ_END, Disposition::Resent);
            }
            _ => {
                ctx.trace(kind, num, Disposition::Ignored);
            }
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn NodeContext, _timer_id: u32) {
        // The receiver arms no timers.
    }
}
