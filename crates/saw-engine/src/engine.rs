use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info};

use saw_abstract::{
    Disposition, NodeContext, Packet, PacketType, ProtocolNode, SimConfig, TransferOutcome,
};

use crate::relay::NetworkRelay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival {
        to: NodeId,
        packet: Packet,
    },
    TimerExpiry {
        node: NodeId,
        timer_id: u32,
        generation: u64,
    },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// One structured entry of the logging interface: packet kind, the
/// applicable number, and what happened to it. Line formatting belongs
/// to whoever consumes the trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub time: u64,
    pub node: NodeId,
    pub kind: PacketType,
    pub number: u32,
    pub disposition: Disposition,
}

/// A human-readable summary of a wire-level event.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

/// Actions buffered during one node callback.
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timers_start: Vec<(u64, u32)>, // (delay, id)
    timers_cancel: Vec<u32>,
    traces: Vec<(PacketType, u32, Disposition)>,
    delivered: Vec<Bytes>,
    outcome: Option<TransferOutcome>,
}

/// Context implementation handed to a node for the duration of one
/// callback.
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl NodeContext for ScopedContext<'_> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.buffer.timers_start.push((delay_ms, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.buffer.timers_cancel.push(timer_id);
    }

    fn deliver_payload(&mut self, unit: Bytes) {
        self.buffer.delivered.push(unit);
    }

    fn complete(&mut self, outcome: TransferOutcome) {
        self.buffer.outcome = Some(outcome);
    }

    fn trace(&mut self, kind: PacketType, number: u32, disposition: Disposition) {
        self.buffer.traces.push((kind, number, disposition));
    }

    fn now(&self) -> u64 {
        self.now
    }
}

/// Deterministic discrete-event loop driving the sender, the receiver
/// and the relay. Each actor runs only inside its own callback and
/// talks to the others exclusively through scheduled events, so no
/// shared mutable state exists outside the engine itself.
pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    relay: NetworkRelay,

    pub sender: Box<dyn ProtocolNode>,
    pub receiver: Box<dyn ProtocolNode>,

    /// Payload units accepted by the receiver, in order.
    pub delivered: Vec<Bytes>,
    pub sender_outcome: Option<TransferOutcome>,
    pub receiver_outcome: Option<TransferOutcome>,
    reception_callback: Option<Box<dyn FnMut(&[Bytes])>>,

    pub packets_sent: u64,
    pub packets_forwarded: u64,
    pub packets_dropped: u64,
    pub trace: Vec<TraceRecord>,
    pub link_events: Vec<LinkEventSummary>,

    /// Timer generations to handle cancellation: a cancel bumps the
    /// generation, an expiry carrying a stale generation is skipped.
    timer_generations: HashMap<(NodeId, u32), u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        relay: NetworkRelay,
        sender: Box<dyn ProtocolNode>,
        receiver: Box<dyn ProtocolNode>,
    ) -> Self {
        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            relay,
            sender,
            receiver,
            delivered: Vec::new(),
            sender_outcome: None,
            receiver_outcome: None,
            reception_callback: None,
            packets_sent: 0,
            packets_forwarded: 0,
            packets_dropped: 0,
            trace: Vec::new(),
            link_events: Vec::new(),
            timer_generations: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Access the relay for deterministic fault injection.
    pub fn relay_mut(&mut self) -> &mut NetworkRelay {
        &mut self.relay
    }

    /// Register a callback fired once the receiver finalizes, with the
    /// accumulated ordered payload.
    pub fn on_reception_complete(&mut self, callback: impl FnMut(&[Bytes]) + 'static) {
        self.reception_callback = Some(Box::new(callback));
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn init(&mut self) {
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.receiver.init(&mut ctx);
            self.process_actions(NodeId::Receiver, buffer);
        }
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.sender.init(&mut ctx);
            self.process_actions(NodeId::Sender, buffer);
        }
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Abort the session: drop every queued event and invalidate all
    /// pending timers, leaking nothing.
    pub fn abort(&mut self) {
        self.event_queue.clear();
        for generation in self.timer_generations.values_mut() {
            *generation += 1;
        }
    }

    /// Process the next event. Returns false once the queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match to {
                        NodeId::Sender => self.sender.on_packet(&mut ctx, packet),
                        NodeId::Receiver => self.receiver.on_packet(&mut ctx, packet),
                    }
                }
                self.process_actions(to, buffer);
            }
            EventType::TimerExpiry {
                node,
                timer_id,
                generation,
            } => {
                // A bumped generation means the timer was cancelled
                // after this expiry was queued.
                let current = self.timer_generations.get(&(node, timer_id)).copied();
                if current != Some(generation) {
                    debug!("Skipping cancelled timer event for timer_id={}", timer_id);
                    return true;
                }

                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match node {
                        NodeId::Sender => self.sender.on_timer(&mut ctx, timer_id),
                        NodeId::Receiver => self.receiver.on_timer(&mut ctx, timer_id),
                    }
                }
                self.process_actions(node, buffer);
            }
        }
        true
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    fn record(&mut self, node: NodeId, kind: PacketType, number: u32, disposition: Disposition) {
        self.trace.push(TraceRecord {
            time: self.time,
            node,
            kind,
            number,
            disposition,
        });
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for (kind, number, disposition) in buffer.traces {
            info!("[{:?}] {:?} {:?} {}", source_node, disposition, kind, number);
            self.record(source_node, kind, number, disposition);
        }

        for unit in buffer.delivered {
            info!("[{:?}] DELIVERED {} bytes", source_node, unit.len());
            self.delivered.push(unit);
        }

        if let Some(outcome) = buffer.outcome {
            info!("[{:?}] terminal outcome: {:?}", source_node, outcome);
            match source_node {
                NodeId::Sender => self.sender_outcome = Some(outcome),
                NodeId::Receiver => {
                    let completed = outcome == TransferOutcome::Completed;
                    self.receiver_outcome = Some(outcome);
                    if completed && let Some(callback) = self.reception_callback.as_mut() {
                        callback(&self.delivered);
                    }
                }
            }
        }

        // Cancellations bump the generation before new timers snapshot
        // it, so a cancel+restart in the same callback stays valid.
        for timer_id in buffer.timers_cancel {
            let generation = self
                .timer_generations
                .entry((source_node, timer_id))
                .or_insert(0);
            *generation += 1;
        }

        for (delay, timer_id) in buffer.timers_start {
            let generation = *self
                .timer_generations
                .entry((source_node, timer_id))
                .or_insert(0);
            self.push_event(
                self.time + delay,
                EventType::TimerExpiry {
                    node: source_node,
                    timer_id,
                    generation,
                },
            );
        }

        for packet in buffer.outgoing_packets {
            self.packets_sent += 1;
            let target_node = source_node.peer();
            let kind = packet.packet_type();
            let number = packet.trace_num();

            if self.relay.relay(&packet, source_node).forwarded {
                self.packets_forwarded += 1;
                self.record(source_node, kind, number, Disposition::Forwarded);
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] FORWARDED {:?} {} ({})",
                        source_node,
                        target_node,
                        kind,
                        number,
                        packet.rendered()
                    ),
                });
                // Scheduled delayed delivery; the relay keeps servicing
                // the opposite direction meanwhile.
                self.push_event(
                    self.time + self.config.transit_delay_ms,
                    EventType::PacketArrival {
                        to: target_node,
                        packet,
                    },
                );
            } else {
                self.packets_dropped += 1;
                self.record(source_node, kind, number, Disposition::Dropped);
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] DROPPED {:?} {} ({})",
                        source_node,
                        target_node,
                        kind,
                        number,
                        packet.rendered()
                    ),
                });
                debug!("Packet lost in relay");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saw_abstract::LossModel;
    use std::cell::Cell;
    use std::rc::Rc;

    struct TimerProbe {
        fired: Rc<Cell<bool>>,
        cancelled: Rc<Cell<bool>>,
    }

    impl ProtocolNode for TimerProbe {
        fn init(&mut self, ctx: &mut dyn NodeContext) {
            // Timer 0 would fire at 10ms; timer 1 fires first and
            // cancels it.
            ctx.start_timer(10, 0);
            ctx.start_timer(5, 1);
        }

        fn on_packet(&mut self, _ctx: &mut dyn NodeContext, _packet: Packet) {}

        fn on_timer(&mut self, ctx: &mut dyn NodeContext, timer_id: u32) {
            match timer_id {
                0 => self.fired.set(true),
                1 => {
                    ctx.cancel_timer(0);
                    self.cancelled.set(true);
                }
                _ => {}
            }
        }
    }

    struct Inert;

    impl ProtocolNode for Inert {
        fn on_packet(&mut self, _ctx: &mut dyn NodeContext, _packet: Packet) {}
        fn on_timer(&mut self, _ctx: &mut dyn NodeContext, _timer_id: u32) {}
    }

    fn probe_sim() -> (Simulator, Rc<Cell<bool>>, Rc<Cell<bool>>) {
        let fired = Rc::new(Cell::new(false));
        let cancelled = Rc::new(Cell::new(false));
        let probe = TimerProbe {
            fired: fired.clone(),
            cancelled: cancelled.clone(),
        };
        let config = SimConfig::default();
        let relay = NetworkRelay::new(LossModel::AlwaysForward, Some(0));
        let sim = Simulator::new(config, relay, Box::new(probe), Box::new(Inert));
        (sim, fired, cancelled)
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let (mut sim, fired, cancelled) = probe_sim();
        sim.run_until_complete();
        assert!(cancelled.get(), "cancelling timer should have fired");
        assert!(!fired.get(), "cancelled timer must not fire");
    }

    #[test]
    fn abort_drains_queue_and_timers() {
        let (mut sim, fired, _) = probe_sim();
        sim.init();
        assert!(sim.remaining_events() > 0);
        sim.abort();
        assert_eq!(sim.remaining_events(), 0);
        while sim.step() {}
        assert!(!fired.get());
    }
}
