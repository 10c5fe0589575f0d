use bytes::Bytes;
use serde::Serialize;

use crate::error::ProtocolError;
use crate::packet::{Packet, PacketType};

/// How a packet event is reported to the logging sink. Combined with
/// the packet kind and number this carries everything the formatting
/// layer needs; rendering the actual line is not the engine's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disposition {
    Sent,
    Received,
    Forwarded,
    Dropped,
    Resent,
    Ignored,
}

/// Terminal result of a transfer session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TransferOutcome {
    Completed,
    Failed {
        reason: ProtocolError,
        retries_exhausted: bool,
        /// Wire sequence number of the unit the session failed on.
        failed_seq: u32,
    },
}

/// The capability the engine hands to a protocol node. Nodes interact
/// with the world only through this interface, which keeps the state
/// machines testable against a capturing fake.
pub trait NodeContext {
    /// Hand a packet to the network relay.
    fn send_packet(&mut self, packet: Packet);

    /// Arm a timer. `timer_id` identifies the timer for cancellation.
    fn start_timer(&mut self, delay_ms: u64, timer_id: u32);

    /// Cancel a running timer. A cancelled timer never fires, even if
    /// its expiry was already queued.
    fn cancel_timer(&mut self, timer_id: u32);

    /// Deliver one accepted payload unit, in order. Receiver side only.
    fn deliver_payload(&mut self, unit: Bytes);

    /// Report the node's terminal outcome. Emitted exactly once per
    /// session per node.
    fn complete(&mut self, outcome: TransferOutcome);

    /// Report a packet event to the logging sink.
    fn trace(&mut self, kind: PacketType, number: u32, disposition: Disposition);

    /// Current simulation time in ms.
    fn now(&self) -> u64;
}

/// A protocol endpoint driven by the event engine.
pub trait ProtocolNode {
    /// Called once when the session starts.
    fn init(&mut self, _ctx: &mut dyn NodeContext) {}

    /// Called when a packet arrives from the relay.
    fn on_packet(&mut self, ctx: &mut dyn NodeContext, packet: Packet);

    /// Called when a timer armed by this node expires.
    fn on_timer(&mut self, ctx: &mut dyn NodeContext, timer_id: u32);
}
