use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use saw_abstract::{LossModel, Packet, PacketBody, PacketType};

use crate::engine::NodeId;

/// Result of one relay decision. Dropping is silent toward both
/// endpoints; nobody is notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub forwarded: bool,
}

/// The network node between the two clients. Stateless with respect to
/// packet contents: it only decides forward or drop, per its loss
/// model and any one-shot fault injections, and makes no assumptions
/// about what kinds of packets arrive in which order.
pub struct NetworkRelay {
    loss: LossModel,
    rng: StdRng,
    relayed: u64,
    drop_data_seq_once: Vec<u32>,
    drop_ack_num_once: Vec<u32>,
    drop_type_once: Vec<PacketType>,
}

impl NetworkRelay {
    pub fn new(loss: LossModel, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            loss,
            rng,
            relayed: 0,
            drop_data_seq_once: Vec::new(),
            drop_ack_num_once: Vec::new(),
            drop_type_once: Vec::new(),
        }
    }

    /// Drop the first DATA packet with this sequence number. Push the
    /// same seq again to also drop its resends.
    pub fn drop_data_seq_once(&mut self, seq: u32) {
        self.drop_data_seq_once.push(seq);
    }

    /// Drop the first ACK with this ack number.
    pub fn drop_ack_num_once(&mut self, ack: u32) {
        self.drop_ack_num_once.push(ack);
    }

    /// Drop the next packet of the given type.
    pub fn drop_next_of_type(&mut self, kind: PacketType) {
        self.drop_type_once.push(kind);
    }

    /// Decide whether `packet`, arriving from `from`, gets forwarded to
    /// the opposite endpoint.
    pub fn relay(&mut self, packet: &Packet, from: NodeId) -> RelayOutcome {
        self.relayed += 1;
        if self.injected_drop(packet) {
            debug!(
                node = ?from,
                kind = ?packet.packet_type(),
                num = packet.trace_num(),
                "relay: deterministic drop"
            );
            return RelayOutcome { forwarded: false };
        }
        let forwarded = match self.loss {
            LossModel::AlwaysForward => true,
            LossModel::Bernoulli { drop_probability } => {
                self.rng.random::<f64>() >= drop_probability
            }
            LossModel::EveryNth { n } => n == 0 || !self.relayed.is_multiple_of(u64::from(n)),
        };
        debug!(
            node = ?from,
            kind = ?packet.packet_type(),
            num = packet.trace_num(),
            forwarded,
            "relay decision"
        );
        RelayOutcome { forwarded }
    }

    fn injected_drop(&mut self, packet: &Packet) -> bool {
        match packet.body() {
            PacketBody::Data { seq, .. } => {
                if let Some(pos) = self.drop_data_seq_once.iter().position(|s| s == seq) {
                    self.drop_data_seq_once.remove(pos);
                    return true;
                }
            }
            PacketBody::Ack { ack } => {
                if let Some(pos) = self.drop_ack_num_once.iter().position(|a| a == ack) {
                    self.drop_ack_num_once.remove(pos);
                    return true;
                }
            }
            _ => {}
        }
        if let Some(pos) = self
            .drop_type_once
            .iter()
            .position(|t| *t == packet.packet_type())
        {
            self.drop_type_once.remove(pos);
            return true;
        }
        false
    }
}
