use serde::{Deserialize, Serialize};

use crate::packet::Endpoint;

/// Forward/drop decision policy of the network relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LossModel {
    /// Forward everything. Used by deterministic tests.
    AlwaysForward,
    /// Independent drop trial per packet with the given probability,
    /// which must lie in `[0, 1)`.
    Bernoulli { drop_probability: f64 },
    /// Deterministic rate: drop every n-th relayed packet.
    EveryNth { n: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss: LossModel,
    pub transit_delay_ms: u64,
    pub retransmit_timeout_ms: u64,
    pub max_retries: u32,
    /// Seed for the relay's RNG. `None` seeds from OS entropy; set it
    /// for deterministic runs.
    pub seed: Option<u64>,
    /// Advertised receiver capacity carried in every packet.
    /// Informational in stop-and-wait; never consulted.
    pub window_size: u16,
    pub sender_endpoint: Endpoint,
    pub receiver_endpoint: Endpoint,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss: LossModel::Bernoulli {
                drop_probability: 0.0,
            },
            transit_delay_ms: 50,
            retransmit_timeout_ms: 1000,
            max_retries: 5,
            seed: None,
            window_size: 1,
            sender_endpoint: Endpoint::new("10.0.0.1", 7710),
            receiver_endpoint: Endpoint::new("10.0.0.2", 7711),
        }
    }
}
