use serde::Deserialize;

use crate::config::{LossModel, SimConfig};

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Payload units handed to the sender, in order.
    #[serde(default)]
    pub payload: Vec<String>,
    pub config: SimConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    /// Shorthand for `loss = { type = "bernoulli", ... }`.
    pub drop_probability: Option<f64>,
    pub loss: Option<LossModel>,
    pub transit_delay_ms: Option<u64>,
    pub retransmit_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub seed: Option<u64>,
    pub window_size: Option<u16>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(p) = self.drop_probability {
            config.loss = LossModel::Bernoulli {
                drop_probability: p,
            };
        }
        if let Some(loss) = &self.loss {
            config.loss = loss.clone();
        }
        if let Some(v) = self.transit_delay_ms {
            config.transit_delay_ms = v;
        }
        if let Some(v) = self.retransmit_timeout_ms {
            config.retransmit_timeout_ms = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.seed {
            config.seed = Some(v);
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Deterministically drop the first DATA packet with this sequence
    /// number. Repeat the action to drop resends too.
    DropNextDataSeq { seq: u32 },
    /// Deterministically drop the first ACK with this ack number.
    DropNextAckNum { ack: u32 },
    /// Deterministically drop the next packet of the given type code
    /// (SOT=1, DATA=2, ACK=3, EOT=4).
    DropNextOfType { code: u8 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// The receiver's accumulated payload equals this, in order.
    DataDelivered { data: Vec<String> },
    SessionCompleted,
    SessionFailed { retries_exhausted: bool },
    /// Total packets placed on the wire by both endpoints.
    PacketsSent { min: u64, max: Option<u64> },
    /// The session finishes within this much simulated time.
    MaxDuration { ms: u64 },
}
