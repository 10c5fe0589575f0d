use anyhow::{Result, ensure};
use bytes::Bytes;

use saw_abstract::{LossModel, SimConfig};
use saw_proto::{Receiver, Sender};

use crate::engine::Simulator;
use crate::relay::NetworkRelay;
use crate::trace::SessionReport;

/// Build a session transferring `payload` under `config`.
///
/// The returned handle owns all three actors; nothing runs until
/// [`SessionHandle::run`] drives the event loop.
pub fn start_transfer(config: SimConfig, payload: Vec<Bytes>) -> Result<SessionHandle> {
    match config.loss {
        LossModel::Bernoulli { drop_probability } => ensure!(
            (0.0..1.0).contains(&drop_probability),
            "drop_probability must be in [0, 1), got {drop_probability}"
        ),
        LossModel::EveryNth { n } => ensure!(n >= 1, "every_nth loss model needs n >= 1"),
        LossModel::AlwaysForward => {}
    }
    ensure!(config.max_retries >= 1, "max_retries must be positive");

    let relay = NetworkRelay::new(config.loss.clone(), config.seed);
    let sender = Sender::new(&config, payload);
    let receiver = Receiver::new(&config);
    let sim = Simulator::new(config, relay, Box::new(sender), Box::new(receiver));
    Ok(SessionHandle { sim })
}

pub struct SessionHandle {
    sim: Simulator,
}

impl SessionHandle {
    /// Register a callback fired with the accumulated ordered payload
    /// once the receiver finalizes.
    pub fn on_reception_complete(&mut self, callback: impl FnMut(&[Bytes]) + 'static) {
        self.sim.on_reception_complete(callback);
    }

    /// Access the relay for deterministic fault injection before the
    /// run starts.
    pub fn relay_mut(&mut self) -> &mut NetworkRelay {
        self.sim.relay_mut()
    }

    /// Abort the session, deterministically dropping all queued
    /// deliveries and pending timers.
    pub fn abort(&mut self) {
        self.sim.abort();
    }

    /// Drive the exchange until both endpoints are quiescent and
    /// return the terminal report.
    pub fn run(mut self) -> SessionReport {
        self.sim.run_until_complete();
        let sim = self.sim;
        let config = sim.config().clone();
        let duration_ms = sim.current_time();
        SessionReport {
            config,
            outcome: sim.sender_outcome,
            delivered: sim.delivered,
            duration_ms,
            packets_sent: sim.packets_sent,
            packets_forwarded: sim.packets_forwarded,
            packets_dropped: sim.packets_dropped,
            trace: sim.trace,
            link_events: sim.link_events,
        }
    }
}
