use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use tracing::info;

use saw_abstract::{LossModel, SimConfig, TransferOutcome};
use saw_engine::{SessionReport, scenario_runner, start_transfer};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stop-and-Wait ARQ protocol simulator")]
struct Args {
    /// Run a scenario file instead of an ad-hoc transfer.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Payload unit to transfer (repeatable, in order).
    #[arg(long = "payload", value_name = "UNIT")]
    payload: Vec<String>,

    /// Per-packet drop probability of the relay, in [0, 1).
    #[arg(long, default_value_t = 0.0)]
    drop_probability: f64,

    /// Simulated one-way transit delay in milliseconds.
    #[arg(long, default_value_t = 50)]
    transit_delay_ms: u64,

    /// Sender retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    retransmit_timeout_ms: u64,

    /// Consecutive timeouts the sender tolerates before giving up.
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// RNG seed for a deterministic run.
    #[arg(long)]
    seed: Option<u64>,

    /// Write a JSON trace of the finished session.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let report = if let Some(path) = &args.scenario {
        scenario_runner::run_scenario_file(path)?
    } else {
        run_ad_hoc(&args)?
    };

    summarize(&report);

    if let Some(path) = &args.trace_out {
        write_trace(path, &report)?;
    }

    Ok(())
}

fn run_ad_hoc(args: &Args) -> Result<SessionReport> {
    let config = SimConfig {
        loss: LossModel::Bernoulli {
            drop_probability: args.drop_probability,
        },
        transit_delay_ms: args.transit_delay_ms,
        retransmit_timeout_ms: args.retransmit_timeout_ms,
        max_retries: args.max_retries,
        seed: args.seed,
        ..SimConfig::default()
    };

    let payload: Vec<Bytes> = if args.payload.is_empty() {
        vec![
            Bytes::from_static(b"Packet 1"),
            Bytes::from_static(b"Packet 2"),
            Bytes::from_static(b"Packet 3"),
        ]
    } else {
        args.payload
            .iter()
            .map(|unit| Bytes::from(unit.clone()))
            .collect()
    };

    let mut session = start_transfer(config, payload)?;
    session.on_reception_complete(|payload| {
        info!("Receiver finalized with {} payload units", payload.len());
    });
    Ok(session.run())
}

fn summarize(report: &SessionReport) {
    match &report.outcome {
        Some(TransferOutcome::Completed) => info!(
            "Session completed in {}ms: {} units delivered, {} packets sent ({} dropped)",
            report.duration_ms,
            report.delivered.len(),
            report.packets_sent,
            report.packets_dropped
        ),
        Some(TransferOutcome::Failed {
            reason, failed_seq, ..
        }) => info!(
            "Session failed on seq {} after {}ms: {}",
            failed_seq, report.duration_ms, reason
        ),
        None => info!("Session aborted before reaching an outcome"),
    }
}

fn write_trace(path: &Path, report: &SessionReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize session trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
