use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use bytes::Bytes;
use tracing::info;

use saw_abstract::{PacketType, SimConfig, TestAction, TestAssertion, TestScenario, TransferOutcome};

use crate::session::start_transfer;
use crate::trace::SessionReport;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    let scenario: TestScenario =
        toml::from_str(&content).context("Failed to parse scenario file")?;
    Ok(scenario)
}

pub fn run_scenario_file(path: &Path) -> Result<SessionReport> {
    let scenario = load_scenario(path)?;
    run_scenario(&scenario)
}

/// Run one scenario: apply config overrides, wire the deterministic
/// fault injections into the relay, drive the session, then check
/// every assertion.
pub fn run_scenario(scenario: &TestScenario) -> Result<SessionReport> {
    info!("Running scenario: {}", scenario.name);

    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let payload: Vec<Bytes> = scenario
        .payload
        .iter()
        .map(|unit| Bytes::from(unit.clone()))
        .collect();
    let mut session = start_transfer(config, payload)?;

    for action in &scenario.actions {
        match action {
            TestAction::DropNextDataSeq { seq } => session.relay_mut().drop_data_seq_once(*seq),
            TestAction::DropNextAckNum { ack } => session.relay_mut().drop_ack_num_once(*ack),
            TestAction::DropNextOfType { code } => {
                let kind = PacketType::from_code(*code)
                    .with_context(|| format!("scenario '{}' names a bad type code", scenario.name))?;
                session.relay_mut().drop_next_of_type(kind);
            }
        }
    }

    let report = session.run();
    check_assertions(scenario, &report)?;
    info!("Scenario '{}' passed", scenario.name);
    Ok(report)
}

fn check_assertions(scenario: &TestScenario, report: &SessionReport) -> Result<()> {
    for assertion in &scenario.assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let delivered = report.delivered_strings();
                ensure!(
                    delivered == *data,
                    "scenario '{}': delivered {:?}, expected {:?}",
                    scenario.name,
                    delivered,
                    data
                );
            }
            TestAssertion::SessionCompleted => {
                ensure!(
                    report.outcome == Some(TransferOutcome::Completed),
                    "scenario '{}': expected completion, got {:?}",
                    scenario.name,
                    report.outcome
                );
            }
            TestAssertion::SessionFailed { retries_exhausted } => match &report.outcome {
                Some(TransferOutcome::Failed {
                    retries_exhausted: actual,
                    ..
                }) => ensure!(
                    actual == retries_exhausted,
                    "scenario '{}': retries_exhausted was {}, expected {}",
                    scenario.name,
                    actual,
                    retries_exhausted
                ),
                other => anyhow::bail!(
                    "scenario '{}': expected failure, got {:?}",
                    scenario.name,
                    other
                ),
            },
            TestAssertion::PacketsSent { min, max } => {
                ensure!(
                    report.packets_sent >= *min,
                    "scenario '{}': only {} packets sent, expected at least {}",
                    scenario.name,
                    report.packets_sent,
                    min
                );
                if let Some(max) = max {
                    ensure!(
                        report.packets_sent <= *max,
                        "scenario '{}': {} packets sent, expected at most {}",
                        scenario.name,
                        report.packets_sent,
                        max
                    );
                }
            }
            TestAssertion::MaxDuration { ms } => {
                ensure!(
                    report.duration_ms <= *ms,
                    "scenario '{}': took {}ms, limit {}ms",
                    scenario.name,
                    report.duration_ms,
                    ms
                );
            }
        }
    }
    Ok(())
}
