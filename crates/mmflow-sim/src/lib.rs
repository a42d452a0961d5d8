//! mmflow-sim: Population feedback simulator
//!
//! Drives the throughput model and population optimizer over rounds and
//! reports the trajectory. Independent scenarios run on separate blocking
//! tasks; each owns its solver state and shares nothing writable.

pub mod report;
pub mod simulation;

pub use report::RunReport;
pub use simulation::{RoundRecord, RunOutcome, Simulation, StopReason};

use chrono::Utc;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use mmflow_core::{MmflowError, MmflowResult, ScenarioConfig};
use tokio::task::JoinSet;
use tracing::{error, info};

/// Run one scenario to completion
pub fn run_scenario(config: ScenarioConfig, rounds: Option<u32>) -> MmflowResult<RunReport> {
    let started_at = Utc::now();
    let sim = Simulation::new(config)?;
    let outcome = sim.run_rounds(rounds.unwrap_or(sim.config().scenario.rounds))?;

    Ok(RunReport::new(
        &sim.config().scenario.name,
        sim.topology(),
        outcome,
        started_at,
    ))
}

/// Run scenarios concurrently, returning results in input order
pub async fn run_scenarios(
    configs: Vec<ScenarioConfig>,
    rounds: Option<u32>,
) -> Vec<MmflowResult<RunReport>> {
    let count = configs.len();
    let jobs: Vec<_> = configs
        .into_iter()
        .map(|config| move || run_scenario(config, rounds))
        .collect();
    let results = join_in_order(jobs).await;

    info!(scenarios = count, "All scenarios finished");
    results
}

/// Run each job on a blocking task; a panicking job yields an error in its
/// own slot instead of losing its position.
async fn join_in_order<T, F>(jobs: Vec<F>) -> Vec<MmflowResult<T>>
where
    T: Send + 'static,
    F: FnOnce() -> MmflowResult<T> + Send + 'static,
{
    let count = jobs.len();
    let mut tasks = JoinSet::new();

    for (index, job) in jobs.into_iter().enumerate() {
        tasks.spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                Err(MmflowError::InternalInvariantViolation(format!(
                    "scenario task panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
            (index, result)
        });
    }

    let mut results: Vec<Option<MmflowResult<T>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                if let Err(e) = &result {
                    error!(index = index, error = %e, "Scenario failed");
                }
                results[index] = Some(result);
            }
            Err(e) => {
                error!(error = %e, cancelled = e.is_cancelled(), "Scenario task did not complete");
            }
        }
    }

    results
        .into_iter()
        .map(|r| {
            r.unwrap_or_else(|| {
                Err(MmflowError::InternalInvariantViolation(
                    "scenario task did not complete".to_string(),
                ))
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_scenarios_keeps_order() {
        let mut second = ScenarioConfig::default();
        second.scenario.name = "second".to_string();
        let mut broken = ScenarioConfig::default();
        broken.scenario.name = "broken".to_string();
        broken.resources[0].capacity = -1.0;

        let results = run_scenarios(
            vec![ScenarioConfig::default(), second, broken],
            Some(3),
        )
        .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().scenario, "default");
        assert_eq!(results[1].as_ref().unwrap().scenario, "second");
        assert_eq!(results[1].as_ref().unwrap().rounds.len(), 3);
        assert!(matches!(results[2], Err(MmflowError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_its_slot() {
        type Job = Box<dyn FnOnce() -> MmflowResult<u32> + Send>;
        let jobs: Vec<Job> = vec![
            Box::new(|| Ok(1)),
            Box::new(|| panic!("bad topology")),
            Box::new(|| Ok(3)),
        ];

        let results = join_in_order(jobs).await;

        assert_eq!(results.len(), 3);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        match &results[1] {
            Err(MmflowError::InternalInvariantViolation(msg)) => {
                assert!(msg.contains("bad topology"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }

    #[test]
    fn test_run_scenario_uses_configured_rounds() {
        let mut config = ScenarioConfig::default();
        config.scenario.rounds = 4;

        let report = run_scenario(config, None).unwrap();
        assert_eq!(report.rounds.len(), 4);
        assert_eq!(report.stop_reason, StopReason::RoundLimit);
    }
}
