//! Run reports

use chrono::{DateTime, Utc};
use mmflow_core::{MmflowResult, Population, Topology};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use uuid::Uuid;

use crate::simulation::{RoundRecord, RunOutcome, StopReason};

/// Serializable summary of one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub users: Vec<String>,
    pub resources: Vec<String>,
    pub goal: Vec<f64>,
    pub rounds: Vec<RoundRecord>,
    pub stop_reason: StopReason,
    pub final_population: Population,
}

impl RunReport {
    pub fn new(
        scenario: &str,
        topology: &Topology,
        outcome: RunOutcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: scenario.to_string(),
            started_at,
            finished_at: Utc::now(),
            users: topology.users().iter().map(|u| u.name.clone()).collect(),
            resources: topology.resources().iter().map(|r| r.name.clone()).collect(),
            goal: outcome.goal,
            rounds: outcome.rounds,
            stop_reason: outcome.stop_reason,
            final_population: outcome.final_population,
        }
    }

    pub fn to_json(&self) -> MmflowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable table of the trajectory
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Scenario: {} ({})", self.scenario, self.run_id);
        let _ = writeln!(out, "Users:    {}", self.users.join(", "));
        let _ = writeln!(out, "Goal:     {}", format_values(&self.goal));
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<6} {:<24} {:<36} {:<10} THROTTLED",
            "ROUND", "POPULATION", "THROUGHPUT", "DEVIATION"
        );

        for record in &self.rounds {
            let population: Vec<String> = record.population.iter().map(|n| n.to_string()).collect();
            let _ = writeln!(
                out,
                "{:<6} {:<24} {:<36} {:<10.4} {}",
                record.round,
                population.join(" "),
                format_values(&record.throughput),
                record.deviation,
                record.throttled.join(" ")
            );
        }

        let final_population: Vec<String> =
            self.final_population.iter().map(|n| n.to_string()).collect();
        let _ = writeln!(out);
        let _ = writeln!(out, "Stopped:  {}", self.stop_reason);
        let _ = writeln!(out, "Final:    {}", final_population.join(" "));

        out
    }
}

fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:.3}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Simulation;
    use mmflow_core::ScenarioConfig;

    fn report(rounds: u32) -> RunReport {
        let sim = Simulation::new(ScenarioConfig::default()).unwrap();
        let outcome = sim.run_rounds(rounds).unwrap();
        RunReport::new("default", sim.topology(), outcome, Utc::now())
    }

    #[test]
    fn test_report_json() {
        let report = report(2);
        let json = report.to_json().unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["scenario"], "default");
        assert_eq!(parsed["rounds"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["stop_reason"]["reason"], "round_limit");
        assert_eq!(parsed["users"][2], "C");
    }

    #[test]
    fn test_report_text() {
        let text = report(2).render_text();

        assert!(text.contains("Scenario: default"));
        assert!(text.contains("Goal:     9.001 0.999 1.000"));
        assert!(text.contains("Stopped:  round limit reached"));
        assert!(text.contains("Final:    80 8 8"));
    }
}
