//! Population feedback loop

use mmflow_core::{MmflowResult, Population, ScenarioConfig, Topology};
use mmflow_solver::{FairnessSolver, PopulationOptimizer, ThroughputModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The configured number of rounds ran
    RoundLimit,
    /// Throughput came within tolerance of the goal
    Converged { round: u32 },
    /// A user's population reached zero, so its weight is no longer valid
    PopulationExhausted { user: String },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::RoundLimit => write!(f, "round limit reached"),
            StopReason::Converged { round } => write!(f, "converged in round {}", round),
            StopReason::PopulationExhausted { user } => {
                write!(f, "population of user {} exhausted", user)
            }
        }
    }
}

/// What happened in one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    /// Population the throughput was computed for
    pub population: Population,
    pub throughput: Vec<f64>,
    /// Largest absolute distance between throughput and goal
    pub deviation: f64,
    /// Names of saturated resources
    pub saturated: Vec<String>,
    /// Names of users that lost one unit, one per saturated resource
    pub throttled: Vec<String>,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub goal: Vec<f64>,
    pub rounds: Vec<RoundRecord>,
    pub stop_reason: StopReason,
    pub final_population: Population,
}

/// Alternates throughput solves and population updates
pub struct Simulation {
    config: ScenarioConfig,
    topology: Arc<Topology>,
    model: ThroughputModel,
    optimizer: PopulationOptimizer,
}

impl Simulation {
    /// Create a simulation whose solver logs through `tracing`
    pub fn new(config: ScenarioConfig) -> MmflowResult<Self> {
        let solver = FairnessSolver::new(config.solver);
        Self::with_solver(config, solver)
    }

    /// Create a simulation with a caller-supplied solver
    pub fn with_solver(config: ScenarioConfig, solver: FairnessSolver) -> MmflowResult<Self> {
        let topology = Arc::new(config.topology()?);
        let model = ThroughputModel::new(Arc::clone(&topology), solver)?;
        let optimizer = PopulationOptimizer::new(Arc::clone(&topology), config.optimizer);

        Ok(Self {
            config,
            topology,
            model,
            optimizer,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Target allocation: the fair share of the ideal weights with unit RTTs
    pub fn goal(&self) -> MmflowResult<Vec<f64>> {
        self.model
            .solver()
            .solve_topology(&self.topology.ideal_weights(), &self.topology)
    }

    /// Run for the configured number of rounds
    pub fn run(&self) -> MmflowResult<RunOutcome> {
        self.run_rounds(self.config.scenario.rounds)
    }

    /// Run for at most `rounds` rounds
    pub fn run_rounds(&self, rounds: u32) -> MmflowResult<RunOutcome> {
        let goal = self.goal()?;
        let mut population = self.config.initial_population();
        let mut records = Vec::new();
        let mut stop_reason = StopReason::RoundLimit;

        info!(
            scenario = %self.config.scenario.name,
            rounds = rounds,
            goal = ?goal,
            "Starting simulation"
        );

        for round in 1..=rounds {
            if let Some(i) = population.iter().position(|&n| n <= 0) {
                let user = self.topology.users()[i].name.clone();
                warn!(round = round, user = %user, "Population exhausted");
                stop_reason = StopReason::PopulationExhausted { user };
                break;
            }

            let weights: Vec<f64> = population.iter().map(|&n| n as f64).collect();
            let throughput = self.model.tput(&weights)?;
            let deviation = max_deviation(&throughput, &goal);
            let plan = self.optimizer.plan(&throughput)?;

            debug!(
                round = round,
                population = ?population,
                throughput = ?throughput,
                deviation = deviation,
                "Round complete"
            );

            records.push(RoundRecord {
                round,
                population: population.clone(),
                throughput,
                deviation,
                saturated: plan
                    .saturated
                    .iter()
                    .map(|&j| self.topology.resources()[j].name.clone())
                    .collect(),
                throttled: plan
                    .throttles
                    .iter()
                    .map(|t| self.topology.users()[t.user].name.clone())
                    .collect(),
            });

            if let Some(tolerance) = self.config.scenario.convergence_tolerance {
                if deviation <= tolerance {
                    stop_reason = StopReason::Converged { round };
                    break;
                }
            }

            population = plan.apply(&population);
        }

        info!(
            scenario = %self.config.scenario.name,
            rounds = records.len(),
            stop = %stop_reason,
            population = ?population,
            "Simulation finished"
        );

        Ok(RunOutcome {
            goal,
            rounds: records,
            stop_reason,
            final_population: population,
        })
    }
}

fn max_deviation(throughput: &[f64], goal: &[f64]) -> f64 {
    throughput
        .iter()
        .zip(goal)
        .map(|(t, g)| (t - g).abs())
        .fold(0.0, f64::max)
}
