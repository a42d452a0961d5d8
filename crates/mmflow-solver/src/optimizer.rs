//! Population optimizer driven by saturated resources

use mmflow_core::{MmflowError, MmflowResult, OptimizerConfig, Population, Topology};
use std::sync::Arc;
use tracing::debug;

/// One population unit removed because of a saturated resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throttle {
    /// Saturated resource index
    pub resource: usize,
    /// User losing one population unit
    pub user: usize,
    /// `allocation / ideal_weight` of that user
    pub score: f64,
}

/// Decisions for one optimizer round
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// Aggregate allocation per resource
    pub utilization: Vec<f64>,
    /// Saturated resources in index order
    pub saturated: Vec<usize>,
    /// One entry per saturated resource
    pub throttles: Vec<Throttle>,
    /// Per-user population change
    pub delta: Vec<i64>,
}

impl UpdatePlan {
    /// Add the accumulated deltas to a population
    pub fn apply(&self, population: &[i64]) -> Population {
        population
            .iter()
            .zip(&self.delta)
            .map(|(n, d)| n + d)
            .collect()
    }
}

/// Steers the population toward the ideal weights
///
/// Every saturated resource removes one unit from the incident user with
/// the highest `allocation / ideal_weight`. Populations only ever shrink.
#[derive(Debug, Clone)]
pub struct PopulationOptimizer {
    topology: Arc<Topology>,
    config: OptimizerConfig,
    capacities: Vec<f64>,
    ideal_weights: Vec<f64>,
}

impl PopulationOptimizer {
    pub fn new(topology: Arc<Topology>, config: OptimizerConfig) -> Self {
        Self {
            capacities: topology.capacities(),
            ideal_weights: topology.ideal_weights(),
            topology,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Work out which users to throttle for an allocation
    pub fn plan(&self, allocation: &[f64]) -> MmflowResult<UpdatePlan> {
        let incidence = self.topology.incidence();
        if allocation.len() != incidence.users() {
            return Err(MmflowError::InvalidInput(format!(
                "{} allocations for {} users",
                allocation.len(),
                incidence.users()
            )));
        }

        let utilization = incidence.load(allocation);
        let saturated: Vec<usize> = utilization
            .iter()
            .zip(&self.capacities)
            .enumerate()
            .filter(|(_, (used, cap))| (*used - *cap).abs() < self.config.saturation_tolerance)
            .map(|(j, _)| j)
            .collect();

        let mut delta = vec![0i64; allocation.len()];
        let mut throttles = Vec::with_capacity(saturated.len());

        for &j in &saturated {
            let mut best: Option<(usize, f64)> = None;
            for i in incidence.users_of(j) {
                let ideal = self.ideal_weights[i];
                if !ideal.is_finite() || ideal <= 0.0 {
                    continue;
                }
                let score = allocation[i] / ideal;
                // Strict comparison keeps the lowest index on ties
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((i, score));
                }
            }

            let (user, score) = best.ok_or_else(|| {
                MmflowError::InvalidConfiguration(format!(
                    "saturated resource '{}' has no incident user with a positive ideal weight",
                    self.topology.resources()[j].name
                ))
            })?;

            debug!(
                resource = %self.topology.resources()[j].name,
                user = %self.topology.users()[user].name,
                score = score,
                "Throttling user on saturated resource"
            );

            delta[user] -= 1;
            throttles.push(Throttle {
                resource: j,
                user,
                score,
            });
        }

        Ok(UpdatePlan {
            utilization,
            saturated,
            throttles,
            delta,
        })
    }

    /// Return the population after one optimizer round
    pub fn update(&self, allocation: &[f64], population: &[i64]) -> MmflowResult<Population> {
        if population.len() != allocation.len() {
            return Err(MmflowError::InvalidInput(format!(
                "{} population counts for {} allocations",
                population.len(),
                allocation.len()
            )));
        }

        Ok(self.plan(allocation)?.apply(population))
    }
}
