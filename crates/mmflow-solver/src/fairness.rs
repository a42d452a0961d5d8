//! Progressive-filling max-min fairness solver
//!
//! Every unfrozen user grows at a rate proportional to its weight until
//! some resource runs out of capacity. That resource freezes, along with
//! every user touching it, and the remaining users keep growing. Each
//! round freezes at least one resource, so a solve takes at most one
//! round per resource.
//!
//! A resource is eligible to bound the next step only when it is unfrozen
//! and has strictly positive remaining capacity and strictly positive
//! demand. Resources that tie for the smallest step all freeze in the same
//! round, since freezing is decided by remaining capacity falling within
//! tolerance of zero rather than by which resource produced the minimum.
//!
//! Both the freeze tolerance and the feasibility tolerance are relative to
//! the resource's capacity (never smaller than the absolute value), so
//! rounding in large capacities does not read as overshoot.

use mmflow_core::{IncidenceMatrix, MmflowError, MmflowResult, SolverConfig, Topology};
use std::sync::Arc;

use crate::observer::{RoundSnapshot, SolveObserver, TracingObserver};

/// Max-min fair allocation by water-filling
#[derive(Clone)]
pub struct FairnessSolver {
    config: SolverConfig,
    observer: Arc<dyn SolveObserver>,
}

impl Default for FairnessSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl std::fmt::Debug for FairnessSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FairnessSolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FairnessSolver {
    /// Create a solver that reports progress through `tracing`
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the diagnostics observer
    pub fn with_observer(mut self, observer: Arc<dyn SolveObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve for the capacities and incidence of a topology
    pub fn solve_topology(&self, weights: &[f64], topology: &Topology) -> MmflowResult<Vec<f64>> {
        self.solve(weights, &topology.capacities(), topology.incidence())
    }

    /// Compute the max-min fair allocation
    ///
    /// Returns one allocation per user. Fails with `InvalidInput` before
    /// iterating if the inputs are malformed, and with
    /// `InternalInvariantViolation` if the result is not a feasible fixed
    /// point.
    pub fn solve(
        &self,
        weights: &[f64],
        capacities: &[f64],
        incidence: &IncidenceMatrix,
    ) -> MmflowResult<Vec<f64>> {
        validate(weights, capacities, incidence)?;
        self.observer.on_start(weights, capacities);

        let tolerance = self.config.tolerance;
        let max_rounds = self.config.max_rounds.unwrap_or(capacities.len() + 1);
        let mut state = FillState::new(weights.len(), capacities);

        let newly_frozen = state.freeze_exhausted(incidence, tolerance);
        self.observer.on_round(&state.snapshot(0, 0.0, &newly_frozen));

        let mut round = 0;
        while !state.all_users_frozen() && !state.all_resources_frozen() {
            if round >= max_rounds {
                return Err(MmflowError::InternalInvariantViolation(format!(
                    "water-fill did not converge within {} rounds",
                    max_rounds
                )));
            }
            round += 1;

            let demand = state.demand(weights, incidence);
            let Some(step) = state.next_step(&demand) else {
                break;
            };

            state.fill(weights, incidence, step);
            let newly_frozen = state.freeze_exhausted(incidence, tolerance);
            self.observer.on_round(&state.snapshot(round, step, &newly_frozen));
        }

        self.check_postconditions(&state, capacities, incidence)?;
        self.observer.on_finish(&state.allocation, round);

        Ok(state.allocation)
    }

    fn check_postconditions(
        &self,
        state: &FillState,
        capacities: &[f64],
        incidence: &IncidenceMatrix,
    ) -> MmflowResult<()> {
        if let Some(user) = state.user_frozen.iter().position(|frozen| !frozen) {
            return Err(MmflowError::InternalInvariantViolation(format!(
                "user {} left unfrozen after water-fill",
                user
            )));
        }

        let load = incidence.load(&state.allocation);
        for (j, (&used, &capacity)) in load.iter().zip(capacities).enumerate() {
            if used > capacity + scaled(self.config.feasibility_tolerance, capacity) {
                return Err(MmflowError::InternalInvariantViolation(format!(
                    "resource {} carries {} over capacity {}",
                    j, used, capacity
                )));
            }
        }

        Ok(())
    }
}

/// Tolerance scaled to the magnitude of a capacity
fn scaled(tolerance: f64, capacity: f64) -> f64 {
    tolerance * capacity.max(1.0)
}

fn validate(weights: &[f64], capacities: &[f64], incidence: &IncidenceMatrix) -> MmflowResult<()> {
    if weights.len() != incidence.users() {
        return Err(MmflowError::InvalidInput(format!(
            "{} weights for {} users",
            weights.len(),
            incidence.users()
        )));
    }
    if capacities.len() != incidence.resources() {
        return Err(MmflowError::InvalidInput(format!(
            "{} capacities for {} resources",
            capacities.len(),
            incidence.resources()
        )));
    }

    for (j, &capacity) in capacities.iter().enumerate() {
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(MmflowError::InvalidInput(format!(
                "resource {} has invalid capacity {}",
                j, capacity
            )));
        }
    }

    for (i, &weight) in weights.iter().enumerate() {
        if incidence.resources_of(i).next().is_none() {
            return Err(MmflowError::InvalidInput(format!(
                "user {} has no incident resource",
                i
            )));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(MmflowError::InvalidInput(format!(
                "user {} has invalid weight {}",
                i, weight
            )));
        }
    }

    Ok(())
}

/// Per-solve working state; frozen flags only ever go from false to true
struct FillState {
    capacities: Vec<f64>,
    allocation: Vec<f64>,
    available: Vec<f64>,
    user_frozen: Vec<bool>,
    resource_frozen: Vec<bool>,
}

impl FillState {
    fn new(users: usize, capacities: &[f64]) -> Self {
        Self {
            capacities: capacities.to_vec(),
            allocation: vec![0.0; users],
            available: capacities.to_vec(),
            user_frozen: vec![false; users],
            resource_frozen: vec![false; capacities.len()],
        }
    }

    fn all_users_frozen(&self) -> bool {
        self.user_frozen.iter().all(|&f| f)
    }

    fn all_resources_frozen(&self) -> bool {
        self.resource_frozen.iter().all(|&f| f)
    }

    /// Summed weight of unfrozen users on each resource
    fn demand(&self, weights: &[f64], incidence: &IncidenceMatrix) -> Vec<f64> {
        let mut demand = vec![0.0; self.available.len()];
        for (i, &weight) in weights.iter().enumerate() {
            if self.user_frozen[i] {
                continue;
            }
            for j in incidence.resources_of(i) {
                demand[j] += weight;
            }
        }
        demand
    }

    /// Smallest `available / demand` over eligible resources
    fn next_step(&self, demand: &[f64]) -> Option<f64> {
        (0..self.available.len())
            .filter(|&j| !self.resource_frozen[j] && demand[j] > 0.0 && self.available[j] > 0.0)
            .map(|j| self.available[j] / demand[j])
            .min_by(|a, b| a.total_cmp(b))
    }

    fn fill(&mut self, weights: &[f64], incidence: &IncidenceMatrix, step: f64) {
        for (i, &weight) in weights.iter().enumerate() {
            if self.user_frozen[i] {
                continue;
            }
            let grant = weight * step;
            self.allocation[i] += grant;
            for j in incidence.resources_of(i) {
                self.available[j] -= grant;
            }
        }
    }

    /// Freeze resources with no capacity left, then every user on a frozen resource
    fn freeze_exhausted(&mut self, incidence: &IncidenceMatrix, tolerance: f64) -> Vec<usize> {
        let newly_frozen: Vec<usize> = (0..self.available.len())
            .filter(|&j| {
                !self.resource_frozen[j]
                    && self.available[j] <= scaled(tolerance, self.capacities[j])
            })
            .collect();

        for &j in &newly_frozen {
            self.resource_frozen[j] = true;
            for i in incidence.users_of(j) {
                self.user_frozen[i] = true;
            }
        }

        newly_frozen
    }

    fn snapshot<'a>(
        &'a self,
        round: usize,
        step: f64,
        newly_frozen: &'a [usize],
    ) -> RoundSnapshot<'a> {
        RoundSnapshot {
            round,
            step,
            allocation: &self.allocation,
            available: &self.available,
            user_frozen: &self.user_frozen,
            resource_frozen: &self.resource_frozen,
            newly_frozen,
        }
    }
}
