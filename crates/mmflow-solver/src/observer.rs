//! Diagnostics hook for the fairness solver

use tracing::{debug, trace};

/// State of a solve after one filling step
#[derive(Debug, Clone, Copy)]
pub struct RoundSnapshot<'a> {
    /// Round number, starting at 1; round 0 is the initial freeze pass
    pub round: usize,
    /// Common rate increment applied to every unfrozen user
    pub step: f64,
    pub allocation: &'a [f64],
    /// Remaining capacity per resource
    pub available: &'a [f64],
    pub user_frozen: &'a [bool],
    pub resource_frozen: &'a [bool],
    /// Resources frozen during this round
    pub newly_frozen: &'a [usize],
}

/// Receives progress events from [`crate::FairnessSolver`]
///
/// All methods default to doing nothing.
pub trait SolveObserver: Send + Sync {
    /// Called once after input validation
    fn on_start(&self, _weights: &[f64], _capacities: &[f64]) {}

    /// Called after the initial freeze pass and after every filling step
    fn on_round(&self, _snapshot: &RoundSnapshot<'_>) {}

    /// Called once the postconditions hold
    fn on_finish(&self, _allocation: &[f64], _rounds: usize) {}
}

/// Observer that emits `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SolveObserver for TracingObserver {
    fn on_start(&self, weights: &[f64], capacities: &[f64]) {
        debug!(
            users = weights.len(),
            resources = capacities.len(),
            weights = ?weights,
            capacities = ?capacities,
            "Starting water-fill"
        );
    }

    fn on_round(&self, snapshot: &RoundSnapshot<'_>) {
        trace!(
            round = snapshot.round,
            step = snapshot.step,
            allocation = ?snapshot.allocation,
            available = ?snapshot.available,
            newly_frozen = ?snapshot.newly_frozen,
            "Water-fill round"
        );
    }

    fn on_finish(&self, allocation: &[f64], rounds: usize) {
        debug!(rounds = rounds, allocation = ?allocation, "Water-fill converged");
    }
}
