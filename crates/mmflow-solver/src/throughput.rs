//! RTT-scaled throughput model

use mmflow_core::{MmflowError, MmflowResult, Topology};
use std::sync::Arc;

use crate::fairness::FairnessSolver;

/// Throughput of competing flows under max-min fair sharing
///
/// A flow's effective weight in the water-fill is its raw weight divided
/// by its round-trip time.
#[derive(Debug, Clone)]
pub struct ThroughputModel {
    topology: Arc<Topology>,
    solver: FairnessSolver,
    capacities: Vec<f64>,
    rtts: Vec<f64>,
}

impl ThroughputModel {
    /// Create a model over a shared topology
    pub fn new(topology: Arc<Topology>, solver: FairnessSolver) -> MmflowResult<Self> {
        let rtts = topology.rtts();
        if let Some((i, rtt)) = rtts
            .iter()
            .enumerate()
            .find(|(_, rtt)| !rtt.is_finite() || **rtt <= 0.0)
        {
            return Err(MmflowError::InvalidInput(format!(
                "user '{}' has invalid rtt {}",
                topology.users()[i].name,
                rtt
            )));
        }

        Ok(Self {
            capacities: topology.capacities(),
            rtts,
            topology,
            solver,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn solver(&self) -> &FairnessSolver {
        &self.solver
    }

    /// `weights[i] / rtt[i]` for every user
    pub fn effective_weights(&self, weights: &[f64]) -> MmflowResult<Vec<f64>> {
        if weights.len() != self.rtts.len() {
            return Err(MmflowError::InvalidInput(format!(
                "{} weights for {} users",
                weights.len(),
                self.rtts.len()
            )));
        }

        Ok(weights.iter().zip(&self.rtts).map(|(w, rtt)| w / rtt).collect())
    }

    /// Max-min fair throughput for the given raw weights
    pub fn tput(&self, weights: &[f64]) -> MmflowResult<Vec<f64>> {
        let scaled = self.effective_weights(weights)?;
        self.solver
            .solve(&scaled, &self.capacities, self.topology.incidence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmflow_core::ScenarioConfig;

    fn default_model() -> ThroughputModel {
        let topology = Arc::new(ScenarioConfig::default().topology().unwrap());
        ThroughputModel::new(topology, FairnessSolver::default()).unwrap()
    }

    #[test]
    fn test_effective_weights() {
        let model = default_model();
        let scaled = model.effective_weights(&[90.0, 10.0, 10.0]).unwrap();

        assert!((scaled[0] - 30.0).abs() < 1e-12);
        assert!((scaled[1] - 10.0).abs() < 1e-12);
        assert!((scaled[2] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_tput_matches_scaled_solve() {
        let model = default_model();
        let weights = [80.0, 10.0, 10.0];

        let tput = model.tput(&weights).unwrap();
        let direct = model
            .solver()
            .solve_topology(&model.effective_weights(&weights).unwrap(), model.topology())
            .unwrap();

        assert_eq!(tput, direct);
        // The low-latency user saturates the 1-unit link
        assert!((tput[2] - 1.0).abs() < 1e-9);
        assert!((tput[0] + tput[1] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_rtt_is_identity() {
        let mut config = ScenarioConfig::default();
        for user in &mut config.users {
            user.rtt = 1.0;
        }
        let topology = Arc::new(config.topology().unwrap());
        let model = ThroughputModel::new(topology.clone(), FairnessSolver::default()).unwrap();

        let weights = [9.01, 1.0, 1.0];
        let expected = FairnessSolver::default()
            .solve_topology(&weights, &topology)
            .unwrap();
        assert_eq!(model.tput(&weights).unwrap(), expected);
    }

    #[test]
    fn test_rejects_bad_rtt() {
        let mut config = ScenarioConfig::default();
        config.users[1].rtt = 0.0;
        let topology = Arc::new(config.topology().unwrap());

        let result = ThroughputModel::new(topology, FairnessSolver::default());
        assert!(matches!(result, Err(MmflowError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let model = default_model();
        assert!(model.tput(&[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_zero_population_is_invalid_input() {
        let model = default_model();
        let result = model.tput(&[80.0, 0.0, 10.0]);
        assert!(matches!(result, Err(MmflowError::InvalidInput(_))));
    }
}
