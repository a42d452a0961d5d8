//! Configuration types for mmflow

use crate::{IncidenceMatrix, MmflowError, MmflowResult, Population, Resource, Topology, User};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Scenario file format (TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario settings
    #[serde(default)]
    pub scenario: ScenarioSettings,
    /// Fairness solver settings
    #[serde(default)]
    pub solver: SolverConfig,
    /// Population optimizer settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Ordered resources
    pub resources: Vec<ResourceSpec>,
    /// Ordered users
    pub users: Vec<UserSpec>,
}

impl Default for ScenarioConfig {
    /// Three users sharing three links of capacity 10, 4 and 1
    fn default() -> Self {
        Self {
            scenario: ScenarioSettings::default(),
            solver: SolverConfig::default(),
            optimizer: OptimizerConfig::default(),
            logging: LoggingConfig::default(),
            resources: vec![
                ResourceSpec::new("R1", 10.0),
                ResourceSpec::new("R2", 4.0),
                ResourceSpec::new("R3", 1.0),
            ],
            users: vec![
                UserSpec::new("A", 3.0, 9.01, 80, &["R1"]),
                UserSpec::new("B", 1.0, 1.0, 10, &["R1", "R2"]),
                UserSpec::new("C", 0.1, 1.0, 10, &["R2", "R3"]),
            ],
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a TOML file
    pub fn from_file(path: &std::path::Path) -> MmflowResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MmflowError::Config(format!("Failed to read scenario file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse a scenario from TOML text
    pub fn from_toml_str(content: &str) -> MmflowResult<Self> {
        toml::from_str(content)
            .map_err(|e| MmflowError::Config(format!("Failed to parse scenario: {}", e)))
    }

    /// Build the index-stable topology described by this scenario
    pub fn topology(&self) -> MmflowResult<Topology> {
        let mut seen = HashSet::new();
        for r in &self.resources {
            if !seen.insert(r.name.as_str()) {
                return Err(MmflowError::Config(format!("duplicate resource '{}'", r.name)));
            }
        }
        let mut seen = HashSet::new();
        for u in &self.users {
            if !seen.insert(u.name.as_str()) {
                return Err(MmflowError::Config(format!("duplicate user '{}'", u.name)));
            }
        }

        let mut incidence = IncidenceMatrix::empty(self.users.len(), self.resources.len());
        for (i, user) in self.users.iter().enumerate() {
            for name in &user.uses {
                let j = self
                    .resources
                    .iter()
                    .position(|r| &r.name == name)
                    .ok_or_else(|| {
                        MmflowError::Config(format!(
                            "user '{}' uses unknown resource '{}'",
                            user.name, name
                        ))
                    })?;
                incidence.set(i, j, true);
            }
        }

        let resources = self
            .resources
            .iter()
            .map(|r| Resource {
                name: r.name.clone(),
                capacity: r.capacity,
            })
            .collect();
        let users = self
            .users
            .iter()
            .map(|u| User {
                name: u.name.clone(),
                rtt: u.rtt,
                ideal_weight: u.ideal_weight,
            })
            .collect();

        Topology::new(resources, users, incidence)
    }

    /// Starting population, in user order
    pub fn initial_population(&self) -> Population {
        self.users.iter().map(|u| u.population).collect()
    }
}

/// Scenario settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Scenario name used in reports
    pub name: String,
    /// Maximum number of simulation rounds
    pub rounds: u32,
    /// Stop once every user's throughput is within this distance of the goal
    pub convergence_tolerance: Option<f64>,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            rounds: 100,
            convergence_tolerance: None,
        }
    }
}

/// Fairness solver configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Remaining capacity at or below which a resource freezes, per unit of
    /// capacity (absolute below a capacity of 1)
    pub tolerance: f64,
    /// Allowed overshoot of aggregate allocation above capacity, scaled the
    /// same way
    pub feasibility_tolerance: f64,
    /// Round cap; `None` means one more than the resource count
    pub max_rounds: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            feasibility_tolerance: 1e-6,
            max_rounds: None,
        }
    }
}

/// Population optimizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Distance from capacity under which a resource counts as saturated
    pub saturation_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            saturation_tolerance: 1e-3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resource entry in a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub capacity: f64,
}

impl ResourceSpec {
    pub fn new(name: &str, capacity: f64) -> Self {
        Self {
            name: name.to_string(),
            capacity,
        }
    }
}

/// User entry in a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSpec {
    pub name: String,
    #[serde(default = "default_rtt")]
    pub rtt: f64,
    pub ideal_weight: f64,
    pub population: i64,
    /// Names of the resources this user consumes
    pub uses: Vec<String>,
}

impl UserSpec {
    pub fn new(name: &str, rtt: f64, ideal_weight: f64, population: i64, uses: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            rtt,
            ideal_weight,
            population,
            uses: uses.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn default_rtt() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENARIO: &str = r#"
[scenario]
name = "two-link"
rounds = 25

[solver]
tolerance = 1e-9

[[resources]]
name = "R1"
capacity = 100.0

[[resources]]
name = "R2"
capacity = 150.0

[[users]]
name = "A"
ideal_weight = 1.0
population = 4
uses = ["R1", "R2"]

[[users]]
name = "B"
rtt = 2.0
ideal_weight = 2.0
population = 6
uses = ["R1"]
"#;

    #[test]
    fn test_default_scenario() {
        let config = ScenarioConfig::default();
        let topo = config.topology().unwrap();

        assert_eq!(topo.user_count(), 3);
        assert_eq!(topo.capacities(), vec![10.0, 4.0, 1.0]);
        assert_eq!(config.initial_population(), vec![80, 10, 10]);
        assert!(topo.incidence().get(2, 2));
    }

    #[test]
    fn test_scenario_parse() {
        let config = ScenarioConfig::from_toml_str(SCENARIO).unwrap();

        assert_eq!(config.scenario.name, "two-link");
        assert_eq!(config.scenario.rounds, 25);
        assert_eq!(config.solver.tolerance, 1e-9);
        assert_eq!(config.solver.feasibility_tolerance, 1e-6);
        assert_eq!(config.optimizer.saturation_tolerance, 1e-3);
        assert_eq!(config.users[0].rtt, 1.0);

        let topo = config.topology().unwrap();
        assert_eq!(topo.incidence().resources_of(0).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(topo.rtts(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_scenario_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();

        let config = ScenarioConfig::from_file(file.path()).unwrap();
        assert_eq!(config.resources.len(), 2);
    }

    #[test]
    fn test_shipped_scenarios_match_default() {
        let three_link =
            ScenarioConfig::from_toml_str(include_str!("../../../scenarios/three-link.toml"))
                .unwrap();
        let default = ScenarioConfig::default();

        assert_eq!(three_link.topology().unwrap(), default.topology().unwrap());
        assert_eq!(three_link.initial_population(), default.initial_population());

        let two_link =
            ScenarioConfig::from_toml_str(include_str!("../../../scenarios/two-link.toml"))
                .unwrap();
        assert_eq!(two_link.scenario.convergence_tolerance, Some(0.5));
        assert_eq!(two_link.topology().unwrap().user_count(), 3);
    }

    #[test]
    fn test_missing_file() {
        let result = ScenarioConfig::from_file(std::path::Path::new("/nonexistent/scenario.toml"));
        assert!(matches!(result, Err(MmflowError::Config(_))));
    }

    #[test]
    fn test_unknown_resource() {
        let mut config = ScenarioConfig::default();
        config.users[0].uses.push("R9".to_string());

        let err = config.topology().unwrap_err();
        assert!(err.to_string().contains("R9"));
    }

    #[test]
    fn test_duplicate_names() {
        let mut config = ScenarioConfig::default();
        config.resources.push(ResourceSpec::new("R1", 5.0));
        assert!(config.topology().is_err());

        let mut config = ScenarioConfig::default();
        config.users.push(UserSpec::new("A", 1.0, 1.0, 1, &["R1"]));
        assert!(config.topology().is_err());
    }
}
