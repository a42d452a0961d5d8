//! Resource/user topology and the incidence matrix

use crate::{MmflowError, MmflowResult};
use serde::{Deserialize, Serialize};

/// Population counts per user, indexed like the topology's users
pub type Population = Vec<i64>;

/// Dense `users × resources` boolean matrix
///
/// `get(i, j)` is true when user `i`'s allocation counts against the
/// capacity of resource `j`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidenceMatrix {
    users: usize,
    resources: usize,
    cells: Vec<bool>,
}

impl IncidenceMatrix {
    /// Create a matrix with no edges
    pub fn empty(users: usize, resources: usize) -> Self {
        Self {
            users,
            resources,
            cells: vec![false; users * resources],
        }
    }

    /// Build a matrix from one row per user
    ///
    /// All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> MmflowResult<Self> {
        let users = rows.len();
        let resources = rows.first().map(|r| r.len()).unwrap_or(0);

        let mut cells = Vec::with_capacity(users * resources);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != resources {
                return Err(MmflowError::InvalidInput(format!(
                    "incidence row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    resources
                )));
            }
            cells.extend(row);
        }

        Ok(Self {
            users,
            resources,
            cells,
        })
    }

    /// Number of users (rows)
    pub fn users(&self) -> usize {
        self.users
    }

    /// Number of resources (columns)
    pub fn resources(&self) -> usize {
        self.resources
    }

    /// Whether user `user` touches resource `resource`
    pub fn get(&self, user: usize, resource: usize) -> bool {
        user < self.users && resource < self.resources && self.cells[user * self.resources + resource]
    }

    /// Set or clear a single edge
    pub fn set(&mut self, user: usize, resource: usize, value: bool) {
        assert!(user < self.users && resource < self.resources);
        self.cells[user * self.resources + resource] = value;
    }

    /// Resources used by a user, in index order
    pub fn resources_of(&self, user: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.resources).filter(move |&j| self.get(user, j))
    }

    /// Users incident to a resource, in index order
    pub fn users_of(&self, resource: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.users).filter(move |&i| self.get(i, resource))
    }

    /// Aggregate allocation per resource: `Σ_i incidence[i][j] * allocation[i]`
    pub fn load(&self, allocation: &[f64]) -> Vec<f64> {
        (0..self.resources)
            .map(|j| self.users_of(j).map(|i| allocation[i]).sum())
            .collect()
    }
}

/// A capacity-constrained resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name (e.g., "R1")
    pub name: String,
    /// Upper bound on aggregate allocation
    pub capacity: f64,
}

/// A user sharing resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User name (e.g., "A")
    pub name: String,
    /// Round-trip-time scale factor
    pub rtt: f64,
    /// Target weight the population optimizer steers toward
    pub ideal_weight: f64,
}

/// Ordered users and resources with an index-stable incidence matrix
///
/// Index `i` in every per-user vector refers to `users()[i]`, and index
/// `j` in every per-resource vector refers to `resources()[j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    resources: Vec<Resource>,
    users: Vec<User>,
    incidence: IncidenceMatrix,
}

impl Topology {
    /// Create a topology, checking that the matrix matches the lists
    pub fn new(
        resources: Vec<Resource>,
        users: Vec<User>,
        incidence: IncidenceMatrix,
    ) -> MmflowResult<Self> {
        if incidence.users() != users.len() || incidence.resources() != resources.len() {
            return Err(MmflowError::InvalidInput(format!(
                "incidence matrix is {}x{}, topology has {} users and {} resources",
                incidence.users(),
                incidence.resources(),
                users.len(),
                resources.len()
            )));
        }

        Ok(Self {
            resources,
            users,
            incidence,
        })
    }

    /// Ordered resources
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Ordered users
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// The incidence matrix
    pub fn incidence(&self) -> &IncidenceMatrix {
        &self.incidence
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Resource capacities in index order
    pub fn capacities(&self) -> Vec<f64> {
        self.resources.iter().map(|r| r.capacity).collect()
    }

    /// Per-user RTT factors in index order
    pub fn rtts(&self) -> Vec<f64> {
        self.users.iter().map(|u| u.rtt).collect()
    }

    /// Per-user ideal weights in index order
    pub fn ideal_weights(&self) -> Vec<f64> {
        self.users.iter().map(|u| u.ideal_weight).collect()
    }

    /// Look up a user index by name
    pub fn user_index(&self, name: &str) -> Option<usize> {
        self.users.iter().position(|u| u.name == name)
    }

    /// Look up a resource index by name
    pub fn resource_index(&self, name: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_link() -> Topology {
        let resources = vec![
            Resource {
                name: "R1".to_string(),
                capacity: 10.0,
            },
            Resource {
                name: "R2".to_string(),
                capacity: 4.0,
            },
            Resource {
                name: "R3".to_string(),
                capacity: 1.0,
            },
        ];
        let users = ["A", "B", "C"]
            .iter()
            .map(|n| User {
                name: n.to_string(),
                rtt: 1.0,
                ideal_weight: 1.0,
            })
            .collect();
        let incidence = IncidenceMatrix::from_rows(vec![
            vec![true, false, false],
            vec![true, true, false],
            vec![false, true, true],
        ])
        .unwrap();

        Topology::new(resources, users, incidence).unwrap()
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let result = IncidenceMatrix::from_rows(vec![vec![true, false], vec![true]]);
        assert!(matches!(result, Err(MmflowError::InvalidInput(_))));
    }

    #[test]
    fn test_incidence_queries() {
        let topo = three_link();
        let m = topo.incidence();

        assert_eq!(m.resources_of(1).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(m.users_of(1).collect::<Vec<_>>(), vec![1, 2]);
        assert!(!m.get(0, 2));
        assert!(!m.get(7, 0));
    }

    #[test]
    fn test_load() {
        let topo = three_link();
        let load = topo.incidence().load(&[9.0, 1.0, 0.5]);
        assert_eq!(load, vec![10.0, 1.5, 0.5]);
    }

    #[test]
    fn test_topology_dimension_mismatch() {
        let result = Topology::new(
            vec![Resource {
                name: "R1".to_string(),
                capacity: 1.0,
            }],
            Vec::new(),
            IncidenceMatrix::empty(1, 1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_index_lookup() {
        let topo = three_link();
        assert_eq!(topo.user_index("C"), Some(2));
        assert_eq!(topo.resource_index("R2"), Some(1));
        assert_eq!(topo.resource_index("R9"), None);
        assert_eq!(topo.capacities(), vec![10.0, 4.0, 1.0]);
    }
}
