//! mmflow-solver: Max-min fair allocation for mmflow
//!
//! This crate provides the allocation logic used by the simulator:
//! - Progressive-filling (water-filling) max-min fairness solver
//! - RTT-scaled throughput model on top of the solver
//! - Population optimizer driven by saturated resources
//! - Observer hook for per-round diagnostics

pub mod fairness;
pub mod observer;
pub mod optimizer;
pub mod throughput;

pub use fairness::FairnessSolver;
pub use observer::{RoundSnapshot, SolveObserver, TracingObserver};
pub use optimizer::{PopulationOptimizer, Throttle, UpdatePlan};
pub use throughput::ThroughputModel;
