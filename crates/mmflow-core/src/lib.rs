//! mmflow-core: Core types for the mmflow fairness solver
//!
//! This crate provides the fundamental types used throughout mmflow:
//! - Ordered resource/user topology and the incidence matrix
//! - Scenario configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod topology;

pub use config::*;
pub use error::*;
pub use topology::*;
