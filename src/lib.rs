//! Evolutionary search over neural network architectures.
//!
//! Topologies are edited by mutation and crossover, inherit trained
//! parameters from their parents, and are selected on fitness reported by an
//! external model adapter. Lower fitness is better.

pub mod config;
pub mod engines;
pub mod error;
pub mod graph;
pub mod topology;
pub mod types;

pub use error::{ArchevoError, Result};
pub use types::{FitnessRecord, Identity};
