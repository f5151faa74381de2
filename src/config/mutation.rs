use super::traits::{invalid, ConfigSection};
use crate::error::ArchevoError;
use serde::{Deserialize, Serialize};

/// Relative weights of the edit kinds a `MutationProposer` draws from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    pub insert_weight: f64,
    pub remove_weight: f64,
    pub resize_weight: f64,
    pub activation_weight: f64,
    /// Width multipliers a resize picks from
    pub resize_factors: Vec<f64>,
    /// Units or filters of a freshly inserted weighted layer
    pub insert_widths: Vec<usize>,
    pub max_edits: usize,
    /// Proposals retried when an edit breaks shape inference
    pub max_attempts: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            insert_weight: 1.0,
            remove_weight: 0.5,
            resize_weight: 1.0,
            activation_weight: 0.5,
            resize_factors: vec![0.5, 0.75, 1.5, 2.0],
            insert_widths: vec![8, 16, 32, 64],
            max_edits: 2,
            max_attempts: 5,
        }
    }
}

impl MutationConfig {
    pub fn total_weight(&self) -> f64 {
        self.insert_weight + self.remove_weight + self.resize_weight + self.activation_weight
    }
}

impl ConfigSection for MutationConfig {
    fn section_name() -> &'static str {
        "mutation"
    }

    fn validate(&self) -> Result<(), ArchevoError> {
        let section = Self::section_name();
        let weights = [
            self.insert_weight,
            self.remove_weight,
            self.resize_weight,
            self.activation_weight,
        ];
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(invalid(section, "weights must be finite and non-negative"));
        }
        if self.total_weight() <= 0.0 {
            return Err(invalid(section, "at least one edit kind needs a positive weight"));
        }
        if self.resize_factors.iter().any(|f| *f <= 0.0) {
            return Err(invalid(section, "resize factors must be positive"));
        }
        if self.insert_widths.is_empty() || self.insert_widths.contains(&0) {
            return Err(invalid(section, "insert_widths must be non-empty and non-zero"));
        }
        if self.max_edits == 0 || self.max_attempts == 0 {
            return Err(invalid(section, "max_edits and max_attempts must be at least 1"));
        }
        Ok(())
    }
}
