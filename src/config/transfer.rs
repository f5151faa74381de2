use super::traits::{invalid, ConfigSection};
use crate::error::ArchevoError;
use serde::{Deserialize, Serialize};

/// Which output channels survive when a node shrinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrunePolicy {
    /// Keep the lowest indices
    KeepFirst,
    /// Keep the channels with the largest summed absolute weight
    L1Norm,
    /// Keep the channels with the largest euclidean weight norm
    L2Norm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub prune_policy: PrunePolicy,
    /// Value written into grown slots
    pub pad_value: f32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            prune_policy: PrunePolicy::KeepFirst,
            pad_value: 0.0,
        }
    }
}

impl ConfigSection for TransferConfig {
    fn section_name() -> &'static str {
        "transfer"
    }

    fn validate(&self) -> Result<(), ArchevoError> {
        if !self.pad_value.is_finite() {
            return Err(invalid(Self::section_name(), "pad_value must be finite"));
        }
        Ok(())
    }
}
