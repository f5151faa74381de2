use crate::error::ArchevoError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), ArchevoError>;
}

pub(crate) fn invalid(section: &str, message: impl std::fmt::Display) -> ArchevoError {
    ArchevoError::Configuration(format!("[{}] {}", section, message))
}
