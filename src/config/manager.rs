use super::{
    evolution::EvolutionConfig, mutation::MutationConfig, traits::ConfigSection,
    transfer::TransferConfig,
};
use crate::error::ArchevoError;
use config::{Config, Environment, File, FileFormat};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

pub const ENV_PREFIX: &str = "ARCHEVO";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub mutation: MutationConfig,
    pub transfer: TransferConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ArchevoError> {
        self.evolution.validate()?;
        self.mutation.validate()?;
        self.transfer.validate()?;
        Ok(())
    }
}

/// Shared, validated configuration.
///
/// Layers are applied in order: defaults, TOML file, then environment
/// variables such as `ARCHEVO__EVOLUTION__POPULATION_SIZE=50`.
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    env_prefix: String,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_env_prefix(ENV_PREFIX)
    }

    pub fn with_env_prefix(prefix: &str) -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
            env_prefix: prefix.to_string(),
        }
    }

    fn environment(&self) -> Environment {
        Environment::with_prefix(&self.env_prefix)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ArchevoError> {
        let path = path.as_ref();
        debug!("loading configuration from {}", path.display());
        let layered = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(self.environment())
            .build()?;
        self.replace(layered.try_deserialize()?)
    }

    pub fn load_from_str(&self, toml: &str) -> Result<(), ArchevoError> {
        let layered = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(self.environment())
            .build()?;
        self.replace(layered.try_deserialize()?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ArchevoError> {
        let toml_str = toml::to_string_pretty(&self.get())?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `f` to a copy and keeps it only if it validates
    pub fn update<F>(&self, f: F) -> Result<(), ArchevoError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get();
        f(&mut candidate);
        self.replace(candidate)
    }

    fn replace(&self, config: AppConfig) -> Result<(), ArchevoError> {
        config.validate()?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrunePolicy;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let manager = ConfigManager::with_env_prefix("ARCHEVO_TEST_PARTIAL");
        manager
            .load_from_str("[evolution]\npopulation_size = 8\n\n[transfer]\nprune_policy = \"L1Norm\"\n")
            .unwrap();
        let config = manager.get();
        assert_eq!(config.evolution.population_size, 8);
        assert_eq!(config.evolution.max_age, EvolutionConfig::default().max_age);
        assert_eq!(config.transfer.prune_policy, PrunePolicy::L1Norm);
    }

    #[test]
    fn test_invalid_update_is_rejected() {
        let manager = ConfigManager::with_env_prefix("ARCHEVO_TEST_UPDATE");
        let err = manager.update(|c| c.evolution.max_age = 0).unwrap_err();
        assert!(matches!(err, ArchevoError::Configuration(_)));
        assert_eq!(manager.get().evolution.max_age, EvolutionConfig::default().max_age);
    }

    #[test]
    fn test_environment_overrides_file() {
        std::env::set_var("ARCHEVO_TEST_ENV__EVOLUTION__SEED", "7");
        let manager = ConfigManager::with_env_prefix("ARCHEVO_TEST_ENV");
        manager.load_from_str("[evolution]\nseed = 3\n").unwrap();
        std::env::remove_var("ARCHEVO_TEST_ENV__EVOLUTION__SEED");
        assert_eq!(manager.get().evolution.seed, 7);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("archevo-config-{}.toml", std::process::id()));
        let manager = ConfigManager::with_env_prefix("ARCHEVO_TEST_SAVE");
        manager.update(|c| c.mutation.max_edits = 4).unwrap();
        manager.save_to_file(&path).unwrap();

        let reloaded = ConfigManager::with_env_prefix("ARCHEVO_TEST_SAVE");
        reloaded.load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(reloaded.get(), manager.get());
    }
}
