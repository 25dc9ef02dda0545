use super::{
    fetch::FetchConfig,
    search::SearchConfig,
    storage::StorageConfig,
    target::TargetConfig,
    traits::ConfigSection,
};
use crate::error::ProbevolveError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix for environment overrides, e.g. `PROBEVOLVE__SEARCH__POPULATION_SIZE`.
pub const ENV_PREFIX: &str = "PROBEVOLVE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub target: TargetConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ProbevolveError> {
        self.search.validate()?;
        self.target.validate()?;
        self.fetch.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Layers an optional TOML file and `PROBEVOLVE__*` environment variables
    /// over the defaults. Validation is deferred to the next `update`, so
    /// command-line overrides can still fill in required fields.
    pub fn load_layered<P: AsRef<Path>>(&self, path: Option<P>) -> Result<(), ProbevolveError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            let path = path.as_ref();
            if !path.exists() {
                return Err(ProbevolveError::Configuration(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        *self.write()? = config;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProbevolveError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProbevolveError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| ProbevolveError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.write()? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProbevolveError> {
        let toml_str = toml::to_string_pretty(&self.get()?)?;

        std::fs::write(path, toml_str)
            .map_err(|e| ProbevolveError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> Result<AppConfig, ProbevolveError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| ProbevolveError::Configuration("Config lock poisoned".to_string()))
    }

    pub fn update<F>(&self, f: F) -> Result<(), ProbevolveError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.write()?;
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, AppConfig>, ProbevolveError> {
        self.config
            .write()
            .map_err(|_| ProbevolveError::Configuration("Config lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_update_rejects_invalid_and_keeps_previous() {
        let manager = ConfigManager::new();
        manager
            .update(|c| c.target.url = Some("http://example.com/^".to_string()))
            .unwrap();

        let result = manager.update(|c| c.search.total_min = 20);
        assert!(result.is_err());
        assert_eq!(manager.get().unwrap().search.total_min, 4);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probevolve.toml");

        let manager = ConfigManager::new();
        manager
            .update(|c| {
                c.target.url = Some("http://example.com/^.html".to_string());
                c.search.population_size = 6;
                c.search.polite = true;
            })
            .unwrap();
        manager.save_to_file(&path).unwrap();

        let reloaded = ConfigManager::new();
        reloaded.load_from_file(&path).unwrap();
        let config = reloaded.get().unwrap();
        assert_eq!(config.search.population_size, 6);
        assert!(config.search.polite);
        assert_eq!(config.target.url.as_deref(), Some("http://example.com/^.html"));
    }

    #[test]
    fn test_layered_file_fills_partial_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[search]\niterations = 25\n").unwrap();

        let manager = ConfigManager::new();
        manager.load_layered(Some(&path)).unwrap();
        let config = manager.get().unwrap();
        assert_eq!(config.search.iterations, 25);
        assert_eq!(config.search.population_size, 10);
        assert_eq!(config.fetch.timeout_ms, 3000);
    }
}
