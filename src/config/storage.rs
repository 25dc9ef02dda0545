use super::traits::ConfigSection;
use crate::error::ProbevolveError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cache_db: PathBuf,
    pub generation_file: PathBuf,
    pub score_log: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_db: PathBuf::from("Discovered_Links.sqlite"),
            generation_file: PathBuf::from("UpcomingGeneration.txt"),
            score_log: PathBuf::from("ScoreTracking.txt"),
        }
    }
}

impl ConfigSection for StorageConfig {
    fn section_name() -> &'static str {
        "storage"
    }

    fn validate(&self) -> Result<(), ProbevolveError> {
        for (name, path) in [
            ("cache_db", &self.cache_db),
            ("generation_file", &self.generation_file),
            ("score_log", &self.score_log),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ProbevolveError::Configuration(format!(
                    "Storage path '{}' must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}
