use super::traits::ConfigSection;
use crate::error::ProbevolveError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Marker splitting a URL template into prefix and suffix, and marking the
/// substitution point inside a raw-request template.
pub const SPLIT_MARKER: char = '^';

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub request_file: Option<PathBuf>,
    pub keyword_file: Option<PathBuf>,
}

impl ConfigSection for TargetConfig {
    fn section_name() -> &'static str {
        "target"
    }

    fn validate(&self) -> Result<(), ProbevolveError> {
        match (&self.url, &self.request_file) {
            (None, None) => Err(ProbevolveError::Configuration(
                "Either a target URL or a request file is required".to_string()
            )),
            (Some(_), Some(_)) => Err(ProbevolveError::Configuration(
                "A target URL and a request file cannot be combined".to_string()
            )),
            (Some(url), None) if url.trim().is_empty() => Err(ProbevolveError::Configuration(
                "Target URL must not be empty".to_string()
            )),
            _ => Ok(()),
        }
    }
}
