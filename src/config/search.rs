use super::traits::ConfigSection;
use crate::error::ProbevolveError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub population_size: usize,
    /// Probes issued by each individual per generation.
    pub iterations: usize,
    pub generations: usize,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    pub total_min: usize,
    pub total_max: usize,
    /// Pause before every probe of an individual.
    pub delay_ms: u64,
    /// Evaluate one individual at a time.
    pub polite: bool,
    pub seed: Option<u64>,
    /// Ignore the persisted generation file at startup.
    pub fresh: bool,
}

/// Global inclusive range every generated length must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBounds {
    pub min: usize,
    pub max: usize,
}

impl LengthBounds {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: usize) -> usize {
        value.clamp(self.min, self.max)
    }
}

impl SearchConfig {
    pub fn bounds(&self) -> LengthBounds {
        LengthBounds::new(self.total_min, self.total_max)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            iterations: 10,
            generations: 10,
            mutation_rate: 0.001,
            total_min: 4,
            total_max: 8,
            delay_ms: 0,
            polite: false,
            seed: None,
            fresh: false,
        }
    }
}

impl ConfigSection for SearchConfig {
    fn section_name() -> &'static str {
        "search"
    }

    fn validate(&self) -> Result<(), ProbevolveError> {
        if self.population_size == 0 {
            return Err(ProbevolveError::Configuration(
                "Population size must be at least 1".to_string()
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ProbevolveError::Configuration(
                "Mutation rate must be between 0 and 1".to_string()
            ));
        }
        if self.total_min > self.total_max {
            return Err(ProbevolveError::Configuration(format!(
                "Minimum length ({}) must not exceed maximum length ({})",
                self.total_min, self.total_max
            )));
        }
        Ok(())
    }
}
