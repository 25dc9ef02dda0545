use crate::engines::generation::individual::Individual;
use crate::error::{ProbevolveError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Save file holding the population to evaluate next, one `[g0 .. g4]` vector
/// per line. Doubles as the starting population of the next run.
#[derive(Debug, Clone)]
pub struct GenerationStore {
    path: PathBuf,
}

impl GenerationStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no save file exists or it holds no individuals.
    /// A malformed line fails the whole load with a recoverable `Parse` error.
    pub fn load(&self) -> Result<Option<Vec<Individual>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let population = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| {
                line.parse::<Individual>().map_err(|e| match e {
                    ProbevolveError::Parse(msg) => {
                        ProbevolveError::Parse(format!("{} line {}: {}", self.path.display(), idx + 1, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if population.is_empty() {
            Ok(None)
        } else {
            Ok(Some(population))
        }
    }

    /// Overwrites the save file with `population`.
    pub fn save(&self, population: &[Individual]) -> Result<()> {
        let mut contents = String::new();
        for individual in population {
            contents.push_str(&individual.to_string());
            contents.push('\n');
        }
        fs::write(&self.path, contents)?;
        log::debug!("saved {} individuals to {}", population.len(), self.path.display());
        Ok(())
    }
}
