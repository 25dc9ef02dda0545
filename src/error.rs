use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbevolveError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid gene vector: expected {expected} genes, got {actual}")]
    InvalidGeneVector { expected: usize, actual: usize },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Block detected: {0}")]
    Blocked(String),

    #[error("Task error: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl ProbevolveError {
    /// Whether the error must abort the run. Fetch failures are absorbed by the
    /// evaluation loop and parse failures by the population loader.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProbevolveError::Fetch(_) | ProbevolveError::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, ProbevolveError>;
