pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod search;

pub use error::{ProbevolveError, Result};
pub use search::{Search, SearchSummary};
