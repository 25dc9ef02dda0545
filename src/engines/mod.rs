pub mod evaluation;
pub mod generation;
pub mod probe;
