pub mod evaluator;
pub mod orchestrator;

pub use evaluator::{evaluate, EvaluationContext, MemberId};
pub use orchestrator::{GenerationOrchestrator, GenerationReport};
