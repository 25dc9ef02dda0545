pub mod cache;
pub mod generation_store;
pub mod score_log;

pub use cache::{PutOutcome, ResultCache};
pub use generation_store::GenerationStore;
pub use score_log::{score_as_percentage, ScoreLog};
