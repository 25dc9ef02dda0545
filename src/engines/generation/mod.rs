pub mod individual;
pub mod operators;
pub mod evolution_engine;
pub mod progress;

pub use individual::{Genes, Individual, ScoredIndividual, GENE_COUNT};
pub use evolution_engine::{EvolutionEngine, validate_population};
pub use progress::{
    ChannelProgressCallback, ConsoleProgressCallback, Hit, MemberState, NullProgressCallback,
    ProgressCallback, ProgressMessage,
};
