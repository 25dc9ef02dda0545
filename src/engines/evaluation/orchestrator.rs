use super::evaluator::{evaluate, EvaluationContext, MemberId};
use crate::data::ScoreLog;
use crate::engines::generation::{
    evolution_engine::EvolutionEngine,
    individual::{Individual, ScoredIndividual},
    progress::MemberState,
};
use crate::error::{ProbevolveError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome of one evaluate-and-reproduce cycle.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub generation: usize,
    pub scored: Vec<ScoredIndividual>,
    pub next: Vec<Individual>,
}

impl GenerationReport {
    pub fn best(&self) -> Option<&ScoredIndividual> {
        self.scored.iter().max_by_key(|m| m.score)
    }

    pub fn total_score(&self) -> u64 {
        total_score(&self.scored)
    }

    pub fn average_score(&self) -> f64 {
        average_score(&self.scored)
    }
}

fn total_score(scored: &[ScoredIndividual]) -> u64 {
    scored.iter().map(|m| u64::from(m.score)).sum()
}

fn average_score(scored: &[ScoredIndividual]) -> f64 {
    if scored.is_empty() {
        0.0
    } else {
        total_score(scored) as f64 / scored.len() as f64
    }
}

/// Evaluates a population, one task per member, waits for all of them, logs
/// the scores and asks the engine for the next population.
pub struct GenerationOrchestrator {
    context: EvaluationContext,
    engine: EvolutionEngine,
    score_log: ScoreLog,
    rng: StdRng,
    generation: usize,
}

impl GenerationOrchestrator {
    pub fn new(
        context: EvaluationContext,
        engine: EvolutionEngine,
        score_log: ScoreLog,
        rng: StdRng,
    ) -> Self {
        Self {
            context,
            engine,
            score_log,
            rng,
            generation: 0,
        }
    }

    pub fn engine_mut(&mut self) -> &mut EvolutionEngine {
        &mut self.engine
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Runs one generation.
    ///
    /// Members are evaluated concurrently, or one after another in polite
    /// mode. Both go through the same path: a semaphore whose permit count is
    /// the concurrency, acquired before each task starts. Once a member fails
    /// no further members are started. No report is produced until every
    /// started task has finished.
    pub async fn run(&mut self, population: Vec<Individual>, iterations: usize) -> Result<GenerationReport> {
        let generation = self.generation;
        let progress = Arc::clone(&self.context.progress);
        progress.on_generation_start(generation, population.len());

        let concurrency = if self.engine.config().polite {
            1
        } else {
            population.len().max(1)
        };
        let permits = Arc::new(Semaphore::new(concurrency));

        let population_len = population.len();
        for index in 0..population_len {
            progress.on_member_state(generation, index, MemberState::Idle);
        }

        // Set by a member that failed; no further members are started.
        let halted = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(population.len());
        for (index, individual) in population.into_iter().enumerate() {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| ProbevolveError::Task(e.to_string()))?;
            if halted.load(Ordering::SeqCst) {
                log::warn!(
                    "Generation {} halted, {} members not started",
                    generation + 1,
                    population_len - index
                );
                break;
            }
            let individual = if individual.name.is_some() {
                individual
            } else {
                individual.with_name(format!("{}-{}", generation + 1, index + 1))
            };
            let context = self.context.clone();
            let mut rng = StdRng::seed_from_u64(self.rng.gen());
            let member = MemberId { generation, index };

            let halted = Arc::clone(&halted);

            handles.push(tokio::spawn(async move {
                let scored = evaluate(individual, iterations, &context, member, &mut rng).await;
                if scored.is_err() {
                    halted.store(true, Ordering::SeqCst);
                }
                drop(permit);
                scored
            }));
        }

        let mut scored = Vec::with_capacity(handles.len());
        let mut failure = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(member)) => scored.push(member),
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    failure.get_or_insert(ProbevolveError::Task(e.to_string()));
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        self.score_log.append(&scored, iterations);

        let best_score = scored.iter().map(|m| m.score).max().unwrap_or(0);
        progress.on_generation_complete(generation, best_score, average_score(&scored));

        let next = self.engine.next_generation(&scored)?;
        self.generation += 1;

        Ok(GenerationReport {
            generation,
            scored,
            next,
        })
    }
}
