use crate::config::traits::ConfigSection;
use crate::config::SearchConfig;
use crate::data::GenerationStore;
use crate::engines::generation::{
    individual::{Individual, ScoredIndividual},
    operators::{crossover, mutate, roulette_selection},
};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Produces the next population from a scored one: roulette selection,
/// pairwise single-point crossover, per-gene mutation, validation, and a save
/// to the generation file.
pub struct EvolutionEngine {
    config: SearchConfig,
    store: GenerationStore,
    rng: StdRng,
}

impl EvolutionEngine {
    pub fn new(config: SearchConfig, store: GenerationStore) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, store, rng)
    }

    /// Fails on a configuration the operators cannot run with, such as a
    /// mutation rate outside `[0, 1]` or inverted length bounds.
    pub fn with_rng(config: SearchConfig, store: GenerationStore, rng: StdRng) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store, rng })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    /// A validated population of `population_size` random individuals.
    pub fn random_population(&mut self) -> Vec<Individual> {
        let bounds = self.config.bounds();
        let mut population: Vec<Individual> = (0..self.config.population_size)
            .map(|_| Individual::random(bounds, &mut self.rng))
            .collect();
        validate_population(&mut population);
        population
    }

    /// Runs one full reproduction cycle and persists the result.
    ///
    /// When nobody scored, selection would only shuffle uninformative parents
    /// around, so the population is replaced by a fresh random one instead.
    pub fn next_generation(&mut self, scored: &[ScoredIndividual]) -> Result<Vec<Individual>> {
        let total_score: u64 = scored.iter().map(|m| u64::from(m.score)).sum();

        if total_score == 0 {
            log::warn!("No members of the generation scored a successful hit...");
            log::warn!("A new random generation is being used to avoid a homogeneous selection pool");
            let population = self.random_population();
            self.store.save(&population)?;
            return Ok(population);
        }

        // Reproduction
        let mut selection_pool: Vec<Individual> = (0..scored.len())
            .map(|_| scored[roulette_selection(scored, &mut self.rng)].individual.clone())
            .collect();

        // Crossover
        selection_pool.shuffle(&mut self.rng);
        let mut crossover_pool: Vec<Individual> = Vec::with_capacity(selection_pool.len());
        for pair in selection_pool.chunks(2) {
            match pair {
                [parent1, parent2] => {
                    let (child1, child2) =
                        crossover(&parent1.genes(), &parent2.genes(), &mut self.rng);
                    crossover_pool.push(Individual::from_genes(&child1)?);
                    crossover_pool.push(Individual::from_genes(&child2)?);
                }
                // An odd member out passes through unchanged
                [single] => crossover_pool.push(single.clone()),
                _ => unreachable!("chunks(2) yields one or two members"),
            }
        }

        let mut next = self.apply_mutation(&crossover_pool)?;
        validate_population(&mut next);

        self.store.save(&next)?;
        Ok(next)
    }

    /// Rebuilds every individual from its possibly mutated gene vector.
    pub fn apply_mutation(&mut self, population: &[Individual]) -> Result<Vec<Individual>> {
        let bounds = self.config.bounds();
        population
            .iter()
            .map(|individual| {
                let mut genes = individual.genes();
                mutate(&mut genes, self.config.mutation_rate, bounds, &mut self.rng);
                Individual::from_genes(&genes)
            })
            .collect()
    }
}

/// Clamps `min_len` down to `max_len` wherever the two are inverted.
pub fn validate_population(population: &mut [Individual]) {
    for individual in population.iter_mut() {
        individual.validate();
    }
}
