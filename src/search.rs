use crate::config::{AppConfig, TargetConfig};
use crate::data::{GenerationStore, ResultCache, ScoreLog};
use crate::engines::evaluation::{EvaluationContext, GenerationOrchestrator};
use crate::engines::generation::{EvolutionEngine, Individual, ProgressCallback, ScoredIndividual};
use crate::engines::probe::{Fetcher, KeywordFilter, ProbeGenerator, ProbeTemplate};
use crate::error::{ProbevolveError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// What a finished search found.
#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    pub generations: usize,
    /// Successful probes across all generations, cache hits included.
    pub total_hits: u64,
    /// Highest scoring individual seen in any generation.
    pub best: Option<ScoredIndividual>,
}

/// One full run: cache, starting population and `generations` cycles.
pub struct Search {
    config: AppConfig,
    cache: Arc<ResultCache>,
    orchestrator: GenerationOrchestrator,
}

impl Search {
    pub fn new(
        config: AppConfig,
        fetcher: Arc<dyn Fetcher>,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<Self> {
        config.validate()?;

        let template = load_template(&config.target)?;
        let filter = match &config.target.keyword_file {
            Some(path) => {
                let filter = KeywordFilter::from_file(path)?;
                log::info!("Loaded {} keywords from {}", filter.len(), path.display());
                Some(Arc::new(filter))
            }
            None => None,
        };

        let cache = Arc::new(ResultCache::open(&config.storage.cache_db)?);
        log::info!("Opened result cache at {}", config.storage.cache_db.display());

        let mut rng = match config.search.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let engine = EvolutionEngine::with_rng(
            config.search.clone(),
            GenerationStore::new(&config.storage.generation_file),
            StdRng::seed_from_u64(rng.gen()),
        )?;

        let context = EvaluationContext {
            generator: Arc::new(ProbeGenerator::new(template)),
            cache: Arc::clone(&cache),
            fetcher,
            filter,
            progress,
            delay: Duration::from_millis(config.search.delay_ms),
        };
        let orchestrator = GenerationOrchestrator::new(
            context,
            engine,
            ScoreLog::new(&config.storage.score_log),
            rng,
        );

        Ok(Self {
            config,
            cache,
            orchestrator,
        })
    }

    /// The persisted generation, or a random one when it is missing, empty,
    /// unreadable or `fresh` is set. Loaded lengths are clamped into bounds.
    pub fn initial_population(&mut self) -> Result<Vec<Individual>> {
        let search = &self.config.search;
        let engine = self.orchestrator.engine_mut();

        if search.fresh {
            log::info!("Starting from a fresh random population");
            return Ok(engine.random_population());
        }

        let loaded = match engine.store().load() {
            Ok(Some(population)) => population,
            Ok(None) => {
                log::info!("No saved generation found, starting from a random population");
                return Ok(engine.random_population());
            }
            Err(e) if !e.is_fatal() => {
                log::warn!(
                    "Could not read {} ({}), starting from a random population",
                    engine.store().path().display(),
                    e
                );
                return Ok(engine.random_population());
            }
            Err(e) => return Err(e),
        };

        let bounds = search.bounds();
        log::info!("Resuming from {} saved individuals", loaded.len());
        Ok(loaded
            .into_iter()
            .map(|mut individual| {
                individual.clamp_lengths(bounds);
                individual
            })
            .collect())
    }

    pub async fn run(mut self) -> Result<SearchSummary> {
        let mut population = self.initial_population()?;
        let iterations = self.config.search.iterations;
        let mut summary = SearchSummary::default();

        for _ in 0..self.config.search.generations {
            let report = self.orchestrator.run(population, iterations).await?;

            summary.generations += 1;
            summary.total_hits += report.total_score();
            if let Some(best) = report.best() {
                let improved = summary
                    .best
                    .as_ref()
                    .map_or(true, |current| best.score > current.score);
                if improved {
                    summary.best = Some(best.clone());
                }
            }

            population = report.next;
        }

        let Search {
            cache,
            orchestrator,
            ..
        } = self;
        drop(orchestrator);
        match Arc::try_unwrap(cache) {
            Ok(cache) => cache.close()?,
            Err(_) => log::warn!("Result cache still in use, leaving it open"),
        }

        Ok(summary)
    }
}

fn load_template(target: &TargetConfig) -> Result<ProbeTemplate> {
    match (&target.url, &target.request_file) {
        (Some(url), _) => Ok(ProbeTemplate::from_url(url)),
        (None, Some(path)) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                ProbevolveError::Configuration(format!(
                    "Cannot read request file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            ProbeTemplate::from_request(raw)
        }
        (None, None) => Err(ProbevolveError::Configuration(
            "Either a target url or a request file is required".to_string(),
        )),
    }
}
