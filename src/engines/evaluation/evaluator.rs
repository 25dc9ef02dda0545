use crate::data::ResultCache;
use crate::engines::generation::{
    individual::{Individual, ScoredIndividual},
    progress::{Hit, MemberState, ProgressCallback},
};
use crate::engines::probe::{Fetcher, KeywordFilter, ProbeGenerator};
use crate::error::Result;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Everything an evaluation needs besides the individual itself. Cheap to
/// clone; the cache and fetcher are shared by all evaluations.
#[derive(Clone)]
pub struct EvaluationContext {
    pub generator: Arc<ProbeGenerator>,
    pub cache: Arc<ResultCache>,
    pub fetcher: Arc<dyn Fetcher>,
    pub filter: Option<Arc<KeywordFilter>>,
    pub progress: Arc<dyn ProgressCallback>,
    /// Pause before each probe.
    pub delay: Duration,
}

/// Identifies a member within a run for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberId {
    pub generation: usize,
    pub index: usize,
}

/// Issues `iterations` probes for one individual, strictly in order, and
/// counts those that produced an outcome.
///
/// Every probe is looked up in the cache first; only misses reach the
/// fetcher, and only fresh outcomes are written back. Recoverable fetch
/// errors count as "no outcome". The keyword filter decides which hits are
/// reported, never the score. The returned individual carries normalized
/// weights.
pub async fn evaluate<R: Rng + Send>(
    individual: Individual,
    iterations: usize,
    context: &EvaluationContext,
    member: MemberId,
    rng: &mut R,
) -> Result<ScoredIndividual> {
    let individual = individual.normalized();
    let progress = &context.progress;
    progress.on_member_state(member.generation, member.index, MemberState::Running);

    let mut score = 0u32;
    for _ in 0..iterations {
        if !context.delay.is_zero() {
            tokio::time::sleep(context.delay).await;
        }

        let probe = context.generator.generate(&individual, rng);

        let (outcome, cached) = match context.cache.get(&probe)? {
            Some(outcome) => (Some(outcome), true),
            None => match context.fetcher.fetch(&probe).await {
                Ok(outcome) => (outcome, false),
                Err(e) if !e.is_fatal() => {
                    log::warn!("{}", e);
                    (None, false)
                }
                Err(e) => return Err(e),
            },
        };

        let Some(outcome) = outcome else {
            log::debug!("no outcome for {}", probe);
            continue;
        };

        if !cached {
            context.cache.put(&probe, &outcome)?;
        }
        score += 1;

        let keyword = match &context.filter {
            Some(filter) => match filter.matches(&outcome) {
                Some(keyword) => Some(keyword.to_string()),
                None => continue,
            },
            None => None,
        };

        progress.on_hit(&Hit {
            generation: member.generation,
            member: member.index,
            name: individual.display_name().to_string(),
            probe,
            outcome,
            cached,
            keyword,
        });
    }

    progress.on_member_state(member.generation, member.index, MemberState::Done);
    Ok(ScoredIndividual::new(individual, score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::progress::{ChannelProgressCallback, ProgressMessage};
    use crate::engines::probe::ProbeTemplate;
    use crate::error::ProbevolveError;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    /// Resolves every probe to itself and counts calls.
    struct EchoFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(&self, probe: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("found {}", probe)))
        }
    }

    struct FailingFetcher {
        fatal: bool,
    }

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch(&self, probe: &str) -> Result<Option<String>> {
            if self.fatal {
                Err(ProbevolveError::Blocked(probe.to_string()))
            } else {
                Err(ProbevolveError::Fetch("timed out".to_string()))
            }
        }
    }

    fn context(
        fetcher: Arc<dyn Fetcher>,
        filter: Option<KeywordFilter>,
    ) -> (EvaluationContext, mpsc::Receiver<ProgressMessage>) {
        let (tx, rx) = mpsc::channel();
        let context = EvaluationContext {
            generator: Arc::new(ProbeGenerator::new(ProbeTemplate::from_url("http://t/^"))),
            cache: Arc::new(ResultCache::open_in_memory().unwrap()),
            fetcher,
            filter: filter.map(Arc::new),
            progress: Arc::new(ChannelProgressCallback::new(tx)),
            delay: Duration::ZERO,
        };
        (context, rx)
    }

    fn digits_only() -> Individual {
        Individual::new(0.0, 0.0, 1.0, 1, 1)
    }

    const MEMBER: MemberId = MemberId { generation: 0, index: 0 };

    #[tokio::test]
    async fn test_repeated_probes_are_served_from_cache() {
        let fetcher = Arc::new(EchoFetcher {
            calls: AtomicUsize::new(0),
        });
        let (ctx, rx) = context(fetcher.clone(), None);
        let mut rng = StdRng::seed_from_u64(3);

        let scored = evaluate(digits_only(), 60, &ctx, MEMBER, &mut rng).await.unwrap();

        assert_eq!(scored.score, 60);
        let calls = fetcher.calls.load(Ordering::SeqCst);
        assert!(calls <= 9, "fetched {} times for 9 possible probes", calls);
        assert_eq!(ctx.cache.len().unwrap(), calls);

        let hits: Vec<Hit> = rx
            .try_iter()
            .filter_map(|m| match m {
                ProgressMessage::Hit(hit) => Some(hit),
                _ => None,
            })
            .collect();
        assert_eq!(hits.len(), 60);
        assert_eq!(hits.iter().filter(|h| !h.cached).count(), calls);
    }

    #[tokio::test]
    async fn test_filter_limits_reports_not_score() {
        let fetcher = Arc::new(EchoFetcher {
            calls: AtomicUsize::new(0),
        });
        let (ctx, rx) = context(fetcher, Some(KeywordFilter::new(["t/7"])));
        let mut rng = StdRng::seed_from_u64(11);

        let scored = evaluate(digits_only(), 30, &ctx, MEMBER, &mut rng).await.unwrap();

        assert_eq!(scored.score, 30);
        for message in rx.try_iter() {
            if let ProgressMessage::Hit(hit) = message {
                assert_eq!(hit.probe, "http://t/7");
                assert_eq!(hit.keyword.as_deref(), Some("t/7"));
            }
        }
    }

    #[tokio::test]
    async fn test_recoverable_fetch_errors_score_nothing() {
        let (ctx, rx) = context(Arc::new(FailingFetcher { fatal: false }), None);
        let mut rng = StdRng::seed_from_u64(5);

        let scored = evaluate(digits_only(), 10, &ctx, MEMBER, &mut rng).await.unwrap();

        assert_eq!(scored.score, 0);
        assert!(ctx.cache.is_empty().unwrap());
        let states: Vec<MemberState> = rx
            .try_iter()
            .filter_map(|m| match m {
                ProgressMessage::MemberState { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![MemberState::Running, MemberState::Done]);
    }

    #[tokio::test]
    async fn test_fatal_fetch_error_aborts() {
        let (ctx, _rx) = context(Arc::new(FailingFetcher { fatal: true }), None);
        let mut rng = StdRng::seed_from_u64(5);

        let result = evaluate(digits_only(), 10, &ctx, MEMBER, &mut rng).await;

        assert!(matches!(result, Err(ProbevolveError::Blocked(_))));
    }

    #[tokio::test]
    async fn test_returns_normalized_individual() {
        let fetcher = Arc::new(EchoFetcher {
            calls: AtomicUsize::new(0),
        });
        let (ctx, _rx) = context(fetcher, None);
        let mut rng = StdRng::seed_from_u64(1);

        let individual = Individual::new(0.0, 0.0, 4.0, 1, 1).with_name("scout");
        let scored = evaluate(individual, 1, &ctx, MEMBER, &mut rng).await.unwrap();

        assert_eq!(scored.individual.display_name(), "scout");

        assert_eq!(scored.individual.p_number, 1.0);
        assert_eq!(scored.individual.p_lower, 0.0);
    }
}
