use devmem_ingestion::{ContentAnalyzer, ContextQuery, MemoryStore};
use devmem_schemas::{
    Candidate, ContextWindow, Memory, MemoryStats, Outcome, SignalSet, Suggestion,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{ResultCache, ALL_MEMORIES_KEY};
use crate::config::SuggestionConfig;
use crate::scorer::RelevanceScorer;

// ============================================================================
// Trigger state machine
// ============================================================================

enum TriggerState {
    Idle,
    Pending {
        generation: u64,
        timer: JoinHandle<()>,
    },
    CoolingDown {
        until: Instant,
    },
}

/// Observable view of the trigger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "generation", rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Pending(u64),
    CoolingDown,
}

struct TriggerMachine {
    state: TriggerState,
    /// Bumped on every context change; identifies the timer that issued a pass.
    generation: u64,
    /// Highest generation whose result has been accepted or discarded.
    completed_generation: u64,
    last_presented_at: Option<Instant>,
    current: Vec<Suggestion>,
}

impl TriggerMachine {
    fn new() -> Self {
        Self {
            state: TriggerState::Idle,
            generation: 0,
            completed_generation: 0,
            last_presented_at: None,
            current: Vec::new(),
        }
    }

    fn cancel_pending(&mut self) {
        if let TriggerState::Pending { generation, timer } =
            std::mem::replace(&mut self.state, TriggerState::Idle)
        {
            timer.abort();
            debug!("Cancelled pending suggestion timer (generation {})", generation);
        }
    }

    fn rate_limited(&self, now: Instant, interval: Duration) -> bool {
        self.last_presented_at
            .is_some_and(|last| now.duration_since(last) < interval)
    }
}

/// A ranked result handed to the interactive caller.
#[derive(Debug, Clone)]
pub struct Presentation {
    pub generation: u64,
    pub suggestions: Vec<Suggestion>,
    pub presented_at: Instant,
}

// ============================================================================
// Orchestrator
// ============================================================================

struct Inner {
    store: Arc<dyn MemoryStore>,
    analyzer: ContentAnalyzer,
    scorer: RelevanceScorer,
    config: SuggestionConfig,
    cache: RwLock<ResultCache<Vec<Memory>>>,
    trigger: Mutex<TriggerMachine>,
    presentations: mpsc::UnboundedSender<Presentation>,
}

/// Debounces context changes, rate-limits presentation and caches the full memory set.
#[derive(Clone)]
pub struct SuggestionOrchestrator {
    inner: Arc<Inner>,
}

impl SuggestionOrchestrator {
    /// Create an orchestrator and the channel its presentations arrive on.
    pub fn new(
        store: Arc<dyn MemoryStore>,
        config: SuggestionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Presentation>) {
        Self::with_scorer(store, config, RelevanceScorer::new())
    }

    pub fn with_scorer(
        store: Arc<dyn MemoryStore>,
        config: SuggestionConfig,
        scorer: RelevanceScorer,
    ) -> (Self, mpsc::UnboundedReceiver<Presentation>) {
        let (tx, rx) = mpsc::unbounded_channel();

        info!(
            "Suggestion orchestrator ready (debounce {:?}, min interval {:?}, cache ttl {:?})",
            config.debounce, config.min_presentation_interval, config.cache_ttl
        );

        let inner = Inner {
            store,
            analyzer: ContentAnalyzer::new(),
            scorer,
            cache: RwLock::new(ResultCache::new(config.cache_ttl)),
            config,
            trigger: Mutex::new(TriggerMachine::new()),
            presentations: tx,
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    pub fn config(&self) -> &SuggestionConfig {
        &self.inner.config
    }

    /// Restart the debounce timer for `context`.
    ///
    /// Returns the generation of the scheduled pass, or `None` when suggestions are disabled.
    /// Must be called from within a tokio runtime.
    pub fn on_context_changed(&self, context: ContextWindow) -> Option<u64> {
        if !self.inner.config.enabled {
            return None;
        }

        // The lock is held until the new state is stored, so the timer task
        // can never observe the machine before it is Pending.
        let mut machine = self.inner.lock_trigger();
        machine.cancel_pending();
        machine.generation += 1;
        let generation = machine.generation;

        let inner = Arc::clone(&self.inner);
        let delay = self.inner.config.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(generation, context).await;
        });

        machine.state = TriggerState::Pending { generation, timer };
        debug!("Scheduled suggestion pass {} in {:?}", generation, delay);

        Some(generation)
    }

    /// Score the context immediately, bypassing debounce and rate limiting.
    pub async fn get_suggestions(&self, context: &ContextWindow) -> Outcome<Vec<Suggestion>> {
        self.inner.suggestions_for(context).await
    }

    /// The last presented result.
    pub fn current_suggestions(&self) -> Vec<Suggestion> {
        self.inner.lock_trigger().current.clone()
    }

    /// Cancel any pending pass and forget the presented result.
    pub fn clear_suggestions(&self) {
        let mut machine = self.inner.lock_trigger();
        machine.cancel_pending();
        machine.completed_generation = machine.generation;
        machine.current.clear();
    }

    pub fn phase(&self) -> Phase {
        let machine = self.inner.lock_trigger();
        match &machine.state {
            TriggerState::Idle => Phase::Idle,
            TriggerState::Pending { generation, .. } => Phase::Pending(*generation),
            TriggerState::CoolingDown { until } if Instant::now() < *until => Phase::CoolingDown,
            TriggerState::CoolingDown { .. } => Phase::Idle,
        }
    }

    /// The full memory set, served from cache while the entry is live.
    pub async fn all_memories(&self) -> Outcome<Vec<Memory>> {
        self.inner.all_memories().await
    }

    pub async fn clear_cache(&self) {
        self.inner.cache.write().await.clear();
        info!("Suggestion cache cleared");
    }

    /// Remote stats, or tag counts over the full memory set when the store cannot provide them.
    pub async fn stats(&self) -> Outcome<MemoryStats> {
        let remote_error = match self.inner.store.stats().await {
            Ok(stats) => return Outcome::Fresh(stats),
            Err(e) => e,
        };
        warn!("Stats unavailable from store, counting locally: {}", remote_error);

        match self.inner.all_memories().await {
            Outcome::Fresh(memories) | Outcome::Cached(memories) => Outcome::degraded(
                MemoryStats::from_memories(&memories),
                remote_error.to_string(),
            ),
            Outcome::Degraded { reason, .. } | Outcome::Failed { reason } => Outcome::Failed {
                reason: format!("{}; {}", remote_error, reason),
            },
        }
    }
}

impl Inner {
    fn lock_trigger(&self) -> MutexGuard<'_, TriggerMachine> {
        self.trigger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer expiry for `generation`.
    async fn fire(self: Arc<Self>, generation: u64, context: ContextWindow) {
        {
            let mut machine = self.lock_trigger();
            let current = matches!(
                machine.state,
                TriggerState::Pending { generation: g, .. } if g == generation
            );
            if !current {
                debug!("Timer {} superseded before firing", generation);
                return;
            }
            // From here on the pass runs to completion.
            machine.state = TriggerState::Idle;

            if machine.rate_limited(Instant::now(), self.config.min_presentation_interval) {
                machine.completed_generation = generation;
                debug!("Rate limited pass {} before fetching", generation);
                return;
            }
        }

        let suggestions = self
            .suggestions_for(&context)
            .await
            .into_value()
            .unwrap_or_default();

        let mut machine = self.lock_trigger();
        if generation <= machine.completed_generation {
            debug!("Discarding stale suggestions from pass {}", generation);
            return;
        }
        machine.completed_generation = generation;

        let now = Instant::now();
        if machine.rate_limited(now, self.config.min_presentation_interval) {
            debug!("Rate limited suggestions from pass {}", generation);
            return;
        }

        if suggestions.is_empty() {
            debug!("Pass {} produced no suggestions", generation);
            return;
        }

        info!(
            "Presenting {} suggestions from pass {} (top: {})",
            suggestions.len(),
            generation,
            suggestions[0].memory.title
        );

        machine.last_presented_at = Some(now);
        machine.current = suggestions.clone();
        if !matches!(machine.state, TriggerState::Pending { .. }) {
            machine.state = TriggerState::CoolingDown {
                until: now + self.config.min_presentation_interval,
            };
        }

        let presentation = Presentation {
            generation,
            suggestions,
            presented_at: now,
        };
        if self.presentations.send(presentation).is_err() {
            debug!("Presentation receiver dropped");
        }
    }

    async fn suggestions_for(&self, context: &ContextWindow) -> Outcome<Vec<Suggestion>> {
        if context.is_empty() {
            return Outcome::Fresh(Vec::new());
        }

        let text = context.query_text();
        let signals = self.analyzer.analyze(text, context.language.as_deref());

        let query = ContextQuery {
            content: text.to_string(),
            language: context.language.clone(),
            filename: context.file.clone(),
            limit: self.config.suggestion_limit,
        };

        match self.store.contextual_candidates(&query).await {
            Ok(candidates) => {
                debug!("Store returned {} candidates", candidates.len());
                Outcome::Fresh(self.select(&signals, candidates))
            }
            Err(e) => {
                warn!("Contextual candidate fetch failed: {}", e);
                let cached = self.cache.read().await.get(ALL_MEMORIES_KEY);
                let suggestions = match cached {
                    Some(memories) => {
                        debug!("Scoring {} cached memories instead", memories.len());
                        let candidates = memories
                            .into_iter()
                            .map(|memory| Candidate {
                                memory,
                                relevance: 0.0,
                                reason: None,
                            })
                            .collect();
                        self.select(&signals, candidates)
                    }
                    None => Vec::new(),
                };
                Outcome::degraded(suggestions, e.to_string())
            }
        }
    }

    fn select(&self, signals: &SignalSet, candidates: Vec<Candidate>) -> Vec<Suggestion> {
        let mut ranked = self.scorer.rank(signals, candidates);
        ranked.retain(|s| s.score > self.config.min_relevance);
        ranked.truncate(self.config.suggestion_limit);
        ranked
    }

    async fn all_memories(&self) -> Outcome<Vec<Memory>> {
        let cached = self.cache.read().await.get(ALL_MEMORIES_KEY);
        if let Some(memories) = cached {
            debug!("Serving {} memories from cache", memories.len());
            return Outcome::Cached(memories);
        }

        match self.store.list_memories(self.config.memory_fetch_limit).await {
            Ok(memories) => {
                info!("Fetched {} memories from store", memories.len());
                self.cache
                    .write()
                    .await
                    .insert(ALL_MEMORIES_KEY, memories.clone());
                Outcome::Fresh(memories)
            }
            Err(e) => {
                warn!("Failed to fetch memories: {}", e);
                Outcome::degraded(Vec::new(), e.to_string())
            }
        }
    }
}
