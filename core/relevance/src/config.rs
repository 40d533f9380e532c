use std::str::FromStr;
use std::time::Duration;

/// Timing, caching and filtering knobs for the suggestion orchestrator.
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    pub enabled: bool,
    /// Quiet period after the last context change before scoring runs.
    pub debounce: Duration,
    /// Minimum spacing between two presented results.
    pub min_presentation_interval: Duration,
    pub cache_ttl: Duration,
    pub suggestion_limit: usize,
    pub memory_fetch_limit: usize,
    /// Suggestions must score strictly above this to be returned.
    pub min_relevance: f32,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_millis(2000),
            min_presentation_interval: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(300),
            suggestion_limit: 5,
            memory_fetch_limit: 50,
            min_relevance: 0.0,
        }
    }
}

impl SuggestionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("DEVMEM_SUGGESTIONS_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.enabled),
            debounce: env_parse("DEVMEM_SUGGESTION_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            min_presentation_interval: env_parse("DEVMEM_SUGGESTION_MIN_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_presentation_interval),
            cache_ttl: env_parse("DEVMEM_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            suggestion_limit: env_parse("DEVMEM_SUGGESTION_LIMIT")
                .unwrap_or(defaults.suggestion_limit),
            memory_fetch_limit: env_parse("DEVMEM_MEMORY_FETCH_LIMIT")
                .unwrap_or(defaults.memory_fetch_limit),
            min_relevance: env_parse("DEVMEM_MIN_RELEVANCE").unwrap_or(defaults.min_relevance),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
