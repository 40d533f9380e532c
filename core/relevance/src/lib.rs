pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod scorer;

pub use cache::{ResultCache, ALL_MEMORIES_KEY};
pub use config::SuggestionConfig;
pub use orchestrator::{Phase, Presentation, SuggestionOrchestrator};
pub use scorer::{BoostPolicy, RelevanceScorer};
