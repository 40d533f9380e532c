use devmem_schemas::{Candidate, Memory, SignalSet, Suggestion};
use tracing::debug;

const DEFAULT_REASON: &str = "Similar content found";

/// Boost increments applied on top of the store's base relevance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostPolicy {
    pub intent_match: f32,
    pub same_language: f32,
    pub per_keyword: f32,
    pub per_identifier: f32,
    /// How many matched keywords the justification names.
    pub keywords_named: usize,
    /// How many matched identifiers the justification names.
    pub identifiers_named: usize,
}

impl Default for BoostPolicy {
    fn default() -> Self {
        Self {
            intent_match: 0.10,
            same_language: 0.05,
            per_keyword: 0.02,
            per_identifier: 0.03,
            keywords_named: 3,
            identifiers_named: 2,
        }
    }
}

/// Scores candidate memories against the signals of a context window.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    policy: BoostPolicy,
}

impl RelevanceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: BoostPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BoostPolicy {
        &self.policy
    }

    pub fn score(&self, signals: &SignalSet, memory: Memory, base: f32) -> Suggestion {
        self.score_with_reason(signals, memory, base, None)
    }

    /// Apply the boosts in order: intent, language, keywords, identifiers.
    ///
    /// An intent match replaces the incoming reason; keyword and identifier
    /// matches append to whatever reason is current at that point.
    pub fn score_with_reason(
        &self,
        signals: &SignalSet,
        memory: Memory,
        base: f32,
        reason: Option<&str>,
    ) -> Suggestion {
        let mut score = base;
        let mut justification = reason
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REASON)
            .to_string();

        let matching_intents: Vec<&str> = signals
            .intents
            .iter()
            .map(|intent| intent.as_str())
            .filter(|intent| {
                let needle = intent.replace('-', "");
                memory.tags.iter().any(|tag| tag.contains(&needle))
            })
            .collect();
        if !matching_intents.is_empty() {
            score += self.policy.intent_match;
            justification = format!("Intent match: {}", matching_intents.join(", "));
        }

        if let (Some(context), Some(candidate)) =
            (signals.language.as_deref(), memory.source.language.as_deref())
        {
            if context == candidate {
                score += self.policy.same_language;
            }
        }

        let content_lower = memory.content.to_lowercase();
        let matching_keywords: Vec<&str> = signals
            .keywords
            .iter()
            .map(String::as_str)
            .filter(|kw| {
                content_lower.contains(kw) || memory.tags.iter().any(|tag| tag.contains(kw))
            })
            .collect();
        if !matching_keywords.is_empty() {
            score += matching_keywords.len() as f32 * self.policy.per_keyword;
            justification.push_str(&format!(
                " (Keywords: {})",
                first_n(&matching_keywords, self.policy.keywords_named)
            ));
        }

        let matching_identifiers: Vec<&str> = signals
            .identifiers
            .iter()
            .map(String::as_str)
            .filter(|id| memory.content.contains(id))
            .collect();
        if !matching_identifiers.is_empty() {
            score += matching_identifiers.len() as f32 * self.policy.per_identifier;
            justification.push_str(&format!(
                " (Identifiers: {})",
                first_n(&matching_identifiers, self.policy.identifiers_named)
            ));
        }

        Suggestion {
            memory,
            score: clamp_score(score),
            justification,
        }
    }

    /// Score every well-formed candidate and sort by score, descending.
    /// Equal scores keep their input order.
    pub fn rank(&self, signals: &SignalSet, candidates: Vec<Candidate>) -> Vec<Suggestion> {
        let total = candidates.len();

        let mut suggestions: Vec<Suggestion> = candidates
            .into_iter()
            .filter(|c| c.memory.is_well_formed())
            .map(|c| {
                let reason = c.reason;
                self.score_with_reason(signals, c.memory, c.relevance, reason.as_deref())
            })
            .collect();

        if suggestions.len() < total {
            debug!(
                "Skipped {} malformed candidates",
                total - suggestions.len()
            );
        }

        // Vec::sort_by is stable
        suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));
        suggestions
    }
}

fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

fn first_n(items: &[&str], n: usize) -> String {
    items.iter().take(n).copied().collect::<Vec<_>>().join(", ")
}
