use devmem_schemas::{Complexity, Intent, PatternFlags, SignalSet};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Domain terms matched as plain substrings of the lower-cased text.
const PROGRAMMING_KEYWORDS: &[&str] = &[
    "function", "class", "method", "variable", "array", "object", "string", "number",
    "async", "await", "promise", "callback", "event", "handler", "listener",
    "component", "service", "controller", "model", "view", "router",
    "database", "query", "api", "endpoint", "request", "response",
    "authentication", "authorization", "security", "encryption",
    "optimization", "performance", "cache", "memory", "algorithm",
    "testing", "debugging", "logging", "monitoring", "error",
];

/// Control-flow and declaration words never reported as identifiers.
const IDENTIFIER_STOP_LIST: &[&str] = &[
    "if", "else", "for", "while", "do", "try", "catch", "class", "function", "var", "let", "const",
];

const MAX_IDENTIFIERS: usize = 10;
const MIN_IDENTIFIER_LEN: usize = 3;

const LOW_COMPLEXITY_BELOW: usize = 20;
const MEDIUM_COMPLEXITY_BELOW: usize = 50;

/// One boolean "does the text suggest X" rule.
struct PatternRule {
    intent: Intent,
    regex: Regex,
}

/// Deterministic signal extraction over a context window or captured snippet.
pub struct ContentAnalyzer {
    rules: Vec<PatternRule>,
    identifier_pattern: Regex,
    script_identifier_pattern: Regex,
    branch_pattern: Regex,
    definition_pattern: Regex,
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentAnalyzer {
    pub fn new() -> Self {
        let rule = |intent, pattern: &str| PatternRule {
            intent,
            regex: Regex::new(pattern).expect("static pattern"),
        };

        Self {
            // Declaration order is the intent order.
            rules: vec![
                rule(
                    Intent::FunctionDefinition,
                    r"(?i)function\s+\w+|const\s+\w+\s*=|def\s+\w+|class\s+\w+",
                ),
                rule(Intent::MethodCall, r"(?i)\.\w+\(|\w+\s*\("),
                rule(Intent::ErrorHandling, r"(?i)try|catch|except|error|throw"),
                rule(Intent::ApiIntegration, r"(?i)fetch|axios|http|api|endpoint|request"),
                rule(Intent::DataPersistence, r"(?i)select|insert|update|delete|query|sql"),
                rule(Intent::Testing, r"(?i)test|spec|describe|it\(|expect"),
                rule(Intent::Authentication, r"(?i)auth|login|token|jwt|password|session"),
                rule(Intent::Optimization, r"(?i)optimize|performance|cache|speed|async|await"),
                rule(
                    Intent::UserInterface,
                    r"(?i)component|render|usestate|useeffect|onclick|event",
                ),
                rule(Intent::Configuration, r"(?i)config|setting|env|environment|variable"),
            ],
            identifier_pattern: Regex::new(r"\b([a-zA-Z_][a-zA-Z0-9_]*)\b").expect("static pattern"),
            // No lookbehind in `regex`, so the left boundary is consumed outside the group.
            script_identifier_pattern: Regex::new(r"(?:^|[^a-zA-Z0-9_$])([a-zA-Z_$][a-zA-Z0-9_$]*)")
                .expect("static pattern"),
            branch_pattern: Regex::new(r"if|else|switch|case|while|for").expect("static pattern"),
            definition_pattern: Regex::new(r"function|def|class|=>").expect("static pattern"),
        }
    }

    /// Extract the full signal set for `text`.
    pub fn analyze(&self, text: &str, language: Option<&str>) -> SignalSet {
        let lower = text.to_lowercase();

        let patterns = self.detect_patterns(&lower);
        let keywords = Self::extract_keywords(&lower);
        let identifiers = self.extract_identifiers(text, language);
        let complexity = self.complexity(text);
        let intents = self.detect_intents(&patterns, &keywords);

        debug!(
            "Analyzed {} bytes: {} keywords, {} identifiers, {} intents, {} complexity",
            text.len(),
            keywords.len(),
            identifiers.len(),
            intents.len(),
            complexity.as_str()
        );

        SignalSet {
            keywords,
            identifiers,
            patterns,
            complexity,
            intents,
            language: language.map(str::to_string),
        }
    }

    /// Evaluate every pattern rule independently.
    pub fn detect_patterns(&self, text: &str) -> PatternFlags {
        let mut flags = PatternFlags::default();
        for rule in &self.rules {
            if !rule.regex.is_match(text) {
                continue;
            }
            match rule.intent {
                Intent::FunctionDefinition => flags.function_definition = true,
                Intent::MethodCall => flags.method_call = true,
                Intent::ErrorHandling => flags.error_handling = true,
                Intent::ApiIntegration => flags.api_call = true,
                Intent::DataPersistence => flags.data_query = true,
                Intent::Testing => flags.testing = true,
                Intent::Authentication => flags.auth = true,
                Intent::Optimization => flags.performance = true,
                Intent::UserInterface => flags.ui = true,
                Intent::Configuration => flags.config = true,
                _ => {}
            }
        }
        flags
    }

    /// Dictionary keywords present in `lower`, in dictionary order.
    pub fn extract_keywords(lower: &str) -> Vec<String> {
        PROGRAMMING_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .map(|kw| kw.to_string())
            .collect()
    }

    /// First ten distinct identifier-shaped tokens, stop-listed and length-filtered.
    pub fn extract_identifiers(&self, text: &str, language: Option<&str>) -> Vec<String> {
        let pattern = match language {
            Some("javascript") | Some("typescript") => &self.script_identifier_pattern,
            _ => &self.identifier_pattern,
        };

        let mut seen = HashSet::new();
        let mut identifiers = Vec::new();

        for caps in pattern.captures_iter(text) {
            let Some(token) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if !seen.insert(token) {
                continue;
            }
            if token.chars().count() < MIN_IDENTIFIER_LEN {
                continue;
            }
            if IDENTIFIER_STOP_LIST.contains(&token.to_lowercase().as_str()) {
                continue;
            }
            identifiers.push(token.to_string());
            if identifiers.len() == MAX_IDENTIFIERS {
                break;
            }
        }

        identifiers
    }

    /// lines + 2 * branch keywords + 3 * definition keywords, bucketed.
    pub fn complexity(&self, text: &str) -> Complexity {
        let lines = text.split('\n').count();
        let branches = self.branch_pattern.find_iter(text).count();
        let definitions = self.definition_pattern.find_iter(text).count();

        let score = lines + branches * 2 + definitions * 3;

        if score < LOW_COMPLEXITY_BELOW {
            Complexity::Low
        } else if score < MEDIUM_COMPLEXITY_BELOW {
            Complexity::Medium
        } else {
            Complexity::High
        }
    }

    fn detect_intents(&self, patterns: &PatternFlags, keywords: &[String]) -> Vec<Intent> {
        let flagged = [
            (patterns.function_definition, Intent::FunctionDefinition),
            (patterns.method_call, Intent::MethodCall),
            (patterns.error_handling, Intent::ErrorHandling),
            (patterns.api_call, Intent::ApiIntegration),
            (patterns.data_query, Intent::DataPersistence),
            (patterns.testing, Intent::Testing),
            (patterns.auth, Intent::Authentication),
            (patterns.performance, Intent::Optimization),
            (patterns.ui, Intent::UserInterface),
            (patterns.config, Intent::Configuration),
        ];

        let mut intents: Vec<Intent> = flagged
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, intent)| *intent)
            .collect();

        let has = |kw: &str| keywords.iter().any(|k| k == kw);
        if has("algorithm") {
            intents.push(Intent::Algorithm);
        }
        if has("security") {
            intents.push(Intent::Security);
        }
        if has("performance") {
            intents.push(Intent::Performance);
        }

        intents
    }
}
