use devmem_schemas::{MemoryKind, MemoryLink, NewMemory, SourceDescriptor, SourceKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::records::truncate;

/// Any of these marks a message as technical.
const TECHNICAL_KEYWORDS: &[&str] = &[
    "bug", "fix", "deploy", "api", "database", "architecture", "decision",
];

/// Terms reported as keywords and counted towards confidence.
const TECHNICAL_TERMS: &[&str] = &[
    "api", "database", "frontend", "backend", "deployment", "architecture", "react", "node",
    "python", "javascript", "typescript", "kubernetes", "docker", "aws", "azure", "github", "jira",
    "performance", "security",
];

const MAX_BODY_CHARS: usize = 1000;

const DECISION_WEIGHT: f32 = 0.4;
const TERM_WEIGHT: f32 = 0.1;
const MAX_TERM_WEIGHT: f32 = 0.3;
const PROJECT_WEIGHT: f32 = 0.2;
const PROBLEM_WEIGHT: f32 = 0.3;

const MAIL_LINK_BASE: &str = "https://outlook.office.com/mail/id/";

/// A mail message as the mail provider hands it over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body_preview: String,
    /// Full body, usually HTML.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default, alias = "receivedDateTime")]
    pub received_at: Option<String>,
}

impl MailMessage {
    /// Subject and preview, the text every heuristic looks at.
    pub fn summary_text(&self) -> String {
        format!("{} {}", self.subject, self.body_preview)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MailCategory {
    Decision,
    Technical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailAnalysis {
    pub relevant: bool,
    pub category: MailCategory,
    pub keywords: Vec<String>,
    /// In [0, 1].
    pub confidence: f32,
}

/// Keyword heuristics that decide whether a message is worth remembering.
pub struct MailAnalyzer {
    decision_pattern: Regex,
    decision_score_pattern: Regex,
    project_pattern: Regex,
    problem_pattern: Regex,
    html_tag_pattern: Regex,
    forwarded_pattern: Regex,
    header_pattern: Regex,
    blank_lines_pattern: Regex,
}

impl MailAnalyzer {
    pub fn new() -> Self {
        Self {
            decision_pattern: Regex::new(r"(?i)decided|decision|agreed|approved|rejected")
                .expect("static pattern"),
            decision_score_pattern: Regex::new(r"(?i)decided|decision|agreed|approved")
                .expect("static pattern"),
            project_pattern: Regex::new(r"(?i)project|sprint|release|milestone")
                .expect("static pattern"),
            problem_pattern: Regex::new(r"(?i)solution|fix|resolve|implement")
                .expect("static pattern"),
            html_tag_pattern: Regex::new(r"<[^>]*>").expect("static pattern"),
            forwarded_pattern: Regex::new(r"(?s)-----Original Message-----.*$")
                .expect("static pattern"),
            header_pattern: Regex::new(r"(?s)From:.*?Subject:.*?\n").expect("static pattern"),
            blank_lines_pattern: Regex::new(r"\n{3,}").expect("static pattern"),
        }
    }

    pub fn analyze(&self, message: &MailMessage) -> MailAnalysis {
        let text = message.summary_text();
        let lower = text.to_lowercase();

        let decision = self.decision_pattern.is_match(&text);
        let technical = TECHNICAL_KEYWORDS.iter().any(|kw| lower.contains(kw));

        MailAnalysis {
            relevant: decision || technical,
            category: if decision {
                MailCategory::Decision
            } else {
                MailCategory::Technical
            },
            keywords: Self::extract_keywords(&lower),
            confidence: self.relevance_score(&text),
        }
    }

    fn extract_keywords(lower: &str) -> Vec<String> {
        TECHNICAL_TERMS
            .iter()
            .filter(|term| lower.contains(*term))
            .map(|term| term.to_string())
            .collect()
    }

    /// Weighted evidence for decision, technical, project and problem-solving language, capped at 1.
    pub fn relevance_score(&self, text: &str) -> f32 {
        let mut score = 0.0;

        if self.decision_score_pattern.is_match(text) {
            score += DECISION_WEIGHT;
        }

        let terms = Self::extract_keywords(&text.to_lowercase()).len();
        score += (terms as f32 * TERM_WEIGHT).min(MAX_TERM_WEIGHT);

        if self.project_pattern.is_match(text) {
            score += PROJECT_WEIGHT;
        }
        if self.problem_pattern.is_match(text) {
            score += PROBLEM_WEIGHT;
        }

        score.min(1.0)
    }

    /// Strip markup, forwarded threads and header blocks, then cap the length.
    pub fn clean_body(&self, raw: &str) -> String {
        let text = self.html_tag_pattern.replace_all(raw, " ");
        let text = self.forwarded_pattern.replace(&text, "");
        let text = self.header_pattern.replace_all(&text, "");
        let text = self.blank_lines_pattern.replace_all(&text, "\n\n");

        truncate(text.trim(), MAX_BODY_CHARS)
    }

    pub fn into_draft(
        &self,
        message: &MailMessage,
        analysis: &MailAnalysis,
        project: &str,
    ) -> NewMemory {
        let body = message.body.as_deref().unwrap_or(&message.body_preview);

        NewMemory {
            title: format!("Email: {}", message.subject),
            content: self.clean_body(body),
            description: message
                .from
                .as_deref()
                .map(|from| format!("From {}", from))
                .unwrap_or_default(),
            tags: analysis.keywords.clone(),
            source: SourceDescriptor {
                kind: SourceKind::Mail,
                ..Default::default()
            },
            project: project.to_string(),
            kind: match analysis.category {
                MailCategory::Decision => MemoryKind::Meeting,
                MailCategory::Technical => MemoryKind::Documentation,
            },
            links: vec![MemoryLink {
                kind: "email".to_string(),
                url: format!("{}{}", MAIL_LINK_BASE, message.id),
                title: message.subject.clone(),
            }],
        }
    }

    /// Drafts for the relevant messages, in input order.
    pub fn capture_relevant(&self, messages: &[MailMessage], project: &str) -> Vec<NewMemory> {
        let drafts: Vec<NewMemory> = messages
            .iter()
            .filter_map(|message| {
                let analysis = self.analyze(message);
                analysis
                    .relevant
                    .then(|| self.into_draft(message, &analysis, project))
            })
            .collect();

        debug!("{} of {} mail messages kept", drafts.len(), messages.len());
        drafts
    }
}

impl Default for MailAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
