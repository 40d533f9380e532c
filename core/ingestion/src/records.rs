use devmem_schemas::{MemoryKind, MemoryLink, NewMemory, SourceDescriptor, SourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::tagger::TagGenerator;

const DECISION_KEYWORDS: &[&str] = &["decision", "approved", "rejected", "status", "outcome", "action"];

const DOCUMENT_KEYWORDS: &[&str] = &[
    "architecture", "design", "specification", "requirements", "api", "database", "deployment",
    "runbook", "documentation", "decision", "adr", "rfc", "technical", "system", "infrastructure",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[".docx", ".pdf", ".md", ".txt", ".xlsx"];

const MAX_TITLE_CHARS: usize = 100;
const MAX_CONTENT_CHARS: usize = 2000;
const MIN_CONTENT_CHARS: usize = 50;

/// A row from a structured list, with the fields we understand lifted into typed slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    pub comments: Option<String>,
    pub decision: Option<String>,
    pub status: Option<String>,
    pub outcome: Option<String>,
    /// Everything else, kept for display but never consulted for control flow.
    pub extra: BTreeMap<String, Value>,
}

impl ListRecord {
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        let mut record = ListRecord::default();

        for (name, value) in fields {
            let slot = match name.as_str() {
                "Title" => Some(&mut record.title),
                "Description" => Some(&mut record.description),
                "Comments" => Some(&mut record.comments),
                "Decision" => Some(&mut record.decision),
                "Status" => Some(&mut record.status),
                "Outcome" => Some(&mut record.outcome),
                _ => None,
            };

            match slot {
                Some(slot) => *slot = text_value(&value),
                None => {
                    record.extra.insert(name, value);
                }
            }
        }

        record
    }

    /// Typed slots in display order.
    fn slots(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("Title", self.title.as_deref()),
            ("Description", self.description.as_deref()),
            ("Comments", self.comments.as_deref()),
            ("Decision", self.decision.as_deref()),
            ("Status", self.status.as_deref()),
            ("Outcome", self.outcome.as_deref()),
        ]
    }

    pub fn is_decision_record(&self) -> bool {
        self.slots()
            .iter()
            .filter_map(|(_, value)| *value)
            .map(str::to_lowercase)
            .any(|text| DECISION_KEYWORDS.iter().any(|kw| text.contains(kw)))
    }

    /// Present typed slots as `Field: value` lines.
    pub fn content(&self) -> String {
        self.slots()
            .iter()
            .filter_map(|(name, value)| value.map(|v| format!("{}: {}", name, v)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_draft(self, project: &str, tagger: &TagGenerator) -> Option<NewMemory> {
        let content = clean_content(&self.content());
        if content.chars().count() < MIN_CONTENT_CHARS {
            debug!("Skipping list record with {} chars of content", content.len());
            return None;
        }

        let title = title_or_first_line(self.title.as_deref(), &self.content());

        let tags = tagger.generate("", &content);

        Some(NewMemory {
            title,
            description: self.description.clone().unwrap_or_default(),
            content,
            tags,
            source: SourceDescriptor {
                kind: SourceKind::ListItem,
                ..Default::default()
            },
            project: project.to_string(),
            kind: MemoryKind::Insight,
            links: Vec::new(),
        })
    }
}

/// A file from a shared document library, with its extracted text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl DocumentRecord {
    pub fn is_technical(&self) -> bool {
        is_technical_document(&self.name)
    }

    pub fn into_draft(self, project: &str, tagger: &TagGenerator) -> Option<NewMemory> {
        if self.content.chars().count() < MIN_CONTENT_CHARS {
            debug!("Skipping document {} with {} chars of content", self.name, self.content.len());
            return None;
        }

        let title = title_or_first_line(Some(self.name.as_str()), &self.content);
        let content = clean_content(&self.content);
        let tags = tagger.generate(&self.name, &content);
        let links = self
            .web_url
            .map(|url| MemoryLink {
                kind: "document".to_string(),
                url,
                title: self.name.clone(),
            })
            .into_iter()
            .collect();

        Some(NewMemory {
            title,
            description: String::new(),
            content,
            tags,
            source: SourceDescriptor {
                kind: SourceKind::Document,
                file: Some(self.name),
                ..Default::default()
            },
            project: project.to_string(),
            kind: MemoryKind::Documentation,
            links,
        })
    }
}

/// A technical-sounding name with an office or text extension.
pub fn is_technical_document(name: &str) -> bool {
    let name = name.to_lowercase();
    DOCUMENT_KEYWORDS.iter().any(|kw| name.contains(kw))
        && DOCUMENT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

fn title_or_first_line(title: Option<&str>, content: &str) -> String {
    match title {
        Some(title) if !title.trim().is_empty() => title.trim().to_string(),
        _ => {
            let first_line = content.lines().next().unwrap_or_default();
            truncate(first_line, MAX_TITLE_CHARS)
        }
    }
}

fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Collapse whitespace runs and cap the length.
fn clean_content(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&collapsed, MAX_CONTENT_CHARS)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
