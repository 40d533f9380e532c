use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag assigned when a memory would otherwise carry no tags at all.
pub const SENTINEL_TAG: &str = "untagged";

/// Strength used when a record carries none (or an unusable one).
pub const DEFAULT_STRENGTH: f32 = 0.5;

/// Lines above and below the cursor that make up a context window.
pub const CONTEXT_RADIUS_LINES: usize = 10;

// ============================================================================
// ID Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryId(pub String);

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemoryId {
    fn from(value: &str) -> Self {
        MemoryId(value.to_string())
    }
}

// ============================================================================
// Memory Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryKind {
    BugFix,
    #[default]
    CodeSnippet,
    Architecture,
    Meeting,
    Insight,
    ToolTip,
    Documentation,
    Design,
    Ticket,
    Link,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::BugFix => "bug-fix",
            MemoryKind::CodeSnippet => "code-snippet",
            MemoryKind::Architecture => "architecture",
            MemoryKind::Meeting => "meeting",
            MemoryKind::Insight => "insight",
            MemoryKind::ToolTip => "tool-tip",
            MemoryKind::Documentation => "documentation",
            MemoryKind::Design => "design",
            MemoryKind::Ticket => "ticket",
            MemoryKind::Link => "link",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MemoryKind::BugFix => "Bug Fix",
            MemoryKind::CodeSnippet => "Code Snippet",
            MemoryKind::Architecture => "Architecture",
            MemoryKind::Meeting => "Meeting",
            MemoryKind::Insight => "Insight",
            MemoryKind::ToolTip => "Tool Tip",
            MemoryKind::Documentation => "Documentation",
            MemoryKind::Design => "Design",
            MemoryKind::Ticket => "Ticket/Issue",
            MemoryKind::Link => "External Link",
        }
    }
}

/// Where a memory was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Selection,
    FileSave,
    Manual,
    Mail,
    Document,
    ListItem,
    #[default]
    #[serde(other)]
    Other,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Selection => "selection",
            SourceKind::FileSave => "file-save",
            SourceKind::Manual => "manual",
            SourceKind::Mail => "mail",
            SourceKind::Document => "document",
            SourceKind::ListItem => "list-item",
            SourceKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLink {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: MemoryKind,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: SourceDescriptor,
    #[serde(default)]
    pub project: String,
    #[serde(alias = "createdAt")]
    pub created_at: String, // RFC3339
    #[serde(default)]
    pub connections: Vec<MemoryId>,
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(default)]
    pub links: Vec<MemoryLink>,
}

fn default_strength() -> f32 {
    DEFAULT_STRENGTH
}

impl Memory {
    /// Enforce the record invariants: at least one tag, strength in [0, 1].
    pub fn normalized(mut self) -> Self {
        self.tags.retain(|t| !t.trim().is_empty());
        if self.tags.is_empty() {
            self.tags.push(SENTINEL_TAG.to_string());
        }
        self.strength = if self.strength.is_nan() {
            DEFAULT_STRENGTH
        } else {
            self.strength.clamp(0.0, 1.0)
        };
        self
    }

    /// A candidate without content or tags cannot be scored.
    pub fn is_well_formed(&self) -> bool {
        !self.content.trim().is_empty() && !self.tags.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);

        if !self.description.trim().is_empty() {
            out.push_str(&self.description);
            out.push_str("\n\n");
        }

        let language = self.source.language.as_deref().unwrap_or("text");
        out.push_str(&format!("## Code\n\n```{}\n{}\n```\n\n", language, self.content));

        out.push_str("## Tags\n");
        for tag in &self.tags {
            out.push_str(&format!("- {}\n", tag));
        }

        let file = self.source.file.as_deref().unwrap_or("Unknown");
        let line = self
            .source
            .line
            .map(|l| l.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        out.push_str(&format!("\n## Source\n{} (Line {})\n", file, line));
        out.push_str(&format!("\n## Created\n{}", self.created_at));

        out
    }
}

/// Memory as submitted for creation, before the store assigns an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMemory {
    pub title: String,
    pub content: String,
    pub description: String,
    pub tags: Vec<String>,
    pub source: SourceDescriptor,
    pub project: String,
    #[serde(default)]
    pub kind: MemoryKind,
    #[serde(default)]
    pub links: Vec<MemoryLink>,
}

// ============================================================================
// Context Window
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub content: String,
    pub selection: Option<String>,
    pub file: Option<String>,
    pub language: Option<String>,
    pub line: usize,
}

impl ContextWindow {
    /// Build the window of `radius` lines above and below `line`.
    pub fn around(
        document: &str,
        line: usize,
        radius: usize,
        selection: Option<String>,
        file: Option<String>,
        language: Option<String>,
    ) -> Self {
        let lines: Vec<&str> = document.split('\n').collect();
        let last = lines.len().saturating_sub(1);
        let cursor = line.min(last);
        let start = cursor.saturating_sub(radius);
        let end = (cursor + radius).min(last);

        Self {
            content: lines[start..=end].join("\n"),
            selection,
            file,
            language,
            line: cursor,
        }
    }

    /// Selected text wins over the surrounding window.
    pub fn query_text(&self) -> &str {
        match self.selection.as_deref() {
            Some(sel) if !sel.trim().is_empty() => sel,
            _ => &self.content,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query_text().trim().is_empty()
    }
}

// ============================================================================
// Signal Set
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFlags {
    pub function_definition: bool,
    pub method_call: bool,
    pub error_handling: bool,
    pub api_call: bool,
    pub data_query: bool,
    pub testing: bool,
    pub auth: bool,
    pub performance: bool,
    pub ui: bool,
    pub config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    FunctionDefinition,
    MethodCall,
    ErrorHandling,
    ApiIntegration,
    DataPersistence,
    Testing,
    Authentication,
    Optimization,
    UserInterface,
    Configuration,
    Algorithm,
    Security,
    Performance,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::FunctionDefinition => "function-definition",
            Intent::MethodCall => "method-call",
            Intent::ErrorHandling => "error-handling",
            Intent::ApiIntegration => "api-integration",
            Intent::DataPersistence => "data-persistence",
            Intent::Testing => "testing",
            Intent::Authentication => "authentication",
            Intent::Optimization => "optimization",
            Intent::UserInterface => "user-interface",
            Intent::Configuration => "configuration",
            Intent::Algorithm => "algorithm",
            Intent::Security => "security",
            Intent::Performance => "performance",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub keywords: Vec<String>,
    pub identifiers: Vec<String>,
    pub patterns: PatternFlags,
    pub complexity: Complexity,
    pub intents: Vec<Intent>,
    pub language: Option<String>,
}

// ============================================================================
// Candidates and Suggestions
// ============================================================================

/// A memory returned by the store's coarse retrieval, before boosting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub memory: Memory,
    #[serde(default)]
    pub relevance: f32,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub memory: Memory,
    pub score: f32,
    pub justification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: usize,
    #[serde(alias = "byTag")]
    pub by_tag: BTreeMap<String, usize>,
}

impl MemoryStats {
    pub fn from_memories(memories: &[Memory]) -> Self {
        let mut by_tag = BTreeMap::new();
        for memory in memories {
            for tag in &memory.tags {
                *by_tag.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        Self {
            total: memories.len(),
            by_tag,
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of an operation that may degrade instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Outcome<T> {
    Fresh(T),
    Cached(T),
    Degraded { value: T, reason: String },
    Failed { reason: String },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. } | Outcome::Failed { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Fresh(v) | Outcome::Cached(v) => Some(v),
            Outcome::Degraded { value, .. } => Some(value),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Fresh(v) | Outcome::Cached(v) => Some(v),
            Outcome::Degraded { value, .. } => Some(value),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Fresh(v) => Outcome::Fresh(f(v)),
            Outcome::Cached(v) => Outcome::Cached(f(v)),
            Outcome::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
            Outcome::Failed { reason } => Outcome::Failed { reason },
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn generate_memory_id() -> MemoryId {
    MemoryId(format!("mem_{}", ulid::Ulid::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_memory() -> Memory {
        Memory {
            id: generate_memory_id(),
            title: "Auth0 Integration Epic".to_string(),
            content: "Implement Auth0 silent authentication with refresh token rotation.".to_string(),
            description: String::new(),
            kind: MemoryKind::Ticket,
            tags: vec!["auth0".into(), "authentication".into(), "jira".into()],
            source: SourceDescriptor {
                kind: SourceKind::Manual,
                file: None,
                line: None,
                language: None,
            },
            project: "Authentication Service".to_string(),
            created_at: "2025-06-07T00:00:00Z".to_string(),
            connections: vec![MemoryId::from("mem_1")],
            strength: 0.8,
            links: vec![],
        }
    }

    #[test]
    fn test_id_generation() {
        let memory_id = generate_memory_id();
        assert!(memory_id.0.starts_with("mem_"));
        assert_eq!(memory_id.0.len(), 30); // "mem_" + 26 chars
    }

    #[test]
    fn test_normalized_applies_sentinel_and_clamps_strength() {
        let mut memory = sample_memory();
        memory.tags = vec!["  ".into()];
        memory.strength = 4.2;

        let memory = memory.normalized();
        assert_eq!(memory.tags, vec![SENTINEL_TAG.to_string()]);
        assert_eq!(memory.strength, 1.0);

        let mut nan = sample_memory();
        nan.strength = f32::NAN;
        assert_eq!(nan.normalized().strength, DEFAULT_STRENGTH);
    }

    #[test]
    fn test_well_formed() {
        let memory = sample_memory();
        assert!(memory.is_well_formed());

        let mut blank = sample_memory();
        blank.content = "   ".into();
        assert!(!blank.is_well_formed());

        let mut untagged = sample_memory();
        untagged.tags.clear();
        assert!(!untagged.is_well_formed());
    }

    #[test]
    fn test_memory_deserializes_store_shape() {
        let json = r#"{
            "id": "mem_42",
            "title": "Retry policy",
            "content": "Use exponential backoff",
            "tags": ["api"],
            "source": {"type": "vscode", "file": "src/client.ts", "line": 12, "language": "typescript"},
            "project": "API Gateway",
            "createdAt": "2025-06-04T10:00:00Z"
        }"#;

        let memory: Memory = serde_json::from_str(json).unwrap();
        assert_eq!(memory.source.kind, SourceKind::Other);
        assert_eq!(memory.source.line, Some(12));
        assert_eq!(memory.strength, DEFAULT_STRENGTH);
        assert_eq!(memory.kind, MemoryKind::CodeSnippet);
        assert!(memory.connections.is_empty());
    }

    #[test]
    fn test_context_window_around_clamps_to_document() {
        let document = (0..30).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");

        let window = ContextWindow::around(&document, 2, CONTEXT_RADIUS_LINES, None, None, None);
        assert!(window.content.starts_with("line 0"));
        assert!(window.content.ends_with("line 12"));

        let window = ContextWindow::around(&document, 100, 3, None, None, None);
        assert_eq!(window.line, 29);
        assert_eq!(window.content, "line 26\nline 27\nline 28\nline 29");
    }

    #[test]
    fn test_query_text_prefers_selection() {
        let mut window = ContextWindow {
            content: "let total = items.len();".into(),
            ..Default::default()
        };
        assert_eq!(window.query_text(), "let total = items.len();");

        window.selection = Some("items.len()".into());
        assert_eq!(window.query_text(), "items.len()");

        window.selection = Some("   ".into());
        assert_eq!(window.query_text(), "let total = items.len();");

        assert!(ContextWindow::default().is_empty());
    }

    #[test]
    fn test_stats_from_memories() {
        let a = sample_memory();
        let mut b = sample_memory();
        b.tags = vec!["jira".into(), "mobile".into()];

        let stats = MemoryStats::from_memories(&[a, b]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_tag.get("jira"), Some(&2));
        assert_eq!(stats.by_tag.get("mobile"), Some(&1));
    }

    #[test]
    fn test_markdown_rendering() {
        let mut memory = sample_memory();
        memory.source.file = Some("src/auth.ts".into());
        memory.source.line = Some(7);
        memory.source.language = Some("typescript".into());

        let md = memory.to_markdown();
        assert!(md.starts_with("# Auth0 Integration Epic"));
        assert!(md.contains("```typescript\n"));
        assert!(md.contains("- authentication\n"));
        assert!(md.contains("src/auth.ts (Line 7)"));
    }

    #[test]
    fn test_outcome_accessors() {
        let fresh: Outcome<Vec<u8>> = Outcome::Fresh(vec![1]);
        assert!(!fresh.is_degraded());
        assert_eq!(fresh.value(), Some(&vec![1]));

        let degraded = Outcome::degraded(Vec::<u8>::new(), "store unavailable");
        assert!(degraded.is_degraded());
        assert_eq!(degraded.map(|v| v.len()).into_value(), Some(0));

        let failed: Outcome<u8> = Outcome::Failed {
            reason: "no data".into(),
        };
        assert!(failed.into_value().is_none());
    }
}
