use chrono::Utc;
use devmem_schemas::{
    generate_memory_id, Memory, MemoryKind, NewMemory, Outcome, SourceDescriptor, SourceKind,
    DEFAULT_STRENGTH,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::store::MemoryStore;
use crate::tagger::TagGenerator;

const AUTO_CAPTURE_TAG: &str = "auto-captured";

/// Languages whose saved files are eligible for auto capture.
const AUTO_CAPTURE_LANGUAGES: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "java",
    "csharp",
    "cpp",
    "go",
    "rust",
    "php",
];

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub auto_capture: bool,
    pub min_auto_capture_len: usize,
    pub default_project: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            auto_capture: false,
            min_auto_capture_len: 100,
            default_project: "Unknown".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            auto_capture: std::env::var("DEVMEM_AUTO_CAPTURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.auto_capture),
            ..defaults
        }
    }
}

/// A manual capture from the editor.
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    pub content: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Comma-separated tags typed by the user; overrides generated tags when non-blank.
    pub tags: Option<String>,
    pub project: Option<String>,
    pub kind: MemoryKind,
}

/// Turns captured content into stored, tagged memories.
pub struct MemoryCapture {
    store: Arc<dyn MemoryStore>,
    tagger: TagGenerator,
    config: CaptureConfig,
}

impl MemoryCapture {
    pub fn new(store: Arc<dyn MemoryStore>, config: CaptureConfig) -> Self {
        Self {
            store,
            tagger: TagGenerator::new(),
            config,
        }
    }

    /// Ask the store for tags, falling back to the local generator.
    pub async fn generate_tags(&self, file: &str, content: &str) -> Outcome<Vec<String>> {
        match self.store.generate_tags(file, content).await {
            Ok(Some(tags)) if !tags.is_empty() => Outcome::Fresh(tags),
            Ok(_) => {
                debug!("Store returned no tags for {}, using local tags", file);
                Outcome::Fresh(self.tagger.generate(file, content))
            }
            Err(e) => {
                warn!("Tag generation failed, using local tags: {}", e);
                Outcome::degraded(self.tagger.generate(file, content), e.to_string())
            }
        }
    }

    /// Persist a manual capture.
    pub async fn capture(&self, request: CaptureRequest) -> Outcome<Memory> {
        let file_name = request.file.as_deref().map(file_name);

        let title = match (&request.title, file_name) {
            (Some(title), _) if !title.trim().is_empty() => title.trim().to_string(),
            (_, Some(name)) => match request.line {
                Some(line) => format!("Code from {}:{}", name, line),
                None => format!("Code from {}", name),
            },
            _ => "Untitled memory".to_string(),
        };

        let tags = match request.tags.as_deref().map(parse_tag_list) {
            Some(tags) if !tags.is_empty() => tags,
            _ => {
                let file = request.file.as_deref().unwrap_or_default();
                self.generate_tags(file, &request.content)
                    .await
                    .into_value()
                    .unwrap_or_default()
            }
        };

        let draft = NewMemory {
            title,
            content: request.content,
            description: request.description.unwrap_or_default(),
            tags,
            source: SourceDescriptor {
                kind: SourceKind::Selection,
                file: request.file,
                line: request.line,
                language: request.language,
            },
            project: request
                .project
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| self.config.default_project.clone()),
            kind: request.kind,
            links: Vec::new(),
        };

        self.persist(draft).await
    }

    /// Capture a whole file on save when auto capture applies to it.
    pub async fn auto_capture_on_save(
        &self,
        file: &str,
        language: &str,
        content: &str,
        project: Option<String>,
    ) -> Option<Outcome<Memory>> {
        if !self.config.auto_capture {
            return None;
        }
        if !AUTO_CAPTURE_LANGUAGES.contains(&language) {
            debug!("Skipping auto capture for {} ({})", file, language);
            return None;
        }
        if content.chars().count() < self.config.min_auto_capture_len {
            debug!("Skipping auto capture for {}: content too short", file);
            return None;
        }

        let name = file_name(file);
        let mut tags = self
            .generate_tags(file, content)
            .await
            .into_value()
            .unwrap_or_default();
        tags.push(AUTO_CAPTURE_TAG.to_string());

        let draft = NewMemory {
            title: format!("Auto-captured: {}", name),
            content: content.to_string(),
            description: format!("Automatically captured on save from {}", name),
            tags,
            source: SourceDescriptor {
                kind: SourceKind::FileSave,
                file: Some(file.to_string()),
                line: None,
                language: Some(language.to_string()),
            },
            project: project.unwrap_or_else(|| self.config.default_project.clone()),
            kind: MemoryKind::CodeSnippet,
            links: Vec::new(),
        };

        Some(self.persist(draft).await)
    }

    async fn persist(&self, draft: NewMemory) -> Outcome<Memory> {
        match self.store.create_memory(&draft).await {
            Ok(memory) => {
                info!("Captured memory {}: {}", memory.id, memory.title);
                Outcome::Fresh(memory)
            }
            Err(e) => {
                warn!("Failed to persist memory \"{}\": {}", draft.title, e);
                Outcome::degraded(local_memory(draft), e.to_string())
            }
        }
    }
}

/// Build the memory the store would have returned, without the store.
fn local_memory(draft: NewMemory) -> Memory {
    Memory {
        id: generate_memory_id(),
        title: draft.title,
        content: draft.content,
        description: draft.description,
        kind: draft.kind,
        tags: draft.tags,
        source: draft.source,
        project: draft.project,
        created_at: Utc::now().to_rfc3339(),
        connections: Vec::new(),
        strength: DEFAULT_STRENGTH,
        links: draft.links,
    }
    .normalized()
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn capture_with(store: Arc<InMemoryStore>, config: CaptureConfig) -> MemoryCapture {
        MemoryCapture::new(store, config)
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(
            parse_tag_list(" auth , ,jwt,  "),
            vec!["auth".to_string(), "jwt".to_string()]
        );
        assert!(parse_tag_list(" , ").is_empty());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("src/api/client.ts"), "client.ts");
        assert_eq!(file_name(r"C:\work\main.py"), "main.py");
        assert_eq!(file_name("README.md"), "README.md");
    }

    #[tokio::test]
    async fn test_generate_tags_uses_local_when_store_has_none() {
        let store = Arc::new(InMemoryStore::default());
        let capture = capture_with(store, CaptureConfig::default());

        let outcome = capture.generate_tags("query.sql", "SELECT 1").await;
        assert_eq!(
            outcome,
            Outcome::Fresh(vec!["sql".to_string(), "database".to_string()])
        );
    }

    #[tokio::test]
    async fn test_generate_tags_degrades_when_store_down() {
        let store = Arc::new(InMemoryStore::default());
        store.set_available(false);
        let capture = capture_with(store, CaptureConfig::default());

        let outcome = capture.generate_tags("query.sql", "SELECT 1").await;
        assert!(outcome.is_degraded());
        assert_eq!(
            outcome.into_value(),
            Some(vec!["sql".to_string(), "database".to_string()])
        );
    }

    #[tokio::test]
    async fn test_capture_defaults_title_and_project() {
        let store = Arc::new(InMemoryStore::default());
        let capture = capture_with(store.clone(), CaptureConfig::default());

        let outcome = capture
            .capture(CaptureRequest {
                content: "fn main() {}".to_string(),
                file: Some("src/main.rs".to_string()),
                line: Some(3),
                language: Some("rust".to_string()),
                ..Default::default()
            })
            .await;

        let memory = match outcome {
            Outcome::Fresh(memory) => memory,
            other => panic!("expected fresh capture, got {:?}", other),
        };
        assert_eq!(memory.title, "Code from main.rs:3");
        assert_eq!(memory.project, "Unknown");
        assert_eq!(memory.tags, vec!["rust".to_string(), "backend".to_string()]);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_user_tags_override_generated() {
        let store = Arc::new(InMemoryStore::default());
        let capture = capture_with(store, CaptureConfig::default());

        let memory = capture
            .capture(CaptureRequest {
                content: "SELECT * FROM users".to_string(),
                file: Some("q.sql".to_string()),
                tags: Some("reporting, users".to_string()),
                ..Default::default()
            })
            .await
            .into_value()
            .unwrap();

        assert_eq!(memory.tags, vec!["reporting".to_string(), "users".to_string()]);
    }

    #[tokio::test]
    async fn test_capture_falls_back_to_local_memory() {
        let store = Arc::new(InMemoryStore::default());
        store.set_available(false);
        let capture = capture_with(store.clone(), CaptureConfig::default());

        let outcome = capture
            .capture(CaptureRequest {
                content: "notes without a file".to_string(),
                ..Default::default()
            })
            .await;

        assert!(outcome.is_degraded());
        let memory = outcome.into_value().unwrap();
        assert_eq!(memory.title, "Untitled memory");
        assert_eq!(memory.tags, vec![devmem_schemas::SENTINEL_TAG.to_string()]);
        assert!(memory.id.0.starts_with("mem_"));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_auto_capture_gates() {
        let store = Arc::new(InMemoryStore::default());
        let long = "x".repeat(120);

        let disabled = capture_with(store.clone(), CaptureConfig::default());
        assert!(disabled
            .auto_capture_on_save("lib.rs", "rust", &long, None)
            .await
            .is_none());

        let enabled = capture_with(
            store.clone(),
            CaptureConfig {
                auto_capture: true,
                ..Default::default()
            },
        );
        assert!(enabled
            .auto_capture_on_save("notes.md", "markdown", &long, None)
            .await
            .is_none());
        assert!(enabled
            .auto_capture_on_save("lib.rs", "rust", "short", None)
            .await
            .is_none());

        let memory = enabled
            .auto_capture_on_save("src/lib.rs", "rust", &long, Some("Core".to_string()))
            .await
            .and_then(Outcome::into_value)
            .unwrap();

        assert_eq!(memory.title, "Auto-captured: lib.rs");
        assert_eq!(memory.description, "Automatically captured on save from lib.rs");
        assert_eq!(memory.project, "Core");
        assert_eq!(memory.source.kind, SourceKind::FileSave);
        assert_eq!(memory.tags.last().map(String::as_str), Some(AUTO_CAPTURE_TAG));
    }
}
