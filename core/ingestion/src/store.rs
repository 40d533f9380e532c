use async_trait::async_trait;
use chrono::Utc;
use devmem_schemas::{generate_memory_id, Candidate, Memory, MemoryStats, NewMemory};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

const USER_AGENT: &str = "devmem-relevance/0.1.0";

/// Connection settings for the external memory store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:4000".to_string(),
            timeout: Duration::from_millis(10_000),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("DEVMEM_API_URL").unwrap_or(defaults.api_url),
            timeout: std::env::var("DEVMEM_API_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Coarse retrieval request for the text around the cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextQuery {
    pub content: String,
    pub language: Option<String>,
    pub filename: Option<String>,
    pub limit: usize,
}

/// The storage collaborator. Every call is safe to retry.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn contextual_candidates(&self, query: &ContextQuery) -> StoreResult<Vec<Candidate>>;
    async fn list_memories(&self, limit: usize) -> StoreResult<Vec<Memory>>;
    async fn create_memory(&self, memory: &NewMemory) -> StoreResult<Memory>;
    /// `Ok(None)` when the store has no tag suggestion of its own.
    async fn generate_tags(&self, filename: &str, content: &str) -> StoreResult<Option<Vec<String>>>;
    async fn stats(&self) -> StoreResult<MemoryStats>;
}

// ============================================================================
// HTTP store
// ============================================================================

/// Request/response client for the memory store API.
pub struct HttpMemoryStore {
    client: Client,
    api_url: String,
}

impl HttpMemoryStore {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        info!("Memory store client targeting {}", config.api_url);
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> StoreResult<Self> {
        Self::new(&StoreConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn read<T: DeserializeOwned>(&self, response: reqwest::Response) -> StoreResult<T> {
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Decode a list one item at a time so a bad record only costs itself.
    fn decode_items<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
        let total = items.len();
        let decoded: Vec<T> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Skipping malformed {}: {}", what, e);
                    None
                }
            })
            .collect();

        debug!("Decoded {}/{} {} records", decoded.len(), total, what);
        decoded
    }
}

/// Drop records without content or tags, then clamp the rest into shape.
fn admit(memory: Memory, what: &str) -> Option<Memory> {
    if memory.is_well_formed() {
        Some(memory.normalized())
    } else {
        warn!("Skipping {} {} without content or tags", what, memory.id);
        None
    }
}

#[async_trait]
impl MemoryStore for HttpMemoryStore {
    async fn contextual_candidates(&self, query: &ContextQuery) -> StoreResult<Vec<Candidate>> {
        let response = self
            .client
            .post(self.url("/api/memories/contextual"))
            .json(query)
            .send()
            .await?;

        let items: Vec<Value> = self.read(response).await?;
        let candidates: Vec<Candidate> = Self::decode_items(items, "candidate");

        Ok(candidates
            .into_iter()
            .filter_map(|c| {
                let Candidate {
                    memory,
                    relevance,
                    reason,
                } = c;
                admit(memory, "candidate").map(|memory| Candidate {
                    memory,
                    relevance,
                    reason,
                })
            })
            .collect())
    }

    async fn list_memories(&self, limit: usize) -> StoreResult<Vec<Memory>> {
        let response = self
            .client
            .get(self.url("/api/memories"))
            .query(&[("limit", limit)])
            .send()
            .await?;

        let items: Vec<Value> = self.read(response).await?;
        let memories: Vec<Memory> = Self::decode_items(items, "memory");

        Ok(memories
            .into_iter()
            .filter_map(|memory| admit(memory, "memory"))
            .collect())
    }

    async fn create_memory(&self, memory: &NewMemory) -> StoreResult<Memory> {
        let response = self
            .client
            .post(self.url("/api/memories"))
            .json(memory)
            .send()
            .await?;

        let created: Memory = self.read(response).await?;
        Ok(created.normalized())
    }

    async fn generate_tags(&self, filename: &str, content: &str) -> StoreResult<Option<Vec<String>>> {
        let response = self
            .client
            .post(self.url("/api/memories/generate-tags"))
            .json(&json!({ "filename": filename, "content": content }))
            .send()
            .await?;

        let body: Value = self.read(response).await?;
        match body.get("tags") {
            Some(tags) if !tags.is_null() => Ok(Some(serde_json::from_value(tags.clone())?)),
            _ => Ok(None),
        }
    }

    async fn stats(&self) -> StoreResult<MemoryStats> {
        let response = self
            .client
            .get(self.url("/api/memories/stats"))
            .send()
            .await?;

        self.read(response).await
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store for tests and offline inspection.
pub struct InMemoryStore {
    memories: RwLock<Vec<Memory>>,
    available: AtomicBool,
    list_calls: AtomicUsize,
    contextual_calls: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryStore {
    pub fn new(memories: Vec<Memory>) -> Self {
        Self {
            memories: RwLock::new(memories),
            available: AtomicBool::new(true),
            list_calls: AtomicUsize::new(0),
            contextual_calls: AtomicUsize::new(0),
        }
    }

    /// Toggle simulated upstream availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn contextual_calls(&self) -> usize {
        self.contextual_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<Memory> {
        self.memories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn insert(&self, memory: Memory) {
        self.memories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(memory);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("in-memory store switched off"))
        }
    }

    fn words(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| w.len() > 1)
            .map(str::to_lowercase)
            .collect()
    }

    /// Jaccard overlap between query words and title + content words.
    fn coarse_relevance(query: &HashSet<String>, memory: &Memory) -> f32 {
        let words = Self::words(&format!("{} {}", memory.title, memory.content));
        let intersection = query.intersection(&words).count();
        let union = query.union(&words).count();

        if union == 0 {
            0.0
        } else {
            intersection as f32 / union as f32
        }
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn contextual_candidates(&self, query: &ContextQuery) -> StoreResult<Vec<Candidate>> {
        self.contextual_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let query_words = Self::words(&query.content);
        let mut candidates: Vec<Candidate> = self
            .snapshot()
            .into_iter()
            .filter(Memory::is_well_formed)
            .map(|memory| Candidate {
                relevance: Self::coarse_relevance(&query_words, &memory),
                memory,
                reason: Some("Similar content found".to_string()),
            })
            .filter(|c| c.relevance > 0.0)
            .collect();

        candidates.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(query.limit);

        Ok(candidates)
    }

    async fn list_memories(&self, limit: usize) -> StoreResult<Vec<Memory>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        Ok(self.snapshot().into_iter().take(limit).collect())
    }

    async fn create_memory(&self, memory: &NewMemory) -> StoreResult<Memory> {
        self.ensure_available()?;

        let created = Memory {
            id: generate_memory_id(),
            title: memory.title.clone(),
            content: memory.content.clone(),
            description: memory.description.clone(),
            kind: memory.kind,
            tags: memory.tags.clone(),
            source: memory.source.clone(),
            project: memory.project.clone(),
            created_at: Utc::now().to_rfc3339(),
            connections: Vec::new(),
            strength: devmem_schemas::DEFAULT_STRENGTH,
            links: memory.links.clone(),
        }
        .normalized();

        self.insert(created.clone());
        Ok(created)
    }

    async fn generate_tags(&self, _filename: &str, _content: &str) -> StoreResult<Option<Vec<String>>> {
        self.ensure_available()?;
        Ok(None)
    }

    async fn stats(&self) -> StoreResult<MemoryStats> {
        self.ensure_available()?;
        Ok(MemoryStats::from_memories(&self.snapshot()))
    }
}
