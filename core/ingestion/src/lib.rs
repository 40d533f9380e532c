pub mod analyzer;
pub mod capture;
pub mod error;
pub mod mail;
pub mod records;
pub mod store;
pub mod tagger;

pub use analyzer::ContentAnalyzer;
pub use capture::{CaptureConfig, CaptureRequest, MemoryCapture};
pub use error::{StoreError, StoreResult};
pub use mail::{MailAnalysis, MailAnalyzer, MailCategory, MailMessage};
pub use records::{is_technical_document, DocumentRecord, ListRecord};
pub use store::{ContextQuery, HttpMemoryStore, InMemoryStore, MemoryStore, StoreConfig};
pub use tagger::{TagGenerator, MAX_TAGS};
