use thiserror::Error;

/// Failures talking to the external memory store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned HTTP {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
