//! Typed errors for the seams where callers branch on the failure kind.
//!
//! Everything else propagates as `anyhow::Error`.

use thiserror::Error;

/// Failures from [`Store`](crate::store::Store) writes that callers must
/// tell apart: a double commit is a consistency error, not an I/O error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item {0} is already classified")]
    AlreadyClassified(String),

    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures talking to an upstream service (content source or LLM).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} credentials not configured. Set {vars}")]
    MissingCredentials {
        service: &'static str,
        vars: &'static str,
    },

    #[error("{service} request failed: {message}")]
    Network {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unexpected payload: {message}")]
    Payload {
        service: &'static str,
        message: String,
    },
}

impl UpstreamError {
    /// 429 and 5xx responses and network failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Network { .. } => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
