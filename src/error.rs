//! Error types for the graph engine
//!
//! Bad-data conditions (malformed batch items, unresolvable citations,
//! missing paths) never surface here; they degrade into structured results.
//! These variants cover infrastructure and programmer errors only.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for the graph engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Extractor error: {0}")]
    Extractor(#[from] ExtractorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the external entity-extraction service
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Extraction is disabled")]
    Disabled,

    #[error("Circuit breaker is open: {0}")]
    CircuitOpen(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<neo4rs::Error> for EngineError {
    fn from(e: neo4rs::Error) -> Self {
        EngineError::Store(e.to_string())
    }
}
