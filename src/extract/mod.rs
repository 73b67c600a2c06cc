//! Capability interfaces for the generative-model collaborators
//!
//! Entity extraction and answer composition are LLM-backed in production and
//! out of scope here; the engine depends only on these traits. Both are
//! treated as untrusted, noisy oracles: wire models tolerate missing fields,
//! malformed types, and duplicate entities. Tests inject deterministic fakes.

pub mod circuit_breaker;
pub mod client;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use client::{ExtractorConfig, HttpEntityExtractor};

use crate::error::Result;
use crate::model::ReasoningPath;
use crate::validate::Source;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Raw entity as emitted by an extractor. Every field beyond the name is
/// optional because extraction quality is inherently noisy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Raw relationship as emitted by an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, rename = "type")]
    pub rel_type: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Extractor output for one text chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedGraph {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relationships: Vec<ExtractedRelationship>,
}

impl ExtractedGraph {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// Entity/relationship extraction from raw text.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text_chunk: &str) -> Result<ExtractedGraph>;
}

/// Prose composition over reasoning paths, producing `[n]`-cited text.
///
/// The engine never generates prose itself; it hands paths and sources to a
/// composer and validates whatever comes back.
#[async_trait]
pub trait AnswerComposer: Send + Sync {
    async fn compose(
        &self,
        question: &str,
        paths: &[ReasoningPath],
        sources: &[Source],
    ) -> Result<String>;
}
