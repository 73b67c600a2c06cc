//! # graphrag-engine
//!
//! Knowledge-graph consistency and grounded-retrieval engine for
//! supply-chain intelligence:
//!
//! - **Entity resolution**: canonicalize noisy mentions via an injected
//!   alias table, substring containment, and fuzzy similarity
//! - **Idempotent ingestion**: property-merging graph upserts with full
//!   provenance, tolerant of malformed extractor output
//! - **Multi-hop reasoning**: bounded simple-path discovery with
//!   deterministic, configurable confidence scoring
//! - **Citation grounding**: validate that generated prose is actually
//!   supported by the sources it cites
//!
//! Entity extraction and answer composition are LLM-backed collaborators
//! hidden behind the [`extract::EntityExtractor`] and
//! [`extract::AnswerComposer`] traits; the graph lives behind
//! [`store::GraphStore`] with Neo4j and in-memory backends.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod reason;
pub mod resolver;
pub mod store;
pub mod validate;

pub use config::Config;
pub use engine::{GraphRagEngine, GroundedAnswer};
pub use error::{EngineError, Result};
