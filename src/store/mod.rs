//! Property-graph persistence abstraction
//!
//! The engine writes and queries the graph only through [`GraphStore`]. Each
//! single entity/relationship upsert must be atomic from the store's
//! perspective; batches are not transactional and are safe to retry because
//! upserts are idempotent. Path queries are read-only and may run
//! concurrently with ingestion (eventual consistency is acceptable).

pub mod memory;
pub mod neo4j;

pub use memory::MemoryGraphStore;
pub use neo4j::{Neo4jConfig, Neo4jGraphStore};

use crate::error::Result;
use crate::model::{CanonicalEntity, EntityType, ReasoningPath, Relationship};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether an upsert created a new record or merged into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Merged,
}

/// Bounded path query from one start entity toward a set of targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathQuery {
    pub start: String,
    pub targets: BTreeSet<String>,
    pub max_hops: usize,
    /// When present, only edges whose type is in this set are traversed.
    #[serde(default)]
    pub allowed_rel_types: Option<BTreeSet<String>>,
    /// Cap on returned paths; shortest first.
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

fn default_result_limit() -> usize {
    20
}

impl PathQuery {
    pub fn new(start: impl Into<String>, targets: BTreeSet<String>, max_hops: usize) -> Self {
        Self {
            start: start.into(),
            targets,
            max_hops,
            allowed_rel_types: None,
            result_limit: default_result_limit(),
        }
    }

    pub fn with_rel_types(mut self, rel_types: BTreeSet<String>) -> Self {
        self.allowed_rel_types = Some(rel_types);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    fn allows(&self, rel_type: &str) -> bool {
        match &self.allowed_rel_types {
            Some(types) => types.contains(rel_type),
            None => true,
        }
    }
}

/// Graph database backend.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Atomically create or property-merge an entity keyed by
    /// `(canonical_name, entity_type)`. New non-null property values
    /// overwrite; existing values are never erased by absent keys.
    async fn upsert_entity(&self, entity: CanonicalEntity) -> Result<UpsertOutcome>;

    /// Atomically create or property-merge a relationship keyed by
    /// `(source, rel_type, target)`, auto-creating bare endpoint nodes.
    async fn upsert_relationship(&self, relationship: Relationship) -> Result<UpsertOutcome>;

    async fn get_entity(
        &self,
        name: &str,
        entity_type: EntityType,
    ) -> Result<Option<CanonicalEntity>>;

    /// All distinct simple paths from `query.start` to any target, ordered
    /// ascending by hop count, deterministically tie-broken, capped at
    /// `result_limit`. Exhausting the traversal budget yields a partial or
    /// empty result, never an error.
    async fn find_paths(&self, query: &PathQuery) -> Result<Vec<ReasoningPath>>;

    async fn entity_count(&self) -> Result<usize>;

    async fn relationship_count(&self) -> Result<usize>;

    /// Admin reset; the only way graph facts are ever deleted.
    async fn clear(&self) -> Result<()>;
}

/// Deterministic path ordering: hop count ascending, criticality/severity
/// sum descending, then lexicographic node names.
pub(crate) fn order_paths(paths: &mut Vec<ReasoningPath>) {
    paths.sort_by(|a, b| {
        a.hop_count()
            .cmp(&b.hop_count())
            .then_with(|| {
                b.criticality_sum()
                    .partial_cmp(&a.criticality_sum())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.node_names().cmp(&b.node_names()))
    });
}
