//! In-memory graph store
//!
//! Backs tests and single-process deployments. Entity and relationship maps
//! are keyed the same way the Neo4j backend keys its MERGE statements, so
//! idempotence behaves identically across backends. Per-key entry operations
//! give each individual upsert the required atomicity.

use super::{order_paths, GraphStore, PathQuery, UpsertOutcome};
use crate::error::Result;
use crate::model::{
    CanonicalEntity, EntityType, PathEdge, PathNode, Properties, ReasoningPath, Relationship,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Traversal budget: maximum node expansions per path query. Exceeding it
/// truncates the result set, which callers treat as "no path found within
/// budget".
const DEFAULT_VISIT_BUDGET: usize = 10_000;

type EntityKey = (String, EntityType);
type RelationshipKey = (String, String, String);

/// DashMap-backed [`GraphStore`].
pub struct MemoryGraphStore {
    entities: DashMap<EntityKey, CanonicalEntity>,
    relationships: DashMap<RelationshipKey, Relationship>,
    visit_budget: usize,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
            relationships: DashMap::new(),
            visit_budget: DEFAULT_VISIT_BUDGET,
        }
    }

    pub fn with_visit_budget(mut self, budget: usize) -> Self {
        self.visit_budget = budget;
        self
    }

    /// Merge `incoming` properties into `existing`: new values win per key,
    /// but nothing already present is ever erased.
    fn merge_properties(existing: &mut Properties, incoming: &Properties) {
        for (key, value) in incoming {
            existing.insert(key.clone(), value.clone());
        }
    }

    fn any_entity_named(&self, name: &str) -> bool {
        self.entities.iter().any(|e| e.key().0 == name)
    }

    /// Snapshot of outgoing edges grouped by source, sorted for
    /// deterministic expansion order.
    fn adjacency(&self) -> BTreeMap<String, Vec<Relationship>> {
        let mut adjacency: BTreeMap<String, Vec<Relationship>> = BTreeMap::new();
        for entry in self.relationships.iter() {
            adjacency
                .entry(entry.value().source_name.clone())
                .or_default()
                .push(entry.value().clone());
        }
        for edges in adjacency.values_mut() {
            edges.sort_by(|a, b| {
                a.rel_type
                    .cmp(&b.rel_type)
                    .then_with(|| a.target_name.cmp(&b.target_name))
            });
        }
        adjacency
    }

    fn node_view(&self, name: &str) -> PathNode {
        // Relationship endpoints are matched by name across type namespaces,
        // mirroring the Cypher `MATCH (n {name: $name})` shape.
        let found = self
            .entities
            .iter()
            .find(|e| e.key().0 == name)
            .map(|e| e.value().clone());
        match found {
            Some(entity) => PathNode {
                name: entity.canonical_name,
                entity_type: entity.entity_type,
                properties: entity.properties,
            },
            None => PathNode {
                name: name.to_string(),
                entity_type: EntityType::Entity,
                properties: Properties::new(),
            },
        }
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn upsert_entity(&self, entity: CanonicalEntity) -> Result<UpsertOutcome> {
        let key = (entity.canonical_name.clone(), entity.entity_type);
        let mut outcome = UpsertOutcome::Created;

        self.entities
            .entry(key)
            .and_modify(|existing| {
                Self::merge_properties(&mut existing.properties, &entity.properties);
                existing.aliases.extend(entity.aliases.iter().cloned());
                existing.provenance = entity.provenance.clone();
                outcome = UpsertOutcome::Merged;
            })
            .or_insert_with(|| entity);

        Ok(outcome)
    }

    async fn upsert_relationship(&self, relationship: Relationship) -> Result<UpsertOutcome> {
        // Endpoints must exist; create bare nodes on demand.
        for endpoint in [&relationship.source_name, &relationship.target_name] {
            if !self.any_entity_named(endpoint) {
                let bare = CanonicalEntity::bare(endpoint.clone(), relationship.provenance.clone());
                self.entities
                    .entry((bare.canonical_name.clone(), bare.entity_type))
                    .or_insert(bare);
            }
        }

        let key = (
            relationship.source_name.clone(),
            relationship.rel_type.clone(),
            relationship.target_name.clone(),
        );
        let mut outcome = UpsertOutcome::Created;

        self.relationships
            .entry(key)
            .and_modify(|existing| {
                Self::merge_properties(&mut existing.properties, &relationship.properties);
                existing.provenance = relationship.provenance.clone();
                outcome = UpsertOutcome::Merged;
            })
            .or_insert_with(|| relationship);

        Ok(outcome)
    }

    async fn get_entity(
        &self,
        name: &str,
        entity_type: EntityType,
    ) -> Result<Option<CanonicalEntity>> {
        Ok(self
            .entities
            .get(&(name.to_string(), entity_type))
            .map(|e| e.value().clone()))
    }

    async fn find_paths(&self, query: &PathQuery) -> Result<Vec<ReasoningPath>> {
        if query.max_hops == 0 || query.targets.is_empty() {
            return Ok(Vec::new());
        }

        let adjacency = self.adjacency();
        let mut paths: Vec<Vec<Relationship>> = Vec::new();
        let mut visited_budget = self.visit_budget;

        // Iterative depth-first enumeration of simple paths. The stack holds
        // (node, path-so-far); expansion order is deterministic because the
        // adjacency snapshot is sorted.
        let mut stack: Vec<(String, Vec<Relationship>)> = vec![(query.start.clone(), Vec::new())];

        while let Some((node, path)) = stack.pop() {
            if visited_budget == 0 {
                debug!(
                    start = query.start.as_str(),
                    "path traversal budget exhausted, returning partial results"
                );
                break;
            }
            visited_budget -= 1;

            if path.len() >= query.max_hops {
                continue;
            }

            let Some(edges) = adjacency.get(&node) else {
                continue;
            };

            // Reverse so the stack pops edges in sorted order.
            for edge in edges.iter().rev() {
                if !query.allows(&edge.rel_type) {
                    continue;
                }
                // Simple paths only: no repeated nodes.
                if edge.target_name == query.start
                    || path.iter().any(|r| r.target_name == edge.target_name)
                {
                    continue;
                }

                let mut extended = path.clone();
                extended.push(edge.clone());

                if query.targets.contains(&edge.target_name) {
                    paths.push(extended.clone());
                }
                stack.push((edge.target_name.clone(), extended));
            }
        }

        let mut reasoning_paths: Vec<ReasoningPath> = paths
            .into_iter()
            .map(|edges| {
                let mut nodes = vec![self.node_view(&query.start)];
                let mut path_edges = Vec::with_capacity(edges.len());
                for edge in &edges {
                    nodes.push(self.node_view(&edge.target_name));
                    path_edges.push(PathEdge {
                        rel_type: edge.rel_type.clone(),
                        properties: edge.properties.clone(),
                    });
                }
                ReasoningPath {
                    nodes,
                    edges: path_edges,
                }
            })
            .collect();

        order_paths(&mut reasoning_paths);
        reasoning_paths.truncate(query.result_limit);
        Ok(reasoning_paths)
    }

    async fn entity_count(&self) -> Result<usize> {
        Ok(self.entities.len())
    }

    async fn relationship_count(&self) -> Result<usize> {
        Ok(self.relationships.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entities.clear();
        self.relationships.clear();
        Ok(())
    }
}
