//! Idempotent graph ingestion
//!
//! Turns noisy extractor output into canonical graph writes: resolve names,
//! sanitize labels and relationship types, filter properties to primitives,
//! then upsert through the store. Ingestion is best-effort by design —
//! extraction quality is noisy, so malformed items are skipped and counted
//! rather than aborting the batch. Batches are idempotent on retry.

use crate::error::Result;
use crate::extract::ExtractedGraph;
use crate::metrics::METRICS;
use crate::model::{
    CanonicalEntity, EntityType, Properties, PropertyValue, Provenance, Relationship, UpsertStats,
};
use crate::resolver::EntityResolver;
use crate::store::GraphStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Fallback relationship type when sanitization leaves nothing.
const DEFAULT_REL_TYPE: &str = "RELATED";

/// Sanitize a relationship type to an uppercase alphanumeric token.
pub fn sanitize_rel_type(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        DEFAULT_REL_TYPE.to_string()
    } else {
        cleaned
    }
}

/// Filter extractor properties to primitive scalars, stringifying the rest.
pub fn filter_properties(raw: &serde_json::Map<String, serde_json::Value>) -> Properties {
    raw.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), PropertyValue::from_json(v)))
        .collect()
}

/// Ingestion engine: turns extracted batches into idempotent store writes.
pub struct GraphUpsertEngine {
    store: Arc<dyn GraphStore>,
    resolver: Arc<Mutex<EntityResolver>>,
}

impl GraphUpsertEngine {
    pub fn new(store: Arc<dyn GraphStore>, resolver: Arc<Mutex<EntityResolver>>) -> Self {
        Self { store, resolver }
    }

    /// Upsert one extracted batch under a single provenance stamp.
    ///
    /// Entities first, then relationships, so endpoint nodes usually exist
    /// with their real labels before edges reference them. Items missing a
    /// name or an endpoint are skipped; the batch always runs to completion.
    pub async fn upsert_graph(
        &self,
        graph: ExtractedGraph,
        provenance: Provenance,
    ) -> Result<UpsertStats> {
        let mut stats = UpsertStats::default();

        for entity in &graph.entities {
            if entity.name.trim().is_empty() {
                warn!("skipping entity with missing name");
                stats.skipped += 1;
                continue;
            }

            let canonical_name = {
                let mut resolver = self.resolver.lock().await;
                resolver.resolve(&entity.name)
            };
            let entity_type = EntityType::from_raw(entity.entity_type.as_deref().unwrap_or(""));
            let properties = filter_properties(&entity.properties);

            let mut aliases = BTreeSet::new();
            aliases.insert(canonical_name.clone());
            aliases.insert(entity.name.trim().to_string());

            self.store
                .upsert_entity(CanonicalEntity {
                    canonical_name,
                    entity_type,
                    properties,
                    aliases,
                    provenance: provenance.clone(),
                })
                .await?;
            stats.entities_merged += 1;
        }

        for relationship in &graph.relationships {
            if relationship.source.trim().is_empty() || relationship.target.trim().is_empty() {
                warn!("skipping relationship with missing endpoint");
                stats.skipped += 1;
                continue;
            }

            let (source_name, target_name) = {
                let mut resolver = self.resolver.lock().await;
                let source = resolver.resolve(&relationship.source);
                let target = resolver.resolve(&relationship.target);
                (source, target)
            };
            let rel_type =
                sanitize_rel_type(relationship.rel_type.as_deref().unwrap_or(DEFAULT_REL_TYPE));
            let properties = filter_properties(&relationship.properties);

            self.store
                .upsert_relationship(Relationship {
                    source_name,
                    target_name,
                    rel_type,
                    properties,
                    provenance: provenance.clone(),
                })
                .await?;
            stats.relationships_created += 1;
        }

        info!(
            batch_id = %provenance.batch_id,
            entities = stats.entities_merged,
            relationships = stats.relationships_created,
            skipped = stats.skipped,
            "ingestion batch complete"
        );
        METRICS
            .entities_merged_total
            .inc_by(stats.entities_merged as f64);
        METRICS
            .relationships_created_total
            .inc_by(stats.relationships_created as f64);
        METRICS.ingest_skipped_total.inc_by(stats.skipped as f64);

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractedEntity, ExtractedRelationship};
    use crate::resolver::{AliasEntry, ResolverConfig};
    use crate::store::MemoryGraphStore;

    fn engine_with_store() -> (GraphUpsertEngine, Arc<MemoryGraphStore>) {
        let store = Arc::new(MemoryGraphStore::new());
        let resolver = Arc::new(Mutex::new(EntityResolver::new(ResolverConfig {
            similarity_threshold: 0.85,
            aliases: vec![AliasEntry {
                canonical: "Nvidia".to_string(),
                aliases: vec!["NVDA".to_string()],
            }],
        })));
        let engine = GraphUpsertEngine::new(store.clone(), resolver);
        (engine, store)
    }

    fn extracted_entity(name: &str, entity_type: &str) -> ExtractedEntity {
        ExtractedEntity {
            name: name.to_string(),
            entity_type: Some(entity_type.to_string()),
            properties: serde_json::Map::new(),
        }
    }

    fn extracted_relationship(source: &str, rel_type: &str, target: &str) -> ExtractedRelationship {
        ExtractedRelationship {
            source: source.to_string(),
            target: target.to_string(),
            rel_type: Some(rel_type.to_string()),
            properties: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_sanitize_rel_type() {
        assert_eq!(sanitize_rel_type("depends on"), "DEPENDSON");
        assert_eq!(sanitize_rel_type("DEPENDS_ON"), "DEPENDS_ON");
        assert_eq!(sanitize_rel_type("supplies-to!"), "SUPPLIESTO");
        assert_eq!(sanitize_rel_type(""), "RELATED");
        assert_eq!(sanitize_rel_type("!!!"), "RELATED");
    }

    #[test]
    fn test_filter_properties_drops_nulls_and_stringifies() {
        let raw = serde_json::json!({
            "revenue": 60.9,
            "segments": ["gaming", "datacenter"],
            "absent": null
        });
        let props = filter_properties(raw.as_object().unwrap());

        assert_eq!(props.get("revenue"), Some(&PropertyValue::Float(60.9)));
        assert_eq!(
            props.get("segments"),
            Some(&PropertyValue::Str("[\"gaming\",\"datacenter\"]".to_string()))
        );
        assert!(!props.contains_key("absent"));
    }

    #[tokio::test]
    async fn test_batch_upsert_resolves_aliases() {
        let (engine, store) = engine_with_store();

        let graph = ExtractedGraph {
            entities: vec![
                extracted_entity("NVDA", "COMPANY"),
                extracted_entity("TSMC", "COMPANY"),
            ],
            relationships: vec![extracted_relationship("NVDA", "DEPENDS_ON", "TSMC")],
        };

        let stats = engine
            .upsert_graph(graph, Provenance::new("pdf", "report", "q3.pdf"))
            .await
            .unwrap();

        assert_eq!(stats.entities_merged, 2);
        assert_eq!(stats.relationships_created, 1);
        assert_eq!(stats.skipped, 0);

        // "NVDA" landed under its canonical name.
        assert!(store
            .get_entity("Nvidia", EntityType::Company)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_entity("NVDA", EntityType::Company)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_malformed_items_skipped_not_fatal() {
        let (engine, store) = engine_with_store();

        let graph = ExtractedGraph {
            entities: vec![
                extracted_entity("", "COMPANY"),
                extracted_entity("TSMC", "COMPANY"),
            ],
            relationships: vec![
                ExtractedRelationship {
                    source: "TSMC".to_string(),
                    target: String::new(),
                    rel_type: Some("SUPPLIES".to_string()),
                    properties: serde_json::Map::new(),
                },
            ],
        };

        let stats = engine
            .upsert_graph(graph, Provenance::new("pdf", "report", "q3.pdf"))
            .await
            .unwrap();

        assert_eq!(stats.entities_merged, 1);
        assert_eq!(stats.relationships_created, 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(store.entity_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_double_upsert_is_idempotent() {
        let (engine, store) = engine_with_store();

        let graph = ExtractedGraph {
            entities: vec![extracted_entity("Nvidia", "COMPANY")],
            relationships: vec![extracted_relationship("Nvidia", "DEPENDS_ON", "TSMC")],
        };

        engine
            .upsert_graph(graph.clone(), Provenance::new("pdf", "a", "a.pdf"))
            .await
            .unwrap();
        let entity_count = store.entity_count().await.unwrap();
        let rel_count = store.relationship_count().await.unwrap();

        engine
            .upsert_graph(graph, Provenance::new("pdf", "b", "b.pdf"))
            .await
            .unwrap();

        assert_eq!(store.entity_count().await.unwrap(), entity_count);
        assert_eq!(store.relationship_count().await.unwrap(), rel_count);
    }

    #[tokio::test]
    async fn test_unknown_type_falls_back_to_entity() {
        let (engine, store) = engine_with_store();

        let graph = ExtractedGraph {
            entities: vec![extracted_entity("HBM3", "WIDGET")],
            relationships: vec![],
        };
        engine
            .upsert_graph(graph, Provenance::new("pdf", "r", "r.pdf"))
            .await
            .unwrap();

        assert!(store
            .get_entity("HBM3", EntityType::Entity)
            .await
            .unwrap()
            .is_some());
    }
}
