//! Neo4j graph store
//!
//! Each upsert is a single MERGE statement, so the store-level atomicity
//! contract holds: concurrent ingestion of the same entity converges instead
//! of duplicating nodes (last writer wins per property key). Node labels and
//! relationship types are interpolated only after sanitization to the closed
//! vocabulary; everything else travels as parameters.

use super::{order_paths, GraphStore, PathQuery, UpsertOutcome};
use crate::error::{EngineError, Result};
use crate::model::{
    CanonicalEntity, EntityType, PathEdge, PathNode, Properties, PropertyValue, ReasoningPath,
    Relationship,
};
use async_trait::async_trait;
use neo4rs::{
    query, BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltString, BoltType, Graph,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Connection settings for the Neo4j backend.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct Neo4jConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}
fn default_username() -> String {
    "neo4j".to_string()
}
fn default_database() -> String {
    "neo4j".to_string()
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            username: default_username(),
            password: String::new(),
            database: default_database(),
        }
    }
}

/// Neo4j-backed [`GraphStore`] over pooled Bolt connections.
pub struct Neo4jGraphStore {
    graph: Graph,
}

#[derive(Debug, Deserialize)]
struct PathNodeRow {
    name: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PathRelRow {
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    properties: BTreeMap<String, serde_json::Value>,
}

fn bolt_value(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        PropertyValue::Int(i) => BoltType::Integer(BoltInteger::new(*i)),
        PropertyValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        PropertyValue::Str(s) => BoltType::String(BoltString::from(s.as_str())),
    }
}

fn bolt_properties(properties: &Properties) -> BoltType {
    let mut map = BoltMap::default();
    for (key, value) in properties {
        map.put(BoltString::from(key.as_str()), bolt_value(value));
    }
    BoltType::Map(map)
}

fn bolt_string_list<I: IntoIterator<Item = S>, S: AsRef<str>>(items: I) -> BoltType {
    let mut list = BoltList::default();
    for item in items {
        list.push(BoltType::String(BoltString::from(item.as_ref())));
    }
    BoltType::List(list)
}

fn json_properties(raw: BTreeMap<String, serde_json::Value>) -> Properties {
    raw.iter()
        .map(|(k, v)| (k.clone(), PropertyValue::from_json(v)))
        .collect()
}

impl Neo4jGraphStore {
    /// Connect to Neo4j. Connection failures surface as
    /// [`EngineError::Store`]; callers may retry with backoff since all
    /// writes through this store are idempotent.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        info!(uri = config.uri.as_str(), "connecting to Neo4j");
        let neo_config = neo4rs::ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.username)
            .password(&config.password)
            .db(config.database.as_str())
            .build()
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn upsert_entity(&self, entity: CanonicalEntity) -> Result<UpsertOutcome> {
        let updated_at = entity.provenance.updated_at.to_rfc3339();
        // Label comes from the closed EntityType vocabulary, safe to
        // interpolate. Alias union dedupes without requiring APOC.
        let cypher = format!(
            "MERGE (e:{label} {{name: $name}}) \
             ON CREATE SET e.created_at = $updated_at \
             SET e += $props, \
                 e.aliases = reduce(acc = [], x IN coalesce(e.aliases, []) + $aliases | \
                     CASE WHEN x IN acc THEN acc ELSE acc + x END), \
                 e.source = $source, \
                 e.source_label = $source_label, \
                 e.source_file = $source_file, \
                 e.batch_id = $batch_id, \
                 e.updated_at = $updated_at \
             RETURN e.created_at = $updated_at AS created",
            label = entity.entity_type.label()
        );

        let mut rows = self
            .graph
            .execute(
                query(&cypher)
                    .param("name", entity.canonical_name.as_str())
                    .param("props", bolt_properties(&entity.properties))
                    .param("aliases", bolt_string_list(entity.aliases.iter()))
                    .param("source", entity.provenance.source.as_str())
                    .param("source_label", entity.provenance.source_label.as_str())
                    .param("source_file", entity.provenance.source_file.as_str())
                    .param("batch_id", entity.provenance.batch_id.to_string())
                    .param("updated_at", updated_at.as_str()),
            )
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let created = match rows
            .next()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?
        {
            Some(row) => row
                .get::<bool>("created")
                .map_err(|e| EngineError::Store(e.to_string()))?,
            None => false,
        };

        Ok(if created {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Merged
        })
    }

    async fn upsert_relationship(&self, relationship: Relationship) -> Result<UpsertOutcome> {
        let updated_at = relationship.provenance.updated_at.to_rfc3339();
        // Endpoints are matched by name across labels and created bare when
        // missing, mirroring the ingestion contract.
        let cypher = format!(
            "MERGE (a {{name: $source}}) \
             MERGE (b {{name: $target}}) \
             MERGE (a)-[r:{rel_type}]->(b) \
             ON CREATE SET r.created_at = $updated_at \
             SET r += $props, \
                 r.source = $source_label, \
                 r.source_file = $source_file, \
                 r.batch_id = $batch_id, \
                 r.updated_at = $updated_at \
             RETURN r.created_at = $updated_at AS created",
            rel_type = relationship.rel_type
        );

        let mut rows = self
            .graph
            .execute(
                query(&cypher)
                    .param("source", relationship.source_name.as_str())
                    .param("target", relationship.target_name.as_str())
                    .param("props", bolt_properties(&relationship.properties))
                    .param("source_label", relationship.provenance.source_label.as_str())
                    .param("source_file", relationship.provenance.source_file.as_str())
                    .param("batch_id", relationship.provenance.batch_id.to_string())
                    .param("updated_at", updated_at.as_str()),
            )
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let created = match rows
            .next()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?
        {
            Some(row) => row
                .get::<bool>("created")
                .map_err(|e| EngineError::Store(e.to_string()))?,
            None => false,
        };

        Ok(if created {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Merged
        })
    }

    async fn get_entity(
        &self,
        name: &str,
        entity_type: EntityType,
    ) -> Result<Option<CanonicalEntity>> {
        let cypher = format!(
            "MATCH (e:{label} {{name: $name}}) \
             RETURN e.name AS name, properties(e) AS props \
             LIMIT 1",
            label = entity_type.label()
        );

        let mut rows = self
            .graph
            .execute(query(&cypher).param("name", name))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?
        else {
            return Ok(None);
        };

        let found_name: String = row
            .get("name")
            .map_err(|e| EngineError::Store(e.to_string()))?;
        let raw_props: BTreeMap<String, serde_json::Value> = row
            .get("props")
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let aliases = raw_props
            .get("aliases")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let provenance = crate::model::Provenance {
            source: raw_props
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            source_label: raw_props
                .get("source_label")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            source_file: raw_props
                .get("source_file")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            batch_id: raw_props
                .get("batch_id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            updated_at: raw_props
                .get("updated_at")
                .and_then(|v| v.as_str())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(chrono::Utc::now),
        };

        // Bookkeeping keys live alongside domain properties on the node;
        // strip them from the property view.
        const INTERNAL_KEYS: &[&str] = &[
            "name",
            "aliases",
            "source",
            "source_label",
            "source_file",
            "batch_id",
            "created_at",
            "updated_at",
        ];
        let properties = raw_props
            .iter()
            .filter(|(k, _)| !INTERNAL_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), PropertyValue::from_json(v)))
            .collect();

        Ok(Some(CanonicalEntity {
            canonical_name: found_name,
            entity_type,
            properties,
            aliases,
            provenance,
        }))
    }

    async fn find_paths(&self, path_query: &PathQuery) -> Result<Vec<ReasoningPath>> {
        if path_query.max_hops == 0 || path_query.targets.is_empty() {
            return Ok(Vec::new());
        }

        let rel_filter = if path_query.allowed_rel_types.is_some() {
            "AND ALL(rel IN relationships(path) WHERE type(rel) IN $rel_types) "
        } else {
            ""
        };

        // Variable-length patterns never repeat relationships but may repeat
        // nodes; the node-uniqueness predicate keeps paths simple.
        let cypher = format!(
            "MATCH path = (start {{name: $start}})-[*1..{max_hops}]->(target) \
             WHERE target.name IN $targets \
             {rel_filter}\
             AND ALL(n IN nodes(path) WHERE \
                 size([m IN nodes(path) WHERE m = n]) = 1) \
             WITH path, \
                  [n IN nodes(path) | {{name: n.name, \
                      type: coalesce(labels(n)[0], 'Entity'), \
                      properties: properties(n)}}] AS node_list, \
                  [r IN relationships(path) | {{type: type(r), \
                      properties: properties(r)}}] AS rel_list, \
                  length(path) AS hops \
             RETURN node_list AS nodes, rel_list AS relationships, hops \
             ORDER BY hops ASC \
             LIMIT $limit",
            max_hops = path_query.max_hops
        );

        let mut q = query(&cypher)
            .param("start", path_query.start.as_str())
            .param("targets", bolt_string_list(path_query.targets.iter()))
            .param("limit", path_query.result_limit as i64);
        if let Some(rel_types) = &path_query.allowed_rel_types {
            q = q.param("rel_types", bolt_string_list(rel_types.iter()));
        }

        let mut rows = self
            .graph
            .execute(q)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let mut paths = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?
        {
            let node_rows: Vec<PathNodeRow> = row
                .get("nodes")
                .map_err(|e| EngineError::Store(e.to_string()))?;
            let rel_rows: Vec<PathRelRow> = row
                .get("relationships")
                .map_err(|e| EngineError::Store(e.to_string()))?;

            paths.push(ReasoningPath {
                nodes: node_rows
                    .into_iter()
                    .map(|n| PathNode {
                        name: n.name,
                        entity_type: EntityType::from_raw(&n.node_type),
                        properties: json_properties(n.properties),
                    })
                    .collect(),
                edges: rel_rows
                    .into_iter()
                    .map(|r| PathEdge {
                        rel_type: r.rel_type,
                        properties: json_properties(r.properties),
                    })
                    .collect(),
            });
        }

        debug!(
            start = path_query.start.as_str(),
            found = paths.len(),
            "path query completed"
        );

        order_paths(&mut paths);
        Ok(paths)
    }

    async fn entity_count(&self) -> Result<usize> {
        let mut rows = self
            .graph
            .execute(query("MATCH (n) RETURN count(n) AS c"))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        match rows
            .next()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?
        {
            Some(row) => Ok(row
                .get::<i64>("c")
                .map_err(|e| EngineError::Store(e.to_string()))? as usize),
            None => Ok(0),
        }
    }

    async fn relationship_count(&self) -> Result<usize> {
        let mut rows = self
            .graph
            .execute(query("MATCH ()-[r]->() RETURN count(r) AS c"))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        match rows
            .next()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?
        {
            Some(row) => Ok(row
                .get::<i64>("c")
                .map_err(|e| EngineError::Store(e.to_string()))? as usize),
            None => Ok(0),
        }
    }

    async fn clear(&self) -> Result<()> {
        self.graph
            .run(query("MATCH (n) DETACH DELETE n"))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(())
    }
}
