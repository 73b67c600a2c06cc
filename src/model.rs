//! Data model for the property graph
//!
//! Canonical entities and relationships are the persistent shapes owned by
//! the graph store; reasoning paths are transient values produced per query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Closed label vocabulary for graph nodes.
///
/// Raw extractor output is sanitized into one of these labels; anything
/// unrecognized falls back to the generic [`EntityType::Entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Company,
    Person,
    Product,
    Location,
    Technology,
    Regulation,
    Risk,
    Metric,
    Indicator,
    Country,
    Industry,
    Entity,
}

impl EntityType {
    /// Sanitize a raw type string from an untrusted extractor.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "COMPANY" => Self::Company,
            "PERSON" => Self::Person,
            "PRODUCT" => Self::Product,
            "LOCATION" => Self::Location,
            "TECH" | "TECHNOLOGY" => Self::Technology,
            "REGULATION" => Self::Regulation,
            "RISK" => Self::Risk,
            "METRIC" | "FINANCIAL_METRIC" => Self::Metric,
            "INDICATOR" | "MACRO_INDICATOR" => Self::Indicator,
            "COUNTRY" => Self::Country,
            "INDUSTRY" => Self::Industry,
            _ => Self::Entity,
        }
    }

    /// Graph label for this type, safe for use in Cypher.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Company => "Company",
            Self::Person => "Person",
            Self::Product => "Product",
            Self::Location => "Location",
            Self::Technology => "Technology",
            Self::Regulation => "Regulation",
            Self::Risk => "Risk",
            Self::Metric => "Metric",
            Self::Indicator => "Indicator",
            Self::Country => "Country",
            Self::Industry => "Industry",
            Self::Entity => "Entity",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Primitive property value permitted on nodes and edges.
///
/// Extractors may emit arbitrary JSON; non-primitive values are stringified
/// before they reach the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl PropertyValue {
    /// Convert arbitrary extractor JSON into a primitive property value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Self::Str(s.clone()),
            other => Self::Str(other.to_string()),
        }
    }

    /// Numeric view, used for criticality/severity thresholds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// Property map with deterministic iteration order.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Provenance stamped on every graph write so audits can trace any fact
/// back to its originating ingestion batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub source_label: String,
    pub source_file: String,
    pub batch_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl Provenance {
    /// Create provenance for a new ingestion batch.
    pub fn new(
        source: impl Into<String>,
        source_label: impl Into<String>,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_label: source_label.into(),
            source_file: source_file.into(),
            batch_id: Uuid::new_v4(),
            updated_at: Utc::now(),
        }
    }
}

/// A canonicalized graph node.
///
/// Unique per `(canonical_name, entity_type)`. Aliases accumulate every raw
/// mention that resolved to this entity. Created or extended on upsert,
/// never deleted outside an explicit admin reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub canonical_name: String,
    pub entity_type: EntityType,
    pub properties: Properties,
    pub aliases: BTreeSet<String>,
    pub provenance: Provenance,
}

impl CanonicalEntity {
    /// Bare node with no properties, used when a relationship endpoint does
    /// not exist yet.
    pub fn bare(name: impl Into<String>, provenance: Provenance) -> Self {
        let name = name.into();
        let mut aliases = BTreeSet::new();
        aliases.insert(name.clone());
        Self {
            canonical_name: name,
            entity_type: EntityType::Entity,
            properties: Properties::new(),
            aliases,
            provenance,
        }
    }
}

/// A directed, typed edge between two canonical entities.
///
/// Keyed by `(source_name, rel_type, target_name)`; repeated upserts merge
/// properties instead of duplicating the edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source_name: String,
    pub target_name: String,
    pub rel_type: String,
    pub properties: Properties,
    pub provenance: Provenance,
}

/// Node view inside a reasoning path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathNode {
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub properties: Properties,
}

/// Edge view inside a reasoning path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEdge {
    pub rel_type: String,
    #[serde(default)]
    pub properties: Properties,
}

/// An alternating node/edge sequence discovered by the reasoner.
///
/// Transient; produced per query and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningPath {
    pub nodes: Vec<PathNode>,
    pub edges: Vec<PathEdge>,
}

impl ReasoningPath {
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }

    /// Name of the entity this path terminates at.
    pub fn terminal(&self) -> Option<&str> {
        self.nodes.last().map(|n| n.name.as_str())
    }

    /// Sum of criticality/severity edge properties, used for tie-breaking
    /// between equal-hop paths.
    pub fn criticality_sum(&self) -> f64 {
        self.edges
            .iter()
            .flat_map(|e| e.properties.iter())
            .filter(|(k, _)| k.as_str() == "criticality" || k.as_str() == "severity")
            .filter_map(|(_, v)| v.as_f64())
            .sum()
    }

    /// Whether any edge carries a criticality/severity property above the
    /// given threshold.
    pub fn has_critical_edge(&self, threshold: f64) -> bool {
        self.edges
            .iter()
            .flat_map(|e| e.properties.iter())
            .filter(|(k, _)| k.as_str() == "criticality" || k.as_str() == "severity")
            .filter_map(|(_, v)| v.as_f64())
            .any(|v| v > threshold)
    }

    /// Node names joined for ordering and display.
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }
}

/// Counters returned by a batch upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertStats {
    pub entities_merged: usize,
    pub relationships_created: usize,
    pub skipped: usize,
}
