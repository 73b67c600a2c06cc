//! Entity resolution: canonicalize raw mentions to stable names
//!
//! Raw extractor output refers to the same real-world entity in many forms
//! ("NVDA", "Nvidia Corporation", "NVIDIA"). The resolver maps every mention
//! to one canonical name via an injected alias table, substring containment,
//! and fuzzy similarity against previously-seen names, in that order.
//!
//! The alias and memoization tables are per-instance mutable state; the type
//! is deliberately not `Sync`-friendly for concurrent mutation. Concurrent
//! ingesters must shard resolver instances or serialize access behind a lock,
//! since alias registration is a read-then-write sequence.

pub mod similarity;

use crate::extract::ExtractedEntity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// One canonical name and its known aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasEntry {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Resolver configuration.
///
/// The alias table is configuration data, loaded at startup — locale name
/// variants and ticker abbreviations belong here, not in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub aliases: Vec<AliasEntry>,
}

fn default_similarity_threshold() -> f64 {
    0.85
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            aliases: Vec::new(),
        }
    }
}

/// Resolver statistics, for diagnostics endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverStats {
    pub unique_entities: usize,
    pub total_aliases: usize,
    pub cached_normalizations: usize,
}

/// Canonicalizes raw entity mentions to stable names.
pub struct EntityResolver {
    similarity_threshold: f64,
    /// canonical name -> alias set; BTreeMap keeps fuzzy-match iteration
    /// deterministic so threshold ties always resolve the same way.
    aliases: BTreeMap<String, BTreeSet<String>>,
    /// raw mention -> canonical name
    cache: HashMap<String, String>,
}

impl EntityResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let mut aliases: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in config.aliases {
            let set = aliases.entry(entry.canonical.clone()).or_default();
            set.insert(entry.canonical);
            set.extend(entry.aliases);
        }
        Self {
            similarity_threshold: config.similarity_threshold,
            aliases,
            cache: HashMap::new(),
        }
    }

    /// Resolve a raw mention to its canonical name.
    ///
    /// First match wins: alias table, substring containment, fuzzy
    /// similarity. An unmatched mention becomes a new canonical name. The
    /// raw string is registered as an alias of whatever is returned.
    /// Whitespace-only input is returned unchanged with no registration.
    pub fn resolve(&mut self, raw: &str) -> String {
        if raw.trim().is_empty() {
            return raw.to_string();
        }

        if let Some(hit) = self.cache.get(raw) {
            return hit.clone();
        }

        let cleaned = raw.trim();
        let canonical = self
            .lookup_alias_table(cleaned)
            .or_else(|| self.lookup_containment(cleaned))
            .or_else(|| self.lookup_fuzzy(cleaned))
            .unwrap_or_else(|| cleaned.to_string());

        self.cache.insert(raw.to_string(), canonical.clone());
        let set = self.aliases.entry(canonical.clone()).or_default();
        set.insert(canonical.clone());
        set.insert(raw.to_string());

        canonical
    }

    /// Exact match against canonical names and their alias sets.
    fn lookup_alias_table(&self, name: &str) -> Option<String> {
        for (canonical, aliases) in &self.aliases {
            if canonical == name || aliases.contains(name) {
                return Some(canonical.clone());
            }
        }
        None
    }

    /// Case-insensitive substring containment against alias sets.
    fn lookup_containment(&self, name: &str) -> Option<String> {
        let lower = name.to_lowercase();
        for (canonical, aliases) in &self.aliases {
            for alias in aliases {
                let alias_lower = alias.to_lowercase();
                if alias_lower.contains(&lower) || lower.contains(&alias_lower) {
                    return Some(canonical.clone());
                }
            }
        }
        None
    }

    /// Best-scoring fuzzy match against previously-seen canonical names.
    ///
    /// Near-threshold ties between two canonical names resolve
    /// deterministically: highest score wins, then lexicographic order.
    fn lookup_fuzzy(&self, name: &str) -> Option<String> {
        let mut best_match: Option<&str> = None;
        let mut best_score = 0.0_f64;

        for canonical in self.aliases.keys() {
            let score = similarity::name_similarity(name, canonical);
            if score >= self.similarity_threshold && score > best_score {
                best_score = score;
                best_match = Some(canonical);
            }
        }

        if let Some(canonical) = best_match {
            debug!(
                raw = name,
                canonical, score = best_score, "fuzzy-resolved entity mention"
            );
        }
        best_match.map(String::from)
    }

    /// All registered aliases for a canonical name.
    pub fn aliases_of(&self, canonical: &str) -> Vec<String> {
        self.aliases
            .get(canonical)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Group raw extracted entities by canonical name.
    ///
    /// Duplicate mentions collapse to a single entity carrying the union of
    /// aliases; the longest description wins when several are present.
    pub fn merge_extracted(&mut self, entities: Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
        let mut groups: BTreeMap<String, Vec<ExtractedEntity>> = BTreeMap::new();
        for entity in entities {
            if entity.name.trim().is_empty() {
                continue;
            }
            let canonical = self.resolve(&entity.name);
            groups.entry(canonical).or_default().push(entity);
        }

        groups
            .into_iter()
            .map(|(canonical, group)| {
                let mut merged = group[0].clone();
                merged.name = canonical;

                let longest_description = group
                    .iter()
                    .filter_map(|e| e.properties.get("description"))
                    .filter_map(|v| v.as_str())
                    .max_by_key(|d| d.len())
                    .map(String::from);
                if let Some(description) = longest_description {
                    merged.properties.insert(
                        "description".to_string(),
                        serde_json::Value::String(description),
                    );
                }
                merged
            })
            .collect()
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            unique_entities: self.aliases.len(),
            total_aliases: self.aliases.values().map(BTreeSet::len).sum(),
            cached_normalizations: self.cache.len(),
        }
    }

    /// Hard reset; canonical names are never retired otherwise.
    pub fn clear(&mut self) {
        self.aliases.clear();
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with_aliases() -> EntityResolver {
        EntityResolver::new(ResolverConfig {
            similarity_threshold: 0.85,
            aliases: vec![
                AliasEntry {
                    canonical: "Nvidia".to_string(),
                    aliases: vec!["NVDA".to_string(), "NVIDIA Corporation".to_string()],
                },
                AliasEntry {
                    canonical: "TSMC".to_string(),
                    aliases: vec![
                        "TSM".to_string(),
                        "Taiwan Semiconductor Manufacturing".to_string(),
                    ],
                },
            ],
        })
    }

    #[test]
    fn test_exact_alias_lookup() {
        let mut resolver = resolver_with_aliases();
        assert_eq!(resolver.resolve("NVDA"), "Nvidia");
        assert_eq!(resolver.resolve("Nvidia"), "Nvidia");
        assert_eq!(resolver.resolve("TSM"), "TSMC");
    }

    #[test]
    fn test_containment_lookup() {
        let mut resolver = resolver_with_aliases();
        assert_eq!(resolver.resolve("Taiwan Semiconductor"), "TSMC");
    }

    #[test]
    fn test_fuzzy_lookup() {
        let mut resolver = resolver_with_aliases();
        resolver.resolve("Samsung Electronics");
        // Internal typo: not a substring of any alias, so only the fuzzy
        // signal can merge it.
        assert_eq!(resolver.resolve("Samsung Elektronics"), "Samsung Electronics");
    }

    #[test]
    fn test_unknown_becomes_new_canonical() {
        let mut resolver = resolver_with_aliases();
        assert_eq!(resolver.resolve("Samsung Electronics"), "Samsung Electronics");
        // Once seen, later mentions resolve to it.
        assert_eq!(resolver.resolve("Samsung Electronic"), "Samsung Electronics");
    }

    #[test]
    fn test_alias_symmetry() {
        let mut resolver = resolver_with_aliases();
        let canonical = resolver.resolve("NVIDIA Corp");
        for alias in resolver.aliases_of(&canonical) {
            assert_eq!(resolver.resolve(&alias), canonical);
        }
    }

    #[test]
    fn test_whitespace_input_unchanged() {
        let mut resolver = resolver_with_aliases();
        assert_eq!(resolver.resolve("   "), "   ");
        assert_eq!(resolver.resolve(""), "");
        // Nothing was registered.
        assert_eq!(resolver.stats().cached_normalizations, 0);
    }

    #[test]
    fn test_memoization() {
        let mut resolver = resolver_with_aliases();
        resolver.resolve("NVDA");
        resolver.resolve("NVDA");
        assert_eq!(resolver.stats().cached_normalizations, 1);
    }

    #[test]
    fn test_raw_mention_registered_as_alias() {
        let mut resolver = resolver_with_aliases();
        resolver.resolve("nvidia corporation");
        assert!(resolver
            .aliases_of("Nvidia")
            .contains(&"nvidia corporation".to_string()));
    }

    #[test]
    fn test_threshold_monotonicity() {
        let lenient = ResolverConfig {
            similarity_threshold: 0.85,
            aliases: Vec::new(),
        };
        let strict = ResolverConfig {
            similarity_threshold: 0.99,
            aliases: Vec::new(),
        };

        let mut lenient_resolver = EntityResolver::new(lenient);
        lenient_resolver.resolve("Advanced Micro Devices");
        let merged_lenient = lenient_resolver.resolve("Advancd Micro Devices");

        let mut strict_resolver = EntityResolver::new(strict);
        strict_resolver.resolve("Advanced Micro Devices");
        let merged_strict = strict_resolver.resolve("Advancd Micro Devices");

        // Lenient threshold merges the near-duplicate; strict one splits it.
        assert_eq!(merged_lenient, "Advanced Micro Devices");
        assert_eq!(merged_strict, "Advancd Micro Devices");
    }

    #[test]
    fn test_merge_extracted_unions_duplicates() {
        let mut resolver = resolver_with_aliases();
        let entities = vec![
            ExtractedEntity {
                name: "NVDA".to_string(),
                entity_type: Some("COMPANY".to_string()),
                properties: [(
                    "description".to_string(),
                    serde_json::Value::String("GPU maker".to_string()),
                )]
                .into_iter()
                .collect(),
            },
            ExtractedEntity {
                name: "Nvidia".to_string(),
                entity_type: Some("COMPANY".to_string()),
                properties: [(
                    "description".to_string(),
                    serde_json::Value::String("Leading GPU and AI accelerator maker".to_string()),
                )]
                .into_iter()
                .collect(),
            },
        ];

        let merged = resolver.merge_extracted(entities);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Nvidia");
        assert_eq!(
            merged[0].properties.get("description").and_then(|v| v.as_str()),
            Some("Leading GPU and AI accelerator maker")
        );
    }
}
