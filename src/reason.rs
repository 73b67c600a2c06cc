//! Multi-hop path reasoning
//!
//! Discovers bounded-length paths between a query subject and a set of
//! target entities, then scores confidence as a deterministic function of
//! path shape — no generative model is involved, so the same graph always
//! yields the same score.

use crate::error::Result;
use crate::metrics::METRICS;
use crate::model::ReasoningPath;
use crate::store::{GraphStore, PathQuery};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Confidence scoring weights.
///
/// The defaults are empirically chosen and have no documented derivation;
/// they are configuration rather than constants so they can be recalibrated
/// against a labeled dataset without touching code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_base")]
    pub base: f64,
    #[serde(default = "default_found_bonus")]
    pub found_bonus: f64,
    /// Bonus when the winning path has 2-3 hops, the most explainable range.
    #[serde(default = "default_sweet_spot_bonus")]
    pub sweet_spot_bonus: f64,
    /// Smaller bonus for a single-hop path: direct but less richly connected.
    #[serde(default = "default_direct_bonus")]
    pub direct_bonus: f64,
    /// Bonus when more than one independent path reaches the same target.
    #[serde(default = "default_corroboration_bonus")]
    pub corroboration_bonus: f64,
    /// Bonus when the winning path carries a high criticality/severity edge.
    #[serde(default = "default_criticality_bonus")]
    pub criticality_bonus: f64,
    #[serde(default = "default_criticality_threshold")]
    pub criticality_threshold: f64,
}

fn default_base() -> f64 {
    0.5
}
fn default_found_bonus() -> f64 {
    0.2
}
fn default_sweet_spot_bonus() -> f64 {
    0.2
}
fn default_direct_bonus() -> f64 {
    0.1
}
fn default_corroboration_bonus() -> f64 {
    0.1
}
fn default_criticality_bonus() -> f64 {
    0.1
}
fn default_criticality_threshold() -> f64 {
    0.7
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            found_bonus: default_found_bonus(),
            sweet_spot_bonus: default_sweet_spot_bonus(),
            direct_bonus: default_direct_bonus(),
            corroboration_bonus: default_corroboration_bonus(),
            criticality_bonus: default_criticality_bonus(),
            criticality_threshold: default_criticality_threshold(),
        }
    }
}

/// Reasoner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

fn default_max_hops() -> usize {
    3
}
fn default_result_limit() -> usize {
    20
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            result_limit: default_result_limit(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// A scored reasoning outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningOutcome {
    pub paths: Vec<ReasoningPath>,
    pub confidence: f64,
}

/// Bounded multi-hop reasoner over a [`GraphStore`].
pub struct MultiHopPathReasoner {
    store: Arc<dyn GraphStore>,
    config: ReasonerConfig,
}

impl MultiHopPathReasoner {
    pub fn new(store: Arc<dyn GraphStore>, config: ReasonerConfig) -> Self {
        Self { store, config }
    }

    /// All distinct simple paths from `start` to any entity in `targets`,
    /// shortest first, capped at the configured result limit.
    ///
    /// An empty result means "insufficient graph evidence", not an error.
    pub async fn find_paths(
        &self,
        start: &str,
        targets: &BTreeSet<String>,
        max_hops: usize,
        allowed_rel_types: Option<BTreeSet<String>>,
    ) -> Result<Vec<ReasoningPath>> {
        let capped_hops = max_hops.min(self.config.max_hops.max(1)).max(1);
        let mut query = PathQuery::new(start, targets.clone(), capped_hops)
            .with_limit(self.config.result_limit);
        if let Some(rel_types) = allowed_rel_types {
            query = query.with_rel_types(rel_types);
        }

        let paths = self.store.find_paths(&query).await?;
        debug!(
            start,
            targets = targets.len(),
            max_hops = capped_hops,
            found = paths.len(),
            "path discovery complete"
        );
        if paths.is_empty() {
            METRICS.reason_no_path_total.inc();
        }
        METRICS.paths_found.observe(paths.len() as f64);
        Ok(paths)
    }

    /// Deterministic confidence for a set of discovered paths.
    ///
    /// The first path is the winner: the input ordering (hop count, then
    /// criticality sum, then node names) is part of the contract.
    pub fn score_confidence(&self, paths: &[ReasoningPath]) -> f64 {
        if paths.is_empty() {
            return 0.0;
        }
        let s = &self.config.scoring;
        let winner = &paths[0];

        let mut score = s.base + s.found_bonus;

        match winner.hop_count() {
            1 => score += s.direct_bonus,
            2 | 3 => score += s.sweet_spot_bonus,
            _ => {}
        }

        // Corroboration: at least two independent paths into one target.
        let mut terminals: Vec<&str> = paths.iter().filter_map(|p| p.terminal()).collect();
        terminals.sort_unstable();
        let corroborated = terminals.windows(2).any(|w| w[0] == w[1]);
        if corroborated {
            score += s.corroboration_bonus;
        }

        if winner.has_critical_edge(s.criticality_threshold) {
            score += s.criticality_bonus;
        }

        score.clamp(0.0, 1.0)
    }

    /// Discover and score in one step.
    pub async fn reason(
        &self,
        start: &str,
        targets: &BTreeSet<String>,
        max_hops: Option<usize>,
        allowed_rel_types: Option<BTreeSet<String>>,
    ) -> Result<ReasoningOutcome> {
        let hops = max_hops.unwrap_or(self.config.max_hops);
        let paths = self
            .find_paths(start, targets, hops, allowed_rel_types)
            .await?;
        let confidence = self.score_confidence(&paths);

        info!(
            start,
            found = paths.len(),
            confidence,
            "reasoning complete"
        );
        Ok(ReasoningOutcome { paths, confidence })
    }
}
