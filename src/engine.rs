//! Engine facade wiring the core components together
//!
//! One shared graph store feeds ingestion and reasoning; the resolver sits
//! behind a mutex because alias registration is read-then-write and the
//! resolver itself is not thread-safe. Validation is pure and needs no
//! coordination.

use crate::config::Config;
use crate::error::Result;
use crate::extract::{AnswerComposer, ExtractedGraph};
use crate::ingest::GraphUpsertEngine;
use crate::model::{Provenance, ReasoningPath, UpsertStats};
use crate::reason::{MultiHopPathReasoner, ReasoningOutcome};
use crate::resolver::{EntityResolver, ResolverStats};
use crate::store::GraphStore;
use crate::validate::{CitationValidator, Evidence, Source, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// A composed answer with its supporting paths and validation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub answer: String,
    pub paths: Vec<ReasoningPath>,
    pub confidence: f64,
    pub validation: ValidationResult,
}

/// Facade over resolver, upsert engine, reasoner, and validator.
pub struct GraphRagEngine {
    store: Arc<dyn GraphStore>,
    resolver: Arc<Mutex<EntityResolver>>,
    upsert_engine: GraphUpsertEngine,
    reasoner: MultiHopPathReasoner,
    validator: CitationValidator,
}

impl GraphRagEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: &Config) -> Self {
        let resolver = Arc::new(Mutex::new(EntityResolver::new(config.resolver.clone())));
        let upsert_engine = GraphUpsertEngine::new(store.clone(), resolver.clone());
        let reasoner = MultiHopPathReasoner::new(store.clone(), config.reasoner.clone());
        let validator = CitationValidator::new(config.validator.clone());

        Self {
            store,
            resolver,
            upsert_engine,
            reasoner,
            validator,
        }
    }

    /// Ingest one extracted batch under a fresh provenance stamp.
    pub async fn ingest(
        &self,
        graph: ExtractedGraph,
        source: &str,
        source_label: &str,
        source_file: &str,
    ) -> Result<UpsertStats> {
        let provenance = Provenance::new(source, source_label, source_file);
        self.upsert_engine.upsert_graph(graph, provenance).await
    }

    /// Multi-hop path discovery with deterministic confidence.
    ///
    /// Query subjects go through the same canonicalization as ingestion, so
    /// "NVDA" finds the paths stored under "Nvidia".
    pub async fn reason(
        &self,
        start: &str,
        targets: &BTreeSet<String>,
        max_hops: Option<usize>,
        allowed_rel_types: Option<BTreeSet<String>>,
    ) -> Result<ReasoningOutcome> {
        let (start, targets) = {
            let mut resolver = self.resolver.lock().await;
            let start = resolver.resolve(start);
            let targets = targets.iter().map(|t| resolver.resolve(t)).collect();
            (start, targets)
        };
        self.reasoner
            .reason(&start, &targets, max_hops, allowed_rel_types)
            .await
    }

    /// Grounding validation of an externally composed answer.
    pub fn validate(&self, answer: &str, sources: &[Source]) -> ValidationResult {
        let result = self.validator.validate(answer, sources);
        crate::metrics::METRICS.record_validation(
            result.is_valid,
            result.invalid_citations.len(),
            result.unsupported_claims.len(),
            result.missing_citations.len(),
        );
        result
    }

    /// Per-claim evidence structure for an answer.
    pub fn build_evidence(&self, answer: &str, sources: &[Source]) -> Vec<Evidence> {
        self.validator.build_evidence(answer, sources)
    }

    /// Full question-answering turn: discover paths, hand them to the
    /// composer, then validate the prose it produced against the sources.
    ///
    /// An empty path set still flows through: the composer sees no evidence
    /// and the caller receives confidence 0.0 rather than an error.
    pub async fn grounded_answer(
        &self,
        composer: &dyn AnswerComposer,
        question: &str,
        start: &str,
        targets: &BTreeSet<String>,
        sources: &[Source],
    ) -> Result<GroundedAnswer> {
        let outcome = self.reason(start, targets, None, None).await?;
        let answer = composer
            .compose(question, &outcome.paths, sources)
            .await?;
        let validation = self.validate(&answer, sources);

        info!(
            question,
            paths = outcome.paths.len(),
            confidence = outcome.confidence,
            grounded = validation.is_valid,
            "grounded answer produced"
        );

        Ok(GroundedAnswer {
            answer,
            paths: outcome.paths,
            confidence: outcome.confidence,
            validation,
        })
    }

    /// Resolver table statistics.
    pub async fn resolver_stats(&self) -> ResolverStats {
        self.resolver.lock().await.stats()
    }

    /// Admin reset: clears the graph and the resolver tables.
    pub async fn reset(&self) -> Result<()> {
        self.store.clear().await?;
        self.resolver.lock().await.clear();
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }
}
