//! API handlers for ingestion, reasoning, and grounding validation

use crate::engine::GraphRagEngine;
use crate::extract::ExtractedGraph;
use crate::metrics::METRICS;
use crate::model::{ReasoningPath, UpsertStats};
use crate::validate::{Evidence, Source, ValidationResult};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<GraphRagEngine>,
}

/// API error envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new("INTERNAL_ERROR", e.to_string())),
    )
}

fn validation_error(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new("VALIDATION_ERROR", message)),
    )
}

/// Ingest request: one extracted batch plus its provenance.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    #[serde(flatten)]
    pub graph: ExtractedGraph,
    #[serde(default = "default_source")]
    pub source: String,
    pub source_label: String,
    pub source_file: String,
}

fn default_source() -> String {
    "api".to_string()
}

/// Ingest a batch of extracted entities and relationships
///
/// POST /api/v1/ingest
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<UpsertStats> {
    let start = Instant::now();
    info!(
        source_label = request.source_label.as_str(),
        entities = request.graph.entities.len(),
        relationships = request.graph.relationships.len(),
        "ingest request"
    );

    if request.source_label.is_empty() {
        return Err(validation_error("source_label cannot be empty"));
    }
    if request.graph.is_empty() {
        return Err(validation_error("batch contains no entities or relationships"));
    }

    let result = state
        .engine
        .ingest(
            request.graph,
            &request.source,
            &request.source_label,
            &request.source_file,
        )
        .await;

    METRICS
        .request_duration
        .with_label_values(&["ingest"])
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(stats) => {
            METRICS
                .ingest_requests
                .with_label_values(&["success"])
                .inc();
            Ok(Json(stats))
        }
        Err(e) => {
            METRICS.ingest_requests.with_label_values(&["error"]).inc();
            error!("Ingest failed: {}", e);
            Err(internal_error(e))
        }
    }
}

/// Reasoning request.
#[derive(Debug, Clone, Deserialize)]
pub struct ReasonRequest {
    pub start_entity: String,
    pub target_entities: BTreeSet<String>,
    #[serde(default)]
    pub max_hops: Option<usize>,
    #[serde(default)]
    pub allowed_relationship_types: Option<BTreeSet<String>>,
}

/// Reasoning response.
#[derive(Debug, Clone, Serialize)]
pub struct ReasonResponse {
    pub paths: Vec<ReasoningPath>,
    pub confidence: f64,
}

/// Discover and score multi-hop paths
///
/// POST /api/v1/reason
pub async fn reason(
    State(state): State<AppState>,
    Json(request): Json<ReasonRequest>,
) -> ApiResult<ReasonResponse> {
    let start = Instant::now();
    info!(start_entity = request.start_entity.as_str(), "reason request");

    if request.start_entity.trim().is_empty() {
        return Err(validation_error("start_entity cannot be empty"));
    }
    if request.target_entities.is_empty() {
        return Err(validation_error("target_entities cannot be empty"));
    }

    let result = state
        .engine
        .reason(
            &request.start_entity,
            &request.target_entities,
            request.max_hops,
            request.allowed_relationship_types,
        )
        .await;

    METRICS
        .request_duration
        .with_label_values(&["reason"])
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(outcome) => {
            METRICS
                .reason_requests
                .with_label_values(&["success"])
                .inc();
            Ok(Json(ReasonResponse {
                paths: outcome.paths,
                confidence: outcome.confidence,
            }))
        }
        Err(e) => {
            METRICS.reason_requests.with_label_values(&["error"]).inc();
            error!("Reasoning failed: {}", e);
            Err(internal_error(e))
        }
    }
}

/// Validation request: a composed answer plus the sources it cites.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Validate a composed answer against its sources
///
/// POST /api/v1/validate
pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<ValidationResult> {
    if request.answer.trim().is_empty() {
        return Err(validation_error("answer cannot be empty"));
    }

    let result = state.engine.validate(&request.answer, &request.sources);
    Ok(Json(result))
}

/// Evidence response wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceResponse {
    pub evidence: Vec<Evidence>,
}

/// Build the per-claim evidence structure for an answer
///
/// POST /api/v1/evidence
pub async fn evidence(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<EvidenceResponse> {
    if request.answer.trim().is_empty() {
        return Err(validation_error("answer cannot be empty"));
    }

    let evidence = state
        .engine
        .build_evidence(&request.answer, &request.sources);
    Ok(Json(EvidenceResponse { evidence }))
}

/// Health probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub entities: usize,
    pub relationships: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let entities = state
        .engine
        .store()
        .entity_count()
        .await
        .map_err(internal_error)?;
    let relationships = state
        .engine
        .store()
        .relationship_count()
        .await
        .map_err(internal_error)?;

    Ok(Json(HealthResponse {
        status: "ok",
        entities,
        relationships,
    }))
}

/// GET /metrics
pub async fn metrics() -> Result<String, (StatusCode, Json<ApiError>)> {
    METRICS.export().map_err(internal_error)
}
