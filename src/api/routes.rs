//! Router assembly

use super::handlers::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the API router with tracing and body-limit middleware.
pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/api/v1/ingest", post(handlers::ingest))
        .route("/api/v1/reason", post(handlers::reason))
        .route("/api/v1/validate", post(handlers::validate))
        .route("/api/v1/evidence", post(handlers::evidence))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .with_state(state)
}
