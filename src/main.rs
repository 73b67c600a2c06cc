//! Server binary: config, tracing, store selection, and the axum router.

use anyhow::Context;
use graphrag_engine::api::{build_router, AppState};
use graphrag_engine::config::{Config, GraphBackend};
use graphrag_engine::engine::GraphRagEngine;
use graphrag_engine::store::{GraphStore, MemoryGraphStore, Neo4jGraphStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config);

    let store: Arc<dyn GraphStore> = match config.graph.backend {
        GraphBackend::Memory => {
            info!("using in-memory graph store");
            Arc::new(MemoryGraphStore::new())
        }
        GraphBackend::Neo4j => {
            info!(uri = config.graph.neo4j.uri.as_str(), "using Neo4j graph store");
            Arc::new(
                Neo4jGraphStore::connect(&config.graph.neo4j)
                    .await
                    .context("failed to connect to Neo4j")?,
            )
        }
    };

    let engine = Arc::new(GraphRagEngine::new(store, &config));
    let app = build_router(AppState { engine }, config.server.body_limit);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(addr = addr.as_str(), "starting server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
