//! HTTP-backed entity extractor client
//!
//! Talks to an extraction service (an LLM wrapper in production) with retry,
//! bounded concurrency, and a circuit breaker. The response payload is the
//! tolerant [`ExtractedGraph`] wire model; nothing downstream trusts it.

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::{EntityExtractor, ExtractedGraph};
use crate::error::{ExtractorError, Result};
use crate::metrics::METRICS;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Extractor client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Enable/disable extraction globally
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Extraction service URL
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// API key (read from env EXTRACTOR_API_KEY if not set)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum characters per extraction request
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Maximum concurrent extraction requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Number of retry attempts
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Base backoff in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Circuit breaker failure threshold
    #[serde(default = "default_breaker_failures")]
    pub circuit_breaker_failures: usize,

    /// Circuit breaker reset timeout in seconds
    #[serde(default = "default_breaker_reset")]
    pub circuit_breaker_reset_secs: u64,
}

fn default_enabled() -> bool {
    true
}
fn default_service_url() -> String {
    "http://localhost:8090".to_string()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_chunk_chars() -> usize {
    4000
}
fn default_max_concurrent() -> usize {
    8
}
fn default_retry_attempts() -> usize {
    2
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_breaker_failures() -> usize {
    5
}
fn default_breaker_reset() -> u64 {
    30
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            service_url: default_service_url(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            max_chunk_chars: default_max_chunk_chars(),
            max_concurrent_requests: default_max_concurrent(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            circuit_breaker_failures: default_breaker_failures(),
            circuit_breaker_reset_secs: default_breaker_reset(),
        }
    }
}

impl ExtractorConfig {
    /// Override with environment variables if present.
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("EXTRACTOR_ENABLED") {
            self.enabled = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = std::env::var("EXTRACTOR_SERVICE_URL") {
            self.service_url = val;
        }
        if let Ok(val) = std::env::var("EXTRACTOR_API_KEY") {
            self.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("EXTRACTOR_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.timeout_ms = timeout;
            }
        }
        if let Ok(val) = std::env::var("EXTRACTOR_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.retry_attempts = retries;
            }
        }
        if let Ok(val) = std::env::var("EXTRACTOR_RETRY_BACKOFF_MS") {
            if let Ok(ms) = val.parse() {
                self.retry_backoff_ms = ms;
            }
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_secs)
    }
}

/// HTTP client implementing [`EntityExtractor`].
pub struct HttpEntityExtractor {
    http: Client,
    config: ExtractorConfig,
    semaphore: Arc<Semaphore>,
    breaker: Arc<CircuitBreaker>,
}

impl HttpEntityExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExtractorError::RequestFailed(e.to_string()))?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests));
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_failures,
            reset_timeout: config.breaker_reset_timeout(),
        }));

        Ok(Self {
            http,
            config,
            semaphore,
            breaker,
        })
    }

    async fn call_extract_api(&self, text_chunk: &str) -> std::result::Result<ExtractedGraph, ExtractorError> {
        let url = format!("{}/v1/extract", self.config.service_url);
        let request_body = serde_json::json!({ "text": text_chunk });

        let mut req = self.http.post(&url).json(&request_body);
        if let Some(api_key) = &self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractorError::Timeout(e.to_string())
            } else {
                ExtractorError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExtractorError::UpstreamError(format!(
                "Status {}: {}",
                status, error_text
            )));
        }

        response
            .json::<ExtractedGraph>()
            .await
            .map_err(|e| ExtractorError::InvalidResponse(e.to_string()))
    }

    /// Deterministic exponential backoff: base * 2^(attempt-1).
    fn calculate_backoff(&self, attempt: usize) -> Duration {
        let base = self.config.retry_backoff();
        base * 2_u32.saturating_pow(attempt.saturating_sub(1) as u32)
    }
}

#[async_trait]
impl EntityExtractor for HttpEntityExtractor {
    async fn extract(&self, text_chunk: &str) -> Result<ExtractedGraph> {
        let start = Instant::now();

        if !self.config.enabled {
            METRICS
                .extractor_requests
                .with_label_values(&["disabled"])
                .inc();
            return Err(ExtractorError::Disabled.into());
        }

        if self.breaker.is_open("extract") {
            METRICS.extractor_circuit_open.inc();
            error!("Circuit breaker is open for extraction");
            return Err(ExtractorError::CircuitOpen("extract".to_string()).into());
        }

        let chunk = if text_chunk.len() > self.config.max_chunk_chars {
            warn!(
                "Truncating extraction chunk: {} > {} chars",
                text_chunk.len(),
                self.config.max_chunk_chars
            );
            let mut end = self.config.max_chunk_chars;
            while !text_chunk.is_char_boundary(end) {
                end -= 1;
            }
            &text_chunk[..end]
        } else {
            text_chunk
        };

        let _permit = self.semaphore.acquire().await.map_err(|e| {
            ExtractorError::RequestFailed(format!("semaphore closed: {}", e))
        })?;

        let mut attempt = 0;
        let graph = loop {
            attempt += 1;

            match self.call_extract_api(chunk).await {
                Ok(graph) => {
                    self.breaker.mark_success("extract");
                    METRICS
                        .extractor_requests
                        .with_label_values(&["success"])
                        .inc();
                    break graph;
                }
                Err(e) => {
                    self.breaker.mark_failure("extract");
                    METRICS
                        .extractor_requests
                        .with_label_values(&["error"])
                        .inc();

                    if attempt > self.config.retry_attempts {
                        error!("Extraction failed after {} attempts: {}", attempt, e);
                        return Err(e.into());
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "Extraction attempt {} failed: {}, retrying in {:?}",
                        attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        debug!(
            "Extracted {} entities, {} relationships in {:?}",
            graph.entities.len(),
            graph.relationships.len(),
            start.elapsed()
        );
        METRICS
            .extractor_request_duration
            .observe(start.elapsed().as_secs_f64());

        Ok(graph)
    }
}
