//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> =
    Lazy::new(|| Arc::new(Metrics::new().expect("Failed to initialize metrics")));

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // API metrics
    pub ingest_requests: CounterVec,
    pub reason_requests: CounterVec,
    pub validate_requests: CounterVec,
    pub request_duration: HistogramVec,

    // Ingestion metrics
    pub entities_merged_total: Counter,
    pub relationships_created_total: Counter,
    pub ingest_skipped_total: Counter,

    // Reasoning metrics
    pub paths_found: Histogram,
    pub reason_no_path_total: Counter,

    // Validation metrics
    pub validation_failures: CounterVec,

    // Extractor metrics
    pub extractor_requests: CounterVec,
    pub extractor_request_duration: Histogram,
    pub extractor_circuit_open: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let ingest_requests = register_counter_vec_with_registry!(
            Opts::new("ingest_requests_total", "Total graph ingestion requests"),
            &["status"],
            registry
        )?;

        let reason_requests = register_counter_vec_with_registry!(
            Opts::new("reason_requests_total", "Total reasoning requests"),
            &["status"],
            registry
        )?;

        let validate_requests = register_counter_vec_with_registry!(
            Opts::new("validate_requests_total", "Total validation requests"),
            &["status"],
            registry
        )?;

        let request_duration = register_histogram_vec_with_registry!(
            "request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            registry
        )?;

        let entities_merged_total = register_counter_with_registry!(
            Opts::new(
                "entities_merged_total",
                "Total entities merged into the graph"
            ),
            registry
        )?;

        let relationships_created_total = register_counter_with_registry!(
            Opts::new(
                "relationships_created_total",
                "Total relationships upserted into the graph"
            ),
            registry
        )?;

        let ingest_skipped_total = register_counter_with_registry!(
            Opts::new(
                "ingest_skipped_total",
                "Total malformed batch items skipped during ingestion"
            ),
            registry
        )?;

        let paths_found = register_histogram_with_registry!(
            "paths_found",
            "Paths discovered per reasoning query",
            registry
        )?;

        let reason_no_path_total = register_counter_with_registry!(
            Opts::new(
                "reason_no_path_total",
                "Reasoning queries that found no path"
            ),
            registry
        )?;

        let validation_failures = register_counter_vec_with_registry!(
            Opts::new(
                "validation_failures_total",
                "Answers failing grounding validation"
            ),
            &["kind"],
            registry
        )?;

        let extractor_requests = register_counter_vec_with_registry!(
            Opts::new("extractor_requests_total", "Total extraction requests"),
            &["status"],
            registry
        )?;

        let extractor_request_duration = register_histogram_with_registry!(
            "extractor_request_duration_seconds",
            "Extraction request duration in seconds",
            registry
        )?;

        let extractor_circuit_open = register_counter_with_registry!(
            Opts::new(
                "extractor_circuit_open_total",
                "Extraction requests rejected by an open circuit breaker"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            ingest_requests,
            reason_requests,
            validate_requests,
            request_duration,
            entities_merged_total,
            relationships_created_total,
            ingest_skipped_total,
            paths_found,
            reason_no_path_total,
            validation_failures,
            extractor_requests,
            extractor_request_duration,
            extractor_circuit_open,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }

    /// Record a validation outcome
    pub fn record_validation(&self, is_valid: bool, invalid: usize, unsupported: usize, missing: usize) {
        let status = if is_valid { "success" } else { "error" };
        self.validate_requests.with_label_values(&[status]).inc();
        if invalid > 0 {
            self.validation_failures
                .with_label_values(&["invalid_citation"])
                .inc_by(invalid as f64);
        }
        if unsupported > 0 {
            self.validation_failures
                .with_label_values(&["unsupported_claim"])
                .inc_by(unsupported as f64);
        }
        if missing > 0 {
            self.validation_failures
                .with_label_values(&["missing_citation"])
                .inc_by(missing as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialize() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_export_contains_registered_metrics() {
        METRICS
            .ingest_requests
            .with_label_values(&["success"])
            .inc();
        let exported = METRICS.export().unwrap();
        assert!(exported.contains("ingest_requests_total"));
    }

    #[test]
    fn test_record_validation_counts_failure_kinds() {
        METRICS.record_validation(false, 1, 2, 0);
        let exported = METRICS.export().unwrap();
        assert!(exported.contains("validation_failures_total"));
    }
}
