//! Circuit breaker protecting the extraction service
//!
//! The extractor is a remote, rate-limited model service; once it starts
//! failing, hammering it with the remainder of an ingestion batch only makes
//! recovery slower. The breaker opens after a failure threshold and lets a
//! probe request through after a reset timeout.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker state for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: BreakerState,
    failure_count: usize,
    opened_at: Option<Instant>,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            opened_at: None,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-operation circuit breaker.
pub struct CircuitBreaker {
    breakers: Mutex<HashMap<String, BreakerEntry>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Whether requests for `operation` should currently be rejected.
    ///
    /// An open breaker transitions to half-open once the reset timeout has
    /// elapsed, letting a single probe through.
    pub fn is_open(&self, operation: &str) -> bool {
        let mut breakers = self.breakers.lock().unwrap();
        let entry = breakers
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);

        match entry.state {
            BreakerState::Closed | BreakerState::HalfOpen => false,
            BreakerState::Open => match entry.opened_at {
                Some(opened_at) if opened_at.elapsed() >= self.config.reset_timeout => {
                    entry.state = BreakerState::HalfOpen;
                    false
                }
                _ => true,
            },
        }
    }

    pub fn mark_success(&self, operation: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        let entry = breakers
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);
        entry.state = BreakerState::Closed;
        entry.failure_count = 0;
        entry.opened_at = None;
    }

    pub fn mark_failure(&self, operation: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        let entry = breakers
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);

        entry.failure_count += 1;
        if entry.failure_count >= self.config.failure_threshold {
            entry.state = BreakerState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self, operation: &str) -> BreakerState {
        let breakers = self.breakers.lock().unwrap();
        breakers
            .get(operation)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
