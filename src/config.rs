//! Application configuration
//!
//! Layered loading: built-in defaults, then an optional TOML file, then
//! `GRAPHRAG_*` environment variables. Every subsystem keeps its own section
//! so the scoring weights and thresholds stay tunable without code changes.

use crate::error::{EngineError, Result};
use crate::extract::ExtractorConfig;
use crate::reason::ReasonerConfig;
use crate::resolver::ResolverConfig;
use crate::store::Neo4jConfig;
use crate::validate::ValidatorConfig;
use serde::{Deserialize, Serialize};

/// Which graph backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    Memory,
    Neo4j,
}

impl Default for GraphBackend {
    fn default() -> Self {
        Self::Memory
    }
}

/// Graph store section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub backend: GraphBackend,
    #[serde(default)]
    pub neo4j: Neo4jConfig,
}

/// HTTP server section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body limit in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8082
}
fn default_body_limit() -> usize {
    2 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
        }
    }
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub reasoner: ReasonerConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from `config/default.toml` (optional), the file
    /// named by `GRAPHRAG_CONFIG` (optional), and `GRAPHRAG_*` environment
    /// variables, in increasing precedence.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(path) = std::env::var("GRAPHRAG_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GRAPHRAG")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| EngineError::Configuration(e.to_string()))
    }

    /// Parse configuration from a TOML string; used in tests.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        settings
            .try_deserialize()
            .map_err(|e| EngineError::Configuration(e.to_string()))
    }
}
