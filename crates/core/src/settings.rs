//! Process-wide configuration for the ranking pipeline.
//!
//! Loaded once per process via the `config` crate, layered the same way
//! as the rest of the workspace (`config/default` -> `config/{APP_ENV}` ->
//! `config/local` -> `APP__`-prefixed environment variables). Every
//! numeric option is clamped at load time so the rest of the pipeline
//! can trust its bounds without re-checking them.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_upstream_region")]
    pub upstream_region: String,
    #[serde(default = "default_embed_model_id")]
    pub embed_model_id: String,

    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,
    #[serde(default)]
    pub upstream_api_key: String,

    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: u32,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_max_k")]
    pub max_k: u32,
    #[serde(default = "default_ttl_days")]
    pub paper_embedding_ttl_days: i64,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_cb_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default = "default_cb_open_seconds")]
    pub circuit_breaker_open_seconds: u64,

    #[serde(default)]
    pub paper_embeddings_table_name: String,
    #[serde(default)]
    pub request_rate_limit_table_name: String,

    #[serde(default = "default_embedding_max_workers")]
    pub embedding_max_workers: usize,

    /// Ambient process-shell settings (C0); not part of the ranking
    /// contract but loaded from the same configuration surface.
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

fn default_upstream_region() -> String {
    "us-east-2".to_string()
}
fn default_embed_model_id() -> String {
    "amazon.titan-embed-text-v2:0".to_string()
}
fn default_upstream_base_url() -> String {
    "https://api.semanticscholar.org".to_string()
}
fn default_candidate_limit() -> u32 {
    100
}
fn default_max_context_chars() -> usize {
    8000
}
fn default_max_k() -> u32 {
    10
}
fn default_ttl_days() -> i64 {
    30
}
fn default_rate_limit_per_minute() -> u32 {
    20
}
fn default_cb_threshold() -> u32 {
    3
}
fn default_cb_open_seconds() -> u64 {
    30
}
fn default_embedding_max_workers() -> usize {
    6
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout_secs() -> u64 {
    8
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9090
}

impl Settings {
    /// Load configuration from files and environment, then clamp every
    /// numeric option into its valid range. Mirrors
    /// `paperforge_common::config::AppConfig::load` layer-for-layer.
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let raw: Settings = config.try_deserialize()?;
        Ok(raw.clamped())
    }

    /// Apply the floor/ceiling rules every numeric setting carries.
    /// Exposed separately from `load` so tests can exercise clamping
    /// without touching the filesystem or environment.
    pub fn clamped(mut self) -> Self {
        self.candidate_limit = self.candidate_limit.clamp(1, 100);
        self.max_context_chars = self.max_context_chars.max(200);
        self.max_k = self.max_k.max(1);
        self.paper_embedding_ttl_days = self.paper_embedding_ttl_days.max(1);
        self.rate_limit_per_minute = self.rate_limit_per_minute.max(1);
        self.circuit_breaker_threshold = self.circuit_breaker_threshold.max(1);
        self.circuit_breaker_open_seconds = self.circuit_breaker_open_seconds.max(5);
        self.embedding_max_workers = self.embedding_max_workers.max(1);
        self.paper_embeddings_table_name = self.paper_embeddings_table_name.trim().to_string();
        self.request_rate_limit_table_name =
            self.request_rate_limit_table_name.trim().to_string();
        self
    }

    /// Both keyed stores must be configured, or the request fails closed.
    pub fn is_configured(&self) -> bool {
        !self.paper_embeddings_table_name.is_empty()
            && !self.request_rate_limit_table_name.is_empty()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream_region: default_upstream_region(),
            embed_model_id: default_embed_model_id(),
            upstream_base_url: default_upstream_base_url(),
            upstream_api_key: String::new(),
            candidate_limit: default_candidate_limit(),
            max_context_chars: default_max_context_chars(),
            max_k: default_max_k(),
            paper_embedding_ttl_days: default_ttl_days(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            circuit_breaker_threshold: default_cb_threshold(),
            circuit_breaker_open_seconds: default_cb_open_seconds(),
            paper_embeddings_table_name: String::new(),
            request_rate_limit_table_name: String::new(),
            embedding_max_workers: default_embedding_max_workers(),
            server: ServerSettings::default(),
        }
        .clamped()
    }
}
