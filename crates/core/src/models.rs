//! Core data types shared across the ranking pipeline.

use serde::{Deserialize, Serialize};

/// One paper as returned by the upstream bibliographic search, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePaper {
    pub paper_id: String,
    pub title: String,
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: String,
    pub url: String,
}

/// A real-valued embedding vector. Dimension is whatever the configured
/// embedding model produces; comparisons are only meaningful between
/// vectors from the same model.
pub type Embedding = Vec<f64>;

/// SHA-256 hex digest over the trimmed title/abstract pair. See
/// [`crate::query::content_hash`].
pub type ContentHash = String;

/// A cached embedding record, keyed externally by `paper_id`.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub content_hash: ContentHash,
    pub embedding: Embedding,
    pub updated_at: String,
    pub ttl: i64,
}

/// A candidate paired with its similarity score, ready for sorting.
#[derive(Debug, Clone)]
pub struct RankedPaper {
    pub paper: CandidatePaper,
    pub score: f64,
}

/// One entry of the response's `results` array.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: String,
    pub url: String,
    pub score: f64,
    pub abstract_snippet: String,
}

/// Metadata attached to a successful response.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RankMeta {
    pub candidates_fetched: usize,
    pub cached_embeddings_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,
}

/// The full ranking outcome, before it is wrapped into an HTTP body.
#[derive(Debug, Clone, Serialize)]
pub struct RankOutcome {
    pub results: Vec<RankedResult>,
    pub meta: RankMeta,
}

/// The invocation-event envelope the request entry point is handed.
/// Mirrors an API-gateway-style event; `paperforge-service` assembles one
/// of these from an incoming HTTP request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEvent {
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default)]
    pub request_context: RequestContext,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub request_id: String,
    pub http: Option<HttpContext>,
    pub identity: Option<IdentityContext>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpContext {
    pub source_ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityContext {
    pub source_ip: Option<String>,
}

/// The decoded request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPayload {
    pub context: Option<serde_json::Value>,
    pub k: Option<serde_json::Value>,
}
