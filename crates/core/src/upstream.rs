//! Upstream bibliographic search client. Issues one candidate search per
//! request, gated by a circuit breaker, and normalizes the raw response
//! into [`CandidatePaper`]s. Carries no retry logic by design (see
//! `crate::embeddings` for the same rationale).

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreaker;
use crate::models::CandidatePaper;

const FIELDS: &str = "paperId,title,abstract,authors,year,venue,url";

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Semantic Scholar is temporarily throttled. Please retry shortly.")]
    CircuitOpen,
    #[error("Semantic Scholar is rate limiting requests right now. Please retry shortly.")]
    RateLimited,
    #[error("Semantic Scholar request failed. Please retry.")]
    RequestFailed,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search_papers(&self, query: &str) -> Result<Vec<CandidatePaper>, UpstreamError>;
}

pub struct SemanticScholarClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    candidate_limit: u32,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl SemanticScholarClient {
    pub fn new(
        base_url: String,
        api_key: String,
        candidate_limit: u32,
        timeout: Duration,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout.max(Duration::from_secs(1)))
            .build()
            .expect("upstream http client builds with static config");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            candidate_limit: candidate_limit.clamp(1, 100),
            circuit_breaker,
        }
    }
}

#[async_trait]
impl SearchClient for SemanticScholarClient {
    async fn search_papers(&self, query: &str) -> Result<Vec<CandidatePaper>, UpstreamError> {
        if !self.circuit_breaker.allow() {
            crate::metrics::record_upstream("circuit_open");
            return Err(UpstreamError::CircuitOpen);
        }

        let url = format!("{}/graph/v1/paper/search", self.base_url);
        let mut request = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("limit", &self.candidate_limit.to_string()),
                ("fields", FIELDS),
            ])
            .header("accept", "application/json")
            .header("user-agent", "paperforge-paper-search/1.0");

        if !self.api_key.is_empty() {
            request = request.header("x-api-key", &self.api_key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(_) => {
                self.circuit_breaker.record_failure();
                crate::metrics::record_upstream("request_failed");
                return Err(UpstreamError::RequestFailed);
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return if status.as_u16() == 429 || status.is_server_error() {
                crate::metrics::record_upstream("rate_limited");
                Err(UpstreamError::RateLimited)
            } else {
                crate::metrics::record_upstream("request_failed");
                Err(UpstreamError::RequestFailed)
            };
        }

        let payload = match response.json::<SearchResponse>().await {
            Ok(payload) => payload,
            Err(_) => {
                self.circuit_breaker.record_failure();
                crate::metrics::record_upstream("request_failed");
                return Err(UpstreamError::RequestFailed);
            }
        };

        self.circuit_breaker.record_success();
        crate::metrics::record_upstream("success");

        let candidates: Vec<CandidatePaper> = payload
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(normalize_candidate)
            .collect();

        tracing::info!(count = candidates.len(), "semantic_scholar_candidates");
        Ok(candidates)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    data: Option<Vec<RawCandidate>>,
}

#[derive(Deserialize)]
struct RawCandidate {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    authors: Option<Vec<RawAuthor>>,
    year: Option<serde_json::Value>,
    venue: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct RawAuthor {
    name: Option<String>,
}

fn normalize_candidate(raw: RawCandidate) -> Option<CandidatePaper> {
    let paper_id = raw.paper_id?.trim().to_string();
    let title = raw.title?.trim().to_string();
    if paper_id.is_empty() || title.is_empty() {
        return None;
    }

    let authors = raw
        .authors
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| a.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

    // `as_i64` only succeeds for a value serde_json parsed as an integer,
    // so a JSON float like `2021.5` is rejected rather than truncated -
    // matching the source system's refusal to coerce a float or string year.
    let year = raw.year.and_then(|v| v.as_i64()).map(|v| v as i32);

    Some(CandidatePaper {
        paper_id,
        title,
        abstract_text: raw.abstract_text.unwrap_or_default().trim().to_string(),
        authors,
        year,
        venue: raw.venue.unwrap_or_default().trim().to_string(),
        url: raw.url.unwrap_or_default().trim().to_string(),
    })
}
