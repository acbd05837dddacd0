//! End-to-end coverage of the request entry point: validation, rate
//! limiting, ranking, and error-to-status mapping, wired together the way
//! `paperforge-service` wires the real DynamoDB- and HTTP-backed
//! implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use paperforge_core::cache::{CacheError, EmbeddingCacheStore};
use paperforge_core::embeddings::EmbeddingClient;
use paperforge_core::embeddings::EmbeddingError;
use paperforge_core::errors::CoreError;
use paperforge_core::models::{ApiEvent, CandidatePaper, HttpContext, RequestContext};
use paperforge_core::ranker::Ranker;
use paperforge_core::rate_limit::{RateLimitError, RateLimitStore};
use paperforge_core::request::RequestEntry;
use paperforge_core::settings::Settings;
use paperforge_core::upstream::{SearchClient, UpstreamError};

struct FixedSearchClient(Vec<CandidatePaper>);

#[async_trait]
impl SearchClient for FixedSearchClient {
    async fn search_papers(&self, _query: &str) -> Result<Vec<CandidatePaper>, UpstreamError> {
        Ok(self.0.clone())
    }
}

struct FailingSearchClient(UpstreamError);

#[async_trait]
impl SearchClient for FailingSearchClient {
    async fn search_papers(&self, _query: &str) -> Result<Vec<CandidatePaper>, UpstreamError> {
        Err(match &self.0 {
            UpstreamError::CircuitOpen => UpstreamError::CircuitOpen,
            UpstreamError::RateLimited => UpstreamError::RateLimited,
            UpstreamError::RequestFailed => UpstreamError::RequestFailed,
        })
    }
}

struct FixedEmbeddingClient {
    query_vector: Vec<f64>,
    by_text: HashMap<String, Vec<f64>>,
}

#[async_trait]
impl EmbeddingClient for FixedEmbeddingClient {
    async fn embed_one(&self, text: &str, _normalize: bool) -> Result<Vec<f64>, EmbeddingError> {
        Ok(self.by_text.get(text).cloned().unwrap_or_else(|| self.query_vector.clone()))
    }
}

#[derive(Default)]
struct InMemoryCache {
    records: Mutex<HashMap<String, (String, Vec<f64>)>>,
}

#[async_trait]
impl EmbeddingCacheStore for InMemoryCache {
    async fn get(
        &self,
        _table_name: &str,
        paper_id: &str,
        content_hash: &str,
    ) -> Result<(Option<Vec<f64>>, bool), CacheError> {
        let records = self.records.lock().unwrap();
        match records.get(paper_id) {
            Some((hash, vector)) if hash == content_hash => Ok((Some(vector.clone()), true)),
            _ => Ok((None, false)),
        }
    }

    async fn put(
        &self,
        _table_name: &str,
        paper_id: &str,
        content_hash: &str,
        embedding: &Vec<f64>,
        _ttl_days: i64,
    ) -> Result<(), CacheError> {
        self.records
            .lock()
            .unwrap()
            .insert(paper_id.to_string(), (content_hash.to_string(), embedding.clone()));
        Ok(())
    }
}

/// A rate limiter fake that allows exactly `limit` calls before refusing,
/// mirroring the real atomic-conditional-update semantics without a live
/// DynamoDB table.
struct CountingRateLimiter {
    limit: u32,
    count: AtomicU32,
}

#[async_trait]
impl RateLimitStore for CountingRateLimiter {
    async fn check(&self, _table: &str, _ip: &str, _limit: u32) -> Result<bool, RateLimitError> {
        let previous = self.count.fetch_add(1, Ordering::SeqCst);
        Ok(previous < self.limit)
    }
}

fn configured_settings() -> Settings {
    let mut settings = Settings::default();
    settings.paper_embeddings_table_name = "PaperEmbeddings".to_string();
    settings.request_rate_limit_table_name = "RequestRateLimit".to_string();
    settings
}

fn candidate(id: &str, title: &str) -> CandidatePaper {
    CandidatePaper {
        paper_id: id.to_string(),
        title: title.to_string(),
        abstract_text: String::new(),
        authors: vec![],
        year: None,
        venue: String::new(),
        url: String::new(),
    }
}

fn event_with_body(body: &str) -> ApiEvent {
    ApiEvent {
        body: Some(body.to_string()),
        is_base64_encoded: false,
        request_context: RequestContext {
            request_id: "req-1".to_string(),
            http: Some(HttpContext { source_ip: Some("203.0.113.9".to_string()) }),
            identity: None,
        },
    }
}

fn entry_with(
    settings: Settings,
    search: impl SearchClient + 'static,
    rate_limiter: impl RateLimitStore + 'static,
) -> RequestEntry {
    let settings = Arc::new(settings);
    let mut by_text = HashMap::new();
    by_text.insert("paper-1".to_string(), vec![1.0, 0.0]);
    by_text.insert("paper-2".to_string(), vec![0.0, 1.0]);

    let ranker = Ranker {
        settings: settings.clone(),
        search_client: Arc::new(search),
        embedding_client: Arc::new(FixedEmbeddingClient {
            query_vector: vec![1.0, 0.0],
            by_text,
        }),
        cache: Arc::new(InMemoryCache::default()),
    };

    RequestEntry {
        settings,
        ranker: Arc::new(ranker),
        rate_limiter: Arc::new(rate_limiter),
    }
}

#[tokio::test]
async fn happy_path_cold_cache_ranks_papers() {
    let candidates = vec![candidate("paper-1", "paper-1"), candidate("paper-2", "paper-2")];
    let entry = entry_with(
        configured_settings(),
        FixedSearchClient(candidates),
        CountingRateLimiter { limit: 20, count: AtomicU32::new(0) },
    );

    let event = event_with_body(r#"{"context":"hybrid retrieval rank fusion","k":10}"#);
    let outcome = entry.handle_event(&event).await.unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].paper_id, "paper-1");
    assert_eq!(outcome.results[0].score, 1.0);
    assert_eq!(outcome.results[1].paper_id, "paper-2");
    assert_eq!(outcome.results[1].score, 0.0);
    assert_eq!(outcome.meta.candidates_fetched, 2);
    assert_eq!(outcome.meta.cached_embeddings_used, 0);
    assert_eq!(outcome.meta.request_id.as_deref(), Some("req-1"));
    assert!(outcome.meta.latency_ms.is_some());
}

#[tokio::test]
async fn empty_context_is_rejected_before_any_collaborator_call() {
    let entry = entry_with(
        configured_settings(),
        FixedSearchClient(vec![]),
        CountingRateLimiter { limit: 20, count: AtomicU32::new(0) },
    );

    let event = event_with_body(r#"{"context":"   ","k":10}"#);
    let err = entry.handle_event(&event).await.unwrap_err();

    assert!(matches!(err, CoreError::InvalidPayload(_)));
    assert_eq!(err.to_string(), "context is required.");
}

#[tokio::test]
async fn twenty_first_call_in_a_minute_is_rate_limited() {
    let entry = entry_with(
        configured_settings(),
        FixedSearchClient(vec![]),
        CountingRateLimiter { limit: 20, count: AtomicU32::new(0) },
    );

    let event = event_with_body(r#"{"context":"hybrid retrieval","k":1}"#);
    for _ in 0..20 {
        entry.handle_event(&event).await.unwrap();
    }
    let err = entry.handle_event(&event).await.unwrap_err();
    assert!(matches!(err, CoreError::RateLimitExceeded));
}

#[tokio::test]
async fn circuit_open_short_circuits_to_a_503_equivalent() {
    let entry = entry_with(
        configured_settings(),
        FailingSearchClient(UpstreamError::CircuitOpen),
        CountingRateLimiter { limit: 20, count: AtomicU32::new(0) },
    );

    let event = event_with_body(r#"{"context":"hybrid retrieval","k":1}"#);
    let err = entry.handle_event(&event).await.unwrap_err();
    assert!(matches!(err, CoreError::CircuitOpen));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn upstream_429_maps_to_rate_limited_not_generic_failure() {
    let entry = entry_with(
        configured_settings(),
        FailingSearchClient(UpstreamError::RateLimited),
        CountingRateLimiter { limit: 20, count: AtomicU32::new(0) },
    );

    let event = event_with_body(r#"{"context":"hybrid retrieval","k":1}"#);
    let err = entry.handle_event(&event).await.unwrap_err();
    assert!(matches!(err, CoreError::UpstreamRateLimited));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn missing_table_configuration_fails_closed() {
    let entry = entry_with(
        Settings::default(),
        FixedSearchClient(vec![]),
        CountingRateLimiter { limit: 20, count: AtomicU32::new(0) },
    );

    let event = event_with_body(r#"{"context":"hybrid retrieval","k":1}"#);
    let err = entry.handle_event(&event).await.unwrap_err();
    assert!(matches!(err, CoreError::NotConfigured));
}

#[tokio::test]
async fn k_greater_than_max_k_is_clamped() {
    let candidates = vec![candidate("paper-1", "paper-1"), candidate("paper-2", "paper-2")];
    let entry = entry_with(
        configured_settings(),
        FixedSearchClient(candidates),
        CountingRateLimiter { limit: 20, count: AtomicU32::new(0) },
    );

    let event = event_with_body(r#"{"context":"hybrid retrieval","k":999}"#);
    let outcome = entry.handle_event(&event).await.unwrap();
    assert!(outcome.results.len() <= entry.settings.max_k as usize);
}
