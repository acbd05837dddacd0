//! Request entry point: validates the inbound envelope, enforces the
//! rate limit, invokes the ranker, and maps every failure mode to its
//! client-facing error.

use std::sync::Arc;
use std::time::Instant;

use base64::Engine;

use crate::errors::{CoreError, Result};
use crate::models::{ApiEvent, RankOutcome, SearchPayload};
use crate::ranker::{RankError, Ranker};
use crate::rate_limit::RateLimitStore;
use crate::settings::Settings;
use crate::upstream::UpstreamError;

pub struct RequestEntry {
    pub settings: Arc<Settings>,
    pub ranker: Arc<Ranker>,
    pub rate_limiter: Arc<dyn RateLimitStore>,
}

impl RequestEntry {
    pub async fn handle_event(&self, event: &ApiEvent) -> Result<RankOutcome> {
        let started_at = Instant::now();
        let result = self.handle_event_inner(event, started_at).await;

        let outcome_tag = match &result {
            Ok(_) => "success".to_string(),
            Err(err) => err.error_type().to_string(),
        };
        crate::metrics::record_request(&outcome_tag, started_at.elapsed().as_secs_f64());

        result
    }

    async fn handle_event_inner(
        &self,
        event: &ApiEvent,
        started_at: Instant,
    ) -> Result<RankOutcome> {
        let request_id = event.request_context.request_id.clone();
        let source_ip = extract_source_ip(event);

        let payload = parse_body(event)?;
        let (context, k) = validate_payload(
            &payload,
            self.settings.max_context_chars,
            self.settings.max_k,
        )?;

        if !self.settings.is_configured() {
            tracing::error!("paper_search_missing_table_config");
            return Err(CoreError::NotConfigured);
        }

        let allowed = self
            .rate_limiter
            .check(
                &self.settings.request_rate_limit_table_name,
                &source_ip,
                self.settings.rate_limit_per_minute,
            )
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "paper_search_rate_limit_unavailable");
                CoreError::RateLimitInternal
            })?;

        if !allowed {
            return Err(CoreError::RateLimitExceeded);
        }

        let mut outcome = self.ranker.rank(&context, k).await.map_err(map_rank_error)?;

        let latency_ms = started_at.elapsed().as_millis() as i64;
        outcome.meta.request_id = Some(request_id.clone());
        outcome.meta.latency_ms = Some(latency_ms);

        tracing::info!(
            request_id = %request_id,
            source_ip = %source_ip,
            candidates = outcome.meta.candidates_fetched,
            cache_hits = outcome.meta.cached_embeddings_used,
            results = outcome.results.len(),
            latency_ms,
            "paper_search_success"
        );

        Ok(outcome)
    }
}

fn map_rank_error(err: RankError) -> CoreError {
    match err {
        RankError::Upstream(UpstreamError::CircuitOpen) => CoreError::CircuitOpen,
        RankError::Upstream(UpstreamError::RateLimited) => CoreError::UpstreamRateLimited,
        RankError::Upstream(UpstreamError::RequestFailed) => CoreError::UpstreamRequestError,
        other => {
            tracing::error!(error = %other, "paper_search_internal_error");
            CoreError::Internal(other.to_string())
        }
    }
}

fn extract_source_ip(event: &ApiEvent) -> String {
    if let Some(http) = &event.request_context.http {
        if let Some(ip) = &http.source_ip {
            if !ip.is_empty() {
                return ip.clone();
            }
        }
    }
    if let Some(identity) = &event.request_context.identity {
        if let Some(ip) = &identity.source_ip {
            if !ip.is_empty() {
                return ip.clone();
            }
        }
    }
    "unknown".to_string()
}

fn parse_body(event: &ApiEvent) -> Result<SearchPayload> {
    let Some(body) = &event.body else {
        return Ok(SearchPayload { context: None, k: None });
    };

    let decoded = if event.is_base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|_| CoreError::InvalidJson)?;
        String::from_utf8(bytes).map_err(|_| CoreError::InvalidJson)?
    } else {
        body.clone()
    };

    if decoded.trim().is_empty() {
        return Ok(SearchPayload { context: None, k: None });
    }

    serde_json::from_str(&decoded).map_err(|_| CoreError::InvalidJson)
}

fn normalize_context(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validates the decoded payload and returns the normalized context and
/// clamped `k`. Booleans are explicitly rejected for `k` even though a
/// boolean in JSON could otherwise be mistaken for a number.
fn validate_payload(
    payload: &SearchPayload,
    max_context_chars: usize,
    max_k: u32,
) -> Result<(String, u32)> {
    // A missing, null, or non-string `context` all get the same message;
    // only a present string that normalizes to empty is "required" rather
    // than "must be a string".
    let context_str = payload
        .context
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::InvalidPayload("context must be a string.".to_string()))?;

    let normalized = normalize_context(context_str);
    if normalized.is_empty() {
        return Err(CoreError::InvalidPayload("context is required.".to_string()));
    }
    if normalized.chars().count() > max_context_chars {
        return Err(CoreError::InvalidPayload(format!(
            "context must be {max_context_chars} characters or fewer."
        )));
    }

    let requested_k = match &payload.k {
        None => 10i64,
        Some(value) => {
            if value.is_boolean() {
                return Err(CoreError::InvalidPayload("k must be a number.".to_string()));
            }
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f as i64))
                .ok_or_else(|| CoreError::InvalidPayload("k must be a number.".to_string()))?
        }
    };

    let k = requested_k.max(1) as u32;
    let k = k.min(max_k);

    Ok((normalized, k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(context: Option<serde_json::Value>, k: Option<serde_json::Value>) -> SearchPayload {
        SearchPayload { context, k }
    }

    #[test]
    fn empty_context_is_rejected() {
        let p = payload(Some(json!("   ")), None);
        let err = validate_payload(&p, 8000, 10).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPayload(_)));
        assert_eq!(err.to_string(), "context is required.");
    }

    #[test]
    fn missing_context_is_rejected() {
        let p = payload(None, None);
        let err = validate_payload(&p, 8000, 10).unwrap_err();
        assert_eq!(err.to_string(), "context must be a string.");
    }

    #[test]
    fn non_string_context_is_rejected() {
        let p = payload(Some(json!(42)), None);
        let err = validate_payload(&p, 8000, 10).unwrap_err();
        assert_eq!(err.to_string(), "context must be a string.");
    }

    #[test]
    fn context_over_limit_is_rejected() {
        let long = "a".repeat(201);
        let p = payload(Some(json!(long)), None);
        let err = validate_payload(&p, 200, 10).unwrap_err();
        assert_eq!(err.to_string(), "context must be 200 characters or fewer.");
    }

    #[test]
    fn context_at_exact_limit_is_accepted() {
        let exact = "a".repeat(200);
        let p = payload(Some(json!(exact.clone())), None);
        let (context, _) = validate_payload(&p, 200, 10).unwrap();
        assert_eq!(context, exact);
    }

    #[test]
    fn k_defaults_to_ten() {
        let p = payload(Some(json!("hello")), None);
        let (_, k) = validate_payload(&p, 8000, 10).unwrap();
        assert_eq!(k, 10);
    }

    #[test]
    fn k_is_clamped_to_max_k() {
        let p = payload(Some(json!("hello")), Some(json!(999)));
        let (_, k) = validate_payload(&p, 8000, 10).unwrap();
        assert_eq!(k, 10);
    }

    #[test]
    fn non_positive_k_coerces_to_one() {
        let p = payload(Some(json!("hello")), Some(json!(0)));
        let (_, k) = validate_payload(&p, 8000, 10).unwrap();
        assert_eq!(k, 1);

        let p = payload(Some(json!("hello")), Some(json!(-5)));
        let (_, k) = validate_payload(&p, 8000, 10).unwrap();
        assert_eq!(k, 1);
    }

    #[test]
    fn boolean_k_is_rejected() {
        let p = payload(Some(json!("hello")), Some(json!(true)));
        let err = validate_payload(&p, 8000, 10).unwrap_err();
        assert_eq!(err.to_string(), "k must be a number.");
    }

    #[test]
    fn string_k_is_rejected() {
        let p = payload(Some(json!("hello")), Some(json!("10")));
        let err = validate_payload(&p, 8000, 10).unwrap_err();
        assert_eq!(err.to_string(), "k must be a number.");
    }

    #[test]
    fn context_whitespace_is_collapsed() {
        assert_eq!(normalize_context("  hybrid   retrieval \n rank  "), "hybrid retrieval rank");
    }

    #[test]
    fn source_ip_prefers_http_context() {
        let mut event = ApiEvent::default();
        event.request_context.http = Some(crate::models::HttpContext {
            source_ip: Some("1.2.3.4".to_string()),
        });
        event.request_context.identity = Some(crate::models::IdentityContext {
            source_ip: Some("5.6.7.8".to_string()),
        });
        assert_eq!(extract_source_ip(&event), "1.2.3.4");
    }

    #[test]
    fn source_ip_falls_back_to_identity_then_unknown() {
        let mut event = ApiEvent::default();
        event.request_context.identity = Some(crate::models::IdentityContext {
            source_ip: Some("5.6.7.8".to_string()),
        });
        assert_eq!(extract_source_ip(&event), "5.6.7.8");

        let event = ApiEvent::default();
        assert_eq!(extract_source_ip(&event), "unknown");
    }

    #[test]
    fn malformed_json_body_is_invalid_json() {
        let event = ApiEvent {
            body: Some("{not json".to_string()),
            is_base64_encoded: false,
            request_context: Default::default(),
        };
        let err = parse_body(&event).unwrap_err();
        assert!(matches!(err, CoreError::InvalidJson));
    }

    #[test]
    fn base64_body_is_decoded_before_parsing() {
        let raw = r#"{"context":"hello"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let event = ApiEvent {
            body: Some(encoded),
            is_base64_encoded: true,
            request_context: Default::default(),
        };
        let payload = parse_body(&event).unwrap();
        assert_eq!(payload.context.unwrap(), json!("hello"));
    }
}
