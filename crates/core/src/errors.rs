//! Error taxonomy for the ranking pipeline.
//!
//! Every variant maps to exactly one client-facing HTTP status and a
//! fixed message theme. Unlike `paperforge-common::errors::AppError`,
//! the wire body here is the flat `{"message": "..."}` shape the ranking
//! contract specifies, not the richer coded envelope the rest of the
//! workspace uses.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid JSON payload.")]
    InvalidJson,

    #[error("{0}")]
    InvalidPayload(String),

    #[error("Service is not configured.")]
    NotConfigured,

    #[error("Rate limiting service is unavailable.")]
    RateLimitInternal,

    #[error("Too many requests. Please try again shortly.")]
    RateLimitExceeded,

    #[error("Semantic Scholar is temporarily throttled. Please retry shortly.")]
    CircuitOpen,

    #[error("Semantic Scholar is rate limiting requests right now. Please retry shortly.")]
    UpstreamRateLimited,

    #[error("Semantic Scholar request failed. Please retry.")]
    UpstreamRequestError,

    #[error("Paper search is temporarily unavailable. Please try again.")]
    Internal(String),
}

impl CoreError {
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::InvalidJson | CoreError::InvalidPayload(_) => 400,
            CoreError::NotConfigured
            | CoreError::RateLimitInternal
            | CoreError::Internal(_) => 500,
            CoreError::RateLimitExceeded => 429,
            CoreError::CircuitOpen | CoreError::UpstreamRateLimited => 503,
            CoreError::UpstreamRequestError => 502,
        }
    }

    /// Short tag for structured logging; never shown to the client.
    pub fn error_type(&self) -> &'static str {
        match self {
            CoreError::InvalidJson => "invalid_json",
            CoreError::InvalidPayload(_) => "invalid_payload",
            CoreError::NotConfigured => "not_configured",
            CoreError::RateLimitInternal => "rate_limit_internal",
            CoreError::RateLimitExceeded => "rate_limit_exceeded",
            CoreError::CircuitOpen => "circuit_open",
            CoreError::UpstreamRateLimited => "upstream_rate_limited",
            CoreError::UpstreamRequestError => "upstream_request_error",
            CoreError::Internal(_) => "internal",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping_matches_error_taxonomy() {
        assert_eq!(CoreError::InvalidJson.status_code(), 400);
        assert_eq!(CoreError::InvalidPayload("x".into()).status_code(), 400);
        assert_eq!(CoreError::NotConfigured.status_code(), 500);
        assert_eq!(CoreError::RateLimitInternal.status_code(), 500);
        assert_eq!(CoreError::RateLimitExceeded.status_code(), 429);
        assert_eq!(CoreError::CircuitOpen.status_code(), 503);
        assert_eq!(CoreError::UpstreamRateLimited.status_code(), 503);
        assert_eq!(CoreError::UpstreamRequestError.status_code(), 502);
        assert_eq!(CoreError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn server_errors_are_5xx_only() {
        assert!(CoreError::NotConfigured.is_server_error());
        assert!(!CoreError::RateLimitExceeded.is_server_error());
        assert!(!CoreError::InvalidJson.is_server_error());
    }
}
