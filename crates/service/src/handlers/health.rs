//! Liveness handler. This service has no database of its own; readiness
//! is the same as liveness because the two DynamoDB tables and the
//! upstream search/embedding endpoints are checked per-request, not
//! pre-flighted here.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy", version: paperforge_core::VERSION })
}
