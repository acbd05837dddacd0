//! The one route this service exposes: POST /v2/search.
//!
//! Assembles a [`paperforge_core::models::ApiEvent`] from the incoming
//! HTTP request - a fresh UUID as the request id, the client's address as
//! `requestContext.http.sourceIp`, and the raw body verbatim - so
//! `RequestEntry::handle_event` is exercised through a real transport
//! without being coupled to any one host at the type level.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;

use paperforge_core::models::{ApiEvent, HttpContext, RankOutcome, RequestContext};

use crate::error::ApiError;
use crate::AppState;

pub async fn search(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: String,
) -> Result<Json<RankOutcome>, ApiError> {
    let event = ApiEvent {
        body: Some(body),
        is_base64_encoded: false,
        request_context: RequestContext {
            request_id: uuid::Uuid::new_v4().to_string(),
            http: Some(HttpContext { source_ip: Some(addr.ip().to_string()) }),
            identity: None,
        },
    };

    let outcome = state.request_entry.handle_event(&event).await?;
    Ok(Json(outcome))
}
