//! Wraps [`paperforge_core::errors::CoreError`] into an axum response.
//!
//! The wire body is exactly the flat `{"message": "..."}` shape the
//! ranking contract specifies; the richer per-field error envelopes other
//! PaperForge services use are not part of this service's contract.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use paperforge_core::errors::CoreError;
use serde::Serialize;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.0.is_server_error() {
            tracing::error!(error_type = self.0.error_type(), error = %self.0, "paper_search_error");
        } else {
            tracing::warn!(error_type = self.0.error_type(), error = %self.0, "paper_search_rejected");
        }

        (status, Json(ErrorBody { message: self.0.to_string() })).into_response()
    }
}
