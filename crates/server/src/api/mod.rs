//! HTTP endpoint modules.
//!
//! Shared error shape lives here; handlers are re-exported flat for the router.

mod analytics;
mod health;
mod threats;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ── Re-exports ───────────────────────────────────────────────────

pub use analytics::analytics;
pub use health::{config, health, metrics, ready, root};
pub use threats::{create_threat, get_threat, list_threats, trigger_threat};
