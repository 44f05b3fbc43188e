//! Verdict listing, lookup, creation and on-demand triggering.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use warden_agent::Scenario;
use warden_core::{Signal, SignalCategory, Verdict};
use warden_relay::StoreMode;

use super::{api_error, ApiError};
use crate::pipeline::analyze_and_publish;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

// ── List & Get ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Serialize)]
pub struct ThreatPage {
    pub threats: Vec<Verdict>,
    pub limit: usize,
    pub offset: usize,
    pub store_mode: StoreMode,
}

pub async fn list_threats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ThreatPage>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("limit must be between 1 and {MAX_LIMIT}"),
        ));
    }
    let offset = params.offset.unwrap_or(0);
    let threats = state.store.list(limit, offset).await;
    Ok(Json(ThreatPage {
        threats,
        limit,
        offset,
        store_mode: state.store.mode(),
    }))
}

pub async fn get_threat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Verdict>, ApiError> {
    let not_found = || api_error(StatusCode::NOT_FOUND, "Threat not found");
    let id = Uuid::parse_str(&id).map_err(|_| not_found())?;
    state.store.get(id).await.map(Json).ok_or_else(not_found)
}

// ── Create ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateThreatRequest {
    pub category: String,
    pub subject: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

pub async fn create_threat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateThreatRequest>,
) -> Result<Json<Verdict>, ApiError> {
    let signal = Signal::from_parts(&req.category, &req.subject, req.metadata).map_err(|e| {
        warn!(error = %e, "rejected signal");
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    })?;
    Ok(Json(analyze_and_publish(&state, signal).await))
}

// ── Trigger ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default, alias = "threat_type")]
    pub category: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
}

/// Generate a signal (scenario beats category beats random) and analyze it.
/// An empty body triggers a random signal.
pub async fn trigger_threat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Verdict>, ApiError> {
    let req: TriggerRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid request body: {e}")))?
    };

    let bad_request = |e: warden_core::WardenError| api_error(StatusCode::BAD_REQUEST, e.to_string());
    let signal = if let Some(name) = req.scenario.as_deref() {
        let scenario: Scenario = name.parse().map_err(bad_request)?;
        state.generator.scenario(scenario)
    } else if let Some(name) = req.category.as_deref() {
        let category: SignalCategory = name.parse().map_err(bad_request)?;
        state.generator.for_category(category)
    } else {
        state.generator.random()
    };

    Ok(Json(analyze_and_publish(&state, signal).await))
}
