//! Service info, liveness, readiness, metrics and config endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use warden_relay::{MetricsResponse, StoreMode};

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub instance_id: Uuid,
    pub endpoints: Vec<&'static str>,
}

pub async fn root(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "warden",
        version: VERSION,
        instance_id: state.store.instance_id(),
        endpoints: vec![
            "/health",
            "/ready",
            "/metrics",
            "/config",
            "/api/threats",
            "/api/threats/trigger",
            "/api/analytics",
            "/ws",
        ],
    })
}

// ── Health & Readiness ────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub analyzers: Vec<String>,
    pub store_mode: StoreMode,
    pub store_backend: &'static str,
    pub active_sessions: usize,
}

/// 503 only when nothing could analyze a signal; a degraded store still serves.
pub async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let analyzers = state.coordinator.registry().names();
    let ready = !analyzers.is_empty();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready,
            analyzers,
            store_mode: state.store.mode(),
            store_backend: state.store.backend_kind(),
            active_sessions: state.sessions.len(),
        }),
    )
}

// ── Metrics & Config ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct MetricsBody {
    #[serde(flatten)]
    pub operations: MetricsResponse,
    pub store_mode: StoreMode,
    pub active_sessions: usize,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsBody> {
    Json(MetricsBody {
        operations: state.metrics.snapshot(),
        store_mode: state.store.mode(),
        active_sessions: state.sessions.len(),
    })
}

pub async fn config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.config.redacted_summary())
}
