use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use warden_core::DashboardMetrics;

use crate::state::AppState;

/// Dashboard aggregates over the retained verdicts plus the all-time total.
pub async fn analytics(State(state): State<Arc<AppState>>) -> Json<DashboardMetrics> {
    let total = state.store.total_count().await;
    let retained = state.store.list(state.config.store.max_retained, 0).await;
    Json(DashboardMetrics::from_verdicts(total, &retained))
}
