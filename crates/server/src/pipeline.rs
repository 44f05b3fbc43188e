//! Signal → verdict → store → broadcast.

use tracing::info;

use warden_core::{Signal, Verdict};

use crate::state::AppState;

/// Analyze one signal, persist the verdict and announce it to the fleet.
///
/// Never fails: analyzer problems end up as degraded opinions and store
/// problems switch the store to its local fallback.
pub async fn analyze_and_publish(state: &AppState, signal: Signal) -> Verdict {
    let contexts = state
        .assembler
        .assemble(&signal, state.coordinator.registry());
    let verdict = state.coordinator.run(&signal, &contexts).await;

    state.store.put(&verdict).await;
    state.store.publish(&verdict).await;

    info!(
        verdict_id = %verdict.id,
        severity = %verdict.severity,
        needs_review = verdict.needs_review,
        store_mode = state.store.mode().as_str(),
        "verdict stored and broadcast"
    );
    verdict
}
