//! Server startup: shared state initialization and background task spawning.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use warden_agent::{AnalyzerRegistry, ContextAssembler, Coordinator, SignalGenerator, StaticReference};
use warden_core::{Config, OperationObserver};
use warden_relay::{MetricsCollector, SharedStore};

use crate::pipeline::analyze_and_publish;
use crate::sessions::SessionRegistry;
use crate::state::AppState;

/// Connect the shared store and build `AppState`.
pub async fn build_app_state(config: Config) -> Arc<AppState> {
    let metrics = MetricsCollector::new();
    let observer: Arc<dyn OperationObserver> = Arc::new(metrics.clone());
    let store = SharedStore::connect(config.store.clone(), observer).await;
    assemble_state(config, store, metrics)
}

/// Wire the coordinator, context assembler and session registry around `store`.
pub fn assemble_state(
    config: Config,
    store: Arc<SharedStore>,
    metrics: MetricsCollector,
) -> Arc<AppState> {
    let registry = Arc::new(AnalyzerRegistry::builtin());
    info!(analyzers = ?registry.names(), "analyzers registered");

    let coordinator = Coordinator::new(registry, &config.coordinator)
        .with_observer(Arc::new(metrics.clone()));
    let assembler = ContextAssembler::new(Arc::new(StaticReference::new()));
    let sessions = Arc::new(SessionRegistry::new(config.sessions.clone()));

    Arc::new(AppState {
        config,
        store,
        coordinator,
        assembler,
        sessions,
        generator: SignalGenerator::new(),
        metrics,
        started_at: Instant::now(),
    })
}

/// Spawn the store supervisor, session fan-out, idle reaper and signal generator.
pub fn spawn_background_tasks(state: &Arc<AppState>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if let Some(handle) = state.store.start() {
        handles.push(handle);
    }

    // Subscribe before anything can publish so no local verdict is missed.
    let mut broadcasts = state.store.subscribe();
    let sessions = Arc::clone(&state.sessions);
    handles.push(tokio::spawn(async move {
        while let Some(message) = broadcasts.next().await {
            let delivered = sessions.deliver(&message);
            tracing::debug!(kind = message.kind(), delivered, "broadcast fanned out");
        }
        warn!("broadcast stream closed; session fan-out stopped");
    }));

    let sessions = Arc::clone(&state.sessions);
    let reap_every = state.config.sessions.keepalive();
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(reap_every);
        loop {
            interval.tick().await;
            sessions.reap_idle();
        }
    }));

    if state.config.generator.enabled {
        handles.push(spawn_generator(Arc::clone(state)));
    } else {
        info!("background signal generator disabled");
    }

    handles
}

/// Analyze one generated signal per interval. A panicking run backs off
/// exponentially: interval * 2^min(failures, 5).
fn spawn_generator(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = state.config.generator.interval();
        info!(interval_secs = interval.as_secs(), "background signal generator started");
        let mut failures: u32 = 0;

        loop {
            let delay = interval * 2u32.pow(failures.min(5));
            tokio::time::sleep(delay).await;

            let run_state = Arc::clone(&state);
            let run = tokio::spawn(async move {
                let signal = run_state.generator.random();
                analyze_and_publish(&run_state, signal).await
            });
            match run.await {
                Ok(verdict) => {
                    failures = 0;
                    tracing::debug!(verdict_id = %verdict.id, "generated signal analyzed");
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(error = %e, failures, "generated signal analysis failed; backing off");
                }
            }
        }
    })
}
