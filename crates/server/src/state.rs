use std::sync::Arc;
use std::time::Instant;

use warden_agent::{ContextAssembler, Coordinator, SignalGenerator};
use warden_core::Config;
use warden_relay::{MetricsCollector, SharedStore};

use crate::sessions::SessionRegistry;

/// Everything request handlers and background tasks share.
pub struct AppState {
    pub config: Config,
    pub store: Arc<SharedStore>,
    pub coordinator: Coordinator,
    pub assembler: ContextAssembler,
    pub sessions: Arc<SessionRegistry>,
    pub generator: SignalGenerator,
    pub metrics: MetricsCollector,
    pub started_at: Instant,
}
