use std::sync::Arc;
use std::time::Instant;

use rc_domain::config::Config;
use rc_pipeline::PipelineRunner;
use rc_sessions::ChatStore;
use tokio_util::sync::CancellationToken;

use crate::runtime::executor::PipelineExecutor;
use crate::runtime::gate::TurnGate;
use crate::runtime::orchestrator::SessionOrchestrator;
use crate::sessions::SessionRegistry;

/// Shared application state passed to all handlers.
///
/// Fields are grouped by concern:
/// - **Sessions**: live connections and turn exclusion
/// - **Pipeline**: the in-process runner and the configured executor
/// - **Security**: the service credential digest
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Sessions ──────────────────────────────────────────────────────
    pub registry: Arc<SessionRegistry>,
    pub gate: Arc<TurnGate>,
    pub store: Arc<dyn ChatStore>,
    pub orchestrator: Arc<SessionOrchestrator>,

    // ── Pipeline ──────────────────────────────────────────────────────
    /// Serves `/run_graph`; always local, whatever `pipeline.mode` says.
    pub runner: Arc<PipelineRunner>,
    /// What WebSocket turns run on.
    pub executor: Arc<dyn PipelineExecutor>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 of the `x-api-key` secret. `None` = dev mode (no auth).
    pub service_key_hash: Option<Vec<u8>>,

    // ── Lifecycle ─────────────────────────────────────────────────────
    pub started_at: Instant,
    /// Fired on shutdown; stops background loops.
    pub shutdown: CancellationToken,
}
