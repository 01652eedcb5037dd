//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! `serve` and `run` share [`build_app_state`] so a one-shot CLI run boots
//! exactly the pipeline the server would.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use rc_domain::config::{Config, ConfigSeverity};
use rc_pipeline::{PipelineRunner, PipelineSettings};
use rc_services::create_gateways;
use rc_sessions::create_store;

use crate::api::auth::hash_key;
use crate::runtime::executor::create_executor;
use crate::runtime::gate::TurnGate;
use crate::runtime::idle_monitor::IdleSessionMonitor;
use crate::runtime::orchestrator::SessionOrchestrator;
use crate::sessions::SessionRegistry;
use crate::state::AppState;

/// Period of the lock-map pruning loop.
const LOCK_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Downstream services ──────────────────────────────────────────
    let (retrieval, generation) =
        create_gateways(&config.services).context("creating service gateways")?;

    // ── Chat store ───────────────────────────────────────────────────
    let store = create_store(&config.storage).context("opening chat store")?;

    // ── Pipeline ─────────────────────────────────────────────────────
    let settings = PipelineSettings::from(&config.pipeline);
    tracing::info!(
        threshold = settings.confidence_threshold,
        top_k = settings.top_k,
        "pipeline ready"
    );
    let runner = Arc::new(PipelineRunner::new(retrieval, generation, settings));
    let executor =
        create_executor(&config.pipeline, runner.clone()).context("creating pipeline executor")?;

    // ── Sessions ─────────────────────────────────────────────────────
    let gate = Arc::new(TurnGate::new(config.sessions.lock_scope));
    tracing::info!(scope = ?config.sessions.lock_scope, "turn gate ready");
    let registry = Arc::new(SessionRegistry::new());
    let orchestrator = Arc::new(SessionOrchestrator::new(
        gate.clone(),
        store.clone(),
        executor.clone(),
        config.pipeline.history_limit,
    ));

    // ── Service key (read once, hashed) ──────────────────────────────
    let service_key_hash = match std::env::var(&config.pipeline.api_key_env) {
        Ok(key) if !key.is_empty() => {
            tracing::info!(env = %config.pipeline.api_key_env, "service key authentication enabled");
            Some(hash_key(&key))
        }
        _ => {
            tracing::warn!(
                env = %config.pipeline.api_key_env,
                "service key not set, protected endpoints are open (dev mode)"
            );
            None
        }
    };

    Ok(AppState {
        config,
        registry,
        gate,
        store,
        orchestrator,
        runner,
        executor,
        service_key_hash,
        started_at: Instant::now(),
        shutdown,
    })
}

/// Spawn the idle monitor and periodic lock pruning. Both stop when
/// `state.shutdown` fires.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Idle sweep ───────────────────────────────────────────────────
    IdleSessionMonitor::new(
        state.registry.clone(),
        state.gate.clone(),
        &state.config.sessions.idle,
    )
    .spawn(state.shutdown.clone());

    // ── Session lock pruning ─────────────────────────────────────────
    {
        let gate = state.gate.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LOCK_PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let pruned = gate.prune_idle();
                        if pruned > 0 {
                            tracing::debug!(pruned, "pruned idle session locks");
                        }
                    }
                }
            }
        });
    }
}
