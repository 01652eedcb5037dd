//! Periodic idle sweep: staged warnings, then eviction.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rc_domain::config::IdleConfig;
use rc_domain::trace::TraceEvent;
use rc_sessions::lifecycle::warning_message;
use rc_sessions::{evaluate_idle, IdleAction, IdlePolicy};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::runtime::gate::TurnGate;
use crate::sessions::SessionRegistry;

/// What one sweep did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub warned: Vec<(String, i64)>,
    pub closed: Vec<String>,
}

pub struct IdleSessionMonitor {
    registry: Arc<SessionRegistry>,
    gate: Arc<TurnGate>,
    policy: IdlePolicy,
    tick: Duration,
}

impl IdleSessionMonitor {
    pub fn new(registry: Arc<SessionRegistry>, gate: Arc<TurnGate>, cfg: &IdleConfig) -> Self {
        Self {
            registry,
            gate,
            policy: IdlePolicy::from_config(cfg),
            tick: Duration::from_millis(cfg.tick_ms.max(1)),
        }
    }

    /// Evaluate every live session once against `now`.
    ///
    /// Sends never wait on a socket writer. A warning that cannot be queued
    /// is still recorded so it is not retried for the same countdown value.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for seen in self.registry.snapshot() {
            match evaluate_idle(&self.policy, seen.last_active_at, seen.last_warned, now) {
                IdleAction::None => {}
                IdleAction::Warn { remaining_secs } => {
                    let Some(handle) = self.registry.get_handle(&seen.session_id) else {
                        continue;
                    };
                    self.registry.record_warning(&seen.session_id, remaining_secs);
                    let delivered = handle.try_send_text(warning_message(remaining_secs)).is_ok();
                    tracing::debug!(
                        session_id = %seen.session_id,
                        remaining_secs,
                        delivered,
                        "idle warning"
                    );
                    TraceEvent::IdleWarning {
                        session_id: seen.session_id.clone(),
                        remaining_secs,
                        delivered,
                    }
                    .emit();
                    report.warned.push((seen.session_id, remaining_secs));
                }
                IdleAction::Close => {
                    let Some(handle) = self.registry.evict(&seen) else {
                        continue;
                    };
                    handle.close();
                    self.gate.forget(&seen.session_id);
                    tracing::info!(session_id = %seen.session_id, "idle session closed");
                    TraceEvent::SessionClosed {
                        session_id: seen.session_id.clone(),
                        reason: "idle_timeout".into(),
                    }
                    .emit();
                    report.closed.push(seen.session_id);
                }
            }
        }

        report
    }

    /// Run the sweep on a fixed interval until `shutdown` fires.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        self.sweep(Utc::now()).await;
                    }
                }
            }
            tracing::debug!("idle monitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{ConnectionHandle, Outbound};
    use chrono::Duration as ChronoDuration;
    use rc_domain::config::LockScope;
    use tokio::sync::mpsc;

    fn setup() -> (IdleSessionMonitor, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::new());
        let gate = Arc::new(TurnGate::new(LockScope::PerSession));
        let monitor = IdleSessionMonitor::new(registry.clone(), gate, &IdleConfig::default());
        (monitor, registry)
    }

    fn connect(registry: &SessionRegistry, id: &str) -> (mpsc::Receiver<Outbound>, DateTime<Utc>) {
        let (tx, rx) = mpsc::channel(16);
        registry.register(id, ConnectionHandle::new(tx));
        let at = registry
            .snapshot()
            .into_iter()
            .find(|s| s.session_id == id)
            .map(|s| s.last_active_at)
            .unwrap();
        (rx, at)
    }

    fn secs(n: i64) -> ChronoDuration {
        ChronoDuration::seconds(n)
    }

    #[tokio::test]
    async fn warns_once_per_countdown_value() {
        let (monitor, registry) = setup();
        let (mut rx, t0) = connect(&registry, "abc");

        let report = monitor.sweep(t0 + secs(150)).await;
        assert_eq!(report.warned, vec![("abc".to_string(), 30)]);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Text("idle timeout in 30 seconds".into())
        );

        // Same second again: nothing new.
        let report = monitor.sweep(t0 + secs(150)).await;
        assert!(report.warned.is_empty());
        assert!(rx.try_recv().is_err());

        let report = monitor.sweep(t0 + secs(155)).await;
        assert_eq!(report.warned, vec![("abc".to_string(), 25)]);
    }

    #[tokio::test]
    async fn closes_at_exact_timeout() {
        let (monitor, registry) = setup();
        let (mut rx, t0) = connect(&registry, "abc");
        let token = registry.get_handle("abc").unwrap().cancelled().clone();

        let report = monitor.sweep(t0 + secs(180)).await;
        assert_eq!(report.closed, vec!["abc".to_string()]);
        assert!(registry.is_empty());
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn touch_starts_a_new_episode() {
        let (monitor, registry) = setup();
        let (mut rx, t0) = connect(&registry, "abc");

        monitor.sweep(t0 + secs(150)).await;
        assert!(rx.try_recv().is_ok());

        let t1 = t0 + secs(151);
        registry.touch_at("abc", t1);
        assert!(monitor.sweep(t1 + secs(100)).await.warned.is_empty());

        let report = monitor.sweep(t1 + secs(150)).await;
        assert_eq!(report.warned, vec![("abc".to_string(), 30)]);
        assert!(monitor.sweep(t0 + secs(180)).await.closed.is_empty());
    }

    #[tokio::test]
    async fn dead_socket_does_not_stop_the_sweep() {
        let (monitor, registry) = setup();
        let (rx, t0) = connect(&registry, "gone");
        drop(rx);
        let (_rx2, _) = connect(&registry, "live");

        let report = monitor.sweep(t0 + secs(200)).await;
        assert_eq!(report.closed.len(), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn backlogged_client_does_not_stall_other_sessions() {
        let (monitor, registry) = setup();
        let (tx, _stuck_rx) = mpsc::channel(1);
        tx.try_send(Outbound::Text("unread".into())).unwrap();
        registry.register("stuck", ConnectionHandle::new(tx));
        let t0 = registry.snapshot()[0].last_active_at;
        let (mut other_rx, _) = connect(&registry, "zz-other");
        registry.touch_at("zz-other", t0);

        // Warning pass: the stuck queue is full, the other session still hears.
        let report = tokio::time::timeout(Duration::from_secs(2), monitor.sweep(t0 + secs(150)))
            .await
            .expect("warning sweep blocked on a full queue");
        assert_eq!(report.warned.len(), 2);
        assert!(matches!(other_rx.try_recv(), Ok(Outbound::Text(_))));

        let report = tokio::time::timeout(Duration::from_secs(2), monitor.sweep(t0 + secs(200)))
            .await
            .expect("close sweep blocked on a full queue");
        let mut closed = report.closed;
        closed.sort();
        assert_eq!(closed, vec!["stuck".to_string(), "zz-other".to_string()]);
        assert!(registry.is_empty());
    }
}
