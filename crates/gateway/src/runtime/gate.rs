//! Turn exclusion.
//!
//! [`ReaderWriterGate`] is a many-readers/one-writer gate over tokio's
//! `RwLock`. Message processing takes the write side; read-only endpoints
//! (history) take the read side so they never observe a half-persisted
//! turn. [`TurnGate`] picks the scope: one gate per session, or one for the
//! whole process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rc_domain::config::LockScope;
use serde::Serialize;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Point-in-time view of a gate.
///
/// `writer_held` implies `readers == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub readers: usize,
    pub writer_held: bool,
    pub waiting_writers: usize,
}

#[derive(Debug, Default)]
struct Counters {
    readers: AtomicUsize,
    writer: AtomicBool,
    waiting_writers: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct ReaderWriterGate {
    lock: Arc<RwLock<()>>,
    counters: Arc<Counters>,
}

impl ReaderWriterGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access. Waits while a writer holds (or is queued for) the gate.
    pub async fn acquire_read(&self) -> GateReadGuard {
        let guard = self.lock.clone().read_owned().await;
        self.counters.readers.fetch_add(1, Ordering::SeqCst);
        GateReadGuard {
            _guard: guard,
            counters: self.counters.clone(),
        }
    }

    /// Exclusive access. Waits for all readers and any current writer.
    pub async fn acquire_write(&self) -> GateWriteGuard {
        let waiting = Waiting::enter(&self.counters.waiting_writers);
        let guard = self.lock.clone().write_owned().await;
        drop(waiting);
        self.counters.writer.store(true, Ordering::SeqCst);
        GateWriteGuard {
            guard: Some(guard),
            counters: self.counters.clone(),
        }
    }

    pub fn try_acquire_write(&self) -> Option<GateWriteGuard> {
        let guard = self.lock.clone().try_write_owned().ok()?;
        self.counters.writer.store(true, Ordering::SeqCst);
        Some(GateWriteGuard {
            guard: Some(guard),
            counters: self.counters.clone(),
        })
    }

    pub fn status(&self) -> GateStatus {
        GateStatus {
            readers: self.counters.readers.load(Ordering::SeqCst),
            writer_held: self.counters.writer.load(Ordering::SeqCst),
            waiting_writers: self.counters.waiting_writers.load(Ordering::SeqCst),
        }
    }

    /// True when no guard, waiter or other clone references this gate.
    fn is_unused(&self) -> bool {
        Arc::strong_count(&self.lock) == 1
    }
}

/// Counts a queued writer; also undone when the acquire future is dropped.
struct Waiting<'a>(&'a AtomicUsize);

impl<'a> Waiting<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared access; released on drop.
#[derive(Debug)]
pub struct GateReadGuard {
    _guard: OwnedRwLockReadGuard<()>,
    counters: Arc<Counters>,
}

impl Drop for GateReadGuard {
    fn drop(&mut self) {
        // Runs before the inner guard is dropped, so the count never lags
        // behind a writer that is about to get in.
        self.counters.readers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Exclusive access. Released by [`release`](Self::release) or on drop,
/// whichever comes first.
#[derive(Debug)]
pub struct GateWriteGuard {
    guard: Option<OwnedRwLockWriteGuard<()>>,
    counters: Arc<Counters>,
}

impl GateWriteGuard {
    /// Release the gate. A second call is a no-op.
    pub fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            self.counters.writer.store(false, Ordering::SeqCst);
            drop(guard);
        }
    }

    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for GateWriteGuard {
    fn drop(&mut self) {
        self.release();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-session gates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One [`ReaderWriterGate`] per session id, created on first use.
#[derive(Default)]
pub struct SessionLockMap {
    gates: Mutex<HashMap<String, ReaderWriterGate>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate_for(&self, session_id: &str) -> ReaderWriterGate {
        self.gates
            .lock()
            .entry(session_id.to_owned())
            .or_default()
            .clone()
    }

    pub fn status(&self, session_id: &str) -> GateStatus {
        self.gates
            .lock()
            .get(session_id)
            .map(ReaderWriterGate::status)
            .unwrap_or_default()
    }

    /// Drop the session's gate unless a turn or reader still uses it.
    pub fn remove_if_unused(&self, session_id: &str) -> bool {
        let mut gates = self.gates.lock();
        match gates.get(session_id) {
            Some(gate) if gate.is_unused() => {
                gates.remove(session_id);
                true
            }
            _ => false,
        }
    }

    /// Remove every gate nobody references. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let mut gates = self.gates.lock();
        let before = gates.len();
        gates.retain(|_, gate| !gate.is_unused());
        before - gates.len()
    }

    /// Number of tracked sessions (for monitoring).
    pub fn session_count(&self) -> usize {
        self.gates.lock().len()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scope selection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub enum TurnGate {
    Global(ReaderWriterGate),
    PerSession(SessionLockMap),
}

impl TurnGate {
    pub fn new(scope: LockScope) -> Self {
        match scope {
            LockScope::Global => Self::Global(ReaderWriterGate::new()),
            LockScope::PerSession => Self::PerSession(SessionLockMap::new()),
        }
    }

    pub fn scope(&self) -> LockScope {
        match self {
            Self::Global(_) => LockScope::Global,
            Self::PerSession(_) => LockScope::PerSession,
        }
    }

    fn gate(&self, session_id: &str) -> ReaderWriterGate {
        match self {
            Self::Global(gate) => gate.clone(),
            Self::PerSession(map) => map.gate_for(session_id),
        }
    }

    /// Exclusive access for processing one message of `session_id`.
    pub async fn write(&self, session_id: &str) -> GateWriteGuard {
        self.gate(session_id).acquire_write().await
    }

    /// Shared access for a read-only operation on `session_id`.
    pub async fn read(&self, session_id: &str) -> GateReadGuard {
        self.gate(session_id).acquire_read().await
    }

    pub fn status(&self, session_id: &str) -> GateStatus {
        match self {
            Self::Global(gate) => gate.status(),
            Self::PerSession(map) => map.status(session_id),
        }
    }

    /// Forget a disconnected session's gate if nothing holds it.
    pub fn forget(&self, session_id: &str) {
        if let Self::PerSession(map) = self {
            map.remove_if_unused(session_id);
        }
    }

    pub fn prune_idle(&self) -> usize {
        match self {
            Self::Global(_) => 0,
            Self::PerSession(map) => map.prune_idle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn readers_share_the_gate() {
        let gate = ReaderWriterGate::new();
        let r1 = gate.acquire_read().await;
        let r2 = gate.acquire_read().await;
        assert_eq!(gate.status().readers, 2);
        assert!(!gate.status().writer_held);
        assert!(gate.try_acquire_write().is_none());
        drop(r1);
        drop(r2);
        assert_eq!(gate.status().readers, 0);
        assert!(gate.try_acquire_write().is_some());
    }

    #[tokio::test]
    async fn writer_waits_for_last_reader() {
        let gate = ReaderWriterGate::new();
        let reader = gate.acquire_read().await;

        let g = gate.clone();
        let writer = tokio::spawn(async move {
            let _guard = g.acquire_write().await;
            g.status()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished());
        assert_eq!(gate.status().waiting_writers, 1);

        drop(reader);
        let seen = writer.await.unwrap();
        assert!(seen.writer_held);
        assert_eq!(seen.readers, 0);
    }

    #[tokio::test]
    async fn writer_excludes_readers() {
        let gate = ReaderWriterGate::new();
        let mut w = gate.acquire_write().await;
        assert!(gate.status().writer_held);

        let g = gate.clone();
        let reader = tokio::spawn(async move {
            let _r = g.acquire_read().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        w.release();
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let gate = ReaderWriterGate::new();
        let mut w = gate.acquire_write().await;
        w.release();
        assert!(!w.is_held());
        w.release();
        assert!(!gate.status().writer_held);

        // A fresh writer can still get in; the stale guard's drop is inert.
        let w2 = gate.acquire_write().await;
        drop(w);
        assert!(gate.status().writer_held);
        drop(w2);
        assert_eq!(gate.status(), GateStatus::default());
    }

    #[tokio::test]
    async fn drop_releases_on_early_return() {
        async fn failing_turn(gate: &ReaderWriterGate) -> Result<(), &'static str> {
            let _guard = gate.acquire_write().await;
            Err("boom")
        }
        let gate = ReaderWriterGate::new();
        assert!(failing_turn(&gate).await.is_err());
        assert!(gate.try_acquire_write().is_some());
    }

    #[tokio::test]
    async fn per_session_gates_are_independent() {
        let gate = TurnGate::new(LockScope::PerSession);
        let _a = gate.write("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), gate.write("b")).await;
        assert!(b.is_ok(), "different sessions must not block each other");
        assert!(gate.status("a").writer_held);
    }

    #[tokio::test]
    async fn global_gate_spans_sessions() {
        let gate = TurnGate::new(LockScope::Global);
        let _a = gate.write("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), gate.write("b")).await;
        assert!(b.is_err(), "global scope must serialize across sessions");
        // The abandoned waiter is no longer counted.
        assert_eq!(gate.status("b").waiting_writers, 0);
    }

    #[tokio::test]
    async fn default_scope_serializes_across_sessions() {
        let gate = TurnGate::new(rc_domain::config::Config::default().sessions.lock_scope);
        assert_eq!(gate.scope(), LockScope::Global);
        let _a = gate.write("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), gate.write("b")).await;
        assert!(b.is_err(), "default scope lets two sessions run at once");
    }

    #[tokio::test]
    async fn held_gates_survive_pruning() {
        let map = SessionLockMap::new();
        let held = map.gate_for("busy");
        let _w = held.acquire_write().await;
        drop(held);
        map.gate_for("idle");

        assert_eq!(map.prune_idle(), 1);
        assert_eq!(map.session_count(), 1);
        assert!(!map.remove_if_unused("busy"));
    }
}
