//! In-memory registry of connected chat sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rc_domain::error::{Error, Result};
use rc_domain::trace::TraceEvent;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A frame queued for a session's socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// How the rest of the process talks to one connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    sink: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(sink: mpsc::Sender<Outbound>) -> Self {
        Self {
            sink,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.sink
            .send(Outbound::Text(text.into()))
            .await
            .map_err(|_| Error::Connection("socket writer closed".into()))
    }

    /// Queue a frame without waiting for room. A full queue is an error.
    pub fn try_send_text(&self, text: impl Into<String>) -> Result<()> {
        self.sink
            .try_send(Outbound::Text(text.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    Error::Connection("socket writer backlogged".into())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    Error::Connection("socket writer closed".into())
                }
            })
    }

    /// Ask the writer to close the socket and stop the reader loop.
    ///
    /// Never waits: if the queue is full the close frame is dropped and the
    /// cancelled token alone ends the connection.
    pub fn close(&self) {
        let _ = self.sink.try_send(Outbound::Close);
        self.cancel.cancel();
    }

    pub fn cancelled(&self) -> &CancellationToken {
        &self.cancel
    }
}

struct SessionEntry {
    connection_id: Uuid,
    handle: ConnectionHandle,
    connected_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
    last_warned: Option<i64>,
}

/// Summary returned by list endpoints and consumed by the idle monitor.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub connection_id: Uuid,
    pub connected_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub last_warned: Option<i64>,
}

/// Thread-safe registry of live sessions. Independent of the turn gate.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Replaces (and cancels) any existing
    /// connection with the same `session_id`.
    pub fn register(&self, session_id: &str, handle: ConnectionHandle) -> Uuid {
        let now = Utc::now();
        let connection_id = Uuid::new_v4();
        let previous = self.sessions.write().insert(
            session_id.to_owned(),
            SessionEntry {
                connection_id,
                handle,
                connected_at: now,
                last_active_at: now,
                last_warned: None,
            },
        );

        let replaced = previous.is_some();
        if let Some(old) = previous {
            old.handle.cancel.cancel();
        }
        tracing::info!(session_id = %session_id, %connection_id, replaced, "session registered");
        TraceEvent::SessionRegistered {
            session_id: session_id.to_owned(),
            connection_id: connection_id.to_string(),
            replaced,
        }
        .emit();
        connection_id
    }

    /// Record activity now. Starts a new idle episode.
    pub fn touch(&self, session_id: &str) -> bool {
        self.touch_at(session_id, Utc::now())
    }

    pub fn touch_at(&self, session_id: &str, at: DateTime<Utc>) -> bool {
        match self.sessions.write().get_mut(session_id) {
            Some(entry) => {
                entry.last_active_at = at;
                entry.last_warned = None;
                true
            }
            None => false,
        }
    }

    /// Remove the session if it still belongs to `connection_id`.
    pub fn unregister(&self, session_id: &str, connection_id: Uuid) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(session_id) {
            Some(entry) if entry.connection_id == connection_id => {
                sessions.remove(session_id);
                tracing::info!(session_id = %session_id, %connection_id, "session unregistered");
                true
            }
            _ => false,
        }
    }

    /// Remove the session unconditionally.
    pub fn remove(&self, session_id: &str) -> Option<ConnectionHandle> {
        self.sessions
            .write()
            .remove(session_id)
            .map(|entry| entry.handle)
    }

    /// Remove the session only if nothing changed since `seen` was taken.
    pub fn evict(&self, seen: &SessionSnapshot) -> Option<ConnectionHandle> {
        let mut sessions = self.sessions.write();
        let unchanged = sessions.get(&seen.session_id).is_some_and(|entry| {
            entry.connection_id == seen.connection_id && entry.last_active_at == seen.last_active_at
        });
        if !unchanged {
            return None;
        }
        sessions.remove(&seen.session_id).map(|entry| entry.handle)
    }

    pub fn record_warning(&self, session_id: &str, remaining_secs: i64) {
        if let Some(entry) = self.sessions.write().get_mut(session_id) {
            entry.last_warned = Some(remaining_secs);
        }
    }

    pub fn get_handle(&self, session_id: &str) -> Option<ConnectionHandle> {
        self.sessions
            .read()
            .get(session_id)
            .map(|entry| entry.handle.clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut out: Vec<SessionSnapshot> = self
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| SessionSnapshot {
                session_id: id.clone(),
                connection_id: entry.connection_id,
                connected_at: entry.connected_at,
                last_active_at: entry.last_active_at,
                last_warned: entry.last_warned,
            })
            .collect();
        out.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        out
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
