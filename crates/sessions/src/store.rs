//! Chat history store.
//!
//! Every user message and bot reply is appended as one turn. History is
//! read back as `"Role: text"` lines, oldest first, capped to the most
//! recent `limit` turns.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use rc_domain::error::Result;
use rc_domain::trace::TraceEvent;
use serde::{Deserialize, Serialize};

/// Author of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Bot,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Bot => "Bot",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format one history line.
pub fn history_line(role: &str, text: &str) -> String {
    format!("{role}: {text}")
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append one turn to the session's history.
    async fn insert_chat(&self, session_id: &str, text: &str, role: ChatRole) -> Result<()>;

    /// The most recent `limit` turns, oldest first.
    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<String>>;

    /// Short backend name for logs and status output.
    fn backend(&self) -> &'static str;
}

pub(crate) fn trace_persisted(session_id: &str, role: ChatRole, text: &str) {
    TraceEvent::ChatPersisted {
        session_id: session_id.to_owned(),
        role: role.as_str().to_owned(),
        chars: text.chars().count(),
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Volatile store used when no durable backend is configured, and in tests.
#[derive(Default)]
pub struct InMemoryChatStore {
    turns: RwLock<HashMap<String, Vec<(ChatRole, String)>>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored turns across all sessions.
    pub fn len(&self) -> usize {
        self.turns.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn insert_chat(&self, session_id: &str, text: &str, role: ChatRole) -> Result<()> {
        self.turns
            .write()
            .entry(session_id.to_owned())
            .or_default()
            .push((role, text.to_owned()));
        trace_persisted(session_id, role, text);
        Ok(())
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<String>> {
        let turns = self.turns.read();
        let Some(entries) = turns.get(session_id) else {
            return Ok(Vec::new());
        };
        let skip = entries.len().saturating_sub(limit);
        Ok(entries[skip..]
            .iter()
            .map(|(role, text)| history_line(role.as_str(), text))
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_history_ends_with_turn() {
        let store = InMemoryChatStore::new();
        store.insert_chat("s", "hi", ChatRole::User).await.unwrap();
        let history = store.get_history("s", 10).await.unwrap();
        assert_eq!(history.last().map(String::as_str), Some("User: hi"));
    }

    #[tokio::test]
    async fn history_is_oldest_first_and_truncated() {
        let store = InMemoryChatStore::new();
        for i in 0..5 {
            store
                .insert_chat("s", &format!("m{i}"), ChatRole::User)
                .await
                .unwrap();
        }
        let history = store.get_history("s", 3).await.unwrap();
        assert_eq!(history, vec!["User: m2", "User: m3", "User: m4"]);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemoryChatStore::new();
        store.insert_chat("a", "one", ChatRole::User).await.unwrap();
        store.insert_chat("b", "two", ChatRole::Bot).await.unwrap();
        assert_eq!(store.get_history("a", 10).await.unwrap(), vec!["User: one"]);
        assert_eq!(store.get_history("b", 10).await.unwrap(), vec!["Bot: two"]);
        assert!(store.get_history("c", 10).await.unwrap().is_empty());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn zero_limit_is_empty() {
        let store = InMemoryChatStore::new();
        store.insert_chat("s", "hi", ChatRole::User).await.unwrap();
        assert!(store.get_history("s", 0).await.unwrap().is_empty());
    }
}
