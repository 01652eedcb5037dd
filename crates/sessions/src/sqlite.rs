//! Durable chat store backed by SQLite.
//!
//! A single connection behind a mutex; every call runs on the blocking
//! pool so the tokio workers never wait on disk.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use rc_domain::error::{Error, Result};

use crate::store::{history_line, trace_persisted, ChatRole, ChatStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS chat_logs (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id  TEXT NOT NULL,
        role        TEXT NOT NULL,
        message     TEXT NOT NULL,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
    CREATE INDEX IF NOT EXISTS idx_chat_logs_session ON chat_logs (session_id, id);
";

fn to_storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

#[derive(Clone)]
pub struct SqliteChatStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChatStore {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(to_storage_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(to_storage_err)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(to_storage_err)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(to_storage_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&conn.lock()).map_err(to_storage_err))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn insert_chat(&self, session_id: &str, text: &str, role: ChatRole) -> Result<()> {
        let (sid, body) = (session_id.to_owned(), text.to_owned());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO chat_logs (session_id, role, message) VALUES (?1, ?2, ?3)",
                params![sid, role.as_str(), body],
            )
            .map(|_| ())
        })
        .await?;
        trace_persisted(session_id, role, text);
        Ok(())
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<String>> {
        let sid = session_id.to_owned();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut lines = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT role, message FROM chat_logs
                     WHERE session_id = ?1
                     ORDER BY id DESC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![sid, limit], |row| {
                    let role: String = row.get(0)?;
                    let message: String = row.get(1)?;
                    Ok(history_line(&role, &message))
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        lines.reverse();
        Ok(lines)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_in_memory() {
        let store = SqliteChatStore::open_in_memory().unwrap();
        store.insert_chat("s", "hello", ChatRole::User).await.unwrap();
        store.insert_chat("s", "hi there", ChatRole::Bot).await.unwrap();
        store.insert_chat("s", "hi", ChatRole::User).await.unwrap();

        let history = store.get_history("s", 10).await.unwrap();
        assert_eq!(history, vec!["User: hello", "Bot: hi there", "User: hi"]);
    }

    #[tokio::test]
    async fn limit_keeps_most_recent_oldest_first() {
        let store = SqliteChatStore::open_in_memory().unwrap();
        for i in 0..6 {
            store
                .insert_chat("s", &format!("m{i}"), ChatRole::User)
                .await
                .unwrap();
        }
        store.insert_chat("other", "x", ChatRole::User).await.unwrap();

        let history = store.get_history("s", 2).await.unwrap();
        assert_eq!(history, vec!["User: m4", "User: m5"]);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.db");

        {
            let store = SqliteChatStore::open(&path).unwrap();
            store.insert_chat("abc", "persist me", ChatRole::User).await.unwrap();
        }

        let store = SqliteChatStore::open(&path).unwrap();
        assert_eq!(
            store.get_history("abc", 10).await.unwrap(),
            vec!["User: persist me"]
        );
        assert_eq!(store.backend(), "sqlite");
    }
}
