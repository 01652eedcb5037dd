//! Session-scoped state that outlives a single pipeline run: the chat
//! history store and the idle-timeout lifecycle policy.

pub mod lifecycle;
pub mod sqlite;
pub mod store;

pub use lifecycle::{evaluate_idle, IdleAction, IdlePolicy};
pub use sqlite::SqliteChatStore;
pub use store::{ChatRole, ChatStore, InMemoryChatStore};

use std::sync::Arc;

use rc_domain::config::{StorageBackend, StorageConfig};
use rc_domain::error::Result;

/// Build the configured [`ChatStore`] implementation.
pub fn create_store(cfg: &StorageConfig) -> Result<Arc<dyn ChatStore>> {
    match cfg.backend {
        StorageBackend::Sqlite => {
            let store = SqliteChatStore::open(&cfg.sqlite_path)?;
            tracing::info!(path = %cfg.sqlite_path.display(), "sqlite chat store ready");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory chat store; history is lost on restart");
            Ok(Arc::new(InMemoryChatStore::new()))
        }
    }
}
