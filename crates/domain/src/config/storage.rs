use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat history storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite database file (used when `backend = "sqlite"`).
    #[serde(default = "d_sqlite_path")]
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: d_sqlite_path(),
        }
    }
}

fn d_sqlite_path() -> PathBuf {
    PathBuf::from("./data/chat.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_parses() {
        let cfg: StorageConfig = toml::from_str(r#"backend = "memory""#).unwrap();
        assert_eq!(cfg.backend, StorageBackend::Memory);
        assert_eq!(cfg.sqlite_path, PathBuf::from("./data/chat.db"));
    }
}
