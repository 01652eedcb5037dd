mod observability;
mod pipeline;
mod server;
mod services;
mod sessions;
mod storage;

pub use observability::*;
pub use pipeline::*;
pub use server::*;
pub use services::*;
pub use sessions::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: &str| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message: message.into(),
            });
        };

        if self.server.port == 0 {
            push(ConfigSeverity::Error, "server.port", "port must be greater than 0");
        }
        if self.server.host.is_empty() {
            push(ConfigSeverity::Error, "server.host", "host must not be empty");
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            push(
                ConfigSeverity::Warning,
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            );
        }

        let idle = &self.sessions.idle;
        if idle.idle_timeout_secs == 0 {
            push(
                ConfigSeverity::Error,
                "sessions.idle.idle_timeout_secs",
                "idle timeout must be greater than 0",
            );
        }
        if idle.warning_interval_secs == 0 {
            push(
                ConfigSeverity::Error,
                "sessions.idle.warning_interval_secs",
                "warning interval must be greater than 0",
            );
        }
        if idle.warning_seconds >= idle.idle_timeout_secs && idle.idle_timeout_secs > 0 {
            push(
                ConfigSeverity::Warning,
                "sessions.idle.warning_seconds",
                "warning window covers the whole idle timeout",
            );
        }
        if idle.tick_ms == 0 {
            push(ConfigSeverity::Error, "sessions.idle.tick_ms", "tick must be greater than 0");
        }

        let threshold = self.pipeline.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            push(
                ConfigSeverity::Error,
                "pipeline.confidence_threshold",
                "threshold must be within [0, 1]",
            );
        }
        if self.pipeline.top_k == 0 {
            push(ConfigSeverity::Error, "pipeline.top_k", "top_k must be greater than 0");
        }
        if self.pipeline.mode == PipelineMode::Remote && self.pipeline.remote_url.is_empty() {
            push(
                ConfigSeverity::Error,
                "pipeline.remote_url",
                "remote_url must be set when mode = \"remote\"",
            );
        }

        if self.services.retrieval.base_url.is_empty() {
            push(
                ConfigSeverity::Error,
                "services.retrieval.base_url",
                "base_url must not be empty",
            );
        }
        if self.services.generation.base_url.is_empty() {
            push(
                ConfigSeverity::Error,
                "services.generation.base_url",
                "base_url must not be empty",
            );
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            push(
                ConfigSeverity::Warning,
                "observability.sample_rate",
                "sample_rate outside [0, 1] is clamped",
            );
        }

        if self.storage.backend == StorageBackend::Memory {
            push(
                ConfigSeverity::Warning,
                "storage.backend",
                "in-memory chat store loses history on restart",
            );
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
