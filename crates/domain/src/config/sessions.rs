use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions: turn exclusion + idle lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionsConfig {
    /// Which sessions share a turn gate.
    #[serde(default)]
    pub lock_scope: LockScope,

    /// Idle-timeout countdown and warnings.
    #[serde(default)]
    pub idle: IdleConfig,
}

/// Scope of the reader/writer gate that serializes message processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// One process-wide gate: at most one turn in flight across all sessions.
    #[default]
    Global,
    /// Opt-in. One gate per session id: turns are ordered within a session
    /// and run in parallel across sessions.
    PerSession,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleConfig {
    /// Seconds of inactivity before the connection is closed.
    #[serde(default = "d_180")]
    pub idle_timeout_secs: u64,
    /// Countdown window (seconds before timeout) in which warnings are sent.
    #[serde(default = "d_30")]
    pub warning_seconds: u64,
    /// Warnings are sent when the remaining time is a multiple of this.
    #[serde(default = "d_5")]
    pub warning_interval_secs: u64,
    /// Sweep period of the idle monitor.
    #[serde(default = "d_1000")]
    pub tick_ms: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 180,
            warning_seconds: 30,
            warning_interval_secs: 5,
            tick_ms: 1000,
        }
    }
}

fn d_180() -> u64 {
    180
}
fn d_30() -> u64 {
    30
}
fn d_5() -> u64 {
    5
}
fn d_1000() -> u64 {
    1000
}
