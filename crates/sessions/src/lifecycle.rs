//! Idle-timeout lifecycle: countdown, staged warnings, eviction.
//!
//! Evaluated for every live session on each monitor tick. The remaining
//! time is `idle_timeout - (now - last_active)` in whole seconds, truncated
//! toward zero.

use chrono::{DateTime, Utc};

use rc_domain::config::IdleConfig;

/// What the monitor should do with one session on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    /// Nothing to report.
    None,
    /// Send a warning carrying the remaining seconds.
    Warn { remaining_secs: i64 },
    /// Timed out: close the connection and forget the session.
    Close,
}

#[derive(Debug, Clone, Copy)]
pub struct IdlePolicy {
    pub idle_timeout_secs: i64,
    pub warning_seconds: i64,
    pub warning_interval_secs: i64,
}

impl IdlePolicy {
    pub fn from_config(cfg: &IdleConfig) -> Self {
        Self {
            idle_timeout_secs: cfg.idle_timeout_secs as i64,
            warning_seconds: cfg.warning_seconds as i64,
            warning_interval_secs: cfg.warning_interval_secs.max(1) as i64,
        }
    }

    /// Whole seconds left before `last_active` times out at `now`.
    pub fn remaining_secs(&self, last_active: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let idle_ms = now.signed_duration_since(last_active).num_milliseconds();
        (self.idle_timeout_secs * 1000 - idle_ms) / 1000
    }
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self::from_config(&IdleConfig::default())
    }
}

/// Decide the action for one session.
///
/// `last_warned` is the countdown value most recently warned in the current
/// idle episode; it is cleared whenever the session sees activity.
pub fn evaluate_idle(
    policy: &IdlePolicy,
    last_active: DateTime<Utc>,
    last_warned: Option<i64>,
    now: DateTime<Utc>,
) -> IdleAction {
    let remaining = policy.remaining_secs(last_active, now);

    if remaining <= 0 {
        return IdleAction::Close;
    }

    if remaining <= policy.warning_seconds
        && remaining % policy.warning_interval_secs == 0
        && last_warned != Some(remaining)
    {
        return IdleAction::Warn {
            remaining_secs: remaining,
        };
    }

    IdleAction::None
}

/// Client-facing warning text.
pub fn warning_message(remaining_secs: i64) -> String {
    format!("idle timeout in {remaining_secs} seconds")
}
