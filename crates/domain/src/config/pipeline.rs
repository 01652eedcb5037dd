use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline (retrieve → decide → generate → memory)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Where the decision graph runs.
    #[serde(default)]
    pub mode: PipelineMode,

    /// Minimum retrieval confidence for context-grounded generation.
    /// Inclusive: `confidence == threshold` uses the retrieved context.
    #[serde(default = "d_threshold")]
    pub confidence_threshold: f64,

    /// Number of matches requested from the retrieval service.
    #[serde(default = "d_top_k")]
    pub top_k: u32,

    /// Chat turns loaded from storage into each run.
    #[serde(default = "d_history_limit")]
    pub history_limit: usize,

    /// Trailing history turns folded into the conversational summary.
    /// `0` disables the summary.
    #[serde(default = "d_summary_turns")]
    pub summary_turns: usize,

    /// Characters of retrieved context kept for the conversational prompt.
    #[serde(default = "d_fallback_chars")]
    pub fallback_context_chars: usize,

    /// Base URL of a remote graph service (used when `mode = "remote"`).
    #[serde(default = "d_remote_url")]
    pub remote_url: String,

    /// Timeout for remote graph calls.
    #[serde(default = "d_remote_timeout")]
    pub remote_timeout_ms: u64,

    /// Environment variable holding the shared secret for `/run_graph`.
    /// Checked both when serving the endpoint and when calling a remote one.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Run the graph in-process.
    #[default]
    Local,
    /// Delegate each run to `POST {remote_url}/run_graph`.
    Remote,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Local,
            confidence_threshold: d_threshold(),
            top_k: d_top_k(),
            history_limit: d_history_limit(),
            summary_turns: d_summary_turns(),
            fallback_context_chars: d_fallback_chars(),
            remote_url: d_remote_url(),
            remote_timeout_ms: d_remote_timeout(),
            api_key_env: d_api_key_env(),
        }
    }
}

fn d_threshold() -> f64 {
    0.35
}
fn d_top_k() -> u32 {
    5
}
fn d_history_limit() -> usize {
    20
}
fn d_summary_turns() -> usize {
    4
}
fn d_fallback_chars() -> usize {
    300
}
fn d_remote_url() -> String {
    "http://langgraph-service:8003".into()
}
fn d_remote_timeout() -> u64 {
    60_000
}
fn d_api_key_env() -> String {
    "RC_SERVICE_API_KEY".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.mode, PipelineMode::Local);
        assert!((cfg.confidence_threshold - 0.35).abs() < f64::EPSILON);
        assert_eq!(cfg.top_k, 5);
        assert_eq!(cfg.fallback_context_chars, 300);
        assert_eq!(cfg.api_key_env, "RC_SERVICE_API_KEY");
    }

    #[test]
    fn threshold_is_tunable() {
        let cfg: PipelineConfig = toml::from_str("confidence_threshold = 0.4").unwrap();
        assert!((cfg.confidence_threshold - 0.4).abs() < f64::EPSILON);
    }
}
