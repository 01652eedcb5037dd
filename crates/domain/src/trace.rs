use serde::Serialize;

/// Structured trace events emitted across all ragchat crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionRegistered {
        session_id: String,
        connection_id: String,
        replaced: bool,
    },
    SessionClosed {
        session_id: String,
        reason: String,
    },
    IdleWarning {
        session_id: String,
        remaining_secs: i64,
        delivered: bool,
    },
    ServiceCall {
        service: String,
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    GenerationFallback {
        session_id: String,
        reason: String,
    },
    StageCompleted {
        session_id: String,
        stage: String,
        duration_ms: u64,
    },
    PipelineCompleted {
        session_id: String,
        use_rag: bool,
        confidence: f64,
        events: usize,
        duration_ms: u64,
    },
    ChatPersisted {
        session_id: String,
        role: String,
        chars: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "rc_event");
    }
}
