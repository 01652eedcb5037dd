//! Session introspection endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::runtime::gate::GateStatus;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub connection_id: String,
    pub connected_at: chrono::DateTime<Utc>,
    pub last_active_at: chrono::DateTime<Utc>,
    pub idle_secs: i64,
    pub last_warned: Option<i64>,
    pub gate: GateStatus,
}

/// Connected sessions with idle time and lock state. Never blocks on the gate.
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let sessions: Vec<SessionView> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|s| SessionView {
            gate: state.gate.status(&s.session_id),
            idle_secs: now.signed_duration_since(s.last_active_at).num_seconds(),
            connection_id: s.connection_id.to_string(),
            connected_at: s.connected_at,
            last_active_at: s.last_active_at,
            last_warned: s.last_warned,
            session_id: s.session_id,
        })
        .collect();

    Json(serde_json::json!({
        "lock_scope": state.gate.scope(),
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/sessions/:id/history
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Stored history, read under the session's shared lock so an in-flight
/// turn is either fully visible or not at all.
pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(state.config.pipeline.history_limit);

    let _read = state.gate.read(&session_id).await;
    match state.store.get_history(&session_id, limit).await {
        Ok(history) => Json(serde_json::json!({
            "session_id": session_id,
            "history": history,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "history read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
