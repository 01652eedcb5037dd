//! `POST /run_graph`: one pipeline run over HTTP.
//!
//! The same contract [`RemotePipeline`](crate::runtime::executor::RemotePipeline)
//! calls, so two processes can split orchestration and graph execution.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::runtime::executor::RunGraphRequest;
use crate::state::AppState;

pub async fn run_graph(
    State(state): State<AppState>,
    Json(body): Json<RunGraphRequest>,
) -> Response {
    let session_id = body.session_id.clone();
    match state.runner.run(body.into_state()).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "run_graph failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "detail": format!("pipeline run failed: {e}") })),
            )
                .into_response()
        }
    }
}
