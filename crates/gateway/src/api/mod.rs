pub mod auth;
pub mod health;
pub mod run_graph;
pub mod sessions;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full router.
///
/// Routes are split into **public** (health probe and the chat socket) and
/// **protected** (gated behind the `x-api-key` service-key middleware).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/ws/:session_id", get(crate::ws::chat_ws));

    let protected = Router::new()
        // Graph execution boundary
        .route("/run_graph", post(run_graph::run_graph))
        .route("/v1/run_graph", post(run_graph::run_graph))
        // Session introspection
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/:id/history", get(sessions::get_history))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_service_key,
        ));

    public.merge(protected)
}
