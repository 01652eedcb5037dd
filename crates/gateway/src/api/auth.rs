//! Service-key middleware.
//!
//! The env var named by `pipeline.api_key_env` (default `RC_SERVICE_API_KEY`)
//! is read **once at startup** and its SHA-256 digest cached in `AppState`.
//! - If set and non-empty, every protected request must carry a matching
//!   `x-api-key` header.
//! - If unset or empty, the server logs a warning once and allows
//!   unauthenticated access (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rc_services::http::API_KEY_HEADER;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// SHA-256 digest used for the constant-time comparison.
pub fn hash_key(key: &str) -> Vec<u8> {
    Sha256::digest(key.as_bytes()).to_vec()
}

pub async fn require_service_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected_hash) = &state.service_key_hash else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    // Comparing fixed-length digests hides the key length.
    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "detail": "Unauthorized" })),
        )
            .into_response();
    }

    next.run(req).await
}
