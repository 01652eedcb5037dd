//! WebSocket endpoint for chat sessions.
//!
//! Flow:
//! 1. Client connects to `/ws/:session_id`
//! 2. Session is registered; a writer task drains its outbound queue
//! 3. Reader loop: each text frame is one turn, processed in order
//! 4. On disconnect, error or idle eviction the session is cleaned up

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use rc_domain::trace::TraceEvent;
use tokio::sync::mpsc;

use crate::sessions::{ConnectionHandle, Outbound};
use crate::state::AppState;

/// Outbound frames buffered per connection before senders wait.
const OUTBOUND_BUFFER: usize = 64;

/// `GET /ws/:session_id`: upgrade to WebSocket.
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Disconnected,
    Evicted,
    Error,
}

impl CloseReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Evicted => "evicted",
            Self::Error => "error",
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);
    let handle = ConnectionHandle::new(outbound_tx);
    let connection_id = state.registry.register(&session_id, handle.clone());
    let cancelled = handle.cancelled().clone();

    // Writer task: forwards queued frames to the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if ws_sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let reason = loop {
        let next = tokio::select! {
            _ = cancelled.cancelled() => break CloseReason::Evicted,
            next = ws_stream.next() => next,
        };

        let raw = match next {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Close(_))) | None => break CloseReason::Disconnected,
            // axum answers pings itself.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Err(e)) => {
                tracing::debug!(session_id = %session_id, error = %e, "socket read failed");
                break CloseReason::Disconnected;
            }
        };

        state.registry.touch(&session_id);

        if let Err(e) = state.orchestrator.handle_frame(&session_id, &handle, &raw).await {
            tracing::warn!(session_id = %session_id, error = %e, "turn failed, closing session");
            let _ = handle.try_send_text(format!("connection error: {e}"));
            break CloseReason::Error;
        }
    };

    // Cleanup: forget the session, stop the writer.
    state.registry.unregister(&session_id, connection_id);
    state.gate.forget(&session_id);
    handle.close();
    drop(handle);
    let _ = writer.await;

    tracing::info!(
        session_id = %session_id,
        %connection_id,
        reason = reason.as_str(),
        "session closed"
    );
    if reason != CloseReason::Evicted {
        TraceEvent::SessionClosed {
            session_id,
            reason: reason.as_str().to_owned(),
        }
        .emit();
    }
}
