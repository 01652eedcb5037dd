//! One inbound frame, start to finish.
//!
//! The frame is parsed into a [`ClientAction`], then processed under the
//! turn gate's write side: persist the user turn, run the pipeline, stream
//! its events, persist and send the reply. The gate is released on every
//! exit path.

use std::sync::Arc;

use rc_domain::error::Result;
use rc_pipeline::{FileMeta, PipelineState};
use rc_sessions::{ChatRole, ChatStore};
use serde_json::{Map, Value};

use crate::runtime::executor::PipelineExecutor;
use crate::runtime::gate::TurnGate;
use crate::sessions::ConnectionHandle;

/// Sent before an upload is processed.
pub const FILE_ACK: &str = "Received file, processing...";

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    UserMessage(String),
    FileUpload { meta: FileMeta, message: String },
}

/// Decode a text frame.
///
/// Anything that is not a recognizable structured action is treated as a
/// plain user message carrying the raw text; parsing never fails.
pub fn parse_frame(raw: &str) -> ClientAction {
    let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(raw) else {
        return ClientAction::UserMessage(raw.to_owned());
    };

    let kind = obj.remove("type");
    let message = match obj.remove("message") {
        Some(Value::String(s)) => Some(s),
        _ => None,
    };

    match kind.as_ref().and_then(Value::as_str) {
        Some("file_upload") | Some("file_uploaded") => ClientAction::FileUpload {
            meta: file_meta_from(obj),
            message: message.unwrap_or_default(),
        },
        _ => ClientAction::UserMessage(message.unwrap_or_else(|| raw.to_owned())),
    }
}

fn file_meta_from(obj: Map<String, Value>) -> FileMeta {
    serde_json::from_value(Value::Object(obj.clone())).unwrap_or(FileMeta {
        extra: obj,
        ..FileMeta::default()
    })
}

pub struct SessionOrchestrator {
    gate: Arc<TurnGate>,
    store: Arc<dyn ChatStore>,
    executor: Arc<dyn PipelineExecutor>,
    history_limit: usize,
}

impl SessionOrchestrator {
    pub fn new(
        gate: Arc<TurnGate>,
        store: Arc<dyn ChatStore>,
        executor: Arc<dyn PipelineExecutor>,
        history_limit: usize,
    ) -> Self {
        Self {
            gate,
            store,
            executor,
            history_limit,
        }
    }

    pub fn gate(&self) -> &Arc<TurnGate> {
        &self.gate
    }

    /// Parse and process one raw frame.
    pub async fn handle_frame(
        &self,
        session_id: &str,
        handle: &ConnectionHandle,
        raw: &str,
    ) -> Result<()> {
        self.process_message(session_id, handle, parse_frame(raw))
            .await
    }

    /// Process one action while holding exclusive access to the session.
    pub async fn process_message(
        &self,
        session_id: &str,
        handle: &ConnectionHandle,
        action: ClientAction,
    ) -> Result<()> {
        let mut guard = self.gate.write(session_id).await;
        tracing::debug!(session_id = %session_id, "turn started");
        let result = self.run_turn(session_id, handle, action).await;
        guard.release();
        tracing::debug!(session_id = %session_id, ok = result.is_ok(), "turn finished");
        result
    }

    async fn run_turn(
        &self,
        session_id: &str,
        handle: &ConnectionHandle,
        action: ClientAction,
    ) -> Result<()> {
        // History first, so the current message is not echoed back into
        // its own summary.
        let history = self.store.get_history(session_id, self.history_limit).await?;

        let state = match action {
            ClientAction::UserMessage(text) => {
                self.store
                    .insert_chat(session_id, &text, ChatRole::User)
                    .await?;
                PipelineState::user_message(session_id, text)
            }
            ClientAction::FileUpload { meta, message } => {
                handle.send_text(FILE_ACK).await?;
                let mut state = PipelineState::file_upload(session_id, meta);
                state.user_message = message;
                state
            }
        };

        let outcome = self.executor.execute(state.with_history(history)).await?;

        for event in outcome.events {
            handle.send_text(event).await?;
        }

        if let Some(reply) = outcome.llm_output.filter(|s| !s.is_empty()) {
            self.store
                .insert_chat(session_id, &reply, ChatRole::Bot)
                .await?;
            handle.send_text(reply).await?;
        }

        Ok(())
    }
}
