use std::collections::BTreeMap;

use rc_services::RetrievedDoc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::events::PipelineEvent;

/// What kind of client action started the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    UserMessage,
    #[serde(alias = "file_upload")]
    FileUploaded,
}

/// Upload metadata from a `file_upload` frame. Content is passed through
/// untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Retrieval confidence, always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Self = Self(0.0);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Confidence {
    fn from(v: f64) -> Self {
        Self::new(v)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

/// Accept an explicit `null` wherever the field has a default.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// The record threaded through every stage of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    pub session_id: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, alias = "message", deserialize_with = "null_as_default")]
    pub user_message: String,
    #[serde(default)]
    pub file_meta: Option<FileMeta>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<String>,

    #[serde(default)]
    events: Vec<PipelineEvent>,
    #[serde(default)]
    pub llm_output: Option<String>,
    #[serde(default)]
    pub use_rag: bool,
    /// Set once the decision stage has run.
    #[serde(default)]
    pub decided: bool,
    #[serde(default)]
    pub rag_answer: String,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub retrieved: Vec<RetrievedDoc>,
    #[serde(default)]
    pub memory: BTreeMap<String, String>,
}

impl PipelineState {
    /// A fresh state with an empty event trail.
    pub fn new(
        session_id: impl Into<String>,
        kind: MessageKind,
        message: impl Into<String>,
        file_meta: Option<FileMeta>,
        history: Vec<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
            user_message: message.into(),
            file_meta,
            history,
            ..Self::default()
        }
    }

    pub fn user_message(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_message: message.into(),
            ..Self::default()
        }
    }

    pub fn file_upload(session_id: impl Into<String>, meta: FileMeta) -> Self {
        Self {
            session_id: session_id.into(),
            kind: MessageKind::FileUploaded,
            file_meta: Some(meta),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }

    pub fn push_event(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    pub fn rendered_events(&self) -> Vec<String> {
        self.events.iter().map(PipelineEvent::render).collect()
    }

    /// Query sent to the retrieval service.
    pub fn retrieval_query(&self) -> String {
        match self.kind {
            MessageKind::FileUploaded if self.user_message.trim().is_empty() => {
                let name = self
                    .file_meta
                    .as_ref()
                    .and_then(|m| m.filename.as_deref())
                    .filter(|n| !n.is_empty())
                    .unwrap_or("file");
                format!("Summarize the uploaded document {name}")
            }
            _ => self.user_message.clone(),
        }
    }

    /// Non-empty generated text, if any.
    pub fn output(&self) -> Option<&str> {
        self.llm_output.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn confidence_clamps_and_drops_nan() {
        assert_eq!(Confidence::new(1.7).value(), 1.0);
        assert_eq!(Confidence::new(-0.2).value(), 0.0);
        assert_eq!(Confidence::new(f64::NAN).value(), 0.0);
        assert_eq!(Confidence::new(0.42).value(), 0.42);
    }

    #[test]
    fn upload_query_names_the_file() {
        let meta = FileMeta {
            filename: Some("report.pdf".into()),
            ..FileMeta::default()
        };
        let state = PipelineState::file_upload("s", meta);
        assert_eq!(
            state.retrieval_query(),
            "Summarize the uploaded document report.pdf"
        );
    }

    #[test]
    fn upload_with_message_queries_the_message() {
        let mut state = PipelineState::file_upload("s", FileMeta::default());
        state.user_message = "what is in section 2?".into();
        assert_eq!(state.retrieval_query(), "what is in section 2?");
    }

    #[test]
    fn deserializes_run_graph_body() {
        let state: PipelineState = serde_json::from_value(json!({
            "session_id": "abc",
            "type": "file_upload",
            "message": "",
            "file_meta": {"filename": "a.txt", "content_type": "text/plain", "pages": 3},
            "history": ["User: hi"],
        }))
        .unwrap();
        assert_eq!(state.kind, MessageKind::FileUploaded);
        assert_eq!(state.retrieval_query(), "Summarize the uploaded document a.txt");
        let meta = state.file_meta.unwrap();
        assert_eq!(meta.filename.as_deref(), Some("a.txt"));
        assert_eq!(meta.extra["pages"], json!(3));
        assert_eq!(state.history, vec!["User: hi"]);
        assert!(state.events.is_empty());
    }

    #[test]
    fn null_fields_take_defaults() {
        let state: PipelineState = serde_json::from_value(json!({
            "session_id": "abc",
            "type": "file_uploaded",
            "message": null,
            "file_meta": null,
            "history": null,
        }))
        .unwrap();
        assert!(state.user_message.is_empty());
        assert!(state.history.is_empty());
        assert!(state.file_meta.is_none());
    }

    #[test]
    fn new_sets_inputs_and_leaves_outputs_empty() {
        let meta = FileMeta {
            filename: Some("notes.md".into()),
            ..FileMeta::default()
        };
        let state = PipelineState::new(
            "sid-7",
            MessageKind::FileUploaded,
            "",
            Some(meta),
            vec!["User: earlier".into()],
        );
        assert_eq!(state.session_id, "sid-7");
        assert_eq!(state.kind, MessageKind::FileUploaded);
        assert_eq!(state.history, vec!["User: earlier"]);
        assert_eq!(state.retrieval_query(), "Summarize the uploaded document notes.md");
        assert!(state.events().is_empty());
        assert!(state.output().is_none());
        assert!(!state.decided);
    }

    #[test]
    fn events_render_in_order() {
        let mut state = PipelineState::user_message("s", "hi");
        state.push_event(PipelineEvent::retrieval_done());
        state.push_event(PipelineEvent::using_rag());
        assert_eq!(state.rendered_events(), vec!["retrieval:done", "rag:using"]);
    }
}
