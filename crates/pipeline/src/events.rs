//! Pipeline progress events.
//!
//! Each stage appends one event describing what it did. On the wire an
//! event is a single `stage:outcome[:detail]` string, e.g. `retrieval:done`
//! or `generated:error:retrieval: HTTP 500`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    Retrieval,
    Decision,
    Generation,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Done,
    Error,
    UsingRag,
    UsingFallback,
    Rag,
    RagFallback,
    Fallback,
    Ready,
}

/// One structured progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PipelineEvent {
    pub stage: StageName,
    pub outcome: EventOutcome,
    pub detail: Option<String>,
}

impl PipelineEvent {
    fn new(stage: StageName, outcome: EventOutcome) -> Self {
        Self {
            stage,
            outcome,
            detail: None,
        }
    }

    pub fn retrieval_done() -> Self {
        Self::new(StageName::Retrieval, EventOutcome::Done)
    }

    pub fn retrieval_error(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(StageName::Retrieval, EventOutcome::Error)
        }
    }

    pub fn using_rag() -> Self {
        Self::new(StageName::Decision, EventOutcome::UsingRag)
    }

    pub fn using_fallback() -> Self {
        Self::new(StageName::Decision, EventOutcome::UsingFallback)
    }

    pub fn generated_rag() -> Self {
        Self::new(StageName::Generation, EventOutcome::Rag)
    }

    pub fn generated_rag_fallback() -> Self {
        Self::new(StageName::Generation, EventOutcome::RagFallback)
    }

    pub fn generated_fallback() -> Self {
        Self::new(StageName::Generation, EventOutcome::Fallback)
    }

    pub fn generation_error(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(StageName::Generation, EventOutcome::Error)
        }
    }

    pub fn memory_ready() -> Self {
        Self::new(StageName::Memory, EventOutcome::Ready)
    }

    pub fn is_error(&self) -> bool {
        self.outcome == EventOutcome::Error
    }

    /// The `stage:outcome` head of the wire form, without any detail.
    fn head(&self) -> Option<&'static str> {
        use EventOutcome as O;
        use StageName as S;
        Some(match (self.stage, self.outcome) {
            (S::Retrieval, O::Done) => "retrieval:done",
            (S::Retrieval, O::Error) => "retrieval:error",
            (S::Decision, O::UsingRag) => "rag:using",
            (S::Decision, O::UsingFallback) => "fallback:using",
            (S::Generation, O::Rag) => "generated:rag",
            (S::Generation, O::RagFallback) => "generated:rag-fallback",
            (S::Generation, O::Fallback) => "generated:fallback",
            (S::Generation, O::Error) => "generated:error",
            (S::Memory, O::Ready) => "memory:ready",
            _ => return None,
        })
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.head().unwrap_or("unknown:event");
        match &self.detail {
            Some(d) => write!(f, "{head}:{d}"),
            None => f.write_str(head),
        }
    }
}

impl From<PipelineEvent> for String {
    fn from(ev: PipelineEvent) -> Self {
        ev.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent(pub String);

impl fmt::Display for UnknownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pipeline event `{}`", self.0)
    }
}

impl std::error::Error for UnknownEvent {}

impl FromStr for PipelineEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let head = (parts.next(), parts.next());
        let detail = parts.next().map(str::to_owned);

        let base = match head {
            (Some("retrieval"), Some("done")) => Self::retrieval_done(),
            (Some("retrieval"), Some("error")) => {
                Self::new(StageName::Retrieval, EventOutcome::Error)
            }
            (Some("rag"), Some("using")) => Self::using_rag(),
            (Some("fallback"), Some("using")) => Self::using_fallback(),
            (Some("generated"), Some("rag")) => Self::generated_rag(),
            (Some("generated"), Some("rag-fallback")) => Self::generated_rag_fallback(),
            (Some("generated"), Some("fallback")) => Self::generated_fallback(),
            (Some("generated"), Some("error")) => {
                Self::new(StageName::Generation, EventOutcome::Error)
            }
            (Some("memory"), Some("ready")) => Self::memory_ready(),
            _ => return Err(UnknownEvent(s.to_owned())),
        };
        Ok(Self { detail, ..base })
    }
}

impl TryFrom<String> for PipelineEvent {
    type Error = UnknownEvent;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_wire_names() {
        assert_eq!(PipelineEvent::retrieval_done().render(), "retrieval:done");
        assert_eq!(PipelineEvent::using_rag().render(), "rag:using");
        assert_eq!(PipelineEvent::using_fallback().render(), "fallback:using");
        assert_eq!(
            PipelineEvent::generated_rag_fallback().render(),
            "generated:rag-fallback"
        );
        assert_eq!(PipelineEvent::memory_ready().render(), "memory:ready");
    }

    #[test]
    fn error_detail_keeps_inner_colons() {
        let ev = PipelineEvent::retrieval_error("retrieval: HTTP 500");
        let wire = ev.render();
        assert_eq!(wire, "retrieval:error:retrieval: HTTP 500");

        let parsed: PipelineEvent = wire.parse().unwrap();
        assert_eq!(parsed, ev);
        assert!(parsed.is_error());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&vec![PipelineEvent::generated_fallback()]).unwrap();
        assert_eq!(json, r#"["generated:fallback"]"#);
    }

    #[test]
    fn rejects_unknown_event() {
        assert!("retrieval:exploded".parse::<PipelineEvent>().is_err());
        assert!("".parse::<PipelineEvent>().is_err());
    }
}
