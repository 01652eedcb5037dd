//! `rc-pipeline`: the per-message decision graph.
//!
//! A run retrieves context, decides whether it is good enough to ground an
//! answer, generates along the chosen path and stages the reply for
//! persistence. Each stage appends a [`PipelineEvent`] that the caller
//! streams to the client.

pub mod events;
pub mod graph;
pub mod prompt;
pub mod runner;
pub mod stages;
pub mod state;

pub use events::{EventOutcome, PipelineEvent, StageName};
pub use graph::{Stage, StageGraph};
pub use runner::{PipelineOutcome, PipelineRunner};
pub use stages::PipelineSettings;
pub use state::{Confidence, FileMeta, MessageKind, PipelineState};
