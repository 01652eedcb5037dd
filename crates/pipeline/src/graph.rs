//! The stage graph.
//!
//! ```text
//! retrieve ──▶ decide ──use_rag──▶ rag_generate ──▶ memory ──▶ end
//!                  └────else────▶ fallback ───────┘
//! ```
//!
//! Built once per runner. Walking it is bounded by a step guard so a bad
//! edge table can never loop.

use std::fmt;

use rc_domain::error::{Error, Result};

use crate::state::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Retrieve,
    Decide,
    RagGenerate,
    Fallback,
    Memory,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Retrieve,
        Stage::Decide,
        Stage::RagGenerate,
        Stage::Fallback,
        Stage::Memory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retrieve => "retrieve",
            Self::Decide => "decide",
            Self::RagGenerate => "rag_generate",
            Self::Fallback => "fallback",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where control goes after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Stage(Stage),
    End,
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    To(Next),
    /// `use_rag` picks the first target, otherwise the second.
    Branch { on_rag: Stage, otherwise: Stage },
}

#[derive(Debug, Clone)]
pub struct StageGraph {
    entry: Stage,
    edges: Vec<(Stage, Edge)>,
}

impl Default for StageGraph {
    fn default() -> Self {
        Self::standard()
    }
}

impl StageGraph {
    pub fn standard() -> Self {
        Self {
            entry: Stage::Retrieve,
            edges: vec![
                (Stage::Retrieve, Edge::To(Next::Stage(Stage::Decide))),
                (
                    Stage::Decide,
                    Edge::Branch {
                        on_rag: Stage::RagGenerate,
                        otherwise: Stage::Fallback,
                    },
                ),
                (Stage::RagGenerate, Edge::To(Next::Stage(Stage::Memory))),
                (Stage::Fallback, Edge::To(Next::Stage(Stage::Memory))),
                (Stage::Memory, Edge::To(Next::End)),
            ],
        }
    }

    pub fn entry(&self) -> Stage {
        self.entry
    }

    /// Upper bound on stages visited in one run.
    pub fn max_steps(&self) -> usize {
        Stage::ALL.len() + 1
    }

    /// Resolve the successor of `from` given the current state.
    pub fn next(&self, from: Stage, state: &PipelineState) -> Result<Next> {
        let edge = self
            .edges
            .iter()
            .find(|(s, _)| *s == from)
            .map(|(_, e)| *e)
            .ok_or_else(|| Error::Pipeline(format!("no edge out of stage `{from}`")))?;

        match edge {
            Edge::To(next) => Ok(next),
            Edge::Branch { on_rag, otherwise } => {
                if !state.decided {
                    return Err(Error::Pipeline(format!(
                        "branch at `{from}` evaluated before a decision was made"
                    )));
                }
                Ok(Next::Stage(if state.use_rag { on_rag } else { otherwise }))
            }
        }
    }

    #[cfg(test)]
    fn without_edge(mut self, stage: Stage) -> Self {
        self.edges.retain(|(s, _)| *s != stage);
        self
    }

    #[cfg(test)]
    fn looping() -> Self {
        Self {
            entry: Stage::Retrieve,
            edges: vec![
                (Stage::Retrieve, Edge::To(Next::Stage(Stage::Memory))),
                (Stage::Memory, Edge::To(Next::Stage(Stage::Retrieve))),
            ],
        }
    }
}

#[cfg(test)]
pub(crate) mod test_graphs {
    use super::*;

    pub fn missing_memory_edge() -> StageGraph {
        StageGraph::standard().without_edge(Stage::Memory)
    }

    pub fn cycle() -> StageGraph {
        StageGraph::looping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decided(use_rag: bool) -> PipelineState {
        let mut state = PipelineState::user_message("s", "q");
        state.decided = true;
        state.use_rag = use_rag;
        state
    }

    #[test]
    fn linear_edges() {
        let g = StageGraph::standard();
        let s = PipelineState::default();
        assert_eq!(g.entry(), Stage::Retrieve);
        assert_eq!(g.next(Stage::Retrieve, &s).unwrap(), Next::Stage(Stage::Decide));
        assert_eq!(g.next(Stage::RagGenerate, &s).unwrap(), Next::Stage(Stage::Memory));
        assert_eq!(g.next(Stage::Fallback, &s).unwrap(), Next::Stage(Stage::Memory));
        assert_eq!(g.next(Stage::Memory, &s).unwrap(), Next::End);
    }

    #[test]
    fn branch_follows_decision() {
        let g = StageGraph::standard();
        assert_eq!(
            g.next(Stage::Decide, &decided(true)).unwrap(),
            Next::Stage(Stage::RagGenerate)
        );
        assert_eq!(
            g.next(Stage::Decide, &decided(false)).unwrap(),
            Next::Stage(Stage::Fallback)
        );
    }

    #[test]
    fn branch_before_decision_is_an_error() {
        let g = StageGraph::standard();
        let err = g.next(Stage::Decide, &PipelineState::default()).unwrap_err();
        assert!(matches!(err, Error::Pipeline(_)));
    }

    #[test]
    fn missing_edge_is_an_error() {
        let g = test_graphs::missing_memory_edge();
        let err = g.next(Stage::Memory, &PipelineState::default()).unwrap_err();
        assert!(err.to_string().contains("memory"), "{err}");
    }
}
