use std::sync::Arc;
use std::time::Instant;

use rc_domain::error::{Error, Result};
use rc_domain::trace::TraceEvent;
use rc_services::{GenerationGateway, RetrievalGateway};
use serde::{Deserialize, Serialize};

use crate::graph::{Next, Stage, StageGraph};
use crate::prompt;
use crate::stages::{PipelineSettings, StageContext};
use crate::state::PipelineState;

/// Result of one run, in the shape `/run_graph` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub events: Vec<String>,
    pub llm_output: Option<String>,
    pub state: PipelineState,
}

impl PipelineOutcome {
    pub fn from_state(state: PipelineState) -> Self {
        Self {
            events: state.rendered_events(),
            llm_output: state.llm_output.clone(),
            state,
        }
    }
}

/// Executes the stage graph against the configured gateways.
pub struct PipelineRunner {
    graph: StageGraph,
    ctx: StageContext,
}

impl PipelineRunner {
    pub fn new(
        retrieval: Arc<dyn RetrievalGateway>,
        generation: Arc<dyn GenerationGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            graph: StageGraph::standard(),
            ctx: StageContext {
                retrieval,
                generation,
                settings,
            },
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.ctx.settings
    }

    #[cfg(test)]
    pub(crate) fn with_graph(mut self, graph: StageGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Run every stage from the entry point to the end.
    ///
    /// Only internal invariant violations surface as errors; service
    /// failures are recorded in the returned events.
    pub async fn run(&self, mut state: PipelineState) -> Result<PipelineOutcome> {
        let started = Instant::now();

        if state.summary.is_empty() {
            state.summary =
                prompt::summarize_history(&state.history, self.ctx.settings.summary_turns);
        }

        let mut current = self.graph.entry();
        let mut steps = 0usize;
        loop {
            steps += 1;
            if steps > self.graph.max_steps() {
                return Err(Error::Pipeline(format!(
                    "step limit of {} exceeded at stage `{current}`",
                    self.graph.max_steps()
                )));
            }

            let stage_started = Instant::now();
            self.run_stage(current, &mut state).await;
            tracing::debug!(
                session_id = %state.session_id,
                stage = %current,
                "stage completed"
            );
            TraceEvent::StageCompleted {
                session_id: state.session_id.clone(),
                stage: current.as_str().to_owned(),
                duration_ms: stage_started.elapsed().as_millis() as u64,
            }
            .emit();

            match self.graph.next(current, &state)? {
                Next::Stage(stage) => current = stage,
                Next::End => break,
            }
        }

        TraceEvent::PipelineCompleted {
            session_id: state.session_id.clone(),
            use_rag: state.use_rag,
            confidence: state.confidence.value(),
            events: state.events().len(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        Ok(PipelineOutcome::from_state(state))
    }

    async fn run_stage(&self, stage: Stage, state: &mut PipelineState) {
        match stage {
            Stage::Retrieve => self.ctx.retrieve(state).await,
            Stage::Decide => self.ctx.decide(state),
            Stage::RagGenerate => self.ctx.rag_generate(state).await,
            Stage::Fallback => self.ctx.fallback(state).await,
            Stage::Memory => self.ctx.memory(state),
        }
    }
}
