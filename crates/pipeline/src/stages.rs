//! The five stage bodies.
//!
//! Downstream failures stop here: every gateway error becomes an event
//! plus, for generation, a diagnostic `llm_output`. Nothing in this module
//! returns an error for a service outage.

use std::sync::Arc;

use rc_services::{GenerationGateway, RetrievalGateway};

use crate::events::PipelineEvent;
use crate::prompt;
use crate::state::{Confidence, PipelineState};

/// Tunables for one runner.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Inclusive lower bound on confidence for the grounded path.
    pub confidence_threshold: f64,
    pub top_k: u32,
    pub summary_turns: usize,
    pub fallback_context_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&rc_domain::config::PipelineConfig::default())
    }
}

impl From<&rc_domain::config::PipelineConfig> for PipelineSettings {
    fn from(cfg: &rc_domain::config::PipelineConfig) -> Self {
        Self {
            confidence_threshold: cfg.confidence_threshold,
            top_k: cfg.top_k,
            summary_turns: cfg.summary_turns,
            fallback_context_chars: cfg.fallback_context_chars,
        }
    }
}

pub(crate) struct StageContext {
    pub retrieval: Arc<dyn RetrievalGateway>,
    pub generation: Arc<dyn GenerationGateway>,
    pub settings: PipelineSettings,
}

pub(crate) const RAG_EMPTY: &str = "RAG generation returned empty.";
pub(crate) const RAG_FALLBACK_EMPTY: &str = "RAG fallback returned empty.";
pub(crate) const FALLBACK_EMPTY: &str = "Fallback LLM returned empty.";

impl StageContext {
    pub async fn retrieve(&self, state: &mut PipelineState) {
        let query = state.retrieval_query();
        match self.retrieval.search(&query, self.settings.top_k).await {
            Ok(result) => {
                state.rag_answer = result.rag_answer;
                state.confidence = Confidence::new(result.confidence);
                state.retrieved = result.docs;
                state.push_event(PipelineEvent::retrieval_done());
            }
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "retrieval failed");
                state.rag_answer.clear();
                state.confidence = Confidence::ZERO;
                state.retrieved.clear();
                state.push_event(PipelineEvent::retrieval_error(e.to_string()));
            }
        }
    }

    pub fn decide(&self, state: &mut PipelineState) {
        state.use_rag = !state.rag_answer.is_empty()
            && state.confidence.value() >= self.settings.confidence_threshold;
        state.decided = true;
        state.push_event(if state.use_rag {
            PipelineEvent::using_rag()
        } else {
            PipelineEvent::using_fallback()
        });
    }

    pub async fn rag_generate(&self, state: &mut PipelineState) {
        let prompt = prompt::rag_prompt(&state.rag_answer, &state.user_message);

        match self.generation.generate_with_context(&prompt).await {
            Ok(text) => {
                state.llm_output = Some(non_empty(text, RAG_EMPTY));
                state.push_event(PipelineEvent::generated_rag());
            }
            Err(primary) => {
                tracing::warn!(
                    session_id = %state.session_id,
                    error = %primary,
                    "grounded generation failed, retrying on fallback model"
                );
                rc_domain::trace::TraceEvent::GenerationFallback {
                    session_id: state.session_id.clone(),
                    reason: primary.to_string(),
                }
                .emit();

                match self.generation.generate_fallback(&prompt).await {
                    Ok(text) => {
                        state.llm_output = Some(non_empty(text, RAG_FALLBACK_EMPTY));
                        state.push_event(PipelineEvent::generated_rag_fallback());
                    }
                    Err(secondary) => {
                        state.llm_output = Some(format!(
                            "RAG generation failed: {primary} / {secondary}"
                        ));
                        state.push_event(PipelineEvent::generation_error(primary.to_string()));
                    }
                }
            }
        }
    }

    pub async fn fallback(&self, state: &mut PipelineState) {
        let context = prompt::short_context(
            &state.summary,
            &state.rag_answer,
            self.settings.fallback_context_chars,
        );
        let prompt = prompt::fallback_prompt(&context, &state.user_message);

        match self.generation.generate_fallback(&prompt).await {
            Ok(text) => {
                state.llm_output = Some(non_empty(text, FALLBACK_EMPTY));
                state.push_event(PipelineEvent::generated_fallback());
            }
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "fallback generation failed");
                state.llm_output = Some(format!("Fallback LLM error: {e}"));
                state.push_event(PipelineEvent::generation_error(e.to_string()));
            }
        }
    }

    /// Stage the reply for persistence. Does not touch storage itself.
    pub fn memory(&self, state: &mut PipelineState) {
        if let Some(reply) = state.output().map(str::to_owned) {
            state.memory.insert("bot_reply".into(), reply);
            state.push_event(PipelineEvent::memory_ready());
        }
    }
}

fn non_empty(text: String, diagnostic: &str) -> String {
    if text.trim().is_empty() {
        diagnostic.to_owned()
    } else {
        text
    }
}
