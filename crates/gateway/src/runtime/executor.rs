//! Where a pipeline run executes: in-process, or on a remote graph service
//! speaking the `/run_graph` contract.

use std::sync::Arc;

use async_trait::async_trait;
use rc_domain::config::{PipelineConfig, PipelineMode, ServiceEndpoint};
use rc_domain::error::{Error, Result};
use rc_pipeline::{PipelineOutcome, PipelineRunner, PipelineState};
use rc_services::http::ServiceClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    async fn execute(&self, state: PipelineState) -> Result<PipelineOutcome>;

    fn mode(&self) -> &'static str;
}

pub struct LocalPipeline {
    runner: Arc<PipelineRunner>,
}

impl LocalPipeline {
    pub fn new(runner: Arc<PipelineRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PipelineExecutor for LocalPipeline {
    async fn execute(&self, state: PipelineState) -> Result<PipelineOutcome> {
        self.runner.run(state).await
    }

    fn mode(&self) -> &'static str {
        "local"
    }
}

/// Request body of `POST /run_graph`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunGraphRequest {
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: rc_pipeline::MessageKind,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_meta: Option<rc_pipeline::FileMeta>,
    #[serde(default)]
    pub history: Option<Vec<String>>,
}

impl RunGraphRequest {
    pub fn from_state(state: &PipelineState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            kind: state.kind,
            message: Some(state.user_message.clone()).filter(|m| !m.is_empty()),
            file_meta: state.file_meta.clone(),
            history: Some(state.history.clone()),
        }
    }

    pub fn into_state(self) -> PipelineState {
        PipelineState::new(
            self.session_id,
            self.kind,
            self.message.unwrap_or_default(),
            self.file_meta,
            self.history.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct RunGraphReply {
    #[serde(default)]
    events: Vec<String>,
    #[serde(default)]
    llm_output: Option<String>,
    #[serde(default)]
    state: Option<Value>,
}

/// Delegates each run to `POST {remote_url}/run_graph`.
pub struct RemotePipeline {
    client: ServiceClient,
}

impl RemotePipeline {
    pub fn new(cfg: &PipelineConfig) -> Result<Self> {
        let endpoint = ServiceEndpoint {
            base_url: cfg.remote_url.clone(),
            api_key_env: cfg.api_key_env.clone(),
            timeout_ms: cfg.remote_timeout_ms,
        };
        Ok(Self {
            client: ServiceClient::new("pipeline", &endpoint)?,
        })
    }
}

#[async_trait]
impl PipelineExecutor for RemotePipeline {
    async fn execute(&self, state: PipelineState) -> Result<PipelineOutcome> {
        let body = RunGraphRequest::from_state(&state);
        let raw = self.client.post_json("/run_graph", &body).await?;
        let reply: RunGraphReply = serde_json::from_value(raw)
            .map_err(|e| Error::Pipeline(format!("malformed /run_graph reply: {e}")))?;

        // The remote state is informational; keep ours if it does not parse.
        let state = reply
            .state
            .and_then(|v| serde_json::from_value::<PipelineState>(v).ok())
            .unwrap_or(state);

        Ok(PipelineOutcome {
            events: reply.events,
            llm_output: reply.llm_output,
            state,
        })
    }

    fn mode(&self) -> &'static str {
        "remote"
    }
}

/// Build the executor selected by `pipeline.mode`.
pub fn create_executor(
    cfg: &PipelineConfig,
    runner: Arc<PipelineRunner>,
) -> Result<Arc<dyn PipelineExecutor>> {
    match cfg.mode {
        PipelineMode::Local => Ok(Arc::new(LocalPipeline::new(runner))),
        PipelineMode::Remote => {
            tracing::info!(url = %cfg.remote_url, "pipeline runs delegated to remote graph service");
            Ok(Arc::new(RemotePipeline::new(cfg)?))
        }
    }
}
