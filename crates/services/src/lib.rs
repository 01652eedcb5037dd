//! `rc-services`: clients for the downstream services the pipeline
//! orchestrates.
//!
//! Two seams, each a trait with a production REST implementation:
//!
//! | Trait                | Implementation          | Endpoints                        |
//! |----------------------|-------------------------|----------------------------------|
//! | [`RetrievalGateway`] | [`RestRetrievalClient`]  | `POST /search`                   |
//! | [`GenerationGateway`]| [`RestGenerationClient`] | `POST /llm_rag`, `POST /fallback_llm` |
//!
//! Both authenticate with the shared `x-api-key` service credential and
//! never retry: fallback policy belongs to the pipeline, not the transport.

pub mod generation;
pub mod http;
pub mod retrieval;

pub use generation::{GenerationGateway, RestGenerationClient};
pub use http::from_reqwest;
pub use retrieval::{RestRetrievalClient, RetrievalGateway, RetrievalResult, RetrievedDoc};

use std::sync::Arc;

use rc_domain::config::ServicesConfig;
use rc_domain::error::Result;

/// Build both REST gateways from the `[services]` config section.
pub fn create_gateways(
    cfg: &ServicesConfig,
) -> Result<(Arc<dyn RetrievalGateway>, Arc<dyn GenerationGateway>)> {
    let retrieval = RestRetrievalClient::new(&cfg.retrieval)?;
    let generation = RestGenerationClient::new(&cfg.generation)?;
    tracing::info!(
        retrieval_url = %cfg.retrieval.base_url,
        generation_url = %cfg.generation.base_url,
        "service gateways ready"
    );
    Ok((Arc::new(retrieval), Arc::new(generation)))
}
