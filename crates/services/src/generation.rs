//! Generation Gateway: text completion with and without retrieved context.

use async_trait::async_trait;
use rc_domain::config::ServiceEndpoint;
use rc_domain::error::Result;
use serde::Serialize;
use serde_json::Value;

use crate::http::ServiceClient;

/// Two logical completion operations on the same service.
///
/// Both return the raw generated text, which may be empty; deciding what an
/// empty reply means is the caller's business.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Context-grounded completion (`POST /llm_rag`).
    async fn generate_with_context(&self, prompt: &str) -> Result<String>;

    /// General-purpose completion (`POST /fallback_llm`).
    async fn generate_fallback(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Clone)]
pub struct RestGenerationClient {
    client: ServiceClient,
}

impl RestGenerationClient {
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new("generation", endpoint)?,
        })
    }

    pub fn with_api_key(endpoint: &ServiceEndpoint, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::with_api_key("generation", endpoint, api_key)?,
        })
    }

    async fn complete(&self, path: &str, prompt: &str) -> Result<String> {
        let body = self.client.post_json(path, &PromptRequest { prompt }).await?;
        Ok(extract_output(&body))
    }
}

#[async_trait]
impl GenerationGateway for RestGenerationClient {
    async fn generate_with_context(&self, prompt: &str) -> Result<String> {
        self.complete("/llm_rag", prompt).await
    }

    async fn generate_fallback(&self, prompt: &str) -> Result<String> {
        self.complete("/fallback_llm", prompt).await
    }
}

/// First non-empty string among `llm_output`, `output` and `text`.
pub fn extract_output(body: &Value) -> String {
    ["llm_output", "output", "text"]
        .iter()
        .filter_map(|k| body.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_llm_output() {
        let body = json!({"llm_output": "a", "output": "b"});
        assert_eq!(extract_output(&body), "a");
    }

    #[test]
    fn falls_through_empty_fields() {
        let body = json!({"llm_output": "", "text": "c"});
        assert_eq!(extract_output(&body), "c");
    }

    #[test]
    fn missing_fields_are_empty() {
        assert_eq!(extract_output(&json!({"status": 1})), "");
    }
}
