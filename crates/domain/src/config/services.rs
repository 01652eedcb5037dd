use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Downstream services (retrieval + generation)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "d_retrieval")]
    pub retrieval: ServiceEndpoint,
    #[serde(default = "d_generation")]
    pub generation: ServiceEndpoint,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            retrieval: d_retrieval(),
            generation: d_generation(),
        }
    }
}

/// Connection settings for one downstream HTTP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub base_url: String,
    /// Environment variable holding the `x-api-key` credential.
    #[serde(default = "d_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl ServiceEndpoint {
    /// Read the credential from the configured env var (empty values count as unset).
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

fn d_retrieval() -> ServiceEndpoint {
    ServiceEndpoint {
        base_url: "http://rag-service:8001".into(),
        api_key_env: d_key_env(),
        timeout_ms: d_timeout_ms(),
    }
}
fn d_generation() -> ServiceEndpoint {
    ServiceEndpoint {
        base_url: "http://embedding-service:8002".into(),
        api_key_env: d_key_env(),
        timeout_ms: d_timeout_ms(),
    }
}
fn d_key_env() -> String {
    "RC_OUTBOUND_API_KEY".into()
}
fn d_timeout_ms() -> u64 {
    30_000
}
