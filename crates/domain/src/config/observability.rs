use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability: JSON logs always, OTLP spans on request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the `ragchat` serve command sends its spans.
///
/// Logs are always written as JSON to stdout. With an `otlp_endpoint` the
/// same spans (socket turns, pipeline stages, gateway calls, idle sweeps)
/// are batched to a collector over gRPC. A failed exporter downgrades to
/// logs only and never stops the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// e.g. `http://localhost:4317`. Unset means no exporter.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "d_service_name")]
    pub service_name: String,

    /// Fraction of traces kept by the ratio sampler.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl ObservabilityConfig {
    pub fn exports_spans(&self) -> bool {
        self.otlp_endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// `sample_rate` clamped into `[0, 1]`; NaN keeps every trace.
    pub fn sampler_ratio(&self) -> f64 {
        if self.sample_rate.is_nan() {
            1.0
        } else {
            self.sample_rate.clamp(0.0, 1.0)
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

fn d_service_name() -> String {
    "ragchat".into()
}

fn d_sample_rate() -> f64 {
    1.0
}
