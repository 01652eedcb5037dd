//! Shared HTTP plumbing for the REST gateways.
//!
//! `ServiceClient` wraps a pooled `reqwest::Client`, stamps every request
//! with the service credential and a trace id, and maps transport and
//! status failures onto the domain [`Error`]. It performs exactly one
//! attempt per call.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, StatusCode};
use rc_domain::config::ServiceEndpoint;
use rc_domain::error::{Error, Result};
use rc_domain::trace::TraceEvent;
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the shared service credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    service: &'static str,
    base_url: String,
    api_key: Option<String>,
}

impl ServiceClient {
    /// Build a client for `endpoint`, reading the credential from its env var.
    pub fn new(service: &'static str, endpoint: &ServiceEndpoint) -> Result<Self> {
        Self::with_api_key(service, endpoint, endpoint.api_key())
    }

    pub fn with_api_key(
        service: &'static str,
        endpoint: &ServiceEndpoint,
        api_key: Option<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(endpoint.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        if api_key.is_none() {
            tracing::warn!(
                service,
                env = %endpoint.api_key_env,
                "no service credential configured; calls are unauthenticated"
            );
        }

        Ok(Self {
            http,
            service,
            base_url: endpoint.base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let rb = rb.header("X-Trace-Id", Uuid::new_v4().to_string());
        match self.api_key {
            Some(ref key) => rb.header(API_KEY_HEADER, key),
            None => rb,
        }
    }

    /// POST a JSON body to `path` and decode the JSON reply.
    ///
    /// * 401/403 → [`Error::Auth`]
    /// * other non-2xx → [`Error::Gateway`]
    /// * connect/timeout → [`Error::Http`] / [`Error::Timeout`]
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value> {
        let endpoint = format!("POST {path}");
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let result = self.decorate(self.http.post(&url).json(body)).send().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                TraceEvent::ServiceCall {
                    service: self.service.to_owned(),
                    endpoint,
                    status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                    duration_ms,
                }
                .emit();
                return Err(from_reqwest(e));
            }
        };

        let status = resp.status();
        TraceEvent::ServiceCall {
            service: self.service.to_owned(),
            endpoint: endpoint.clone(),
            status: status.as_u16(),
            duration_ms,
        }
        .emit();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "{endpoint} auth failed ({}): {body}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Gateway {
                service: self.service.to_owned(),
                message: format!("{endpoint} returned {}: {body}", status.as_u16()),
            });
        }

        let text = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&text).map_err(|e| Error::Gateway {
            service: self.service.to_owned(),
            message: format!("failed to parse {endpoint} response: {e}"),
        })
    }
}
