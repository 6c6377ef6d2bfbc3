//! Upstream forwarding.
//!
//! The core depends only on the `Upstream` capability; the hyper-backed
//! implementation here rebuilds the captured request, forwards it with a
//! bounded timeout and collects the response. There is no retry: retries
//! are a caller or middleware concern.

use super::client::HttpClient;
use crate::errors::UpstreamError;
use crate::exchange::{CapturedRequest, CapturedResponse};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Request;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// The forwarding capability the mode controller depends on.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, request: &CapturedRequest)
        -> Result<CapturedResponse, UpstreamError>;
}

/// Rebuild the target URI from a captured request, optionally redirecting
/// to a fixed destination.
fn build_target_uri(destination_override: Option<&str>, request: &CapturedRequest) -> String {
    let destination = destination_override.unwrap_or(&request.destination);
    let scheme = if request.scheme.is_empty() {
        "http"
    } else {
        &request.scheme
    };
    if request.query.is_empty() {
        format!("{scheme}://{destination}{}", request.path)
    } else {
        format!("{scheme}://{destination}{}?{}", request.path, request.query)
    }
}

/// Hyper-backed forwarder with a per-request timeout.
pub struct HyperUpstream {
    client: HttpClient,
    timeout: Duration,
    /// Overrides the captured destination when the proxy fronts one service
    destination_override: Option<String>,
}

impl HyperUpstream {
    pub fn new(
        client: HttpClient,
        timeout: Duration,
        destination_override: Option<String>,
    ) -> Self {
        Self {
            client,
            timeout,
            destination_override,
        }
    }
}

#[async_trait]
impl Upstream for HyperUpstream {
    async fn forward(
        &self,
        request: &CapturedRequest,
    ) -> Result<CapturedResponse, UpstreamError> {
        let uri = build_target_uri(self.destination_override.as_deref(), request);
        let host = request.destination.clone();
        debug!("forwarding {} {}", request.method, uri);

        let mut builder = Request::builder()
            .method(request.method.as_str())
            .uri(uri.as_str());
        for (name, values) in &request.headers {
            // Host is derived from the target URI
            if name == "host" {
                continue;
            }
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        let outbound = builder
            .body(Full::new(Bytes::from(request.body.clone().into_bytes())))
            .map_err(|e| UpstreamError::BadRequest(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(outbound))
            .await
            .map_err(|_| UpstreamError::Timeout {
                host: host.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| UpstreamError::Connect {
                host: host.clone(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_lowercase())
                    .or_default()
                    .push(value.to_string());
            }
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?
            .to_bytes();

        Ok(CapturedResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
