//! External middleware collaborator seam.
//!
//! The transformation logic itself is opaque to the core: the contract is a
//! serialized `{request, response}` document sent out and the same shape
//! received back with fields possibly altered. A failing middleware never
//! fails the request path; the mode controller degrades to the unmodified
//! exchange and surfaces the error on the journal entry.

use crate::errors::MiddlewareError;
use crate::exchange::{CapturedRequest, CapturedResponse};
use crate::proxy::client::HttpClient;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Request;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// The data contract exchanged with middleware. `response` is absent when
/// no response exists yet (request-stage transformation, synthesis input).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponsePair {
    pub request: CapturedRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CapturedResponse>,
}

/// Asynchronous transformation capability. Implementations may block on
/// process or network I/O; callers hold no lock across the await.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process(
        &self,
        pair: RequestResponsePair,
    ) -> Result<RequestResponsePair, MiddlewareError>;
}

/// Remote middleware reached over HTTP: the pair is POSTed as JSON and the
/// transformed pair read back from the response body.
pub struct HttpMiddleware {
    url: String,
    client: HttpClient,
    timeout: Duration,
}

impl HttpMiddleware {
    pub fn new(url: String, client: HttpClient, timeout: Duration) -> Self {
        Self {
            url,
            client,
            timeout,
        }
    }
}

#[async_trait]
impl Middleware for HttpMiddleware {
    async fn process(
        &self,
        pair: RequestResponsePair,
    ) -> Result<RequestResponsePair, MiddlewareError> {
        let payload = serde_json::to_vec(&pair)
            .map_err(|e| MiddlewareError::MalformedPayload(e.to_string()))?;

        let request = Request::post(self.url.as_str())
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| MiddlewareError::Transport {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        debug!("invoking middleware at {}", self.url);
        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| MiddlewareError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| MiddlewareError::Transport {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MiddlewareError::RemoteStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| MiddlewareError::Transport {
                url: self.url.clone(),
                message: e.to_string(),
            })?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|e| MiddlewareError::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_contract_roundtrip() {
        let pair = RequestResponsePair {
            request: CapturedRequest {
                method: "GET".to_string(),
                scheme: "http".to_string(),
                destination: "svc".to_string(),
                path: "/x".to_string(),
                ..Default::default()
            },
            response: Some(CapturedResponse {
                status: 200,
                body: b"ok".to_vec(),
                ..Default::default()
            }),
        };
        let json = serde_json::to_string(&pair).unwrap();
        let restored: RequestResponsePair = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.request, pair.request);
        assert_eq!(restored.response, pair.response);
    }

    #[test]
    fn test_pair_contract_response_is_optional() {
        let restored: RequestResponsePair = serde_json::from_str(
            r#"{"request": {"method": "GET", "scheme": "http", "destination": "svc", "path": "/"}}"#,
        )
        .unwrap();
        assert!(restored.response.is_none());
    }
}
