//! Inbound request capture and dispatch.
//!
//! Converts a hyper request into the captured form the pipeline works on,
//! hands it to the mode controller, and converts the outcome back. The
//! whole body is collected up front: matching needs it, and every mode
//! journals it.

use crate::exchange::{CapturedRequest, CapturedResponse};
use crate::modes::ModeController;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error};

/// Serve one request end to end.
pub async fn handle_request(
    controller: &Arc<ModeController>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let captured = match capture_request(req).await {
        Ok(captured) => captured,
        Err(response) => return Ok(response),
    };

    debug!(
        "{} {} {} ({})",
        captured.method,
        captured.destination,
        captured.path,
        controller.mode().as_str()
    );

    let response = controller.process(captured).await;
    Ok(into_hyper_response(response))
}

/// Capture the inbound request. Works for both absolute-form URIs (clients
/// configured with an HTTP proxy) and origin-form with a Host header.
async fn capture_request(
    req: Request<Incoming>,
) -> Result<CapturedRequest, Response<Full<Bytes>>> {
    let method = req.method().to_string();
    let uri = req.uri().clone();

    let scheme = uri.scheme_str().unwrap_or("http").to_string();
    let destination = uri
        .authority()
        .map(|a| a.to_string())
        .or_else(|| {
            req.headers()
                .get(hyper::header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();
    let path = uri.path().to_string();
    let query = uri.query().unwrap_or_default().to_string();

    let mut headers: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_lowercase())
                .or_default()
                .push(value.to_string());
        }
    }

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("failed to read request body: {e}");
            return Err(plain_error(
                StatusCode::BAD_REQUEST,
                "failed to read request body",
            ));
        }
    };

    Ok(CapturedRequest {
        method,
        scheme,
        destination,
        path,
        query,
        body: String::from_utf8_lossy(&body).into_owned(),
        headers,
    })
}

fn into_hyper_response(response: CapturedResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    );
    for (name, values) in &response.headers {
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|e| {
            error!("failed to build response: {e}");
            plain_error(StatusCode::INTERNAL_SERVER_ERROR, "invalid response")
        })
}

fn plain_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = format!(r#"{{"error": "{message}"}}"#);
    // Static status + static header cannot fail to build
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response parts")
}
