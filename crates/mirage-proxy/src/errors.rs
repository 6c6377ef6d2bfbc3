//! Error taxonomy for the request-processing pipeline.
//!
//! Matching failures are never errors (a field that does not match is a
//! non-match); these types cover the cases that must surface to a caller or
//! be recovered into a defined response at the mode-controller level.

use thiserror::Error;

/// A simulation (or a single pair) was rejected before any store mutation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid {kind} matcher on field '{field}': {message}")]
    InvalidMatcher {
        field: String,
        kind: String,
        message: String,
    },
    #[error("unsupported simulation schema version {found} (supported: {supported})")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    #[error("malformed simulation document: {0}")]
    MalformedDocument(String),
}

/// Internal store invariant violation. Fatal to the operation, not the process.
#[derive(Debug, Error)]
pub enum StoreInvariantError {
    #[error("duplicate pair id '{0}' in simulation")]
    DuplicatePairId(String),
}

/// Failure of a store mutation. Either the submitted set was invalid or an
/// internal invariant would have been violated; in both cases nothing was
/// applied.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Invariant(#[from] StoreInvariantError),
}

/// Upstream forwarding failed. Surfaced to the client as a gateway-class
/// error and recorded in the journal.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to connect to upstream {host}: {message}")]
    Connect { host: String, message: String },
    #[error("upstream request to {host} timed out after {timeout_secs}s")]
    Timeout { host: String, timeout_secs: u64 },
    #[error("request could not be forwarded: {0}")]
    BadRequest(String),
    #[error("failed to read upstream response body: {0}")]
    Body(String),
}

impl UpstreamError {
    /// Gateway-class status to hand back to the client.
    pub fn status(&self) -> u16 {
        match self {
            UpstreamError::Timeout { .. } => 504,
            _ => 502,
        }
    }
}

/// The middleware collaborator failed. The request path degrades to the
/// unmodified request/response; the failure is annotated on the journal entry.
#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("middleware endpoint {url} returned status {status}")]
    RemoteStatus { url: String, status: u16 },
    #[error("middleware call to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("middleware call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("middleware returned an unparsable payload: {0}")]
    MalformedPayload(String),
}
