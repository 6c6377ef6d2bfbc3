//! Mode state machine and per-request dispatch.
//!
//! The mode is a single process-wide value changed only through `set_mode`;
//! there are no implicit transitions. It lives in a lock-free cell separate
//! from the store's lock so the hot path reads it without blocking on
//! writers, and a request keeps the mode it started with even if the mode
//! changes mid-flight. Every dispatch path, success or failure, ends in
//! exactly one journal append.
//!
//! # Module Structure
//!
//! - `diff` - response comparison for diff mode

pub mod diff;

use crate::exchange::{CapturedRequest, CapturedResponse};
use crate::journal::{Journal, JournalEntry};
use crate::matching::{find_best_match, MatchDiagnostics};
use crate::middleware::{Middleware, RequestResponsePair};
use crate::proxy::forwarding::Upstream;
use crate::simulation::types::{MatcherSpec, Pair, RequestMatcher, SimulatedResponse};
use crate::simulation::{CompiledPair, SimulationStore};
use crate::state::StateStore;
use crate::templating;
use crate::errors::UpstreamError;
use base64::Engine;
use crossbeam::atomic::AtomicCell;
use diff::{diff_response, DiffReport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Process-wide behavior selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Answer from the store; no match returns the configured error response
    #[default]
    Simulate,
    /// Forward upstream and append the real exchange to the store
    Capture,
    /// Forward upstream, transforming request and response via middleware
    Modify,
    /// Middleware alone produces the response; nothing is forwarded
    Synthesize,
    /// Answer from the store on a match, fall through to upstream otherwise
    Spy,
    /// Forward upstream and record a diff against the stored expectation
    Diff,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Simulate => "simulate",
            Mode::Capture => "capture",
            Mode::Modify => "modify",
            Mode::Synthesize => "synthesize",
            Mode::Spy => "spy",
            Mode::Diff => "diff",
        }
    }
}

/// Tunables for dispatch behavior.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Status of the simulate-mode no-match response
    pub no_match_status: u16,
    /// Fixed no-match body; None falls back to the diagnostics body
    pub no_match_body: Option<String>,
    /// Header names capture mode turns into exact matchers; `*` captures all
    pub capture_headers: Vec<String>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            no_match_status: 502,
            no_match_body: None,
            capture_headers: Vec::new(),
        }
    }
}

/// Journal annotations accumulated by one dispatch.
#[derive(Default)]
struct Annotations {
    matched_pair_id: Option<String>,
    diff: Option<DiffReport>,
    middleware_error: Option<String>,
    upstream_error: Option<String>,
}

/// Orchestrates matching engine, upstream forwarder and middleware per mode.
pub struct ModeController {
    store: Arc<SimulationStore>,
    journal: Arc<Journal>,
    state: Arc<StateStore>,
    mode: AtomicCell<Mode>,
    upstream: Arc<dyn Upstream>,
    middleware: Option<Arc<dyn Middleware>>,
    options: ControllerOptions,
}

impl ModeController {
    pub fn new(
        store: Arc<SimulationStore>,
        journal: Arc<Journal>,
        state: Arc<StateStore>,
        upstream: Arc<dyn Upstream>,
        middleware: Option<Arc<dyn Middleware>>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            store,
            journal,
            state,
            mode: AtomicCell::new(Mode::default()),
            upstream,
            middleware,
            options,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode.load()
    }

    /// The only mode transition. Takes effect for the next request;
    /// in-flight requests complete under the mode active at their start.
    pub fn set_mode(&self, mode: Mode) {
        let previous = self.mode.swap(mode);
        if previous != mode {
            info!("mode changed: {} -> {}", previous.as_str(), mode.as_str());
        }
    }

    /// Process one inbound request to completion, including the journal
    /// append every path ends with.
    pub async fn process(&self, request: CapturedRequest) -> CapturedResponse {
        let mode = self.mode.load();
        let (response, notes) = match mode {
            Mode::Simulate => self.simulate(&request).await,
            Mode::Capture => self.capture(&request).await,
            Mode::Modify => self.modify(&request).await,
            Mode::Synthesize => self.synthesize(&request).await,
            Mode::Spy => self.spy(&request).await,
            Mode::Diff => self.diff(&request).await,
        };

        let mut entry = JournalEntry::new(request, response.clone(), mode, notes.matched_pair_id);
        entry.diff = notes.diff;
        entry.middleware_error = notes.middleware_error;
        entry.upstream_error = notes.upstream_error;
        self.journal.append(entry);

        response
    }

    // ------------------------------------------------------------------
    // Per-mode dispatch
    // ------------------------------------------------------------------

    async fn simulate(&self, request: &CapturedRequest) -> (CapturedResponse, Annotations) {
        let snapshot = self.store.snapshot();
        let state = self.state.snapshot();
        let result = find_best_match(request, &snapshot, &state);

        match result.pair {
            Some(pair) => {
                let response = self.render_simulated(request, pair).await;
                let (response, middleware_error) =
                    self.transform_response(request, response).await;
                (
                    response,
                    Annotations {
                        matched_pair_id: Some(pair.source.id.clone()),
                        middleware_error,
                        ..Default::default()
                    },
                )
            }
            None => (
                self.no_match_response(&result.diagnostics),
                Annotations::default(),
            ),
        }
    }

    async fn capture(&self, request: &CapturedRequest) -> (CapturedResponse, Annotations) {
        match self.upstream.forward(request).await {
            Ok(real) => {
                let pair = derive_pair(request, &real, &self.options.capture_headers);
                let pair_id = pair.id.clone();
                if let Err(e) = self.store.append(pair) {
                    warn!("captured pair rejected by store: {e}");
                }
                (
                    real,
                    Annotations {
                        matched_pair_id: Some(pair_id),
                        ..Default::default()
                    },
                )
            }
            Err(e) => self.upstream_failure(e),
        }
    }

    async fn modify(&self, request: &CapturedRequest) -> (CapturedResponse, Annotations) {
        let (outbound, request_error) = self.transform_request(request.clone()).await;
        match self.upstream.forward(&outbound).await {
            Ok(real) => {
                let (response, response_error) = self.transform_response(&outbound, real).await;
                (
                    response,
                    Annotations {
                        middleware_error: request_error.or(response_error),
                        ..Default::default()
                    },
                )
            }
            Err(e) => {
                let (response, mut notes) = self.upstream_failure(e);
                notes.middleware_error = request_error;
                (response, notes)
            }
        }
    }

    async fn synthesize(&self, request: &CapturedRequest) -> (CapturedResponse, Annotations) {
        let Some(middleware) = &self.middleware else {
            let message = "synthesize mode requires middleware".to_string();
            return (
                error_response(503, &message),
                Annotations {
                    middleware_error: Some(message),
                    ..Default::default()
                },
            );
        };

        let pair = RequestResponsePair {
            request: request.clone(),
            response: None,
        };
        match middleware.process(pair).await {
            Ok(RequestResponsePair {
                response: Some(response),
                ..
            }) => (response, Annotations::default()),
            Ok(RequestResponsePair { response: None, .. }) => {
                let message = "middleware produced no response".to_string();
                (
                    error_response(503, &message),
                    Annotations {
                        middleware_error: Some(message),
                        ..Default::default()
                    },
                )
            }
            Err(e) => {
                let message = e.to_string();
                (
                    error_response(503, &message),
                    Annotations {
                        middleware_error: Some(message),
                        ..Default::default()
                    },
                )
            }
        }
    }

    async fn spy(&self, request: &CapturedRequest) -> (CapturedResponse, Annotations) {
        let snapshot = self.store.snapshot();
        let state = self.state.snapshot();
        let result = find_best_match(request, &snapshot, &state);

        match result.pair {
            Some(pair) => {
                let response = self.render_simulated(request, pair).await;
                let (response, middleware_error) =
                    self.transform_response(request, response).await;
                (
                    response,
                    Annotations {
                        matched_pair_id: Some(pair.source.id.clone()),
                        middleware_error,
                        ..Default::default()
                    },
                )
            }
            // No match: pass through to the real service without storing
            None => match self.upstream.forward(request).await {
                Ok(real) => (real, Annotations::default()),
                Err(e) => self.upstream_failure(e),
            },
        }
    }

    async fn diff(&self, request: &CapturedRequest) -> (CapturedResponse, Annotations) {
        match self.upstream.forward(request).await {
            Ok(real) => {
                let snapshot = self.store.snapshot();
                let state = self.state.snapshot();
                let result = find_best_match(request, &snapshot, &state);
                match result.pair {
                    Some(pair) => {
                        let report =
                            diff_response(&pair.source.id, &pair.source.response, &real);
                        if report.has_differences() {
                            debug!(
                                "diff for pair {}: {} field(s) diverged",
                                pair.source.id,
                                report.entries.len()
                            );
                        }
                        (
                            real,
                            Annotations {
                                matched_pair_id: Some(pair.source.id.clone()),
                                diff: Some(report),
                                ..Default::default()
                            },
                        )
                    }
                    None => (real, Annotations::default()),
                }
            }
            Err(e) => self.upstream_failure(e),
        }
    }

    // ------------------------------------------------------------------
    // Shared pieces
    // ------------------------------------------------------------------

    /// Build the response for a matched pair: delay, templating, state
    /// transitions.
    async fn render_simulated(
        &self,
        request: &CapturedRequest,
        pair: &CompiledPair,
    ) -> CapturedResponse {
        let spec = &pair.source.response;
        if let Some(delay_ms) = spec.fixed_delay_ms {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let body = if spec.templated && !spec.encoded_body {
            templating::render(&spec.body, request).into_bytes()
        } else {
            spec.body_bytes()
        };

        if let Some(transitions) = &spec.transitions_state {
            self.state.apply_transitions(transitions);
        }

        CapturedResponse {
            status: spec.status,
            headers: spec.headers.clone(),
            body,
        }
    }

    /// Request-stage middleware; degrades to the unmodified request.
    async fn transform_request(
        &self,
        request: CapturedRequest,
    ) -> (CapturedRequest, Option<String>) {
        let Some(middleware) = &self.middleware else {
            return (request, None);
        };
        let pair = RequestResponsePair {
            request: request.clone(),
            response: None,
        };
        match middleware.process(pair).await {
            Ok(transformed) => (transformed.request, None),
            Err(e) => {
                warn!("request middleware failed, passing through: {e}");
                (request, Some(e.to_string()))
            }
        }
    }

    /// Response-stage middleware; degrades to the unmodified response.
    async fn transform_response(
        &self,
        request: &CapturedRequest,
        response: CapturedResponse,
    ) -> (CapturedResponse, Option<String>) {
        let Some(middleware) = &self.middleware else {
            return (response, None);
        };
        let pair = RequestResponsePair {
            request: request.clone(),
            response: Some(response.clone()),
        };
        match middleware.process(pair).await {
            Ok(RequestResponsePair {
                response: Some(transformed),
                ..
            }) => (transformed, None),
            Ok(RequestResponsePair { response: None, .. }) => {
                warn!("response middleware dropped the response, passing through");
                (response, Some("middleware dropped the response".to_string()))
            }
            Err(e) => {
                warn!("response middleware failed, passing through: {e}");
                (response, Some(e.to_string()))
            }
        }
    }

    fn no_match_response(&self, diagnostics: &MatchDiagnostics) -> CapturedResponse {
        if let Some(body) = &self.options.no_match_body {
            return CapturedResponse {
                status: self.options.no_match_status,
                headers: HashMap::new(),
                body: body.clone().into_bytes(),
            };
        }
        let detail = diagnostics
            .closest_miss()
            .map(|miss| {
                serde_json::json!({
                    "error": "no matching simulation pair",
                    "closestMiss": miss,
                })
            })
            .unwrap_or_else(|| serde_json::json!({ "error": "no matching simulation pair" }));
        json_response(self.options.no_match_status, &detail)
    }

    fn upstream_failure(&self, error: UpstreamError) -> (CapturedResponse, Annotations) {
        warn!("upstream forwarding failed: {error}");
        (
            error_response(error.status(), &error.to_string()),
            Annotations {
                upstream_error: Some(error.to_string()),
                ..Default::default()
            },
        )
    }
}

/// Derive an exact-match pair from an observed exchange (capture mode).
fn derive_pair(
    request: &CapturedRequest,
    response: &CapturedResponse,
    capture_headers: &[String],
) -> Pair {
    let mut matcher = RequestMatcher {
        method: Some(vec![MatcherSpec::exact(&request.method)]),
        scheme: Some(vec![MatcherSpec::exact(&request.scheme)]),
        destination: Some(vec![MatcherSpec::exact(&request.destination)]),
        path: Some(vec![MatcherSpec::exact(&request.path)]),
        query: Some(vec![MatcherSpec::exact(&request.query)]),
        body: Some(vec![MatcherSpec::exact(&request.body)]),
        headers: HashMap::new(),
    };

    let capture_all = capture_headers.iter().any(|name| name == "*");
    for (name, values) in &request.headers {
        let wanted = capture_all
            || capture_headers
                .iter()
                .any(|header| header.eq_ignore_ascii_case(name));
        if wanted {
            matcher
                .headers
                .insert(name.clone(), vec![MatcherSpec::exact(values.join(";"))]);
        }
    }

    let simulated = match String::from_utf8(response.body.clone()) {
        Ok(text) => SimulatedResponse {
            status: response.status,
            body: text,
            headers: response.headers.clone(),
            ..Default::default()
        },
        Err(_) => SimulatedResponse {
            status: response.status,
            body: base64::engine::general_purpose::STANDARD.encode(&response.body),
            encoded_body: true,
            headers: response.headers.clone(),
            ..Default::default()
        },
    };

    Pair::new(matcher, simulated)
}

fn json_response(status: u16, body: &serde_json::Value) -> CapturedResponse {
    CapturedResponse {
        status,
        headers: HashMap::from([(
            "content-type".to_string(),
            vec!["application/json".to_string()],
        )]),
        body: body.to_string().into_bytes(),
    }
}

/// Error response in the shape every failure path uses.
pub fn error_response(status: u16, message: &str) -> CapturedResponse {
    json_response(status, &serde_json::json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MiddlewareError;
    use crate::simulation::Simulation;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Upstream stub returning a fixed response, or an error when unset.
    struct StubUpstream {
        response: Option<CapturedResponse>,
        calls: AtomicUsize,
    }

    impl StubUpstream {
        fn responding(body: &str) -> Self {
            Self {
                response: Some(CapturedResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: body.as_bytes().to_vec(),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Upstream for StubUpstream {
        async fn forward(
            &self,
            request: &CapturedRequest,
        ) -> Result<CapturedResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone().ok_or_else(|| UpstreamError::Connect {
                host: request.destination.clone(),
                message: "connection refused".to_string(),
            })
        }
    }

    /// Middleware stub that uppercases response bodies.
    struct UppercasingMiddleware;

    #[async_trait]
    impl Middleware for UppercasingMiddleware {
        async fn process(
            &self,
            mut pair: RequestResponsePair,
        ) -> Result<RequestResponsePair, MiddlewareError> {
            if let Some(response) = &mut pair.response {
                response.body = response.body_string().to_uppercase().into_bytes();
            }
            Ok(pair)
        }
    }

    struct FailingMiddleware;

    #[async_trait]
    impl Middleware for FailingMiddleware {
        async fn process(
            &self,
            _pair: RequestResponsePair,
        ) -> Result<RequestResponsePair, MiddlewareError> {
            Err(MiddlewareError::Timeout { timeout_secs: 1 })
        }
    }

    /// Middleware stub that synthesizes a canned response.
    struct SynthesizingMiddleware;

    #[async_trait]
    impl Middleware for SynthesizingMiddleware {
        async fn process(
            &self,
            mut pair: RequestResponsePair,
        ) -> Result<RequestResponsePair, MiddlewareError> {
            pair.response = Some(CapturedResponse {
                status: 201,
                headers: HashMap::new(),
                body: b"synthesized".to_vec(),
            });
            Ok(pair)
        }
    }

    fn request(method: &str, path: &str) -> CapturedRequest {
        CapturedRequest {
            method: method.to_string(),
            scheme: "http".to_string(),
            destination: "api.example.com".to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn controller(
        upstream: Arc<StubUpstream>,
        middleware: Option<Arc<dyn Middleware>>,
    ) -> ModeController {
        ModeController::new(
            Arc::new(SimulationStore::new()),
            Arc::new(Journal::new(None)),
            Arc::new(StateStore::new()),
            upstream,
            middleware,
            ControllerOptions::default(),
        )
    }

    fn stored_pair(method: &str, path: &str, status: u16, body: &str) -> Pair {
        let matcher = RequestMatcher {
            method: Some(vec![MatcherSpec::exact(method)]),
            path: Some(vec![MatcherSpec::exact(path)]),
            ..Default::default()
        };
        let response = SimulatedResponse {
            status,
            body: body.to_string(),
            ..Default::default()
        };
        Pair::new(matcher, response)
    }

    #[tokio::test]
    async fn test_simulate_returns_stored_response_without_forwarding() {
        let upstream = Arc::new(StubUpstream::responding("real"));
        let unit = controller(Arc::clone(&upstream), None);
        unit.store
            .replace_all(Simulation::new(vec![stored_pair(
                "GET", "/users/1", 200, r#"{"id":1}"#,
            )]))
            .unwrap();

        let response = unit.process(request("GET", "/users/1")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, br#"{"id":1}"#);
        assert_eq!(upstream.call_count(), 0);

        let entries = unit.journal.get_all();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].matched_pair_id.is_some());
        assert_eq!(entries[0].mode, Mode::Simulate);
    }

    #[tokio::test]
    async fn test_simulate_no_match_returns_configured_error() {
        let unit = controller(Arc::new(StubUpstream::responding("real")), None);
        unit.store
            .replace_all(Simulation::new(vec![stored_pair("GET", "/users/1", 200, "x")]))
            .unwrap();

        let response = unit.process(request("GET", "/users/2")).await;
        assert_eq!(response.status, 502);
        let body = String::from_utf8(response.body).unwrap();
        assert!(body.contains("no matching simulation pair"));
        assert!(body.contains("closestMiss"));

        let entries = unit.journal.get_all();
        assert!(entries[0].matched_pair_id.is_none());
    }

    #[tokio::test]
    async fn test_simulate_no_match_honors_configured_body() {
        let unit = ModeController::new(
            Arc::new(SimulationStore::new()),
            Arc::new(Journal::new(None)),
            Arc::new(StateStore::new()),
            Arc::new(StubUpstream::responding("x")),
            None,
            ControllerOptions {
                no_match_status: 470,
                no_match_body: Some("nothing here".to_string()),
                ..Default::default()
            },
        );

        let response = unit.process(request("GET", "/anything")).await;
        assert_eq!(response.status, 470);
        assert_eq!(response.body, b"nothing here");
    }

    #[tokio::test]
    async fn test_capture_appends_pair_and_returns_real_response() {
        let upstream = Arc::new(StubUpstream::responding("upstream-body"));
        let unit = controller(Arc::clone(&upstream), None);
        unit.set_mode(Mode::Capture);

        let response = unit.process(request("GET", "/products")).await;
        assert_eq!(response.body, b"upstream-body");
        assert_eq!(upstream.call_count(), 1);
        assert_eq!(unit.store.get_all().pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_capture_then_simulate_replays_upstream_response() {
        let upstream = Arc::new(StubUpstream::responding("the-real-answer"));
        let unit = controller(Arc::clone(&upstream), None);

        unit.set_mode(Mode::Capture);
        unit.process(request("GET", "/catalog")).await;

        unit.set_mode(Mode::Simulate);
        let replayed = unit.process(request("GET", "/catalog")).await;
        assert_eq!(replayed.body, b"the-real-answer");
        // Only the capture pass hit the real service
        assert_eq!(upstream.call_count(), 1);
    }

    #[tokio::test]
    async fn test_capture_upstream_failure_is_gatewayed_and_journaled() {
        let unit = controller(Arc::new(StubUpstream::failing()), None);
        unit.set_mode(Mode::Capture);

        let response = unit.process(request("GET", "/x")).await;
        assert_eq!(response.status, 502);
        assert!(unit.store.get_all().pairs.is_empty());

        let entries = unit.journal.get_all();
        assert!(entries[0].upstream_error.is_some());
    }

    #[tokio::test]
    async fn test_modify_applies_middleware_to_response() {
        let unit = controller(
            Arc::new(StubUpstream::responding("quiet")),
            Some(Arc::new(UppercasingMiddleware)),
        );
        unit.set_mode(Mode::Modify);

        let response = unit.process(request("POST", "/loud")).await;
        assert_eq!(response.body, b"QUIET");
    }

    #[tokio::test]
    async fn test_modify_degrades_on_middleware_failure() {
        let unit = controller(
            Arc::new(StubUpstream::responding("unchanged")),
            Some(Arc::new(FailingMiddleware)),
        );
        unit.set_mode(Mode::Modify);

        let response = unit.process(request("POST", "/x")).await;
        // Pass-through despite the failure
        assert_eq!(response.body, b"unchanged");
        let entries = unit.journal.get_all();
        assert!(entries[0].middleware_error.is_some());
    }

    #[tokio::test]
    async fn test_synthesize_uses_middleware_only() {
        let upstream = Arc::new(StubUpstream::responding("must-not-be-called"));
        let unit = controller(Arc::clone(&upstream), Some(Arc::new(SynthesizingMiddleware)));
        unit.set_mode(Mode::Synthesize);

        let response = unit.process(request("POST", "/generate")).await;
        assert_eq!(response.status, 201);
        assert_eq!(response.body, b"synthesized");
        assert_eq!(upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_synthesize_without_middleware_is_a_defined_failure() {
        let unit = controller(Arc::new(StubUpstream::responding("x")), None);
        unit.set_mode(Mode::Synthesize);

        let response = unit.process(request("POST", "/generate")).await;
        assert_eq!(response.status, 503);
        let entries = unit.journal.get_all();
        assert!(entries[0].middleware_error.is_some());
    }

    #[tokio::test]
    async fn test_spy_prefers_store_and_falls_through_to_upstream() {
        let upstream = Arc::new(StubUpstream::responding("from-upstream"));
        let unit = controller(Arc::clone(&upstream), None);
        unit.store
            .replace_all(Simulation::new(vec![stored_pair(
                "GET",
                "/known",
                200,
                "from-store",
            )]))
            .unwrap();
        unit.set_mode(Mode::Spy);

        let hit = unit.process(request("GET", "/known")).await;
        assert_eq!(hit.body, b"from-store");
        assert_eq!(upstream.call_count(), 0);

        let miss = unit.process(request("GET", "/unknown")).await;
        assert_eq!(miss.body, b"from-upstream");
        assert_eq!(upstream.call_count(), 1);
        // Spy never stores what it observed
        assert_eq!(unit.store.get_all().pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_diff_returns_real_response_and_records_divergence() {
        let upstream = Arc::new(StubUpstream::responding("actual-body"));
        let unit = controller(Arc::clone(&upstream), None);
        unit.store
            .replace_all(Simulation::new(vec![stored_pair(
                "GET",
                "/versioned",
                200,
                "expected-body",
            )]))
            .unwrap();
        unit.set_mode(Mode::Diff);

        let response = unit.process(request("GET", "/versioned")).await;
        assert_eq!(response.body, b"actual-body");

        let entries = unit.journal.get_all();
        let report = entries[0].diff.as_ref().unwrap();
        assert!(report.has_differences());
        assert_eq!(report.entries[0].field, "body");
    }

    #[tokio::test]
    async fn test_every_path_journals_exactly_once() {
        let unit = controller(Arc::new(StubUpstream::failing()), None);
        for mode in [
            Mode::Simulate,
            Mode::Capture,
            Mode::Modify,
            Mode::Synthesize,
            Mode::Spy,
            Mode::Diff,
        ] {
            unit.set_mode(mode);
            unit.process(request("GET", "/probe")).await;
        }
        assert_eq!(unit.journal.len(), 6);
    }

    #[tokio::test]
    async fn test_templated_response_renders_request_values() {
        let unit = controller(Arc::new(StubUpstream::responding("x")), None);
        let matcher = RequestMatcher {
            path: Some(vec![MatcherSpec::new(
                crate::simulation::MatcherKind::Glob,
                serde_json::Value::String("/echo/*".to_string()),
            )]),
            ..Default::default()
        };
        let response = SimulatedResponse {
            body: r#"{"youAsked": "${request.path}"}"#.to_string(),
            templated: true,
            ..Default::default()
        };
        unit.store
            .replace_all(Simulation::new(vec![Pair::new(matcher, response)]))
            .unwrap();

        let result = unit.process(request("GET", "/echo/hello")).await;
        assert_eq!(result.body, br#"{"youAsked": "/echo/hello"}"#);
    }

    #[tokio::test]
    async fn test_state_transitions_sequence_responses() {
        let unit = controller(Arc::new(StubUpstream::responding("x")), None);

        let add_matcher = RequestMatcher {
            path: Some(vec![MatcherSpec::exact("/basket/add")]),
            ..Default::default()
        };
        let add_response = SimulatedResponse {
            body: "added".to_string(),
            transitions_state: Some(HashMap::from([(
                "basket".to_string(),
                "full".to_string(),
            )])),
            ..Default::default()
        };

        let checkout_matcher = RequestMatcher {
            path: Some(vec![MatcherSpec::exact("/checkout")]),
            ..Default::default()
        };
        let checkout_response = SimulatedResponse {
            body: "paid".to_string(),
            requires_state: Some(HashMap::from([(
                "basket".to_string(),
                "full".to_string(),
            )])),
            ..Default::default()
        };

        unit.store
            .replace_all(Simulation::new(vec![
                Pair::new(add_matcher, add_response),
                Pair::new(checkout_matcher, checkout_response),
            ]))
            .unwrap();

        // Checkout before adding anything: the gated pair is not a candidate
        let early = unit.process(request("POST", "/checkout")).await;
        assert_eq!(early.status, 502);

        unit.process(request("POST", "/basket/add")).await;
        let paid = unit.process(request("POST", "/checkout")).await;
        assert_eq!(paid.body, b"paid");
    }

    #[tokio::test]
    async fn test_capture_honors_header_capture_list() {
        let upstream = Arc::new(StubUpstream::responding("ok"));
        let unit = ModeController::new(
            Arc::new(SimulationStore::new()),
            Arc::new(Journal::new(None)),
            Arc::new(StateStore::new()),
            upstream,
            None,
            ControllerOptions {
                capture_headers: vec!["Authorization".to_string()],
                ..Default::default()
            },
        );
        unit.set_mode(Mode::Capture);

        let mut req = request("GET", "/private");
        req.headers
            .insert("authorization".to_string(), vec!["token-1".to_string()]);
        req.headers
            .insert("accept".to_string(), vec!["*/*".to_string()]);
        unit.process(req).await;

        let pairs = unit.store.get_all().pairs;
        assert!(pairs[0].request.headers.contains_key("authorization"));
        assert!(!pairs[0].request.headers.contains_key("accept"));
    }

    #[tokio::test]
    async fn test_mode_reads_are_explicit_only() {
        let unit = controller(Arc::new(StubUpstream::responding("x")), None);
        assert_eq!(unit.mode(), Mode::Simulate);
        unit.set_mode(Mode::Diff);
        assert_eq!(unit.mode(), Mode::Diff);
        // Traffic does not transition the mode
        unit.process(request("GET", "/x")).await;
        assert_eq!(unit.mode(), Mode::Diff);
    }

    #[test]
    fn test_derive_pair_encodes_binary_bodies() {
        let response = CapturedResponse {
            status: 200,
            headers: HashMap::new(),
            body: vec![0xff, 0x00, 0x7f],
        };
        let pair = derive_pair(&request("GET", "/bin"), &response, &[]);
        assert!(pair.response.encoded_body);
        assert_eq!(pair.response.body_bytes(), vec![0xff, 0x00, 0x7f]);
    }

    #[test]
    fn test_derive_pair_uses_exact_matchers() {
        let mut req = request("GET", "/users/1");
        req.query = "full=true".to_string();
        let pair = derive_pair(&req, &CapturedResponse::default(), &[]);
        for (_, specs) in pair.request.scalar_fields() {
            assert_eq!(specs[0].matcher, crate::simulation::MatcherKind::Exact);
        }
        assert_eq!(
            pair.request.query.as_ref().unwrap()[0],
            MatcherSpec::exact("full=true")
        );
    }
}
