//! Type definitions for the simulation data model.
//!
//! A simulation is an ordered sequence of pairs, each associating a request
//! template (`RequestMatcher`) with a canned response (`SimulatedResponse`).
//! Pairs are immutable once stored; updates are whole-pair replacements.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current simulation document schema version.
///
/// Documents with any other version are rejected at import time rather than
/// interpreted on a best-effort basis.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Matchers
// ============================================================================

/// Matcher kind. The set is closed: dispatch is exhaustive and every kind is
/// independently testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatcherKind {
    /// Byte-for-byte equality
    Exact,
    /// `*` wildcard expansion, anchored at both ends
    Glob,
    /// Regex tested for a match anywhere in the value
    Regex,
    /// RFC 9535 JSONPath query; matches when it selects at least one node
    JsonPath,
    /// Match value must be structurally contained in the body JSON
    JsonPartial,
    /// XPath expression; matches on a non-empty result
    Xpath,
    /// Match value XML contained in the body XML (whitespace-insensitive)
    XmlPartial,
    /// Body is a JSON array containing every element of the match array
    Array,
    /// Value is a JWT whose decoded header/payload contain the match document
    Jwt,
}

impl MatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::Exact => "exact",
            MatcherKind::Glob => "glob",
            MatcherKind::Regex => "regex",
            MatcherKind::JsonPath => "jsonPath",
            MatcherKind::JsonPartial => "jsonPartial",
            MatcherKind::Xpath => "xpath",
            MatcherKind::XmlPartial => "xmlPartial",
            MatcherKind::Array => "array",
            MatcherKind::Jwt => "jwt",
        }
    }
}

/// One field-level predicate: a kind plus its match value.
///
/// String kinds (exact, glob, regex, jsonPath, xpath) take a string value;
/// structural kinds (jsonPartial, array, jwt) take arbitrary JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherSpec {
    pub matcher: MatcherKind,
    pub value: serde_json::Value,
}

impl MatcherSpec {
    pub fn new(matcher: MatcherKind, value: impl Into<serde_json::Value>) -> Self {
        Self {
            matcher,
            value: value.into(),
        }
    }

    /// Shorthand for the most common spec.
    pub fn exact(value: impl Into<String>) -> Self {
        Self::new(MatcherKind::Exact, serde_json::Value::String(value.into()))
    }
}

/// A request template. Every field is optional; an absent field (or an empty
/// matcher list) matches any value. All specs listed for a field must succeed
/// for the field to match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Vec<MatcherSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Vec<MatcherSpec>>,
    /// Host the client addressed, e.g. `api.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Vec<MatcherSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<MatcherSpec>>,
    /// Raw query string as received (no parameter re-ordering)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Vec<MatcherSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<MatcherSpec>>,
    /// Header name -> matcher list. Names are matched case-insensitively.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Vec<MatcherSpec>>,
}

impl RequestMatcher {
    /// Iterate the present scalar fields as (name, specs) for validation and
    /// diagnostics. Headers are handled separately by callers.
    pub fn scalar_fields(&self) -> impl Iterator<Item = (&'static str, &Vec<MatcherSpec>)> {
        [
            ("method", self.method.as_ref()),
            ("scheme", self.scheme.as_ref()),
            ("destination", self.destination.as_ref()),
            ("path", self.path.as_ref()),
            ("query", self.query.as_ref()),
            ("body", self.body.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, specs)| specs.map(|s| (name, s)))
    }
}

// ============================================================================
// Responses
// ============================================================================

fn default_status_code() -> u16 {
    200
}

fn is_default_status(status: &u16) -> bool {
    *status == default_status_code()
}

/// A canned response returned when the paired matcher wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedResponse {
    #[serde(default = "default_status_code", skip_serializing_if = "is_default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    /// When true, `body` is base64-encoded binary data
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub encoded_body: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Vec<String>>,
    /// Enables `${request.*}` substitution in the body
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub templated: bool,
    /// State entries written after this response is served
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions_state: Option<HashMap<String, String>>,
    /// State entries that must hold for the owning pair to be a candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_state: Option<HashMap<String, String>>,
    /// Artificial delay before the response is returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_delay_ms: Option<u64>,
}

impl SimulatedResponse {
    /// Response body as raw bytes, decoding base64 when `encoded_body` is set.
    ///
    /// Base64 validity is checked at load time; a decode failure here (a
    /// hand-edited document that skipped validation) degrades to the literal
    /// bytes.
    pub fn body_bytes(&self) -> Vec<u8> {
        if self.encoded_body {
            base64::engine::general_purpose::STANDARD
                .decode(&self.body)
                .unwrap_or_else(|_| self.body.clone().into_bytes())
        } else {
            self.body.clone().into_bytes()
        }
    }
}

// ============================================================================
// Pairs and simulations
// ============================================================================

fn generate_pair_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Immutable association of one request template with one response.
/// The unit of storage, export and matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    /// Opaque identifier, unique within a simulation
    #[serde(default = "generate_pair_id")]
    pub id: String,
    pub request: RequestMatcher,
    pub response: SimulatedResponse,
}

impl Pair {
    pub fn new(request: RequestMatcher, response: SimulatedResponse) -> Self {
        Self {
            id: generate_pair_id(),
            request,
            response,
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// The full ordered pair sequence held by the store at a point in time.
/// Insertion order is significant: earlier-declared pairs win score ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub pairs: Vec<Pair>,
}

impl Simulation {
    pub fn new(pairs: Vec<Pair>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            pairs,
        }
    }
}
