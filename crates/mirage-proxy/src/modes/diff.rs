//! Response diffing for diff mode.
//!
//! Compares a real upstream response against the stored expectation of the
//! matched pair. JSON bodies are compared structurally first so formatting
//! differences are not noise; anything else falls back to a line diff.

use crate::exchange::CapturedResponse;
use crate::simulation::SimulatedResponse;
use serde::{Deserialize, Serialize};
use similar::TextDiff;

/// One divergence between expectation and observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    /// `status`, `headers.<name>` or `body`
    pub field: String,
    pub expected: String,
    pub actual: String,
    /// Unified line diff, only produced for bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
}

/// Structured comparison result recorded on the journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub pair_id: String,
    pub entries: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn has_differences(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Compare a real response against the stored expectation.
pub fn diff_response(
    pair_id: &str,
    expected: &SimulatedResponse,
    actual: &CapturedResponse,
) -> DiffReport {
    let mut entries = Vec::new();

    if expected.status != actual.status {
        entries.push(DiffEntry {
            field: "status".to_string(),
            expected: expected.status.to_string(),
            actual: actual.status.to_string(),
            delta: None,
        });
    }

    // Only headers the expectation names are compared; upstreams add
    // hop-dependent headers that are not part of the contract
    for (name, expected_values) in &expected.headers {
        let expected_joined = expected_values.join(";");
        let actual_joined = actual
            .headers
            .get(&name.to_lowercase())
            .or_else(|| actual.headers.get(name))
            .map(|values| values.join(";"));
        if actual_joined.as_deref() != Some(expected_joined.as_str()) {
            entries.push(DiffEntry {
                field: format!("headers.{name}"),
                expected: expected_joined,
                actual: actual_joined.unwrap_or_default(),
                delta: None,
            });
        }
    }

    let expected_body = String::from_utf8_lossy(&expected.body_bytes()).into_owned();
    let actual_body = actual.body_string();
    if !bodies_equal(&expected_body, &actual_body) {
        let delta = TextDiff::from_lines(expected_body.as_str(), actual_body.as_str())
            .unified_diff()
            .header("expected", "actual")
            .to_string();
        entries.push(DiffEntry {
            field: "body".to_string(),
            expected: expected_body,
            actual: actual_body,
            delta: Some(delta),
        });
    }

    DiffReport {
        pair_id: pair_id.to_string(),
        entries,
    }
}

/// Structural equality when both sides are JSON, byte equality otherwise.
fn bodies_equal(expected: &str, actual: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(expected),
        serde_json::from_str::<serde_json::Value>(actual),
    ) {
        (Ok(e), Ok(a)) => e == a,
        _ => expected == actual,
    }
}
