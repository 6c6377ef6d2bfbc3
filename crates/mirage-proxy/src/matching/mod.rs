//! Best-match selection over a simulation snapshot.
//!
//! The engine is a pure function of (request, snapshot, state view): it
//! never mutates the store and holds no lock — callers hand it an immutable
//! snapshot taken at entry. A pair is a candidate only when every present
//! field of its template matches; candidates are scored by how many
//! non-wildcard fields matched, highest score wins, ties go to the
//! earliest-declared pair.

use crate::exchange::CapturedRequest;
use crate::matchers::all_match;
use crate::simulation::{CompiledPair, CompiledRequestMatcher, CompiledSimulation};
use serde::Serialize;
use std::collections::HashMap;

/// Why one pair was rejected. Supports observability without a match.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedPair {
    pub pair_id: String,
    /// Template fields that failed, e.g. `path`, `headers.x-api-key`, `state`
    pub failed_fields: Vec<String>,
}

/// Per-request match diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDiagnostics {
    pub missed: Vec<MissedPair>,
}

impl MatchDiagnostics {
    /// The rejected pair that came closest (fewest failed fields), for
    /// no-match error responses.
    pub fn closest_miss(&self) -> Option<&MissedPair> {
        self.missed
            .iter()
            .min_by_key(|miss| miss.failed_fields.len())
    }
}

/// Outcome of a match attempt.
pub struct MatchResult<'a> {
    pub pair: Option<&'a CompiledPair>,
    pub diagnostics: MatchDiagnostics,
}

/// Select the best-matching pair for a request, or none.
///
/// `state` is the current sequenced-scenario view: pairs whose response
/// requires state entries not present are not candidates.
pub fn find_best_match<'a>(
    request: &CapturedRequest,
    simulation: &'a CompiledSimulation,
    state: &HashMap<String, String>,
) -> MatchResult<'a> {
    let mut best: Option<(usize, &CompiledPair)> = None;
    let mut diagnostics = MatchDiagnostics::default();

    for pair in simulation.pairs() {
        let mut failed = template_failed_fields(request, &pair.matcher);
        if let Some(required) = &pair.source.response.requires_state {
            let satisfied = required
                .iter()
                .all(|(key, value)| state.get(key) == Some(value));
            if !satisfied {
                failed.push("state".to_string());
            }
        }
        if failed.is_empty() {
            let score = score(&pair.matcher);
            // Strictly-greater keeps the earliest pair on ties
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, pair));
            }
        } else {
            diagnostics.missed.push(MissedPair {
                pair_id: pair.source.id.clone(),
                failed_fields: failed,
            });
        }
    }

    MatchResult {
        pair: best.map(|(_, pair)| pair),
        diagnostics,
    }
}

/// Count of non-wildcard fields; headers count once per header name.
fn score(matcher: &CompiledRequestMatcher) -> usize {
    let scalar = [
        &matcher.method,
        &matcher.scheme,
        &matcher.destination,
        &matcher.path,
        &matcher.query,
        &matcher.body,
    ]
    .into_iter()
    .filter(|field| field.as_ref().is_some_and(|m| !m.is_empty()))
    .count();
    let headers = matcher
        .headers
        .iter()
        .filter(|(_, m)| !m.is_empty())
        .count();
    scalar + headers
}

/// True when the request satisfies every present field of a template.
/// State gating does not apply here; journal queries reuse this directly.
pub fn request_matches(request: &CapturedRequest, matcher: &CompiledRequestMatcher) -> bool {
    template_failed_fields(request, matcher).is_empty()
}

fn template_failed_fields(
    request: &CapturedRequest,
    matcher: &CompiledRequestMatcher,
) -> Vec<String> {
    let mut failed = Vec::new();

    let scalar_fields = [
        ("method", &matcher.method, request.method.as_str()),
        ("scheme", &matcher.scheme, request.scheme.as_str()),
        (
            "destination",
            &matcher.destination,
            request.destination.as_str(),
        ),
        ("path", &matcher.path, request.path.as_str()),
        ("query", &matcher.query, request.query.as_str()),
        ("body", &matcher.body, request.body.as_str()),
    ];
    for (name, field, actual) in scalar_fields {
        if let Some(matchers) = field {
            if !all_match(matchers, actual) {
                failed.push(name.to_string());
            }
        }
    }

    for (name, matchers) in &matcher.headers {
        if matchers.is_empty() {
            continue;
        }
        match request.header_joined(name) {
            Some(actual) if all_match(matchers, &actual) => {}
            _ => failed.push(format!("headers.{name}")),
        }
    }

    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{
        MatcherKind, MatcherSpec, Pair, RequestMatcher, SimulatedResponse, Simulation,
    };
    use serde_json::json;

    fn request(method: &str, path: &str) -> CapturedRequest {
        CapturedRequest {
            method: method.to_string(),
            scheme: "http".to_string(),
            destination: "api.example.com".to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn pair(method: Option<&str>, path: Option<&str>) -> Pair {
        let mut matcher = RequestMatcher::default();
        if let Some(m) = method {
            matcher.method = Some(vec![MatcherSpec::exact(m)]);
        }
        if let Some(p) = path {
            matcher.path = Some(vec![MatcherSpec::exact(p)]);
        }
        Pair::new(matcher, SimulatedResponse::default())
    }

    fn compile(pairs: Vec<Pair>) -> CompiledSimulation {
        CompiledSimulation::compile(&Simulation::new(pairs)).unwrap()
    }

    fn no_state() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_method_and_path_match_ignores_other_fields() {
        let simulation = compile(vec![pair(Some("GET"), Some("/users/1"))]);
        let mut req = request("GET", "/users/1");
        req.query = "verbose=true".to_string();
        req.body = "anything".to_string();
        req.headers
            .insert("x-extra".to_string(), vec!["1".to_string()]);

        let result = find_best_match(&req, &simulation, &no_state());
        assert!(result.pair.is_some());
    }

    #[test]
    fn test_more_specific_candidate_wins() {
        let loose = pair(Some("GET"), None);
        let tight = pair(Some("GET"), Some("/users/1"));
        let loose_id = loose.id.clone();
        let tight_id = tight.id.clone();
        // Declared loose-first: specificity must beat declaration order
        let simulation = compile(vec![loose, tight]);

        let result = find_best_match(&request("GET", "/users/1"), &simulation, &no_state());
        assert_eq!(result.pair.unwrap().source.id, tight_id);

        // A request only the loose pair matches still resolves
        let result = find_best_match(&request("GET", "/other"), &simulation, &no_state());
        assert_eq!(result.pair.unwrap().source.id, loose_id);
    }

    #[test]
    fn test_tie_breaks_to_earliest_declared() {
        let first = pair(Some("GET"), Some("/dup"));
        let second = pair(Some("GET"), Some("/dup"));
        let first_id = first.id.clone();
        let simulation = compile(vec![first, second]);

        let result = find_best_match(&request("GET", "/dup"), &simulation, &no_state());
        assert_eq!(result.pair.unwrap().source.id, first_id);
    }

    #[test]
    fn test_deterministic_across_repeated_calls() {
        let simulation = compile(vec![
            pair(Some("GET"), None),
            pair(None, Some("/users/1")),
            pair(Some("GET"), Some("/users/1")),
        ]);
        let req = request("GET", "/users/1");
        let first = find_best_match(&req, &simulation, &no_state())
            .pair
            .unwrap()
            .source
            .id
            .clone();
        for _ in 0..10 {
            let again = find_best_match(&req, &simulation, &no_state());
            assert_eq!(again.pair.unwrap().source.id, first);
        }
    }

    #[test]
    fn test_no_match_diagnostics_name_failed_fields() {
        let simulation = compile(vec![pair(Some("POST"), Some("/users/1"))]);
        let result = find_best_match(&request("GET", "/users/2"), &simulation, &no_state());

        assert!(result.pair.is_none());
        let missed = &result.diagnostics.missed[0];
        assert_eq!(
            missed.failed_fields,
            vec!["method".to_string(), "path".to_string()]
        );
    }

    #[test]
    fn test_closest_miss_prefers_fewest_failures() {
        let far = pair(Some("POST"), Some("/a"));
        let near = pair(Some("GET"), Some("/b"));
        let near_id = near.id.clone();
        let simulation = compile(vec![far, near]);

        let result = find_best_match(&request("GET", "/c"), &simulation, &no_state());
        assert_eq!(
            result.diagnostics.closest_miss().unwrap().pair_id,
            near_id
        );
    }

    #[test]
    fn test_header_matching_is_case_insensitive_on_names() {
        let mut matcher = RequestMatcher::default();
        matcher.headers.insert(
            "X-Api-Key".to_string(),
            vec![MatcherSpec::exact("secret")],
        );
        let simulation = compile(vec![Pair::new(matcher, SimulatedResponse::default())]);

        let mut req = request("GET", "/");
        req.headers
            .insert("x-api-key".to_string(), vec!["secret".to_string()]);
        assert!(find_best_match(&req, &simulation, &no_state()).pair.is_some());

        let mut wrong = request("GET", "/");
        wrong
            .headers
            .insert("x-api-key".to_string(), vec!["other".to_string()]);
        let result = find_best_match(&wrong, &simulation, &no_state());
        assert!(result.pair.is_none());
        assert_eq!(
            result.diagnostics.missed[0].failed_fields,
            vec!["headers.x-api-key".to_string()]
        );
    }

    #[test]
    fn test_absent_header_fails_nonwildcard_matcher() {
        let mut matcher = RequestMatcher::default();
        matcher
            .headers
            .insert("Authorization".to_string(), vec![MatcherSpec::exact("token")]);
        let simulation = compile(vec![Pair::new(matcher, SimulatedResponse::default())]);

        assert!(find_best_match(&request("GET", "/"), &simulation, &no_state())
            .pair
            .is_none());
    }

    #[test]
    fn test_requires_state_gates_candidacy() {
        let mut matcher = RequestMatcher::default();
        matcher.path = Some(vec![MatcherSpec::exact("/checkout")]);
        let response = SimulatedResponse {
            requires_state: Some(HashMap::from([(
                "basket".to_string(),
                "full".to_string(),
            )])),
            ..Default::default()
        };
        let simulation = compile(vec![Pair::new(matcher, response)]);
        let req = request("GET", "/checkout");

        let result = find_best_match(&req, &simulation, &no_state());
        assert!(result.pair.is_none());
        assert_eq!(
            result.diagnostics.missed[0].failed_fields,
            vec!["state".to_string()]
        );

        let state = HashMap::from([("basket".to_string(), "full".to_string())]);
        assert!(find_best_match(&req, &simulation, &state).pair.is_some());
    }

    #[test]
    fn test_body_matcher_kinds_participate() {
        let mut matcher = RequestMatcher::default();
        matcher.body = Some(vec![MatcherSpec {
            matcher: MatcherKind::JsonPartial,
            value: json!({"action": "create"}),
        }]);
        let simulation = compile(vec![Pair::new(matcher, SimulatedResponse::default())]);

        let mut req = request("POST", "/actions");
        req.body = r#"{"action": "create", "id": 9}"#.to_string();
        assert!(find_best_match(&req, &simulation, &no_state()).pair.is_some());

        req.body = r#"{"action": "delete"}"#.to_string();
        assert!(find_best_match(&req, &simulation, &no_state()).pair.is_none());
    }

    #[test]
    fn test_empty_simulation_yields_no_match_and_no_diagnostics() {
        let simulation = compile(vec![]);
        let result = find_best_match(&request("GET", "/"), &simulation, &no_state());
        assert!(result.pair.is_none());
        assert!(result.diagnostics.missed.is_empty());
        assert!(result.diagnostics.closest_miss().is_none());
    }
}
