//! Field-level predicate evaluators.
//!
//! Matcher specs are compiled once at load time (`CompiledMatcher::compile`)
//! so the hot path never parses a regex, glob or JSONPath. Evaluation
//! (`matches`) is pure and side-effect-free: a failure to parse the actual
//! value is a non-match, never an error. The only errors this module
//! produces are `ValidationError`s at compile time.
//!
//! # Module Structure
//!
//! - `field` - string-shaped matching (exact, glob, regex)
//! - `json` - JSONPath, partial containment, array containment
//! - `xml` - XPath and XML fragment containment
//! - `jwt` - JWT claim matching

mod field;
mod json;
mod jwt;
mod xml;

pub use json::json_contains;

use crate::errors::ValidationError;
use crate::simulation::types::{MatcherKind, MatcherSpec};
use regex::Regex;
use serde_json_path::JsonPath;
use std::sync::Arc;

/// A matcher spec compiled for repeated evaluation.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    Exact(String),
    Glob(Arc<Regex>),
    Regex(Arc<Regex>),
    JsonPath(Arc<JsonPath>),
    JsonPartial(serde_json::Value),
    /// Validated at compile time, evaluated against each document
    Xpath(String),
    /// Pre-minified expected fragment
    XmlPartial(String),
    Array(Vec<serde_json::Value>),
    Jwt(serde_json::Value),
}

impl CompiledMatcher {
    /// Compile one spec. `field` names the request field for error reporting.
    pub fn compile(spec: &MatcherSpec, field: &str) -> Result<Self, ValidationError> {
        let invalid = |message: String| ValidationError::InvalidMatcher {
            field: field.to_string(),
            kind: spec.matcher.as_str().to_string(),
            message,
        };

        let as_string = || {
            spec.value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid("match value must be a string".to_string()))
        };

        match spec.matcher {
            MatcherKind::Exact => Ok(CompiledMatcher::Exact(as_string()?)),
            MatcherKind::Glob => {
                let pattern = as_string()?;
                let regex = field::glob_to_regex(&pattern).map_err(|e| invalid(e.to_string()))?;
                Ok(CompiledMatcher::Glob(Arc::new(regex)))
            }
            MatcherKind::Regex => {
                let pattern = as_string()?;
                let regex = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;
                Ok(CompiledMatcher::Regex(Arc::new(regex)))
            }
            MatcherKind::JsonPath => {
                let expression = as_string()?;
                let path = JsonPath::parse(&expression).map_err(|e| invalid(e.to_string()))?;
                Ok(CompiledMatcher::JsonPath(Arc::new(path)))
            }
            MatcherKind::JsonPartial => Ok(CompiledMatcher::JsonPartial(spec.value.clone())),
            MatcherKind::Xpath => {
                let expression = as_string()?;
                xml::validate_xpath(&expression).map_err(invalid)?;
                Ok(CompiledMatcher::Xpath(expression))
            }
            MatcherKind::XmlPartial => {
                let fragment = as_string()?;
                Ok(CompiledMatcher::XmlPartial(xml::minify_xml(&fragment)))
            }
            MatcherKind::Array => {
                let items = spec
                    .value
                    .as_array()
                    .cloned()
                    .ok_or_else(|| invalid("match value must be a JSON array".to_string()))?;
                if items.is_empty() {
                    return Err(invalid("match array must not be empty".to_string()));
                }
                Ok(CompiledMatcher::Array(items))
            }
            MatcherKind::Jwt => Ok(CompiledMatcher::Jwt(spec.value.clone())),
        }
    }

    /// Compile a whole field's spec list.
    pub fn compile_all(
        specs: &[MatcherSpec],
        field: &str,
    ) -> Result<Vec<CompiledMatcher>, ValidationError> {
        specs.iter().map(|s| Self::compile(s, field)).collect()
    }

    /// Evaluate against an actual value. Pure; never fails.
    pub fn matches(&self, actual: &str) -> bool {
        match self {
            CompiledMatcher::Exact(expected) => field::exact_matches(expected, actual),
            CompiledMatcher::Glob(regex) => field::glob_matches(regex, actual),
            CompiledMatcher::Regex(regex) => field::regex_matches(regex, actual),
            CompiledMatcher::JsonPath(path) => json::json_path_matches(path, actual),
            CompiledMatcher::JsonPartial(expected) => json::json_partial_matches(expected, actual),
            CompiledMatcher::Xpath(expression) => xml::xpath_matches(expression, actual),
            CompiledMatcher::XmlPartial(fragment) => xml::xml_partial_matches(fragment, actual),
            CompiledMatcher::Array(items) => json::array_matches(items, actual),
            CompiledMatcher::Jwt(expected) => jwt::jwt_matches(expected, actual),
        }
    }
}

/// AND semantics across a field's matcher list. An empty list is a wildcard.
pub fn all_match(matchers: &[CompiledMatcher], actual: &str) -> bool {
    matchers.iter().all(|m| m.matches(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(kind: MatcherKind, value: serde_json::Value) -> MatcherSpec {
        MatcherSpec {
            matcher: kind,
            value,
        }
    }

    #[test]
    fn test_compile_and_match_each_kind() {
        let cases = [
            (spec(MatcherKind::Exact, json!("/users")), "/users", "/user"),
            (spec(MatcherKind::Glob, json!("/users/*")), "/users/1", "/teams/1"),
            (spec(MatcherKind::Regex, json!(r"^\d+$")), "123", "12a"),
            (
                spec(MatcherKind::JsonPath, json!("$.id")),
                r#"{"id": 1}"#,
                r#"{"name": "x"}"#,
            ),
            (
                spec(MatcherKind::JsonPartial, json!({"id": 1})),
                r#"{"id": 1, "extra": true}"#,
                r#"{"id": 2}"#,
            ),
            (
                spec(MatcherKind::Xpath, json!("/root/item")),
                "<root><item/></root>",
                "<root/>",
            ),
            (
                spec(MatcherKind::XmlPartial, json!("<item>a</item>")),
                "<root>\n<item>a</item>\n</root>",
                "<root><item>b</item></root>",
            ),
            (
                spec(MatcherKind::Array, json!([1, 2])),
                "[2, 1, 3]",
                "[1, 3]",
            ),
        ];

        for (matcher_spec, hit, miss) in cases {
            let compiled = CompiledMatcher::compile(&matcher_spec, "body").unwrap();
            assert!(compiled.matches(hit), "{:?} should match {hit}", matcher_spec.matcher);
            assert!(!compiled.matches(miss), "{:?} should not match {miss}", matcher_spec.matcher);
        }
    }

    #[test]
    fn test_compile_rejects_bad_regex() {
        let err = CompiledMatcher::compile(&spec(MatcherKind::Regex, json!("(unclosed")), "path")
            .unwrap_err();
        assert!(err.to_string().contains("regex matcher on field 'path'"));
    }

    #[test]
    fn test_compile_rejects_bad_jsonpath() {
        assert!(
            CompiledMatcher::compile(&spec(MatcherKind::JsonPath, json!("$[")), "body").is_err()
        );
    }

    #[test]
    fn test_compile_rejects_nonstring_value_for_string_kinds() {
        assert!(CompiledMatcher::compile(&spec(MatcherKind::Exact, json!(42)), "path").is_err());
        assert!(CompiledMatcher::compile(&spec(MatcherKind::Glob, json!(null)), "path").is_err());
    }

    #[test]
    fn test_compile_rejects_empty_array() {
        assert!(CompiledMatcher::compile(&spec(MatcherKind::Array, json!([])), "body").is_err());
    }

    #[test]
    fn test_all_match_and_semantics() {
        let matchers = vec![
            CompiledMatcher::compile(&spec(MatcherKind::Glob, json!("/api/*")), "path").unwrap(),
            CompiledMatcher::compile(&spec(MatcherKind::Regex, json!(r"v\d+")), "path").unwrap(),
        ];
        assert!(all_match(&matchers, "/api/v1/users"));
        assert!(!all_match(&matchers, "/api/users"));
        // Empty list is a wildcard
        assert!(all_match(&[], "anything"));
    }
}
