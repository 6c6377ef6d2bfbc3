//! Response body templating from request data.
//!
//! When a simulated response sets `templated`, occurrences of
//! `${request.<field>}` in its body are substituted with values captured
//! from the incoming request before the response is returned.
//!
//! # Supported Template Variables
//!
//! - `${request.method}` / `${request.scheme}` / `${request.destination}`
//! - `${request.path}` - request path without query string
//! - `${request.body}` - raw request body
//! - `${request.query.<name>}` - query parameter value (URL-decoded)
//! - `${request.headers.<name>}` - header value (case-insensitive)
//!
//! Unresolvable variables are left untouched so a malformed template is
//! visible in the output rather than silently blanked.

use crate::exchange::CapturedRequest;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static TEMPLATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{request\.([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)?)\}")
        .expect("static regex")
});

/// Parse a raw query string into URL-decoded parameters.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if query.is_empty() {
        return params;
    }
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            let decoded = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            params.insert(key.to_string(), decoded);
        } else if !pair.is_empty() {
            params.insert(pair.to_string(), String::new());
        }
    }
    params
}

/// Look up one dotted template path against the request.
fn lookup(request: &CapturedRequest, path: &str) -> Option<String> {
    let parts: Vec<&str> = path.splitn(2, '.').collect();
    match parts.as_slice() {
        ["method"] => Some(request.method.clone()),
        ["scheme"] => Some(request.scheme.clone()),
        ["destination"] => Some(request.destination.clone()),
        ["path"] => Some(request.path.clone()),
        ["body"] => Some(request.body.clone()),
        ["query", name] => parse_query_string(&request.query).get(*name).cloned(),
        ["headers", name] => request.header_joined(name),
        _ => None,
    }
}

/// Substitute `${request.*}` variables in a response body.
pub fn render(body: &str, request: &CapturedRequest) -> String {
    TEMPLATE_REGEX
        .replace_all(body, |caps: &Captures| {
            lookup(request, &caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
