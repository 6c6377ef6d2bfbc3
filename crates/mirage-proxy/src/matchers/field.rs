//! String-shaped matchers: exact, glob and regex.

use regex::Regex;
use std::sync::Arc;

/// Translate a glob pattern into an anchored regex.
///
/// `*` expands to any run of characters (including newlines, so body globs
/// work); every other character is matched literally.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("(?s)^");
    for ch in pattern.chars() {
        if ch == '*' {
            expr.push_str(".*");
        } else {
            expr.push_str(&regex::escape(&ch.to_string()));
        }
    }
    expr.push('$');
    Regex::new(&expr)
}

/// Exact byte-for-byte equality.
#[inline]
pub fn exact_matches(expected: &str, actual: &str) -> bool {
    expected == actual
}

/// Anchored glob match via a precompiled regex.
#[inline]
pub fn glob_matches(compiled: &Arc<Regex>, actual: &str) -> bool {
    compiled.is_match(actual)
}

/// Regex match anywhere in the value (not a full match).
#[inline]
pub fn regex_matches(compiled: &Arc<Regex>, actual: &str) -> bool {
    compiled.is_match(actual)
}
