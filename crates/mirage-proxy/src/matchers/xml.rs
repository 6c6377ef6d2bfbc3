//! XML-shaped matchers: XPath evaluation and whitespace-insensitive
//! fragment containment.

use once_cell::sync::Lazy;
use regex::Regex;
use sxd_document::parser;
use sxd_xpath::{evaluate_xpath, Value};

static INTER_TAG_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">\s+<").expect("static regex"));

/// Collapse whitespace between tags and trim the ends, so fragment
/// containment ignores formatting differences.
pub fn minify_xml(xml: &str) -> String {
    INTER_TAG_WHITESPACE
        .replace_all(xml.trim(), "><")
        .into_owned()
}

/// Validate an XPath expression at matcher-load time.
pub fn validate_xpath(expression: &str) -> Result<(), String> {
    let factory = sxd_xpath::Factory::new();
    match factory.build(expression) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err("empty XPath expression".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Evaluate an XPath against a body; matches on a non-empty result.
/// An unparsable body is a non-match, never an error.
pub fn xpath_matches(expression: &str, actual: &str) -> bool {
    let Ok(package) = parser::parse(actual) else {
        return false;
    };
    let document = package.as_document();
    match evaluate_xpath(&document, expression) {
        Ok(Value::Boolean(b)) => b,
        Ok(Value::Number(n)) => !n.is_nan(),
        Ok(Value::String(s)) => !s.is_empty(),
        Ok(Value::Nodeset(nodes)) => nodes.iter().next().is_some(),
        Err(_) => false,
    }
}

/// Whitespace-insensitive containment of an XML fragment in the body.
/// Both sides must parse as XML; the expected fragment is pre-minified at
/// compile time.
pub fn xml_partial_matches(minified_expected: &str, actual: &str) -> bool {
    if parser::parse(actual).is_err() {
        return false;
    }
    minify_xml(actual).contains(minified_expected)
}
