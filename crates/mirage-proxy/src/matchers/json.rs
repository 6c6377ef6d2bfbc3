//! JSON-shaped matchers: JSONPath queries, partial containment and array
//! element containment.

use serde_json::Value;
use serde_json_path::JsonPath;

/// True when `expected` is structurally contained in `actual`:
/// object keys are a subset (recursively), array elements are contained
/// order-independently, scalars compare by equality.
pub fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => e
            .iter()
            .all(|(key, ev)| a.get(key).is_some_and(|av| json_contains(av, ev))),
        (Value::Array(a), Value::Array(e)) => {
            e.iter().all(|ev| a.iter().any(|av| json_contains(av, ev)))
        }
        _ => actual == expected,
    }
}

/// Evaluate a precompiled JSONPath against a body. An unparsable body is a
/// non-match, never an error.
pub fn json_path_matches(path: &JsonPath, actual: &str) -> bool {
    let Ok(json) = serde_json::from_str::<Value>(actual) else {
        return false;
    };
    !path.query(&json).is_empty()
}

/// Partial containment of the match document in the body.
pub fn json_partial_matches(expected: &Value, actual: &str) -> bool {
    let Ok(json) = serde_json::from_str::<Value>(actual) else {
        return false;
    };
    json_contains(&json, expected)
}

/// The body must parse as a JSON array containing every element of the match
/// array, order-independently. The match array is validated non-empty at
/// compile time.
pub fn array_matches(expected: &[Value], actual: &str) -> bool {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(actual) else {
        return false;
    };
    expected
        .iter()
        .all(|ev| items.iter().any(|av| json_contains(av, ev)))
}
