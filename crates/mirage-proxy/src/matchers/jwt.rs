//! JWT claim matching.
//!
//! The actual value is treated as a compact-serialization JWT; its header
//! and payload segments are base64url-decoded into a
//! `{"header": …, "payload": …}` document which the match value must be
//! structurally contained in. Signatures are not verified; this matcher
//! asserts claims, not authenticity.

use super::json::json_contains;
use base64::Engine;
use serde_json::{json, Value};

/// Decode the header and payload segments of a compact JWT.
/// Returns None for anything that does not decode as a JWT.
fn decode_jwt(token: &str) -> Option<Value> {
    let mut segments = token.trim().splitn(3, '.');
    let header_b64 = segments.next()?;
    let payload_b64 = segments.next()?;
    // The signature segment must exist even though it is not inspected
    segments.next()?;

    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header: Value = serde_json::from_slice(&engine.decode(header_b64).ok()?).ok()?;
    let payload: Value = serde_json::from_slice(&engine.decode(payload_b64).ok()?).ok()?;

    Some(json!({ "header": header, "payload": payload }))
}

/// Match a JWT's decoded claims against an expected partial document.
pub fn jwt_matches(expected: &Value, actual: &str) -> bool {
    match decode_jwt(actual) {
        Some(decoded) => json_contains(&decoded, expected),
        None => false,
    }
}
