//! Captured request/response exchange model.
//!
//! These are the proxy's view of actual traffic: what the matching engine
//! evaluates templates against, what capture mode turns into pairs, and what
//! the journal records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An inbound request as observed by the proxy.
///
/// Header names are stored lowercased so lookups are case-insensitive
/// regardless of what the client sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    pub method: String,
    pub scheme: String,
    pub destination: String,
    pub path: String,
    /// Raw query string, empty when the request had none
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Vec<String>>,
}

impl CapturedRequest {
    /// Header values for a name, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&Vec<String>> {
        self.headers.get(&name.to_lowercase())
    }

    /// Header values joined for matcher evaluation. Multi-valued headers are
    /// joined with ";", matching the serialization the stored templates use.
    pub fn header_joined(&self, name: &str) -> Option<String> {
        self.header(name).map(|values| values.join(";"))
    }
}

/// A response as observed by the proxy, from upstream or from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl CapturedResponse {
    /// Body as UTF-8 text, lossily. Diffing and capture use this; the raw
    /// bytes stay authoritative for what is sent to the client.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
