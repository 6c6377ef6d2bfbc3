//! Append-only journal of observed exchanges.
//!
//! Every request the proxy serves ends in exactly one journal append,
//! whatever the outcome. The journal is independent of the simulation
//! store: entries are immutable once appended and evicted oldest-first
//! when a capacity is configured. Entry order is append-completion order.

use crate::errors::ValidationError;
use crate::exchange::{CapturedRequest, CapturedResponse};
use crate::matching::request_matches;
use crate::modes::diff::DiffReport;
use crate::modes::Mode;
use crate::simulation::{CompiledRequestMatcher, RequestMatcher};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One observed request/response exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub request: CapturedRequest,
    pub response: CapturedResponse,
    pub timestamp: DateTime<Utc>,
    /// Mode active when the exchange was captured
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pair_id: Option<String>,
    /// Structured comparison recorded by diff mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffReport>,
    /// Middleware failure the request path degraded through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middleware_error: Option<String>,
    /// Upstream failure recorded for forwarding modes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_error: Option<String>,
}

impl JournalEntry {
    pub fn new(
        request: CapturedRequest,
        response: CapturedResponse,
        mode: Mode,
        matched_pair_id: Option<String>,
    ) -> Self {
        Self {
            request,
            response,
            timestamp: Utc::now(),
            mode,
            matched_pair_id,
            diff: None,
            middleware_error: None,
            upstream_error: None,
        }
    }
}

/// Diagnostic query over the journal: time range and/or a request template
/// evaluated through the matcher library.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalFilter {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub request: Option<RequestMatcher>,
}

pub struct Journal {
    entries: Mutex<VecDeque<JournalEntry>>,
    /// None = unlimited
    capacity: Option<usize>,
}

impl Journal {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// O(1) amortized append with oldest-first eviction at capacity.
    pub fn append(&self, entry: JournalEntry) {
        let mut entries = self.entries.lock();
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return;
            }
            while entries.len() >= capacity {
                entries.pop_front();
            }
        }
        entries.push_back(entry);
    }

    /// All entries in append order.
    pub fn get_all(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Entries satisfying the filter, in append order. The template is
    /// compiled once per query; an invalid template is a validation error,
    /// not an empty result.
    pub fn query(&self, filter: &JournalFilter) -> Result<Vec<JournalEntry>, ValidationError> {
        let compiled = filter
            .request
            .as_ref()
            .map(CompiledRequestMatcher::compile)
            .transpose()?;

        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|entry| {
                if let Some(from) = filter.from {
                    if entry.timestamp < from {
                        return false;
                    }
                }
                if let Some(to) = filter.to {
                    if entry.timestamp > to {
                        return false;
                    }
                }
                compiled
                    .as_ref()
                    .map_or(true, |matcher| request_matches(&entry.request, matcher))
            })
            .cloned()
            .collect())
    }

    pub fn delete_all(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
