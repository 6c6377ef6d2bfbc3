//! Shared state for sequenced scenarios.
//!
//! Responses can require state entries (`requiresState`) and write them
//! (`transitionsState`), letting a simulation express call sequences such as
//! basket-empty -> basket-full. The map is process-wide and independent of
//! the simulation store's lock.

use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct StateStore {
    entries: RwLock<HashMap<String, String>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time view used for candidacy gating during one match pass.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }

    /// Apply a served response's transitions. Empty-string values delete the
    /// key, so a scenario can reset itself.
    pub fn apply_transitions(&self, transitions: &HashMap<String, String>) {
        if transitions.is_empty() {
            return;
        }
        let mut entries = self.entries.write();
        for (key, value) in transitions {
            if value.is_empty() {
                entries.remove(key);
            } else {
                entries.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn delete_all(&self) {
        self.entries.write().clear();
    }
}
