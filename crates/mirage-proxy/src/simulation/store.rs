//! Snapshot-swapped simulation store.
//!
//! Writers validate and compile a complete new pair sequence first, then
//! swap the shared handle in one assignment. Readers clone the handle under
//! a brief read lock and run match computation against the snapshot with no
//! lock held, so the hot path is never serialized behind matching cost and
//! never observes a half-replaced set.

use super::compiled::CompiledSimulation;
use super::types::{Pair, Simulation};
use crate::errors::{StoreError, StoreInvariantError};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct SimulationStore {
    snapshot: RwLock<Arc<CompiledSimulation>>,
}

impl Default for SimulationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(CompiledSimulation::default())),
        }
    }

    /// Current snapshot. Callers match against this without further locking;
    /// a concurrent replace does not disturb it.
    pub fn snapshot(&self) -> Arc<CompiledSimulation> {
        self.snapshot.read().clone()
    }

    /// The stored pairs in declaration order, as source data.
    pub fn get_all(&self) -> Simulation {
        self.snapshot().export()
    }

    /// Atomically replace the whole pair set. Validation and compilation
    /// happen before the swap; on any failure the previous set stays intact.
    pub fn replace_all(&self, simulation: Simulation) -> Result<(), StoreError> {
        check_unique_ids(&simulation.pairs)?;
        let compiled = Arc::new(CompiledSimulation::compile(&simulation)?);
        let count = compiled.len();
        *self.snapshot.write() = compiled;
        info!("simulation replaced: {count} pairs");
        Ok(())
    }

    /// Append one pair at the end, preserving tie-break order for
    /// subsequent matches. Used by capture mode.
    pub fn append(&self, pair: Pair) -> Result<(), StoreError> {
        let mut guard = self.snapshot.write();
        if guard.pairs().iter().any(|p| p.source.id == pair.id) {
            return Err(StoreInvariantError::DuplicatePairId(pair.id).into());
        }
        let id = pair.id.clone();
        *guard = Arc::new(guard.with_appended(pair)?);
        debug!("pair appended: {id}");
        Ok(())
    }

    pub fn delete_all(&self) {
        *self.snapshot.write() = Arc::new(CompiledSimulation::default());
        info!("simulation cleared");
    }
}

fn check_unique_ids(pairs: &[Pair]) -> Result<(), StoreInvariantError> {
    let mut seen = HashSet::with_capacity(pairs.len());
    for pair in pairs {
        if !seen.insert(pair.id.as_str()) {
            return Err(StoreInvariantError::DuplicatePairId(pair.id.clone()));
        }
    }
    Ok(())
}
