//! Simulation document import and export.
//!
//! The persisted format is the logical schema only: a schema-versioned JSON
//! document listing pairs in order. Documents carrying an unrecognized
//! schema version are rejected outright rather than interpreted on a
//! compatibility guess.

use super::types::{Simulation, SCHEMA_VERSION};
use crate::errors::ValidationError;
use std::fs;
use std::path::Path;
use tracing::info;

/// Parse and version-check a simulation document.
pub fn import_simulation(json: &str) -> Result<Simulation, ValidationError> {
    // Version is checked before full deserialization so a schema mismatch is
    // reported as such, not as a field error deep in some pair
    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct VersionProbe {
        #[serde(default = "current_version")]
        schema_version: u32,
    }
    fn current_version() -> u32 {
        SCHEMA_VERSION
    }

    let probe: VersionProbe = serde_json::from_str(json)
        .map_err(|e| ValidationError::MalformedDocument(e.to_string()))?;
    if probe.schema_version != SCHEMA_VERSION {
        return Err(ValidationError::UnsupportedSchemaVersion {
            found: probe.schema_version,
            supported: SCHEMA_VERSION,
        });
    }

    serde_json::from_str(json).map_err(|e| ValidationError::MalformedDocument(e.to_string()))
}

/// Serialize a simulation for export.
pub fn export_simulation(simulation: &Simulation) -> String {
    // Serialization of these derive-only types cannot fail
    serde_json::to_string_pretty(simulation).unwrap_or_default()
}

/// Load a simulation document from disk.
pub fn load_from_file(path: &Path) -> Result<Simulation, ValidationError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ValidationError::MalformedDocument(format!("{}: {e}", path.display())))?;
    let simulation = import_simulation(&contents)?;
    info!(
        "loaded {} pairs from {}",
        simulation.pairs.len(),
        path.display()
    );
    Ok(simulation)
}

/// Write a simulation document to disk.
pub fn save_to_file(simulation: &Simulation, path: &Path) -> Result<(), std::io::Error> {
    fs::write(path, export_simulation(simulation))?;
    info!(
        "saved {} pairs to {}",
        simulation.pairs.len(),
        path.display()
    );
    Ok(())
}
