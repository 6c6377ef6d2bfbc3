//! Simulation data model, compiled forms, store and persistence.
//!
//! # Module Structure
//!
//! - `types` - source data model (pairs, matchers, responses)
//! - `compiled` - load-time compiled forms the hot path evaluates
//! - `store` - snapshot-swapped concurrent store
//! - `persistence` - schema-versioned document import/export

pub mod compiled;
pub mod persistence;
pub mod store;
pub mod types;

pub use compiled::{CompiledPair, CompiledRequestMatcher, CompiledSimulation};
pub use store::SimulationStore;
pub use types::{
    MatcherKind, MatcherSpec, Pair, RequestMatcher, SimulatedResponse, Simulation, SCHEMA_VERSION,
};
