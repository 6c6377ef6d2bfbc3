//! Compiled forms of the simulation data model.
//!
//! Pairs are compiled when they enter the store so the matching hot path
//! works on ready-to-evaluate predicates. A compiled pair keeps its source
//! `Pair` alongside, which is what export and capture hand back out.

use crate::errors::ValidationError;
use crate::matchers::CompiledMatcher;
use crate::simulation::types::{Pair, RequestMatcher, Simulation};

/// A request template with every matcher compiled.
///
/// `None` means the field was absent (wildcard, contributes no score);
/// `Some(vec![])` is also a wildcard but can only arise from an explicitly
/// empty list in the source document.
#[derive(Debug, Clone, Default)]
pub struct CompiledRequestMatcher {
    pub method: Option<Vec<CompiledMatcher>>,
    pub scheme: Option<Vec<CompiledMatcher>>,
    pub destination: Option<Vec<CompiledMatcher>>,
    pub path: Option<Vec<CompiledMatcher>>,
    pub query: Option<Vec<CompiledMatcher>>,
    pub body: Option<Vec<CompiledMatcher>>,
    /// Header names lowercased at compile time for case-insensitive lookup
    pub headers: Vec<(String, Vec<CompiledMatcher>)>,
}

impl CompiledRequestMatcher {
    pub fn compile(matcher: &RequestMatcher) -> Result<Self, ValidationError> {
        let compile_field = |specs: &Option<Vec<_>>, field: &str| {
            specs
                .as_ref()
                .map(|s| CompiledMatcher::compile_all(s, field))
                .transpose()
        };

        let mut headers = Vec::with_capacity(matcher.headers.len());
        for (name, specs) in &matcher.headers {
            let field = format!("headers.{name}");
            headers.push((
                name.to_lowercase(),
                CompiledMatcher::compile_all(specs, &field)?,
            ));
        }
        // Deterministic evaluation order regardless of source map iteration
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            method: compile_field(&matcher.method, "method")?,
            scheme: compile_field(&matcher.scheme, "scheme")?,
            destination: compile_field(&matcher.destination, "destination")?,
            path: compile_field(&matcher.path, "path")?,
            query: compile_field(&matcher.query, "query")?,
            body: compile_field(&matcher.body, "body")?,
            headers,
        })
    }
}

/// One pair as held by the store: source + compiled template + insertion index.
#[derive(Debug, Clone)]
pub struct CompiledPair {
    /// Position in declaration order; the matching tie-break key
    pub index: usize,
    pub source: Pair,
    pub matcher: CompiledRequestMatcher,
}

/// An immutable, fully-compiled snapshot of the store.
#[derive(Debug, Clone, Default)]
pub struct CompiledSimulation {
    pairs: Vec<CompiledPair>,
}

impl CompiledSimulation {
    /// Compile a whole simulation. Fails without producing a partial result.
    pub fn compile(simulation: &Simulation) -> Result<Self, ValidationError> {
        let pairs = simulation
            .pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| {
                Ok(CompiledPair {
                    index,
                    source: pair.clone(),
                    matcher: CompiledRequestMatcher::compile(&pair.request)?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[CompiledPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Append one compiled pair, producing a new snapshot.
    pub(crate) fn with_appended(&self, pair: Pair) -> Result<Self, ValidationError> {
        let matcher = CompiledRequestMatcher::compile(&pair.request)?;
        let mut pairs = self.pairs.clone();
        pairs.push(CompiledPair {
            index: pairs.len(),
            source: pair,
            matcher,
        });
        Ok(Self { pairs })
    }

    /// Reconstruct the source simulation, preserving order.
    pub fn export(&self) -> Simulation {
        Simulation::new(self.pairs.iter().map(|p| p.source.clone()).collect())
    }
}
