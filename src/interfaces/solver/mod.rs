//! Interfaces to the external Hartree-Fock back-ends and ADC solver that produce the results
//! being cross-referenced.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use anyhow::{self, format_err};
use serde::{Deserialize, Serialize};

use crate::interfaces::source::HfSource;
use crate::target::adc::AdcResult;
use crate::target::hf_data::HfData;
use crate::target::reference_state::Operator;

mod stored;

pub use stored::StoredResultsSolver;


// ==================
// Struct definitions
// ==================

/// A structure identifying one physical system to be computed by every back-end. Both names
/// are opaque identifiers used only for dispatch and caching.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestCase {
    /// The name of the molecule.
    pub molecule: String,

    /// The name of the basis set.
    pub basis: String,
}

impl TestCase {
    /// Constructs a new test case.
    pub fn new(molecule: &str, basis: &str) -> Self {
        Self {
            molecule: molecule.to_string(),
            basis: basis.to_string(),
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.molecule, self.basis)
    }
}

/// A structure describing an ADC calculation to be carried out on top of a Hartree-Fock
/// reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdcRequest {
    /// The ADC method, *e.g.* `adc2`.
    pub method: String,

    /// The number of excited states to be computed.
    pub n_states: usize,

    /// The convergence tolerance of the eigensolver.
    #[serde(default = "default_conv_tol")]
    pub conv_tol: f64,

    /// The number of core orbitals for core-valence-separated methods, `None` otherwise.
    #[serde(default)]
    pub n_core_orbitals: Option<usize>,
}

fn default_conv_tol() -> f64 {
    1e-10
}

impl AdcRequest {
    /// Constructs a request for a valence method with the default eigensolver tolerance.
    pub fn new(method: &str, n_states: usize) -> Self {
        Self {
            method: method.to_string(),
            n_states,
            conv_tol: default_conv_tol(),
            n_core_orbitals: None,
        }
    }
}

impl fmt::Display for AdcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} states", self.method, self.n_states)?;
        if let Some(n_core) = self.n_core_orbitals {
            write!(f, ", {n_core} core orbital(s)")?;
        }
        write!(f, ", convergence tolerance {:.3e})", self.conv_tol)
    }
}

// =================
// Trait definitions
// =================

/// Trait for external collaborators that run Hartree-Fock back-ends and the ADC solver.
///
/// Implementors must be shareable across threads as back-ends may be run concurrently.
pub trait ExternalSolver: Send + Sync {
    /// Returns the identifiers of the back-ends installed in the runtime environment.
    fn available_backends(&self) -> Vec<String>;

    /// Returns the one-particle operators a back-end provides integrals for.
    fn operators(&self, backend: &str) -> Vec<Operator>;

    /// Runs a Hartree-Fock calculation with a back-end and returns the source from which its
    /// data can be imported.
    fn run_hf(&self, backend: &str, case: &TestCase) -> Result<HfSource, anyhow::Error>;

    /// Runs an ADC calculation on top of the Hartree-Fock data a back-end produced for `case`.
    fn run_adc(
        &self,
        backend: &str,
        case: &TestCase,
        data: &HfData,
        request: &AdcRequest,
    ) -> Result<AdcResult, anyhow::Error>;
}

/// Trait for external collaborators that compute response properties for ADC results.
pub trait PropertyProvider {
    /// Returns a copy of `result` with its response properties attached.
    fn attach_properties(&self, result: &AdcResult) -> Result<AdcResult, anyhow::Error>;
}

impl<F> PropertyProvider for F
where
    F: Fn(&AdcResult) -> Result<AdcResult, anyhow::Error>,
{
    fn attach_properties(&self, result: &AdcResult) -> Result<AdcResult, anyhow::Error> {
        self(result)
    }
}

/// A property provider for results that already carry their response properties, such as
/// results read back from files.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoredProperties;

impl PropertyProvider for StoredProperties {
    fn attach_properties(&self, result: &AdcResult) -> Result<AdcResult, anyhow::Error> {
        Ok(result.clone())
    }
}

// =============
// Cached solver
// =============

/// An [`ExternalSolver`] decorator that memoises Hartree-Fock sources by back-end and test case,
/// so that the same system is never recomputed by the same back-end.
///
/// Only the source is cached: every consumer still imports a fresh [`HfData`] from it.
pub struct CachedSolver<S: ExternalSolver> {
    /// The wrapped solver.
    inner: S,

    /// The memoised Hartree-Fock sources.
    hf_cache: Mutex<HashMap<(String, TestCase), HfSource>>,
}

impl<S: ExternalSolver> CachedSolver<S> {
    /// Wraps a solver.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            hf_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the wrapped solver.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the number of memoised Hartree-Fock sources.
    pub fn n_cached(&self) -> usize {
        self.hf_cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

impl<S: ExternalSolver> ExternalSolver for CachedSolver<S> {
    fn available_backends(&self) -> Vec<String> {
        self.inner.available_backends()
    }

    fn operators(&self, backend: &str) -> Vec<Operator> {
        self.inner.operators(backend)
    }

    fn run_hf(&self, backend: &str, case: &TestCase) -> Result<HfSource, anyhow::Error> {
        let key = (backend.to_string(), case.clone());
        if let Some(source) = self
            .hf_cache
            .lock()
            .map_err(|_| format_err!("Hartree-Fock cache lock poisoned."))?
            .get(&key)
        {
            log::debug!("Reusing cached Hartree-Fock source for `{backend}` on {case}.");
            return Ok(source.clone());
        }
        // The lock is not held while the back-end runs so that other back-ends can proceed.
        let source = self.inner.run_hf(backend, case)?;
        self.hf_cache
            .lock()
            .map_err(|_| format_err!("Hartree-Fock cache lock poisoned."))?
            .entry(key)
            .or_insert_with(|| source.clone());
        Ok(source)
    }

    fn run_adc(
        &self,
        backend: &str,
        case: &TestCase,
        data: &HfData,
        request: &AdcRequest,
    ) -> Result<AdcResult, anyhow::Error> {
        self.inner.run_adc(backend, case, data, request)
    }
}
