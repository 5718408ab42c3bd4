//! Tolerance-aware, sign-invariant equivalence checks between results from different back-ends.
//!
//! Every protocol in this module takes a set of labelled results (labels are back-end
//! identifiers) and checks every 2-combination of them independently. Three strictness tiers are
//! used within one pass, see [`ToleranceHierarchy`].

use std::error::Error;
use std::fmt;

use approx;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{ArrayViewD, Dimension, Zip};
use serde::{Deserialize, Serialize};

use crate::interfaces::source::{HfField, MissingFieldError};
use crate::target::adc::AdcProperty;

mod adc;
mod hf;

pub use adc::compare_adc_results;
pub use hf::{compare_hf_data, compare_hf_properties, SignTreatment};


/// Relative slack used for every comparison tier other than eigenvalues.
pub const DEFAULT_RTOL: f64 = 1e-7;

/// Relative tolerance of the eigenvalue tier, which has no absolute component.
pub const EIGENVALUE_RTOL: f64 = 1e-8;

/// Factor by which the eigenvector tier's absolute tolerance exceeds the base tolerance.
pub const EIGENVECTOR_ATOL_FACTOR: f64 = 10.0;

// ==========
// Tolerances
// ==========

/// A combined absolute and relative closeness criterion. Two numbers $`a`$ and $`b`$ are close if
/// $`|a - b| \le \mathrm{atol}`$ or $`|a - b| \le \mathrm{rtol} \max(|a|, |b|)`$.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// The absolute tolerance.
    pub atol: f64,

    /// The relative tolerance.
    pub rtol: f64,
}

impl Tolerance {
    /// Constructs a tolerance whose absolute part is `atol` and whose relative part is the
    /// default floating-point slack [`DEFAULT_RTOL`].
    pub fn absolute(atol: f64) -> Self {
        Self {
            atol,
            rtol: DEFAULT_RTOL,
        }
    }

    /// A tolerance which only accepts identical values.
    pub fn exact() -> Self {
        Self {
            atol: 0.0,
            rtol: 0.0,
        }
    }

    /// Returns `true` if `a` and `b` are close under this tolerance.
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        approx::relative_eq!(a, b, epsilon = self.atol, max_relative = self.rtol)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atol = {:.3e}, rtol = {:.3e}", self.atol, self.rtol)
    }
}

/// The three strictness tiers used in one comparison pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToleranceHierarchy {
    /// The tightest tier, for eigenvalues: relative slack only.
    pub eigenvalue: Tolerance,

    /// The loosest tier, for eigenvector magnitudes.
    pub eigenvector: Tolerance,

    /// The tier for everything else.
    pub general: Tolerance,
}

impl ToleranceHierarchy {
    /// Builds the tolerance hierarchy for a base absolute tolerance.
    pub fn from_atol(atol: f64) -> Self {
        Self {
            eigenvalue: Tolerance {
                atol: 0.0,
                rtol: EIGENVALUE_RTOL,
            },
            eigenvector: Tolerance::absolute(EIGENVECTOR_ATOL_FACTOR * atol),
            general: Tolerance::absolute(atol),
        }
    }
}

// ==========
// Quantities
// ==========

/// Enumerated type for the quantities being compared, used to localise failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Quantity {
    /// A canonical field of Hartree-Fock data.
    HfData(HfField),

    /// The total nuclear charge of a reference state.
    NuclearTotalCharge,

    /// The nuclear dipole of a reference state.
    NuclearDipole,

    /// The total electric dipole moment of a reference state.
    DipoleMoment,

    /// The ADC eigenvalues.
    Eigenvalues,

    /// The number of eigensolver iterations.
    IterationCount,

    /// The number of ADC eigenvectors.
    EigenvectorCount,

    /// The set of block names of one ADC eigenvector.
    EigenvectorBlocks { state: usize },

    /// One block of one ADC eigenvector.
    EigenvectorBlock { state: usize, block: String },

    /// An ADC response property.
    Property(AdcProperty),
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::HfData(field) => write!(f, "Hartree-Fock field `{field}`"),
            Quantity::NuclearTotalCharge => write!(f, "nuclear total charge"),
            Quantity::NuclearDipole => write!(f, "nuclear dipole"),
            Quantity::DipoleMoment => write!(f, "dipole moment"),
            Quantity::Eigenvalues => write!(f, "eigenvalues"),
            Quantity::IterationCount => write!(f, "iteration count"),
            Quantity::EigenvectorCount => write!(f, "number of eigenvectors"),
            Quantity::EigenvectorBlocks { state } => {
                write!(f, "block names of eigenvector {state}")
            }
            Quantity::EigenvectorBlock { state, block } => {
                write!(f, "block `{block}` of eigenvector {state}")
            }
            Quantity::Property(property) => write!(f, "property `{property}`"),
        }
    }
}

// ======
// Errors
// ======

/// A pair of back-end labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairLabels(pub String, pub String);

impl fmt::Display for PairLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` vs `{}`", self.0, self.1)
    }
}

/// Error indicating that two results differ in structure (block names, shapes, counts, or
/// presence of optional data) rather than in numerical value.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuralMismatchError {
    /// The labels of the two results.
    pub labels: PairLabels,

    /// The quantity whose structure differs.
    pub quantity: Quantity,

    /// A description of the difference.
    pub detail: String,
}

impl fmt::Display for StructuralMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Structural mismatch in {} ({}): {}.",
            self.quantity, self.labels, self.detail
        )
    }
}

impl Error for StructuralMismatchError {}

/// Error indicating that a numerical comparison exceeded its tolerance.
#[derive(Clone, Debug, PartialEq)]
pub struct ToleranceViolationError {
    /// The labels of the two results.
    pub labels: PairLabels,

    /// The quantity whose values differ.
    pub quantity: Quantity,

    /// The multi-index of the first violating element. Empty for scalars.
    pub index: Vec<usize>,

    /// The value on the first side at [`Self::index`].
    pub lhs: f64,

    /// The value on the second side at [`Self::index`].
    pub rhs: f64,

    /// The tolerance that was exceeded.
    pub tolerance: Tolerance,

    /// The total number of violating elements.
    pub n_violations: usize,
}

impl fmt::Display for ToleranceViolationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tolerance violation in {} ({})", self.quantity, self.labels)?;
        if !self.index.is_empty() {
            write!(f, " at index {:?}", self.index)?;
        }
        write!(
            f,
            ": {:+.12e} vs {:+.12e} (|Δ| = {:.3e}; {}); {} violating element(s).",
            self.lhs,
            self.rhs,
            (self.lhs - self.rhs).abs(),
            self.tolerance,
            self.n_violations
        )
    }
}

impl Error for ToleranceViolationError {}

/// Enumerated type for errors arising in a single comparison.
#[derive(Clone, Debug)]
pub enum ComparisonError {
    /// Fewer than two results were supplied.
    InsufficientResults(usize),

    /// A result lacks a field that the comparison requires.
    MissingField {
        label: String,
        error: MissingFieldError,
    },

    /// An external collaborator failed while preparing a result for comparison.
    Collaborator { label: String, reason: String },

    /// The two results differ in structure.
    StructuralMismatch(StructuralMismatchError),

    /// The two results differ beyond tolerance.
    ToleranceViolation(ToleranceViolationError),
}

impl fmt::Display for ComparisonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComparisonError::InsufficientResults(n) => write!(
                f,
                "At least two results are required for a comparison, but {n} given."
            ),
            ComparisonError::MissingField { label, error } => write!(f, "`{label}`: {error}"),
            ComparisonError::Collaborator { label, reason } => {
                write!(f, "`{label}`: unable to prepare result: {reason}")
            }
            ComparisonError::StructuralMismatch(err) => write!(f, "{err}"),
            ComparisonError::ToleranceViolation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ComparisonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ComparisonError::MissingField { error, .. } => Some(error),
            ComparisonError::StructuralMismatch(err) => Some(err),
            ComparisonError::ToleranceViolation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StructuralMismatchError> for ComparisonError {
    fn from(err: StructuralMismatchError) -> Self {
        ComparisonError::StructuralMismatch(err)
    }
}

impl From<ToleranceViolationError> for ComparisonError {
    fn from(err: ToleranceViolationError) -> Self {
        ComparisonError::ToleranceViolation(err)
    }
}

/// The failures gathered by one comparison call. In [`ComparisonMode::FailFast`] this holds
/// exactly one failure.
#[derive(Clone, Debug)]
pub struct ComparisonFailures(pub Vec<ComparisonError>);

impl ComparisonFailures {
    /// Returns the gathered failures.
    pub fn failures(&self) -> &[ComparisonError] {
        &self.0
    }
}

impl fmt::Display for ComparisonFailures {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} comparison failure(s):", self.0.len())?;
        for err in self.0.iter() {
            writeln!(f, "  {err}")?;
        }
        Ok(())
    }
}

impl Error for ComparisonFailures {}

// ================
// Comparison modes
// ================

/// Enumerated type for how failures are handled within one comparison call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Stop at the first failure.
    #[default]
    FailFast,

    /// Check every quantity of every pair and report all failures together.
    Exhaustive,
}

/// Collects failures according to a [`ComparisonMode`].
pub(crate) struct FailureCollector {
    mode: ComparisonMode,
    failures: Vec<ComparisonError>,
}

impl FailureCollector {
    pub(crate) fn new(mode: ComparisonMode) -> Self {
        Self {
            mode,
            failures: vec![],
        }
    }

    /// Records the outcome of one check. In fail-fast mode, a failure is returned immediately as
    /// an error so that it can be propagated with `?`.
    pub(crate) fn check(
        &mut self,
        outcome: Result<(), ComparisonError>,
    ) -> Result<(), ComparisonFailures> {
        match (outcome, self.mode) {
            (Ok(()), _) => Ok(()),
            (Err(err), ComparisonMode::FailFast) => Err(ComparisonFailures(vec![err])),
            (Err(err), ComparisonMode::Exhaustive) => {
                self.failures.push(err);
                Ok(())
            }
        }
    }

    pub(crate) fn finish(self) -> Result<(), ComparisonFailures> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(ComparisonFailures(self.failures))
        }
    }
}

// ============
// Result pairs
// ============

/// Two labelled results held for the duration of one pairwise comparison.
pub struct ResultPair<'a, T> {
    /// The labels of the two results.
    pub labels: PairLabels,

    /// The first result.
    pub lhs: &'a T,

    /// The second result.
    pub rhs: &'a T,
}

/// Forms every 2-combination of the labelled results, in insertion order.
///
/// # Errors
///
/// Errors with [`ComparisonError::InsufficientResults`] if fewer than two results are given.
pub fn result_pairs<T>(
    results: &IndexMap<String, T>,
) -> Result<Vec<ResultPair<'_, T>>, ComparisonError> {
    if results.len() < 2 {
        return Err(ComparisonError::InsufficientResults(results.len()));
    }
    Ok(results
        .iter()
        .tuple_combinations()
        .map(|((label_a, a), (label_b, b))| ResultPair {
            labels: PairLabels(label_a.clone(), label_b.clone()),
            lhs: a,
            rhs: b,
        })
        .collect())
}

// =================
// Element-wise test
// =================

/// Compares two dense arrays element-wise.
///
/// # Errors
///
/// Errors with a structural mismatch if the shapes differ, or with a tolerance violation
/// localised at the first offending element.
pub(crate) fn compare_arrays(
    labels: &PairLabels,
    quantity: Quantity,
    lhs: ArrayViewD<'_, f64>,
    rhs: ArrayViewD<'_, f64>,
    tolerance: Tolerance,
) -> Result<(), ComparisonError> {
    if lhs.shape() != rhs.shape() {
        return Err(StructuralMismatchError {
            labels: labels.clone(),
            quantity,
            detail: format!("shapes {:?} and {:?} differ", lhs.shape(), rhs.shape()),
        }
        .into());
    }
    let n_violations = Zip::from(&lhs)
        .and(&rhs)
        .fold(0usize, |acc, &a, &b| {
            if tolerance.is_close(a, b) {
                acc
            } else {
                acc + 1
            }
        });
    if n_violations == 0 {
        return Ok(());
    }
    let (index, a, b) = lhs
        .indexed_iter()
        .zip(rhs.iter())
        .find(|((_, &a), &b)| !tolerance.is_close(a, b))
        .map(|((idx, &a), &b)| (idx.slice().to_vec(), a, b))
        .unwrap_or_default();
    Err(ToleranceViolationError {
        labels: labels.clone(),
        quantity,
        index,
        lhs: a,
        rhs: b,
        tolerance,
        n_violations,
    }
    .into())
}

/// Compares two scalars.
pub(crate) fn compare_scalars(
    labels: &PairLabels,
    quantity: Quantity,
    lhs: f64,
    rhs: f64,
    tolerance: Tolerance,
) -> Result<(), ComparisonError> {
    if tolerance.is_close(lhs, rhs) {
        Ok(())
    } else {
        Err(ToleranceViolationError {
            labels: labels.clone(),
            quantity,
            index: vec![],
            lhs,
            rhs,
            tolerance,
            n_violations: 1,
        }
        .into())
    }
}
