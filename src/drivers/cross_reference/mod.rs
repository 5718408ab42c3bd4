//! Driver for cross-referencing the results of independent Hartree-Fock back-ends.

use std::error::Error;
use std::fmt;

use anyhow::{self, format_err, Context};
use derive_builder::Builder;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::comparison::{
    compare_adc_results, compare_hf_properties, ComparisonFailures, ComparisonMode,
};
use crate::drivers::CrossRefDriver;
use crate::interfaces::solver::{AdcRequest, ExternalSolver, PropertyProvider, TestCase};
use crate::io::format::{
    log_section_begin, log_section_end, log_subtitle, log_title, yes_no, xref_error,
    xref_output, xref_warn, XrefOutput,
};
use crate::target::reference_state::ReferenceState;


/// The base absolute tolerance used when none is specified.
pub const DEFAULT_ATOL: f64 = 5e-9;

/// The minimum number of back-ends for cross-referencing to be meaningful.
pub const MIN_BACKENDS: usize = 2;

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

fn default_atol() -> f64 {
    DEFAULT_ATOL
}
fn default_excluded_backends() -> Vec<String> {
    vec!["molsturm".to_string()]
}
fn default_checks() -> Vec<CrossReferenceCheck> {
    vec![CrossReferenceCheck::HfProperties]
}
fn default_true() -> bool {
    true
}

/// Enumerated type for the checks that can be carried out on every test case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossReferenceCheck {
    /// Variant for comparing properties of the Hartree-Fock reference states.
    HfProperties,

    /// Variant for comparing ADC eigenpairs and their response properties.
    Adc(AdcRequest),
}

impl fmt::Display for CrossReferenceCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossReferenceCheck::HfProperties => write!(f, "Hartree-Fock properties"),
            CrossReferenceCheck::Adc(request) => write!(f, "ADC {request}"),
        }
    }
}

/// Structure containing control parameters for cross-referencing back-ends.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct CrossReferenceParams {
    /// The systems to be computed by every back-end.
    pub cases: Vec<TestCase>,

    /// The checks to be carried out on every case.
    #[builder(default = "default_checks()")]
    #[serde(default = "default_checks")]
    pub checks: Vec<CrossReferenceCheck>,

    /// The base absolute tolerance from which the tolerance hierarchy is built.
    #[builder(default = "DEFAULT_ATOL")]
    #[serde(default = "default_atol")]
    pub atol: f64,

    /// Back-ends that are never used even when available.
    #[builder(default = "default_excluded_backends()")]
    #[serde(default = "default_excluded_backends")]
    pub excluded_backends: Vec<String>,

    /// Whether to stop each comparison at its first failure.
    #[builder(default)]
    #[serde(default)]
    pub mode: ComparisonMode,

    /// Boolean indicating if the back-ends are run concurrently for each case.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub parallel_backends: bool,
}

impl CrossReferenceParams {
    /// Returns a builder to construct a [`CrossReferenceParams`] structure.
    pub fn builder() -> CrossReferenceParamsBuilder {
        CrossReferenceParamsBuilder::default()
    }
}

impl fmt::Display for CrossReferenceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Test cases: {}",
            self.cases
                .iter()
                .map(|case| case.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        writeln!(
            f,
            "Checks: {}",
            self.checks
                .iter()
                .map(|check| check.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        writeln!(f, "Base absolute tolerance: {:.3e}", self.atol)?;
        writeln!(
            f,
            "Excluded back-ends: {}",
            if self.excluded_backends.is_empty() {
                "none".to_string()
            } else {
                self.excluded_backends.join(", ")
            }
        )?;
        writeln!(f, "Comparison mode: {:?}", self.mode)?;
        writeln!(
            f,
            "Run back-ends concurrently: {}",
            yes_no(self.parallel_backends)
        )?;
        Ok(())
    }
}

// -------
// Outcome
// -------

/// Signal that the cross-reference suite was not run because too few back-ends are available.
/// This is neither a pass nor a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedError {
    /// The back-ends that were available after exclusions.
    pub available: Vec<String>,

    /// The number of back-ends required.
    pub required: usize,
}

impl fmt::Display for SkippedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Cross-reference suite skipped: at least {} back-ends are required, but only {} available ({}).",
            self.required,
            self.available.len(),
            if self.available.is_empty() {
                "none".to_string()
            } else {
                self.available.join(", ")
            }
        )
    }
}

impl Error for SkippedError {}

/// Structure holding the outcome of one check on one test case.
#[derive(Clone, Debug)]
pub struct CheckReport {
    /// The test case.
    pub case: TestCase,

    /// The check carried out.
    pub check: CrossReferenceCheck,

    /// The outcome of the comparison.
    pub outcome: Result<(), ComparisonFailures>,
}

impl CheckReport {
    /// Returns `true` if the check passed.
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}: {}",
            self.case,
            self.check,
            if self.passed() { "PASS" } else { "FAIL" }
        )
    }
}

/// Enumerated type for the outcome of a cross-reference suite.
#[derive(Clone, Debug)]
pub enum CrossReferenceOutcome {
    /// Too few back-ends were available.
    Skipped(SkippedError),

    /// Every check was run on every case.
    Completed(Vec<CheckReport>),
}

impl CrossReferenceOutcome {
    /// Returns `true` if the suite was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, CrossReferenceOutcome::Skipped(_))
    }

    /// Returns `true` if the suite ran and every check passed.
    pub fn passed(&self) -> bool {
        match self {
            CrossReferenceOutcome::Skipped(_) => false,
            CrossReferenceOutcome::Completed(reports) => reports.iter().all(CheckReport::passed),
        }
    }

    /// Returns `true` if the suite ran and at least one check failed.
    pub fn failed(&self) -> bool {
        match self {
            CrossReferenceOutcome::Skipped(_) => false,
            CrossReferenceOutcome::Completed(reports) => {
                reports.iter().any(|report| !report.passed())
            }
        }
    }
}

// ------
// Result
// ------

/// Structure to contain cross-reference results.
#[derive(Clone, Builder, Debug)]
pub struct CrossReferenceResult<'a> {
    /// The control parameters used to obtain this set of results.
    parameters: &'a CrossReferenceParams,

    /// The back-ends that were cross-referenced, after exclusions.
    backends: Vec<String>,

    /// The outcome of the suite.
    outcome: CrossReferenceOutcome,
}

impl<'a> CrossReferenceResult<'a> {
    fn builder() -> CrossReferenceResultBuilder<'a> {
        CrossReferenceResultBuilder::default()
    }

    /// Returns the control parameters used.
    pub fn parameters(&self) -> &CrossReferenceParams {
        self.parameters
    }

    /// Returns the back-ends that were cross-referenced.
    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    /// Returns the outcome of the suite.
    pub fn outcome(&self) -> &CrossReferenceOutcome {
        &self.outcome
    }
}

// ------
// Driver
// ------

/// Driver for running the same calculations through several back-ends and checking that every
/// pair of them agrees.
///
/// The builder takes its fields by value, so the solver need not be `Clone`.
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct CrossReferenceDriver<'a, S>
where
    S: ExternalSolver,
{
    /// The control parameters.
    parameters: &'a CrossReferenceParams,

    /// The collaborator running the back-ends.
    solver: &'a S,

    /// The collaborator attaching response properties to ADC results.
    property_provider: &'a (dyn PropertyProvider + Sync),

    /// The result of the cross-referencing.
    #[builder(setter(skip), default = "None")]
    result: Option<CrossReferenceResult<'a>>,
}

impl<'a, S> CrossReferenceDriver<'a, S>
where
    S: ExternalSolver,
{
    /// Returns a builder to construct a [`CrossReferenceDriver`] structure.
    pub fn builder() -> CrossReferenceDriverBuilder<'a, S> {
        CrossReferenceDriverBuilder::default()
    }

    /// Returns the back-ends to be cross-referenced: those available minus those excluded.
    fn backends(&self) -> Vec<String> {
        self.solver
            .available_backends()
            .into_iter()
            .filter(|backend| !self.parameters.excluded_backends.contains(backend))
            .collect()
    }

    /// Obtains one result per back-end, concurrently if requested. The returned map preserves
    /// the order of `backends`.
    fn per_backend<T, F>(
        &self,
        backends: &[String],
        f: F,
    ) -> Result<IndexMap<String, T>, anyhow::Error>
    where
        T: Send,
        F: Fn(&str) -> Result<T, anyhow::Error> + Sync,
    {
        let results = if self.parameters.parallel_backends {
            backends
                .par_iter()
                .map(|backend| f(backend))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            backends
                .iter()
                .map(|backend| f(backend))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(backends.iter().cloned().zip(results).collect())
    }

    fn check_case(
        &self,
        backends: &[String],
        case: &TestCase,
        check: &CrossReferenceCheck,
    ) -> Result<CheckReport, anyhow::Error> {
        let params = self.parameters;
        let outcome = match check {
            CrossReferenceCheck::HfProperties => {
                let states = self.per_backend(backends, |backend| {
                    let data = self
                        .solver
                        .run_hf(backend, case)?
                        .import()
                        .with_context(|| format!("Unable to import `{backend}` data for {case}"))?;
                    Ok(ReferenceState::from_hf_data(
                        &data,
                        &self.solver.operators(backend),
                    ))
                })?;
                compare_hf_properties(&states, params.atol, params.mode)
            }
            CrossReferenceCheck::Adc(request) => {
                let results = self.per_backend(backends, |backend| {
                    let data = self
                        .solver
                        .run_hf(backend, case)?
                        .import()
                        .with_context(|| format!("Unable to import `{backend}` data for {case}"))?;
                    self.solver
                        .run_adc(backend, case, &data, request)
                        .with_context(|| format!("ADC failed for `{backend}` on {case}"))
                })?;
                compare_adc_results(&results, params.atol, params.mode, self.property_provider)
            }
        };
        Ok(CheckReport {
            case: case.clone(),
            check: check.clone(),
            outcome,
        })
    }

    fn cross_reference(&mut self) -> Result<(), anyhow::Error> {
        log_title("Cross-Reference of Hartree-Fock Back-Ends");
        xref_output!("");
        let params = self.parameters;
        params.log_lines();
        xref_output!("");

        let backends = self.backends();
        xref_output!(
            "Back-ends available: {}",
            if backends.is_empty() {
                "none".to_string()
            } else {
                backends.join(", ")
            }
        );
        xref_output!("");

        let outcome = if backends.len() < MIN_BACKENDS {
            let skipped = SkippedError {
                available: backends.clone(),
                required: MIN_BACKENDS,
            };
            xref_warn!("{skipped}");
            CrossReferenceOutcome::Skipped(skipped)
        } else {
            let mut reports: Vec<CheckReport> =
                Vec::with_capacity(params.cases.len() * params.checks.len());
            for case in params.cases.iter() {
                let section = format!("Test case {case}");
                log_section_begin(&section);
                let n_reports_before = reports.len();
                xref_output!("");
                for check in params.checks.iter() {
                    log_subtitle(&check.to_string());
                    let report = self.check_case(&backends, case, check)?;
                    match &report.outcome {
                        Ok(()) => {
                            xref_output!("{report}");
                        }
                        Err(failures) => {
                            xref_error!("{report}");
                            for failure in failures.failures() {
                                xref_error!("  {failure}");
                            }
                        }
                    }
                    xref_output!("");
                    reports.push(report);
                }
                let n_failed_case = reports[n_reports_before..]
                    .iter()
                    .filter(|report| !report.passed())
                    .count();
                log_section_end(&section, n_failed_case);
                xref_output!("");
            }
            let n_failed = reports.iter().filter(|report| !report.passed()).count();
            xref_output!(
                "Summary: {} of {} check(s) passed.",
                reports.len() - n_failed,
                reports.len()
            );
            CrossReferenceOutcome::Completed(reports)
        };

        self.result = Some(
            CrossReferenceResult::builder()
                .parameters(params)
                .backends(backends)
                .outcome(outcome)
                .build()?,
        );
        Ok(())
    }
}

impl<'a, S> CrossRefDriver for CrossReferenceDriver<'a, S>
where
    S: ExternalSolver,
{
    type Params = CrossReferenceParams;

    type Outcome = CrossReferenceResult<'a>;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No cross-reference results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.cross_reference()
    }
}
