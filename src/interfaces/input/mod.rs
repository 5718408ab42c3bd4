//! `hfcrossref` YAML input.

use std::path::{Path, PathBuf};

use anyhow::{self, bail, ensure, Context};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::comparison::{compare_adc_results, compare_hf_data, ComparisonMode, SignTreatment};
use crate::drivers::cross_reference::{
    CrossReferenceDriver, CrossReferenceParams, DEFAULT_ATOL,
};
use crate::drivers::CrossRefDriver;
use crate::interfaces::solver::{CachedSolver, StoredProperties, StoredResultsSolver};
use crate::interfaces::source::HfSource;
use crate::interfaces::InputHandle;
use crate::io::format::{log_subtitle, log_title, xref_error, xref_output, xref_warn};
use crate::io::{read_xref_binary, XrefFileType};
use crate::target::adc::AdcResult;
use crate::target::hf_data::HfData;
use crate::target::reference_state::Operator;

#[cfg(test)]
#[path = "input_tests.rs"]
mod input_tests;

fn default_atol() -> f64 {
    DEFAULT_ATOL
}
fn default_operators() -> Vec<Operator> {
    vec![Operator::ElectricDipole]
}

// ==========================
// Cross-reference from store
// ==========================

/// A structure specifying a cross-reference suite run over pre-computed results.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrossReferenceInput {
    /// The root of the store of pre-computed results. See [`StoredResultsSolver`] for its
    /// layout.
    pub store: PathBuf,

    /// The one-particle operators the stored back-ends provide.
    #[serde(default = "default_operators")]
    pub operators: Vec<Operator>,

    /// The parameters of the suite.
    pub params: CrossReferenceParams,
}

impl CrossReferenceInput {
    /// Runs the suite. A skipped suite is not a failure.
    ///
    /// # Returns
    ///
    /// `true` if the suite did not fail.
    pub fn run(&self) -> Result<bool, anyhow::Error> {
        let solver = CachedSolver::new(StoredResultsSolver::new(&self.store, &self.operators));
        let mut driver = CrossReferenceDriver::builder()
            .parameters(&self.params)
            .solver(&solver)
            .property_provider(&StoredProperties)
            .build()
            .with_context(|| "Unable to construct a cross-reference driver")?;
        driver.run()?;
        let outcome = driver.result()?.outcome();
        if outcome.is_skipped() {
            xref_warn!("The cross-reference suite has been skipped.");
        }
        Ok(!outcome.failed())
    }
}

// ================
// File comparisons
// ================

/// Enumerated type for the kinds of files that can be compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileComparisonKind {
    /// Hartree-Fock data containers.
    HfData,

    /// `hfcrossref` binary files of ADC results.
    Adc,
}

/// Enumerated type for the container formats Hartree-Fock data can be read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    /// `hfcrossref` binary containers. File names are given without their `.xref.hf` extension.
    #[default]
    Binary,

    /// HDF5 files. File names are given in full. Requires the `hdf5-container` feature.
    Hdf5,
}

/// A structure specifying a comparison of persisted results across labelled back-ends.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileComparison {
    /// The kind of the files.
    pub kind: FileComparisonKind,

    /// The files, keyed by back-end label.
    pub files: IndexMap<String, PathBuf>,

    /// The container format of Hartree-Fock data files.
    #[serde(default)]
    pub format: ContainerFormat,

    /// How sign-ambiguous Hartree-Fock tensors are compared.
    #[serde(default)]
    pub signs: SignTreatment,

    /// The base absolute tolerance.
    #[serde(default = "default_atol")]
    pub atol: f64,

    /// Whether to stop at the first failure.
    #[serde(default)]
    pub mode: ComparisonMode,
}

impl FileComparison {
    fn hf_source(&self, path: &Path) -> Result<HfSource, anyhow::Error> {
        match self.format {
            ContainerFormat::Binary => Ok(HfSource::Binary(path.to_path_buf())),
            #[cfg(feature = "hdf5-container")]
            ContainerFormat::Hdf5 => Ok(HfSource::Hdf5(path.to_path_buf())),
            #[cfg(not(feature = "hdf5-container"))]
            ContainerFormat::Hdf5 => bail!(
                "Unable to read {}: HDF5 containers require the `hdf5-container` feature.",
                path.display()
            ),
        }
    }

    /// Reads every file and compares the results.
    ///
    /// # Errors
    ///
    /// Errors if a file cannot be read, or with the [`crate::comparison::ComparisonFailures`]
    /// if the results disagree.
    pub fn run(&self) -> Result<(), anyhow::Error> {
        ensure!(
            self.files.len() >= 2,
            "At least two files are required for a comparison, but {} given.",
            self.files.len()
        );
        match self.kind {
            FileComparisonKind::HfData => {
                let records = self
                    .files
                    .iter()
                    .map(|(label, path)| {
                        let data = self.hf_source(path)?.import().with_context(|| {
                            format!("Unable to import `{label}` data from {}", path.display())
                        })?;
                        Ok((label.clone(), data))
                    })
                    .collect::<Result<IndexMap<String, HfData>, anyhow::Error>>()?;
                compare_hf_data(&records, self.atol, self.mode, self.signs)?;
            }
            FileComparisonKind::Adc => {
                let results = self
                    .files
                    .iter()
                    .map(|(label, path)| {
                        let result: AdcResult = read_xref_binary(path, XrefFileType::AdcResult)
                            .with_context(|| {
                                format!("Unable to read `{label}` ADC result from {}", path.display())
                            })?;
                        Ok((label.clone(), result))
                    })
                    .collect::<Result<IndexMap<String, AdcResult>, anyhow::Error>>()?;
                compare_adc_results(&results, self.atol, self.mode, &StoredProperties)?;
            }
        }
        Ok(())
    }
}

// =====
// Input
// =====

/// A structure containing `hfcrossref` input parameters which can be serialised into and
/// deserialised from a YAML input file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Input {
    /// Settings for a cross-reference suite over pre-computed results. If `None`, no suite
    /// is run.
    #[serde(default)]
    pub cross_reference: Option<CrossReferenceInput>,

    /// Comparisons of persisted results.
    #[serde(default)]
    pub file_comparisons: Vec<FileComparison>,
}

impl InputHandle for Input {
    /// Runs the cross-reference suite and every file comparison. All of them are run even if an
    /// earlier one fails.
    fn handle(&self) -> Result<(), anyhow::Error> {
        let mut n_failed = 0;

        if let Some(cross_reference) = self.cross_reference.as_ref() {
            match cross_reference.run() {
                Ok(true) => {}
                Ok(false) => n_failed += 1,
                Err(err) => {
                    xref_error!("Cross-reference suite aborted: {err:#}");
                    n_failed += 1;
                }
            }
        }

        if !self.file_comparisons.is_empty() {
            log_title("File Comparisons");
            xref_output!("");
        }
        for (i, comparison) in self.file_comparisons.iter().enumerate() {
            log_subtitle(&format!(
                "Comparison {} ({:?}): {}",
                i + 1,
                comparison.kind,
                comparison.files.keys().cloned().collect::<Vec<_>>().join(", ")
            ));
            match comparison.run() {
                Ok(()) => {
                    xref_output!("PASS");
                }
                Err(err) => {
                    xref_error!("FAIL: {err:#}");
                    n_failed += 1;
                }
            }
            xref_output!("");
        }

        if n_failed > 0 {
            bail!("{n_failed} task(s) failed.");
        }
        Ok(())
    }
}
