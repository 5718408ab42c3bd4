//! A solver serving pre-computed results from a directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{self, ensure, Context};

use crate::interfaces::solver::{AdcRequest, ExternalSolver, TestCase};
use crate::interfaces::source::HfSource;
use crate::io::{read_xref_binary, XrefFileType};
use crate::target::adc::AdcResult;
use crate::target::hf_data::HfData;
use crate::target::reference_state::Operator;

/// An [`ExternalSolver`] whose back-ends have been run beforehand.
///
/// The store is laid out as one sub-directory per back-end, each holding
///
/// * `<molecule>_<basis>.xref.hf` binary containers of Hartree-Fock data, and
/// * `<molecule>_<basis>_<method>_<n_states>.xref.adc` binary files of ADC results, with a
///   `_core<n_core_orbitals>` suffix before the extensions for core-valence-separated requests.
///
/// The eigensolver tolerance of a request is not part of the file name.
///
/// The back-ends available are the sub-directories present, in lexicographical order.
#[derive(Clone, Debug)]
pub struct StoredResultsSolver {
    /// The root of the store.
    root: PathBuf,

    /// The operators every stored back-end provides.
    operators: Vec<Operator>,
}

impl StoredResultsSolver {
    /// Constructs a solver over the store rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P, operators: &[Operator]) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            operators: operators.to_vec(),
        }
    }

    /// Returns the file name, without extensions, of the Hartree-Fock container of a case.
    pub fn hf_name(&self, backend: &str, case: &TestCase) -> PathBuf {
        self.root
            .join(backend)
            .join(format!("{}_{}", case.molecule, case.basis))
    }

    /// Returns the file name, without extensions, of the ADC result of a case.
    pub fn adc_name(&self, backend: &str, case: &TestCase, request: &AdcRequest) -> PathBuf {
        let mut name = format!(
            "{}_{}_{}_{}",
            case.molecule, case.basis, request.method, request.n_states
        );
        if let Some(n_core) = request.n_core_orbitals {
            name.push_str(&format!("_core{n_core}"));
        }
        self.root.join(backend).join(name)
    }

    /// Reads a stored ADC result for a case.
    pub fn read_adc(
        &self,
        backend: &str,
        case: &TestCase,
        request: &AdcRequest,
    ) -> Result<AdcResult, anyhow::Error> {
        let name = self.adc_name(backend, case, request);
        let result: AdcResult = read_xref_binary(&name, XrefFileType::AdcResult)
            .with_context(|| format!("Unable to read stored ADC result for `{backend}` on {case}"))?;
        ensure!(
            result.n_states() == request.n_states,
            "Stored ADC result {} holds {} states, but {} requested.",
            name.display(),
            result.n_states(),
            request.n_states
        );
        Ok(result)
    }
}

impl ExternalSolver for StoredResultsSolver {
    fn available_backends(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            log::warn!("Unable to list back-ends in {}.", self.root.display());
            return vec![];
        };
        let mut backends = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect::<Vec<_>>();
        backends.sort();
        backends
    }

    fn operators(&self, _backend: &str) -> Vec<Operator> {
        self.operators.clone()
    }

    fn run_hf(&self, backend: &str, case: &TestCase) -> Result<HfSource, anyhow::Error> {
        let name = self.hf_name(backend, case);
        ensure!(
            XrefFileType::HfData.path(&name).is_file(),
            "No stored Hartree-Fock data for `{backend}` on {case} at {}.",
            XrefFileType::HfData.path(&name).display()
        );
        Ok(HfSource::Binary(name))
    }

    fn run_adc(
        &self,
        backend: &str,
        case: &TestCase,
        _data: &HfData,
        request: &AdcRequest,
    ) -> Result<AdcResult, anyhow::Error> {
        self.read_adc(backend, case, request)
    }
}
