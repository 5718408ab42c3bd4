use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use nalgebra::Vector3;
use ndarray::{array, Array1, Array2, Array4};
use tempfile::tempdir;

use crate::comparison::{ComparisonFailures, ComparisonMode, SignTreatment};
use crate::drivers::cross_reference::{CrossReferenceCheck, CrossReferenceParams, DEFAULT_ATOL};
use crate::interfaces::binaries::write_hf_data_binary;
use crate::interfaces::solver::{AdcRequest, TestCase};
use crate::interfaces::InputHandle;
use crate::io::{read_xref_yaml, write_xref_binary, XrefFileType};
use crate::target::adc::{AdcProperties, AdcResult, AmplitudeVector};
use crate::target::hf_data::{HfData, Multipoles};
use crate::target::reference_state::Operator;

use super::{
    ContainerFormat, CrossReferenceInput, FileComparison, FileComparisonKind, Input,
};

const ROOT: &str = env!("CARGO_MANIFEST_DIR");

fn hf_data(elec_1_z: f64) -> HfData {
    HfData::builder()
        .restricted(true)
        .convergence_tolerance(1e-10)
        .occupation(array![1.0, 0.0])
        .orbital_coefficients(array![[0.55, 0.55], [1.21, -1.21]])
        .orbital_energies(array![-0.578, 0.670])
        .fock_matrix(array![[-0.578, 0.0], [0.0, 0.670]])
        .electron_repulsion_integrals(Array4::from_elem((2, 2, 2, 2), 0.3))
        .scf_energy(Some(-1.117))
        .spin_multiplicity(Some(1))
        .multipoles(Multipoles::new(
            Vector3::new(0.0, 0.0, elec_1_z),
            2.0,
            Vector3::new(0.0, 0.0, 1.4),
        ))
        .build()
        .unwrap()
}

fn adc_result(n_iter: usize) -> AdcResult {
    let vectors = (0..3)
        .map(|i| {
            AmplitudeVector::new().with_block("singles", array![0.8, -0.6 + 0.1 * i as f64].into_dyn())
        })
        .collect::<Vec<_>>();
    AdcResult::builder()
        .eigenvalues(array![0.47, 0.55, 0.59])
        .n_iter(n_iter)
        .eigenvectors(&vectors)
        .properties(Some(
            AdcProperties::builder()
                .oscillator_strengths(Some(Array1::from_elem(3, 0.05)))
                .state_dipole_moments(Some(Array2::zeros((3, 3))))
                .build()
                .unwrap(),
        ))
        .build()
        .unwrap()
}

/// Writes a store of two back-ends for the case `h2/sto3g` and returns its root.
fn write_store(root: &Path, pyscf_elec_1_z: f64, pyscf_n_iter: usize) -> PathBuf {
    let case = TestCase::new("h2", "sto3g");
    for (backend, elec_1_z, n_iter) in [
        ("adcc", -0.1, 11),
        ("pyscf", pyscf_elec_1_z, pyscf_n_iter),
    ] {
        let dir = root.join(backend);
        fs::create_dir_all(&dir).unwrap();
        write_hf_data_binary(
            &hf_data(elec_1_z),
            dir.join(format!("{}_{}", case.molecule, case.basis)),
        )
        .unwrap();
        write_xref_binary(
            dir.join(format!("{}_{}_adc2_3", case.molecule, case.basis)),
            XrefFileType::AdcResult,
            &adc_result(n_iter),
        )
        .unwrap();
    }
    root.to_path_buf()
}

fn cross_reference_input(store: PathBuf) -> CrossReferenceInput {
    CrossReferenceInput {
        store,
        operators: vec![Operator::ElectricDipole],
        params: CrossReferenceParams::builder()
            .cases(vec![TestCase::new("h2", "sto3g")])
            .checks(vec![
                CrossReferenceCheck::HfProperties,
                CrossReferenceCheck::Adc(AdcRequest::new("adc2", 3)),
            ])
            .build()
            .unwrap(),
    }
}

#[test]
fn test_interfaces_input_cross_reference() {
    let name = format!("{ROOT}/tests/input/test_input_cross_reference.yml");
    let inp = read_xref_yaml::<Input, _>(&name).unwrap();
    assert!(inp.file_comparisons.is_empty());

    let xref = inp.cross_reference.unwrap();
    assert_eq!(xref.store, PathBuf::from("tests/store"));
    assert_eq!(xref.operators, vec![Operator::ElectricDipole]);
    assert_eq!(
        xref.params.cases,
        vec![TestCase::new("h2o", "sto3g"), TestCase::new("lih", "cc-pvdz")]
    );
    assert_eq!(xref.params.checks.len(), 3);
    assert_eq!(xref.params.checks[0], CrossReferenceCheck::HfProperties);
    if let CrossReferenceCheck::Adc(request) = &xref.params.checks[2] {
        assert_eq!(request.method, "cvs-adc2");
        assert_eq!(request.n_core_orbitals, Some(1));
        assert_eq!(request.conv_tol, 1e-8);
    } else {
        panic!("Unexpected check kind.");
    }
    assert_eq!(xref.params.atol, 1e-8);
    assert!(xref.params.excluded_backends.is_empty());
    assert_eq!(xref.params.mode, ComparisonMode::Exhaustive);
    assert!(!xref.params.parallel_backends);
}

#[test]
fn test_interfaces_input_file_comparisons() {
    let name = format!("{ROOT}/tests/input/test_input_file_comparisons.yml");
    let inp = read_xref_yaml::<Input, _>(&name).unwrap();
    assert!(inp.cross_reference.is_none());
    assert_eq!(inp.file_comparisons.len(), 3);

    let hf = &inp.file_comparisons[0];
    assert_eq!(hf.kind, FileComparisonKind::HfData);
    assert_eq!(hf.format, ContainerFormat::Binary);
    assert_eq!(hf.signs, SignTreatment::Magnitude);
    assert_eq!(hf.atol, DEFAULT_ATOL);
    assert_eq!(hf.mode, ComparisonMode::FailFast);
    assert_eq!(hf.files.keys().collect::<Vec<_>>(), vec!["pyscf", "psi4"]);

    let hdf5 = &inp.file_comparisons[1];
    assert_eq!(hdf5.format, ContainerFormat::Hdf5);
    assert_eq!(hdf5.signs, SignTreatment::Signed);
    assert_eq!(hdf5.atol, 1e-10);

    let adc = &inp.file_comparisons[2];
    assert_eq!(adc.kind, FileComparisonKind::Adc);
    assert_eq!(adc.mode, ComparisonMode::Exhaustive);
}

#[test]
fn test_interfaces_input_handle_store_pass() {
    let dir = tempdir().unwrap();
    let store = write_store(dir.path(), -0.1, 11);
    let inp = Input {
        cross_reference: Some(cross_reference_input(store)),
        file_comparisons: vec![],
    };
    inp.handle().unwrap();
}

#[test]
fn test_interfaces_input_handle_store_fail() {
    let dir = tempdir().unwrap();
    let store = write_store(dir.path(), -0.1, 12);
    let xref = cross_reference_input(store);
    assert!(!xref.run().unwrap());

    let inp = Input {
        cross_reference: Some(xref),
        file_comparisons: vec![],
    };
    assert!(inp.handle().is_err());
}

#[test]
fn test_interfaces_input_handle_store_skipped() {
    let dir = tempdir().unwrap();
    let store = write_store(dir.path(), -0.1, 11);
    let mut xref = cross_reference_input(store);
    xref.params.excluded_backends = vec!["pyscf".to_string()];
    assert!(xref.run().unwrap());
}

#[test]
fn test_interfaces_input_file_comparison_run() {
    let dir = tempdir().unwrap();
    let store = write_store(dir.path(), -0.1 + 1e-6, 11);
    let files = |suffix: &str| {
        ["adcc", "pyscf"]
            .into_iter()
            .map(|backend| (backend.to_string(), store.join(backend).join(format!("h2_sto3g{suffix}"))))
            .collect::<IndexMap<_, _>>()
    };

    let mut comparison = FileComparison {
        kind: FileComparisonKind::Adc,
        files: files("_adc2_3"),
        format: ContainerFormat::Binary,
        signs: SignTreatment::Signed,
        atol: DEFAULT_ATOL,
        mode: ComparisonMode::FailFast,
    };
    comparison.run().unwrap();

    // The electronic dipoles differ by 1e-6.
    comparison.kind = FileComparisonKind::HfData;
    comparison.files = files("");
    let err = comparison.run().unwrap_err();
    let failures = err.downcast_ref::<ComparisonFailures>().unwrap();
    assert_eq!(failures.failures().len(), 1);

    comparison.atol = 1e-5;
    comparison.run().unwrap();

    comparison.files.truncate(1);
    assert!(comparison.run().is_err());
}

#[test]
fn test_interfaces_input_file_comparison_missing_file() {
    let dir = tempdir().unwrap();
    let comparison = FileComparison {
        kind: FileComparisonKind::HfData,
        files: IndexMap::from([
            ("adcc".to_string(), dir.path().join("a")),
            ("pyscf".to_string(), dir.path().join("b")),
        ]),
        format: ContainerFormat::Binary,
        signs: SignTreatment::Signed,
        atol: DEFAULT_ATOL,
        mode: ComparisonMode::FailFast,
    };
    let err = comparison.run().unwrap_err();
    assert!(format!("{err:#}").contains("Unable to import `adcc` data"));

    let inp = Input {
        cross_reference: None,
        file_comparisons: vec![comparison],
    };
    assert!(inp.handle().is_err());
}

#[cfg(not(feature = "hdf5-container"))]
#[test]
fn test_interfaces_input_file_comparison_hdf5_unavailable() {
    let comparison = FileComparison {
        kind: FileComparisonKind::HfData,
        files: IndexMap::from([
            ("adcc".to_string(), PathBuf::from("a.h5")),
            ("pyscf".to_string(), PathBuf::from("b.h5")),
        ]),
        format: ContainerFormat::Hdf5,
        signs: SignTreatment::Signed,
        atol: DEFAULT_ATOL,
        mode: ComparisonMode::FailFast,
    };
    let err = comparison.run().unwrap_err();
    assert!(err.to_string().contains("hdf5-container"));
}
