use std::collections::HashMap;

use indexmap::IndexMap;
use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array4};
use tempfile::tempdir;

use hfcrossref::comparison::{compare_adc_results, ComparisonError, ComparisonMode, Quantity};
use hfcrossref::drivers::cross_reference::{
    CrossReferenceCheck, CrossReferenceDriver, CrossReferenceOutcome, CrossReferenceParams,
};
use hfcrossref::drivers::CrossRefDriver;
use hfcrossref::interfaces::binaries::write_hf_data_binary;
use hfcrossref::interfaces::solver::{
    AdcRequest, CachedSolver, ExternalSolver, StoredProperties, StoredResultsSolver, TestCase,
};
use hfcrossref::interfaces::source::{HfSource, SourceValue};
use hfcrossref::io::{write_xref_binary, XrefFileType};
use hfcrossref::target::adc::{AdcProperties, AdcResult, AmplitudeVector};
use hfcrossref::target::hf_data::{HfData, Multipoles};
use hfcrossref::target::reference_state::Operator;

const N_STATES: usize = 5;

fn water_hf_data() -> HfData {
    let energies = Array1::from(vec![-20.55, -1.34, -0.70, -0.57, -0.49, 0.18, 0.26]);
    HfData::builder()
        .restricted(true)
        .convergence_tolerance(1e-10)
        .occupation(Array1::from(vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]))
        .orbital_coefficients(Array2::from_shape_fn((7, 7), |(i, j)| {
            if i == j {
                0.9
            } else {
                0.01 * (i + j) as f64
            }
        }))
        .orbital_energies(energies.clone())
        .fock_matrix(Array2::from_diag(&energies))
        .electron_repulsion_integrals(Array4::from_shape_fn((7, 7, 7, 7), |(p, q, r, s)| {
            0.05 / (1 + p + q + r + s) as f64
        }))
        .scf_energy(Some(-74.963))
        .spin_multiplicity(Some(1))
        .multipoles(Multipoles::new(
            Vector3::new(0.0, 0.0, -0.33),
            10.0,
            Vector3::new(0.0, 0.0, 1.0),
        ))
        .build()
        .unwrap()
}

/// ADC(2) singlets of water as produced by one back-end. `signs` flips the overall sign of each
/// eigenvector, `eigenvector_noise` is added to every singles amplitude magnitude.
fn water_adc2(
    eigenvalue_shifts: &[f64; N_STATES],
    signs: &[f64; N_STATES],
    eigenvector_noise: f64,
) -> AdcResult {
    let eigenvalues = Array1::from_shape_fn(N_STATES, |i| {
        [0.2966, 0.3608, 0.3859, 0.4519, 0.5035][i] + eigenvalue_shifts[i]
    });
    let vectors = (0..N_STATES)
        .map(|state| {
            let singles = Array2::from_shape_fn((5, 2), |(i, a)| {
                let x = 0.05 + 0.1 * ((state + i * 2 + a) % 7) as f64;
                signs[state] * (x + eigenvector_noise)
            });
            let doubles = Array1::from_shape_fn(25, |k| signs[state] * 1e-3 * (k % 5) as f64);
            AmplitudeVector::new()
                .with_block("singles", singles.into_dyn())
                .with_block("doubles", doubles.into_dyn())
        })
        .collect::<Vec<_>>();
    AdcResult::builder()
        .eigenvalues(eigenvalues)
        .n_iter(12)
        .eigenvectors(&vectors)
        .properties(Some(
            AdcProperties::builder()
                .oscillator_strengths(Some(Array1::from(vec![0.0, 0.0, 0.07, 0.0, 0.11])))
                .state_dipole_moments(Some(Array2::from_shape_fn((N_STATES, 3), |(i, x)| {
                    if x == 2 {
                        -0.2 - 0.05 * i as f64
                    } else {
                        0.0
                    }
                })))
                .build()
                .unwrap(),
        ))
        .build()
        .unwrap()
}

#[test]
fn test_adc_results_across_backends() {
    let reference = water_adc2(&[0.0; N_STATES], &[1.0; N_STATES], 0.0);
    let other = water_adc2(
        &[1e-10, -1e-10, 0.0, 2e-10, 0.0],
        &[-1.0, 1.0, -1.0, -1.0, 1.0],
        4e-8,
    );
    let results = IndexMap::from([
        ("adcc".to_string(), reference.clone()),
        ("pyscf".to_string(), other),
    ]);
    compare_adc_results(&results, 5e-9, ComparisonMode::FailFast, &StoredProperties).unwrap();

    let shifted = water_adc2(&[0.0, 0.0, 0.0, 0.0, 1e-6], &[1.0; N_STATES], 0.0);
    let results = IndexMap::from([
        ("adcc".to_string(), reference),
        ("pyscf".to_string(), shifted),
    ]);
    let failures =
        compare_adc_results(&results, 5e-9, ComparisonMode::FailFast, &StoredProperties)
            .unwrap_err();
    match &failures.failures()[0] {
        ComparisonError::ToleranceViolation(err) => {
            assert_eq!(err.quantity, Quantity::Eigenvalues);
            assert_eq!(err.index, vec![4]);
        }
        other => panic!("Unexpected failure: {other}"),
    }
}

/// Writes a store with the given back-ends, all holding identical results except for the
/// eigenvalue shifts of each back-end.
fn write_store(root: &std::path::Path, backends: &HashMap<&str, [f64; N_STATES]>) {
    let case = TestCase::new("h2o", "sto3g");
    let request = AdcRequest::new("adc2", N_STATES);
    let solver = StoredResultsSolver::new(root, &[]);
    for (backend, shifts) in backends.iter() {
        std::fs::create_dir_all(root.join(backend)).unwrap();
        // One back-end still writes the deprecated key.
        let mut map = water_hf_data().to_source_map();
        if *backend == "psi4" {
            map.remove("convergence_tolerance");
            map.insert("threshold", SourceValue::Float(1e-10));
            write_xref_binary(solver.hf_name(backend, &case), XrefFileType::HfData, &map)
                .unwrap();
        } else {
            write_hf_data_binary(&water_hf_data(), solver.hf_name(backend, &case)).unwrap();
        }
        write_xref_binary(
            solver.adc_name(backend, &case, &request),
            XrefFileType::AdcResult,
            &water_adc2(shifts, &[1.0; N_STATES], 0.0),
        )
        .unwrap();
    }
}

fn run_suite(root: &std::path::Path) -> CrossReferenceOutcome {
    let params = CrossReferenceParams::builder()
        .cases(vec![TestCase::new("h2o", "sto3g")])
        .checks(vec![
            CrossReferenceCheck::HfProperties,
            CrossReferenceCheck::Adc(AdcRequest::new("adc2", N_STATES)),
        ])
        .build()
        .unwrap();
    let solver = CachedSolver::new(StoredResultsSolver::new(root, &[Operator::ElectricDipole]));
    let mut driver = CrossReferenceDriver::builder()
        .parameters(&params)
        .solver(&solver)
        .property_provider(&StoredProperties)
        .build()
        .unwrap();
    driver.run().unwrap();
    let outcome = driver.result().unwrap().outcome().clone();
    if !outcome.is_skipped() {
        // Both checks import the same sources, which are only produced once per back-end.
        assert_eq!(solver.n_cached(), solver.available_backends().len());
    }
    outcome
}

#[test]
fn test_cross_reference_suite_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    write_store(
        dir.path(),
        &HashMap::from([("adcc", [0.0; N_STATES]), ("psi4", [0.0; N_STATES])]),
    );
    let outcome = run_suite(dir.path());
    assert!(outcome.passed());

    let dir = tempdir().unwrap();
    write_store(
        dir.path(),
        &HashMap::from([
            ("adcc", [0.0; N_STATES]),
            ("pyscf", [0.0, 0.0, 0.0, 0.0, 1e-6]),
        ]),
    );
    let outcome = run_suite(dir.path());
    assert!(outcome.failed());
    let CrossReferenceOutcome::Completed(reports) = outcome else {
        panic!("The suite should have completed.");
    };
    assert!(reports[0].passed());
    assert!(!reports[1].passed());
}

#[test]
fn test_cross_reference_suite_skipped() {
    let dir = tempdir().unwrap();
    write_store(
        dir.path(),
        &HashMap::from([("adcc", [0.0; N_STATES]), ("molsturm", [0.0; N_STATES])]),
    );
    let outcome = run_suite(dir.path());
    assert!(outcome.is_skipped());
    assert!(!outcome.failed());
}

#[test]
fn test_import_from_binary_source() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("h2o_sto3g");
    write_hf_data_binary(&water_hf_data(), &name).unwrap();
    let data = HfSource::Binary(name).import().unwrap();
    assert_eq!(data.n_orbitals(), 7);
    assert_eq!(data.scf_energy(), Some(-74.963));
}
