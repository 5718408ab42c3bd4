use indexmap::IndexMap;
use nalgebra::Vector3;
use ndarray::{array, Array4};
use tempfile::tempdir;

use crate::comparison::{compare_hf_data, ComparisonMode, SignTreatment};
use crate::interfaces::hdf5::{write_group, write_hf_data_hdf5, Hdf5Container};
use crate::interfaces::source::{
    import_hf_data, HfSource, ImportError, ReferenceDataSource, SourceValue,
};
use crate::target::hf_data::{HfData, Multipoles};

fn lih_hf_data() -> HfData {
    HfData::builder()
        .restricted(false)
        .convergence_tolerance(1e-9)
        .occupation(array![1.0, 1.0, 0.0])
        .orbital_coefficients(array![[0.99, 0.02], [0.15, 0.95], [0.3, -0.7]])
        .orbital_energies(array![-2.35, -0.29, 0.08])
        .fock_matrix(array![[-2.35, 0.0, 0.01], [0.0, -0.29, 0.0], [0.01, 0.0, 0.08]])
        .electron_repulsion_integrals(Array4::from_shape_fn((3, 3, 3, 3), |(i, j, k, l)| {
            1.0 / (1 + i + j + k + l) as f64
        }))
        .scf_energy(Some(-7.86))
        .spin_multiplicity(Some(1))
        .multipoles(Multipoles::new(
            Vector3::new(0.0, 0.0, 2.1),
            4.0,
            Vector3::new(0.0, 0.0, -5.4),
        ))
        .build()
        .unwrap()
}

#[test]
fn test_hdf5_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lih.h5");
    let data = lih_hf_data();
    write_hf_data_hdf5(&data, &path).unwrap();

    let container = Hdf5Container::open(&path).unwrap();
    assert!(container.contains("multipoles/elec_1").unwrap());
    assert!(!container.contains("multipoles/elec_2").unwrap());
    assert!(!container.contains("density/alpha").unwrap());
    assert_eq!(
        container.materialise("spin_multiplicity").unwrap(),
        SourceValue::Int(1)
    );
    let imported = import_hf_data(&container).unwrap();
    drop(container);

    let records = IndexMap::from([
        ("written".to_string(), data),
        ("read".to_string(), imported),
    ]);
    compare_hf_data(&records, 0.0, ComparisonMode::Exhaustive, SignTreatment::Signed).unwrap();
}

#[test]
fn test_hdf5_threshold_alias() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy.h5");
    let mut map = lih_hf_data().to_source_map();
    map.remove("convergence_tolerance");
    map.insert("threshold", SourceValue::Float(1e-10));
    {
        let file = hdf5::File::create(&path).unwrap();
        write_group(&file, &map).unwrap();
    }

    let imported = HfSource::Hdf5(path.clone()).import().unwrap();
    assert_eq!(imported.convergence_tolerance(), 1e-10);
}

#[test]
fn test_hdf5_missing_multipole() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("incomplete.h5");
    let mut map = lih_hf_data().to_source_map();
    if let Some(SourceValue::Group(mut multipoles)) = map.remove("multipoles") {
        multipoles.remove("nuclear_0");
        map.insert("multipoles", SourceValue::Group(multipoles));
    }
    {
        let file = hdf5::File::create(&path).unwrap();
        write_group(&file, &map).unwrap();
    }

    match HfSource::Hdf5(path).import() {
        Err(ImportError::MissingField(err)) => assert_eq!(err.field, "multipoles/nuclear_0"),
        Err(err) => panic!("Unexpected error: {err}"),
        Ok(_) => panic!("Import should have failed."),
    }
}
