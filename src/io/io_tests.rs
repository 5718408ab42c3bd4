use std::path::PathBuf;

use ndarray::array;
use tempfile::tempdir;

use crate::interfaces::input::{FileComparisonKind, Input};
use crate::io::{read_xref_binary, read_xref_yaml, write_xref_binary, write_xref_yaml, XrefFileType};
use crate::target::adc::{AdcResult, AmplitudeVector};

#[test]
fn test_io_file_type_paths() {
    assert_eq!(XrefFileType::HfData.ext(), "xref.hf");
    assert_eq!(XrefFileType::AdcResult.ext(), "xref.adc");
    assert_eq!(
        XrefFileType::AdcResult.path("store/pyscf/h2o_sto3g_adc2_5"),
        PathBuf::from("store/pyscf/h2o_sto3g_adc2_5.xref.adc")
    );
    // Dots in basis-set names are kept.
    assert_eq!(
        XrefFileType::HfData.path("store/pyscf/h2o_6-31g.d"),
        PathBuf::from("store/pyscf/h2o_6-31g.d.xref.hf")
    );
    assert_eq!(XrefFileType::HfData.to_string(), "Hartree-Fock container");
}

#[test]
fn test_io_adc_result_binary() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("result");
    let result = AdcResult::builder()
        .eigenvalues(array![0.45])
        .n_iter(7)
        .eigenvectors(&[AmplitudeVector::new().with_block("singles", array![0.7, 0.7].into_dyn())])
        .build()
        .unwrap();
    write_xref_binary(&name, XrefFileType::AdcResult, &result).unwrap();
    assert!(dir.path().join("result.xref.adc").exists());

    let read: AdcResult = read_xref_binary(&name, XrefFileType::AdcResult).unwrap();
    assert_eq!(read, result);

    let err = read_xref_binary::<AdcResult, _>(&name, XrefFileType::HfData).unwrap_err();
    assert!(err.to_string().starts_with("Unable to open Hartree-Fock container"));

    std::fs::write(dir.path().join("garbage.xref.adc"), [1u8, 2, 3]).unwrap();
    let err =
        read_xref_binary::<AdcResult, _>(dir.path().join("garbage"), XrefFileType::AdcResult)
            .unwrap_err();
    assert!(err.to_string().starts_with("Unable to decode ADC result file"));
}

#[test]
fn test_io_input_yaml() {
    let dir = tempdir().unwrap();
    let input: Input = serde_yaml::from_str(
        r#"
file_comparisons:
  - kind: adc
    files:
      pyscf: store/pyscf/h2o_sto3g_adc2_5
      psi4: store/psi4/h2o_sto3g_adc2_5
"#,
    )
    .unwrap();
    let written = write_xref_yaml(dir.path().join("input"), &input).unwrap();
    assert_eq!(written, dir.path().join("input.yml"));
    let kept = write_xref_yaml(dir.path().join("copy.yaml"), &input).unwrap();
    assert_eq!(kept, dir.path().join("copy.yaml"));
    assert!(read_xref_yaml::<Input, _>(&kept).is_ok());

    let read: Input = read_xref_yaml(dir.path().join("input.yml")).unwrap();
    assert!(read.cross_reference.is_none());
    assert_eq!(read.file_comparisons.len(), 1);
    assert_eq!(read.file_comparisons[0].kind, FileComparisonKind::Adc);
    assert_eq!(
        read.file_comparisons[0].files.keys().collect::<Vec<_>>(),
        vec!["pyscf", "psi4"]
    );
}
