use ndarray::{array, Array1, Array2};

use crate::target::adc::{AdcProperties, AdcProperty, AdcResult, AmplitudeVector};

fn singles_doubles(scale: f64) -> AmplitudeVector {
    AmplitudeVector::new()
        .with_block("singles", array![[0.9, 0.1], [0.0, -0.2]].mapv(|x| x * scale).into_dyn())
        .with_block("doubles", Array1::from_elem(3, 0.01 * scale).into_dyn())
}

fn adc_result() -> AdcResult {
    AdcResult::builder()
        .eigenvalues(array![0.31, 0.38])
        .n_iter(12)
        .eigenvectors(&[singles_doubles(1.0), singles_doubles(-1.0)])
        .build()
        .unwrap()
}

#[test]
fn test_adc_amplitude_vector() {
    let v = singles_doubles(1.0);
    assert_eq!(v.n_blocks(), 2);
    assert_eq!(v.block_names().collect::<Vec<_>>(), vec!["singles", "doubles"]);
    assert_eq!(v.block("singles").unwrap().shape(), &[2, 2]);
    assert!(v.block("triples").is_none());

    let collected: AmplitudeVector = vec![("ph".to_string(), Array1::zeros(2).into_dyn())]
        .into_iter()
        .collect();
    assert_eq!(collected.block_names().collect::<Vec<_>>(), vec!["ph"]);
}

#[test]
fn test_adc_result_builder() {
    let result = adc_result();
    assert_eq!(result.n_states(), 2);
    assert_eq!(result.n_iter(), 12);
    assert_eq!(result.eigenvectors().len(), 2);
    assert!(!result.has_property(AdcProperty::OscillatorStrengths));
    assert!(result.property_dense(AdcProperty::StateDipoleMoments).is_none());
    assert_eq!(
        result.to_string(),
        "AdcResult[2 states, 12 iterations, blocks: singles, doubles]"
    );
}

#[test]
fn test_adc_result_builder_mismatched_eigenpairs() {
    assert!(AdcResult::builder()
        .eigenvalues(array![0.31, 0.38, 0.45])
        .n_iter(12)
        .eigenvectors(&[singles_doubles(1.0)])
        .build()
        .is_err());
}

#[test]
fn test_adc_result_with_properties() {
    let result = adc_result();
    let props = AdcProperties::builder()
        .oscillator_strengths(Some(array![0.02, 0.3]))
        .build()
        .unwrap();
    let with_props = result.with_properties(props);

    assert!(!result.has_property(AdcProperty::OscillatorStrengths));
    assert!(with_props.has_property(AdcProperty::OscillatorStrengths));
    assert!(!with_props.has_property(AdcProperty::StateDipoleMoments));
    assert_eq!(
        with_props
            .property_dense(AdcProperty::OscillatorStrengths)
            .unwrap()
            .shape(),
        &[2]
    );
    assert_eq!(with_props.eigenvalues(), result.eigenvalues());

    let props = AdcProperties::builder()
        .state_dipole_moments(Some(Array2::zeros((2, 3))))
        .build()
        .unwrap();
    let with_dipoles = result.with_properties(props);
    assert_eq!(
        with_dipoles
            .property_dense(AdcProperty::StateDipoleMoments)
            .unwrap()
            .shape(),
        &[2, 3]
    );
}

#[test]
fn test_adc_property_display() {
    assert_eq!(
        AdcProperty::ALL.map(|p| p.to_string()),
        ["oscillator_strengths", "state_dipole_moments"]
    );
}
