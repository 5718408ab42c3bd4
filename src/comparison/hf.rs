//! Comparisons of Hartree-Fock reference states and full Hartree-Fock data.

use indexmap::IndexMap;
use nalgebra::Vector3;
use ndarray::{ArrayD, ArrayView1, ArrayViewD};
use serde::{Deserialize, Serialize};

use crate::comparison::{
    compare_arrays, compare_scalars, result_pairs, ComparisonError, ComparisonFailures,
    ComparisonMode, FailureCollector, PairLabels, Quantity, StructuralMismatchError,
    ToleranceHierarchy,
};
use crate::interfaces::source::HfField;
use crate::io::format::xref_output;
use crate::target::hf_data::HfData;
use crate::target::reference_state::{ReferenceState, ReferenceStateProperty};

/// Enumerated type for how sign-ambiguous Hartree-Fock tensors are compared.
///
/// Orbital coefficients, and hence the electron-repulsion integrals in the orbital basis, are
/// only defined up to the sign of each orbital. Data from one source compared against itself
/// should be compared with signs; data from different back-ends should only be compared by
/// magnitude.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignTreatment {
    /// Compare signed values.
    #[default]
    Signed,

    /// Compare absolute values.
    Magnitude,
}

impl SignTreatment {
    fn apply(&self, arr: ArrayViewD<'_, f64>) -> ArrayD<f64> {
        match self {
            SignTreatment::Signed => arr.to_owned(),
            SignTreatment::Magnitude => arr.mapv(f64::abs),
        }
    }
}

fn vector_view(v: &Vector3<f64>) -> ArrayViewD<'_, f64> {
    ArrayView1::from(v.as_slice()).into_dyn()
}

/// Checks that the reference-state properties computed by every back-end agree.
///
/// For every pair of results, the total nuclear charge and the nuclear dipole are compared.
/// The total dipole moment is compared only when both results have it populated. All
/// comparisons use the general tier of the tolerance hierarchy built from `atol`.
///
/// # Arguments
///
/// * `results` - The reference states, keyed by back-end label.
/// * `atol` - The base absolute tolerance.
/// * `mode` - Whether to stop at the first failure.
///
/// # Errors
///
/// Errors with the gathered failures. Fewer than two results is itself a failure.
pub fn compare_hf_properties(
    results: &IndexMap<String, ReferenceState>,
    atol: f64,
    mode: ComparisonMode,
) -> Result<(), ComparisonFailures> {
    let tolerances = ToleranceHierarchy::from_atol(atol);
    let pairs = result_pairs(results).map_err(|err| ComparisonFailures(vec![err]))?;
    let mut collector = FailureCollector::new(mode);
    for pair in pairs.iter() {
        log::debug!("Comparing reference-state properties of {}.", pair.labels);
        collector.check(compare_scalars(
            &pair.labels,
            Quantity::NuclearTotalCharge,
            pair.lhs.nuclear_total_charge(),
            pair.rhs.nuclear_total_charge(),
            tolerances.general,
        ))?;
        collector.check(compare_arrays(
            &pair.labels,
            Quantity::NuclearDipole,
            vector_view(pair.lhs.nuclear_dipole()),
            vector_view(pair.rhs.nuclear_dipole()),
            tolerances.general,
        ))?;
        if let (Some(lhs_dip), Some(rhs_dip)) =
            (pair.lhs.dipole_moment(), pair.rhs.dipole_moment())
        {
            collector.check(compare_arrays(
                &pair.labels,
                Quantity::DipoleMoment,
                vector_view(lhs_dip),
                vector_view(rhs_dip),
                tolerances.general,
            ))?;
        } else {
            log::debug!(
                "Skipping {} for {}: not available from both back-ends.",
                ReferenceStateProperty::DipoleMoment,
                pair.labels
            );
        }
    }
    let outcome = collector.finish();
    if outcome.is_ok() {
        xref_output!(
            "Reference-state properties agree across {} back-end(s).",
            results.len()
        );
    }
    outcome
}

fn compare_hf_pair(
    labels: &PairLabels,
    lhs: &HfData,
    rhs: &HfData,
    tolerances: &ToleranceHierarchy,
    signs: SignTreatment,
    collector: &mut FailureCollector,
) -> Result<(), ComparisonFailures> {
    let general = tolerances.general;
    let structural = |field: HfField, detail: String| -> Result<(), ComparisonError> {
        Err(StructuralMismatchError {
            labels: labels.clone(),
            quantity: Quantity::HfData(field),
            detail,
        }
        .into())
    };

    collector.check(if lhs.restricted() == rhs.restricted() {
        Ok(())
    } else {
        structural(
            HfField::Restricted,
            format!("{} vs {}", lhs.restricted(), rhs.restricted()),
        )
    })?;
    collector.check(compare_scalars(
        labels,
        Quantity::HfData(HfField::ConvergenceTolerance),
        lhs.convergence_tolerance(),
        rhs.convergence_tolerance(),
        general,
    ))?;
    collector.check(compare_arrays(
        labels,
        Quantity::HfData(HfField::Occupation),
        lhs.occupation().view().into_dyn(),
        rhs.occupation().view().into_dyn(),
        general,
    ))?;
    collector.check(compare_arrays(
        labels,
        Quantity::HfData(HfField::OrbitalCoefficients),
        signs
            .apply(lhs.orbital_coefficients().view().into_dyn())
            .view(),
        signs
            .apply(rhs.orbital_coefficients().view().into_dyn())
            .view(),
        general,
    ))?;
    collector.check(compare_arrays(
        labels,
        Quantity::HfData(HfField::OrbitalEnergies),
        lhs.orbital_energies().view().into_dyn(),
        rhs.orbital_energies().view().into_dyn(),
        general,
    ))?;
    collector.check(compare_arrays(
        labels,
        Quantity::HfData(HfField::FockMatrix),
        lhs.fock_matrix().view().into_dyn(),
        rhs.fock_matrix().view().into_dyn(),
        general,
    ))?;
    collector.check(compare_arrays(
        labels,
        Quantity::HfData(HfField::ElectronRepulsionIntegrals),
        signs
            .apply(lhs.electron_repulsion_integrals().view().into_dyn())
            .view(),
        signs
            .apply(rhs.electron_repulsion_integrals().view().into_dyn())
            .view(),
        general,
    ))?;
    collector.check(match (lhs.scf_energy(), rhs.scf_energy()) {
        (Some(e_l), Some(e_r)) => compare_scalars(
            labels,
            Quantity::HfData(HfField::ScfEnergy),
            e_l,
            e_r,
            general,
        ),
        (None, None) => Ok(()),
        (l, r) => structural(
            HfField::ScfEnergy,
            format!("present: {} vs {}", l.is_some(), r.is_some()),
        ),
    })?;
    collector.check(if lhs.spin_multiplicity() == rhs.spin_multiplicity() {
        Ok(())
    } else {
        structural(
            HfField::SpinMultiplicity,
            format!(
                "{:?} vs {:?}",
                lhs.spin_multiplicity(),
                rhs.spin_multiplicity()
            ),
        )
    })?;

    let (mp_l, mp_r) = (lhs.multipoles(), rhs.multipoles());
    collector.check(compare_arrays(
        labels,
        Quantity::HfData(HfField::ElectronicDipole),
        vector_view(mp_l.elec_1()),
        vector_view(mp_r.elec_1()),
        general,
    ))?;
    collector.check(compare_scalars(
        labels,
        Quantity::HfData(HfField::NuclearCharge),
        mp_l.nuclear_0(),
        mp_r.nuclear_0(),
        general,
    ))?;
    collector.check(compare_arrays(
        labels,
        Quantity::HfData(HfField::NuclearDipole),
        vector_view(mp_l.nuclear_1()),
        vector_view(mp_r.nuclear_1()),
        general,
    ))?;
    Ok(())
}

/// Checks that full Hartree-Fock data records agree field by field.
///
/// Every canonical field is compared under the general tier of the tolerance hierarchy built
/// from `atol`. Boolean and integer fields must agree exactly, and optional fields must be
/// present in both records or absent from both.
///
/// # Arguments
///
/// * `records` - The Hartree-Fock data, keyed by label.
/// * `atol` - The base absolute tolerance.
/// * `mode` - Whether to stop at the first failure.
/// * `signs` - How orbital coefficients and electron-repulsion integrals are compared.
///
/// # Errors
///
/// Errors with the gathered failures. Fewer than two records is itself a failure.
pub fn compare_hf_data(
    records: &IndexMap<String, HfData>,
    atol: f64,
    mode: ComparisonMode,
    signs: SignTreatment,
) -> Result<(), ComparisonFailures> {
    let tolerances = ToleranceHierarchy::from_atol(atol);
    let pairs = result_pairs(records).map_err(|err| ComparisonFailures(vec![err]))?;
    let mut collector = FailureCollector::new(mode);
    for pair in pairs.iter() {
        log::debug!("Comparing Hartree-Fock data of {}.", pair.labels);
        compare_hf_pair(
            &pair.labels,
            pair.lhs,
            pair.rhs,
            &tolerances,
            signs,
            &mut collector,
        )?;
    }
    let outcome = collector.finish();
    if outcome.is_ok() {
        xref_output!("Hartree-Fock data agree across {} record(s).", records.len());
    }
    outcome
}
