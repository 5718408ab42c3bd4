//! Properties of a Hartree-Fock reference state that are compared across back-ends.

use std::fmt;

use derive_builder::Builder;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::target::hf_data::HfData;


/// Enumerated type for one-particle operators that a back-end may provide integrals for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// The electric dipole operator.
    ElectricDipole,

    /// The magnetic dipole operator.
    MagneticDipole,

    /// The nabla operator.
    Nabla,
}

/// Enumerated type for the optional properties of a [`ReferenceState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceStateProperty {
    /// The total electric dipole moment of the reference.
    DipoleMoment,
}

impl fmt::Display for ReferenceStateProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceStateProperty::DipoleMoment => write!(f, "dipole moment"),
        }
    }
}

/// A structure holding the comparable properties of a Hartree-Fock reference state.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceState {
    /// The total nuclear charge.
    nuclear_total_charge: f64,

    /// The nuclear dipole moment.
    nuclear_dipole: Vector3<f64>,

    /// The total electric dipole moment, populated only if the electric dipole operator is
    /// available from the back-end.
    #[builder(default = "None")]
    dipole_moment: Option<Vector3<f64>>,
}

impl ReferenceState {
    /// Returns a builder to construct a new [`ReferenceState`].
    pub fn builder() -> ReferenceStateBuilder {
        ReferenceStateBuilder::default()
    }

    /// Derives the reference-state properties from Hartree-Fock data.
    ///
    /// # Arguments
    ///
    /// * `data` - The Hartree-Fock data.
    /// * `operators` - The one-particle operators available from the back-end that produced
    /// `data`. The electric dipole moment is only populated if [`Operator::ElectricDipole`] is
    /// amongst these.
    pub fn from_hf_data(data: &HfData, operators: &[Operator]) -> Self {
        let multipoles = data.multipoles();
        let dipole_moment = operators
            .contains(&Operator::ElectricDipole)
            .then(|| multipoles.nuclear_1() + multipoles.elec_1());
        Self {
            nuclear_total_charge: multipoles.nuclear_0(),
            nuclear_dipole: *multipoles.nuclear_1(),
            dipole_moment,
        }
    }

    /// Returns the total nuclear charge.
    pub fn nuclear_total_charge(&self) -> f64 {
        self.nuclear_total_charge
    }

    /// Returns the nuclear dipole moment.
    pub fn nuclear_dipole(&self) -> &Vector3<f64> {
        &self.nuclear_dipole
    }

    /// Returns the total electric dipole moment, if available.
    pub fn dipole_moment(&self) -> Option<&Vector3<f64>> {
        self.dipole_moment.as_ref()
    }

    /// Returns `true` if the specified optional property is populated.
    pub fn has_property(&self, property: ReferenceStateProperty) -> bool {
        match property {
            ReferenceStateProperty::DipoleMoment => self.dipole_moment.is_some(),
        }
    }
}
