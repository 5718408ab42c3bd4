//! Canonical Hartree-Fock reference data.

use std::fmt;

use derive_builder::Builder;
use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array4};

use crate::interfaces::source::{SourceMap, SourceValue};


// ==================
// Struct definitions
// ==================

/// A structure holding the multipole moments accompanying a Hartree-Fock reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Multipoles {
    /// The electronic dipole moment.
    elec_1: Vector3<f64>,

    /// The total nuclear charge.
    nuclear_0: f64,

    /// The nuclear dipole moment.
    nuclear_1: Vector3<f64>,
}

impl Multipoles {
    /// Constructs a new set of multipoles.
    ///
    /// # Arguments
    ///
    /// * `elec_1` - The electronic dipole moment.
    /// * `nuclear_0` - The total nuclear charge.
    /// * `nuclear_1` - The nuclear dipole moment.
    pub fn new(elec_1: Vector3<f64>, nuclear_0: f64, nuclear_1: Vector3<f64>) -> Self {
        Self {
            elec_1,
            nuclear_0,
            nuclear_1,
        }
    }

    /// Returns the electronic dipole moment.
    pub fn elec_1(&self) -> &Vector3<f64> {
        &self.elec_1
    }

    /// Returns the total nuclear charge.
    pub fn nuclear_0(&self) -> f64 {
        self.nuclear_0
    }

    /// Returns the nuclear dipole moment.
    pub fn nuclear_1(&self) -> &Vector3<f64> {
        &self.nuclear_1
    }
}

/// A structure holding one normalised Hartree-Fock reference computation. Once built, the data
/// cannot be modified; a fresh import always produces a fresh structure.
#[derive(Builder, Clone, Debug)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct HfData {
    /// Boolean indicating if the orbitals are spin-restricted.
    restricted: bool,

    /// The convergence tolerance used by the self-consistent-field procedure that generated
    /// these data.
    convergence_tolerance: f64,

    /// The occupation numbers of the orbitals.
    occupation: Array1<f64>,

    /// The orbital coefficients, indexed by orbital then by basis function.
    orbital_coefficients: Array2<f64>,

    /// The orbital energies.
    orbital_energies: Array1<f64>,

    /// The Fock matrix in the orbital basis.
    fock_matrix: Array2<f64>,

    /// The electron-repulsion integrals in the orbital basis.
    electron_repulsion_integrals: Array4<f64>,

    /// The converged self-consistent-field energy, if reported by the source.
    #[builder(default = "None")]
    scf_energy: Option<f64>,

    /// The spin multiplicity, if reported by the source.
    #[builder(default = "None")]
    spin_multiplicity: Option<u32>,

    /// The multipole moments of the reference.
    multipoles: Multipoles,
}

impl HfDataBuilder {
    /// Locates the first field whose shape is inconsistent with the number of orbitals implied by
    /// the orbital energies.
    ///
    /// # Returns
    ///
    /// The name of the offending field together with a description of the inconsistency, or
    /// `None` if all fields present in the builder are mutually consistent.
    pub fn inconsistent_field(&self) -> Option<(&'static str, String)> {
        let norbs = self.orbital_energies.as_ref()?.len();
        if let Some(occs) = self.occupation.as_ref() {
            if occs.len() != norbs {
                return Some((
                    "occupation",
                    format!("{} entries found, {norbs} orbitals expected", occs.len()),
                ));
            }
        }
        if let Some(coeffs) = self.orbital_coefficients.as_ref() {
            if coeffs.nrows() != norbs {
                return Some((
                    "orbital_coefficients",
                    format!("{} orbitals found, {norbs} expected", coeffs.nrows()),
                ));
            }
        }
        if let Some(fock) = self.fock_matrix.as_ref() {
            if fock.shape() != [norbs, norbs] {
                return Some((
                    "fock_matrix",
                    format!("shape {:?} found, [{norbs}, {norbs}] expected", fock.shape()),
                ));
            }
        }
        if let Some(eri) = self.electron_repulsion_integrals.as_ref() {
            if eri.shape().iter().any(|&n| n != norbs) {
                return Some((
                    "electron_repulsion_integrals",
                    format!(
                        "shape {:?} found, [{norbs}, {norbs}, {norbs}, {norbs}] expected",
                        eri.shape()
                    ),
                ));
            }
        }
        None
    }

    fn validate(&self) -> Result<(), String> {
        match self.inconsistent_field() {
            Some((field, reason)) => {
                log::error!("Hartree-Fock data field `{field}` is inconsistent: {reason}.");
                Err(format!("Hartree-Fock data validation failed for `{field}`: {reason}."))
            }
            None => Ok(()),
        }
    }
}

impl HfData {
    /// Returns a builder to construct a new [`HfData`].
    pub fn builder() -> HfDataBuilder {
        HfDataBuilder::default()
    }

    /// Returns `true` if the orbitals are spin-restricted.
    pub fn restricted(&self) -> bool {
        self.restricted
    }

    /// Returns the self-consistent-field convergence tolerance.
    pub fn convergence_tolerance(&self) -> f64 {
        self.convergence_tolerance
    }

    /// Returns the occupation numbers of the orbitals.
    pub fn occupation(&self) -> &Array1<f64> {
        &self.occupation
    }

    /// Returns the orbital coefficients.
    pub fn orbital_coefficients(&self) -> &Array2<f64> {
        &self.orbital_coefficients
    }

    /// Returns the orbital energies.
    pub fn orbital_energies(&self) -> &Array1<f64> {
        &self.orbital_energies
    }

    /// Returns the Fock matrix in the orbital basis.
    pub fn fock_matrix(&self) -> &Array2<f64> {
        &self.fock_matrix
    }

    /// Returns the electron-repulsion integrals in the orbital basis.
    pub fn electron_repulsion_integrals(&self) -> &Array4<f64> {
        &self.electron_repulsion_integrals
    }

    /// Returns the self-consistent-field energy, if available.
    pub fn scf_energy(&self) -> Option<f64> {
        self.scf_energy
    }

    /// Returns the spin multiplicity, if available.
    pub fn spin_multiplicity(&self) -> Option<u32> {
        self.spin_multiplicity
    }

    /// Returns the multipole moments.
    pub fn multipoles(&self) -> &Multipoles {
        &self.multipoles
    }

    /// Returns the number of orbitals.
    pub fn n_orbitals(&self) -> usize {
        self.orbital_energies.len()
    }

    /// Converts these data into an in-memory source mapping keyed by the canonical field names.
    /// Importing the returned mapping reproduces these data exactly.
    pub fn to_source_map(&self) -> SourceMap {
        let mut multipoles = SourceMap::new();
        multipoles.insert(
            "elec_1",
            SourceValue::from_slice(self.multipoles.elec_1.as_slice()),
        );
        multipoles.insert("nuclear_0", SourceValue::Float(self.multipoles.nuclear_0));
        multipoles.insert(
            "nuclear_1",
            SourceValue::from_slice(self.multipoles.nuclear_1.as_slice()),
        );

        let mut map = SourceMap::new();
        map.insert("restricted", SourceValue::Bool(self.restricted));
        map.insert(
            "convergence_tolerance",
            SourceValue::Float(self.convergence_tolerance),
        );
        map.insert("occupation", SourceValue::from(self.occupation.clone()));
        map.insert(
            "orbital_coefficients",
            SourceValue::from(self.orbital_coefficients.clone()),
        );
        map.insert(
            "orbital_energies",
            SourceValue::from(self.orbital_energies.clone()),
        );
        map.insert("fock_matrix", SourceValue::from(self.fock_matrix.clone()));
        map.insert(
            "electron_repulsion_integrals",
            SourceValue::from(self.electron_repulsion_integrals.clone()),
        );
        if let Some(energy) = self.scf_energy {
            map.insert("scf_energy", SourceValue::Float(energy));
        }
        if let Some(mult) = self.spin_multiplicity {
            map.insert("spin_multiplicity", SourceValue::Int(i64::from(mult)));
        }
        map.insert("multipoles", SourceValue::Group(multipoles));
        map
    }
}

impl fmt::Display for HfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HfData[{}, {} orbitals, {} basis functions, convergence tolerance {:.3e}",
            if self.restricted {
                "restricted"
            } else {
                "unrestricted"
            },
            self.n_orbitals(),
            self.orbital_coefficients.ncols(),
            self.convergence_tolerance
        )?;
        if let Some(energy) = self.scf_energy {
            write!(f, ", E(SCF) = {energy:+.10}")?;
        }
        write!(f, "]")
    }
}
