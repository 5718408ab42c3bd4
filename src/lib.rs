//! # hfcrossref: cross-back-end equivalence checking for Hartree-Fock and ADC results
//!
//! `hfcrossref` sits between independent Hartree-Fock back-ends and a downstream ADC solver.
//! It
//! - imports Hartree-Fock reference data from in-memory mappings, `hfcrossref` binary
//!   containers, or HDF5 files into one canonical, immutable [`target::hf_data::HfData`]
//!   record, resolving the deprecated `threshold` key on the way, and
//! - certifies that reference-state properties and ADC eigenpairs and response properties
//!   computed by different back-ends for the same system agree, using a three-tier tolerance
//!   hierarchy and comparing eigenvectors by magnitude so that their arbitrary signs do not
//!   matter.
//!
//! ## Getting started
//!
//! The available features defined by this crate are:
//! - `hdf5-container`: Enables Hartree-Fock data to be read from and written to HDF5 files
//!
//! The comparison protocols can be used directly:
//!
//! ```
//! use indexmap::IndexMap;
//! use nalgebra::Vector3;
//! use hfcrossref::comparison::{compare_hf_properties, ComparisonMode};
//! use hfcrossref::target::reference_state::ReferenceState;
//!
//! let state = ReferenceState::builder()
//!     .nuclear_total_charge(10.0)
//!     .nuclear_dipole(Vector3::new(0.0, 0.0, 0.5))
//!     .build()
//!     .unwrap();
//! let results = IndexMap::from([
//!     ("pyscf".to_string(), state.clone()),
//!     ("psi4".to_string(), state),
//! ]);
//! assert!(compare_hf_properties(&results, 5e-9, ComparisonMode::FailFast).is_ok());
//! ```
//!
//! Whole suites over several back-ends are run by
//! [`drivers::cross_reference::CrossReferenceDriver`], given an implementation of
//! [`interfaces::solver::ExternalSolver`].
//!
//! ## Output
//!
//! Human-readable reports are logged to the `hfcrossref-output` log target. Everything else is
//! logged to the default targets of the [`log`] facade.

pub mod comparison;
pub mod drivers;
pub mod interfaces;
pub mod io;
pub mod target;
