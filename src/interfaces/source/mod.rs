//! Normalisation of heterogeneous Hartree-Fock data sources into [`HfData`].
//!
//! A source is anything implementing [`ReferenceDataSource`]: a path-addressed hierarchy of
//! values where groups are separated by `/`. Every value crossing this boundary is fully
//! materialised into memory by [`ReferenceDataSource::materialise`]; nothing lazy is ever handed
//! on to the comparison layer.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use log;
use nalgebra::Vector3;
use ndarray::{Array, Array1, ArrayD, Dimension, Ix1, Ix2, Ix4};
use serde::{Deserialize, Serialize};

#[cfg(feature = "hdf5-container")]
use crate::interfaces::hdf5::Hdf5Container;
use crate::interfaces::binaries::BinaryContainer;
use crate::target::hf_data::{HfData, Multipoles};


/// Key under which some sources still store the self-consistent-field convergence tolerance.
pub const DEPRECATED_THRESHOLD_KEY: &str = "threshold";

// ======
// Errors
// ======

/// Error indicating that a mandatory field is absent from a source after alias resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFieldError {
    /// The canonical path of the absent field, *e.g.* `multipoles/nuclear_1`.
    pub field: String,
}

impl fmt::Display for MissingFieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Missing field `{}`.", self.field)
    }
}

impl Error for MissingFieldError {}

/// Enumerated type for errors arising while importing Hartree-Fock data.
#[derive(Debug, Clone)]
pub enum ImportError {
    /// A mandatory field is absent.
    MissingField(MissingFieldError),

    /// A field is present but its value cannot be interpreted as required.
    InvalidField { field: String, reason: String },

    /// The underlying container could not be read.
    Read { path: String, reason: String },
}

impl ImportError {
    pub(crate) fn missing(field: &str) -> Self {
        ImportError::MissingField(MissingFieldError {
            field: field.to_string(),
        })
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ImportError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn read(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        ImportError::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImportError::MissingField(err) => write!(f, "Import error: {err}"),
            ImportError::InvalidField { field, reason } => {
                write!(f, "Import error: invalid field `{field}`: {reason}.")
            }
            ImportError::Read { path, reason } => {
                write!(f, "Import error: unable to read `{path}`: {reason}.")
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImportError::MissingField(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MissingFieldError> for ImportError {
    fn from(err: MissingFieldError) -> Self {
        ImportError::MissingField(err)
    }
}

// =============
// Source values
// =============

/// Enumerated type for values that can be stored in a Hartree-Fock data source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SourceValue {
    /// A boolean scalar.
    Bool(bool),

    /// An integer scalar.
    Int(i64),

    /// A floating-point scalar.
    Float(f64),

    /// A dense floating-point array of arbitrary dimensionality.
    Array(ArrayD<f64>),

    /// A nested group of named values.
    Group(SourceMap),
}

impl SourceValue {
    /// Constructs a one-dimensional array value from a slice.
    pub fn from_slice(xs: &[f64]) -> Self {
        SourceValue::Array(Array1::from(xs.to_vec()).into_dyn())
    }

    /// Returns a short description of the kind of this value.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceValue::Bool(_) => "boolean",
            SourceValue::Int(_) => "integer",
            SourceValue::Float(_) => "float",
            SourceValue::Array(_) => "array",
            SourceValue::Group(_) => "group",
        }
    }

    fn into_bool(self, field: &str) -> Result<bool, ImportError> {
        match self {
            SourceValue::Bool(b) => Ok(b),
            SourceValue::Int(0) => Ok(false),
            SourceValue::Int(1) => Ok(true),
            other => Err(ImportError::invalid(
                field,
                format!("boolean expected, {} found", other.kind()),
            )),
        }
    }

    fn into_f64(self, field: &str) -> Result<f64, ImportError> {
        match self {
            SourceValue::Float(x) => Ok(x),
            SourceValue::Int(i) => Ok(i as f64),
            SourceValue::Array(arr) if arr.len() == 1 => arr
                .iter()
                .next()
                .copied()
                .ok_or_else(|| ImportError::invalid(field, "empty array")),
            other => Err(ImportError::invalid(
                field,
                format!("scalar expected, {} found", other.kind()),
            )),
        }
    }

    fn into_u32(self, field: &str) -> Result<u32, ImportError> {
        match self {
            SourceValue::Int(i) => u32::try_from(i)
                .map_err(|_| ImportError::invalid(field, format!("{i} is not a valid count"))),
            SourceValue::Float(x) if x.fract() == 0.0 && x >= 0.0 && x <= f64::from(u32::MAX) => {
                Ok(x as u32)
            }
            other => Err(ImportError::invalid(
                field,
                format!("non-negative integer expected, {} found", other.kind()),
            )),
        }
    }

    fn into_array<D: Dimension>(self, field: &str) -> Result<Array<f64, D>, ImportError> {
        match self {
            SourceValue::Array(arr) => {
                let ndim = arr.ndim();
                arr.into_dimensionality::<D>().map_err(|_| {
                    ImportError::invalid(
                        field,
                        format!(
                            "{}-dimensional array expected, {ndim}-dimensional array found",
                            D::NDIM.unwrap_or(0)
                        ),
                    )
                })
            }
            other => Err(ImportError::invalid(
                field,
                format!("array expected, {} found", other.kind()),
            )),
        }
    }

    /// Coerces this value into a dense three-vector. Arrays of any shape holding exactly three
    /// elements are accepted, as are groups holding exactly three scalar entries.
    fn into_vector3(self, field: &str) -> Result<Vector3<f64>, ImportError> {
        let components = match self {
            SourceValue::Array(arr) => arr.iter().copied().collect::<Vec<_>>(),
            SourceValue::Group(group) => group
                .0
                .into_iter()
                .map(|(key, value)| value.into_f64(&format!("{field}/{key}")))
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(ImportError::invalid(
                    field,
                    format!("three-vector expected, {} found", other.kind()),
                ))
            }
        };
        if components.len() != 3 {
            return Err(ImportError::invalid(
                field,
                format!("three components expected, {} found", components.len()),
            ));
        }
        Ok(Vector3::from_iterator(components))
    }
}

impl<D: Dimension> From<Array<f64, D>> for SourceValue {
    fn from(arr: Array<f64, D>) -> Self {
        SourceValue::Array(arr.into_dyn())
    }
}

/// An in-memory hierarchical mapping from names to [`SourceValue`]s.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMap(IndexMap<String, SourceValue>);

impl SourceMap {
    /// Constructs an empty mapping.
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Inserts a value under a top-level key, returning the value previously stored there.
    pub fn insert(&mut self, key: impl Into<String>, value: SourceValue) -> Option<SourceValue> {
        self.0.insert(key.into(), value)
    }

    /// Removes a top-level key.
    pub fn remove(&mut self, key: &str) -> Option<SourceValue> {
        self.0.shift_remove(key)
    }

    /// Looks up a value by a `/`-separated path.
    pub fn get(&self, path: &str) -> Option<&SourceValue> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        segments.try_fold(self.0.get(first)?, |value, segment| match value {
            SourceValue::Group(group) => group.0.get(segment),
            _ => None,
        })
    }

    /// Returns the top-level keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Returns the top-level entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SourceValue)> {
        self.0.iter()
    }

    /// Returns the number of top-level entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the mapping holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ================
// Source interface
// ================

/// Trait for hierarchical containers from which Hartree-Fock data can be imported.
pub trait ReferenceDataSource {
    /// Returns `true` if a value or group is stored at the `/`-separated `path`.
    fn contains(&self, path: &str) -> Result<bool, ImportError>;

    /// Reads the value stored at `path` fully into memory. Groups are materialised recursively.
    ///
    /// # Errors
    ///
    /// Errors with [`ImportError::MissingField`] if nothing is stored at `path`, or with
    /// [`ImportError::Read`] if the container cannot be read.
    fn materialise(&self, path: &str) -> Result<SourceValue, ImportError>;
}

impl ReferenceDataSource for SourceMap {
    fn contains(&self, path: &str) -> Result<bool, ImportError> {
        Ok(self.get(path).is_some())
    }

    fn materialise(&self, path: &str) -> Result<SourceValue, ImportError> {
        self.get(path).cloned().ok_or_else(|| ImportError::missing(path))
    }
}

// =================
// Canonical fields
// =================

/// Enumerated type for the canonical fields of Hartree-Fock data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HfField {
    Restricted,
    ConvergenceTolerance,
    Occupation,
    OrbitalCoefficients,
    OrbitalEnergies,
    FockMatrix,
    ElectronRepulsionIntegrals,
    ScfEnergy,
    SpinMultiplicity,
    Multipoles,
    ElectronicDipole,
    NuclearCharge,
    NuclearDipole,
}

impl HfField {
    /// All top-level fields which must be present in every source, in reporting order.
    pub const MANDATORY: [HfField; 7] = [
        HfField::Restricted,
        HfField::ConvergenceTolerance,
        HfField::Occupation,
        HfField::OrbitalCoefficients,
        HfField::OrbitalEnergies,
        HfField::FockMatrix,
        HfField::ElectronRepulsionIntegrals,
    ];

    /// All fields inside the `multipoles` group, which must all be present.
    pub const MULTIPOLES: [HfField; 3] = [
        HfField::ElectronicDipole,
        HfField::NuclearCharge,
        HfField::NuclearDipole,
    ];

    /// Returns the canonical path of this field.
    pub fn key(&self) -> &'static str {
        match self {
            HfField::Restricted => "restricted",
            HfField::ConvergenceTolerance => "convergence_tolerance",
            HfField::Occupation => "occupation",
            HfField::OrbitalCoefficients => "orbital_coefficients",
            HfField::OrbitalEnergies => "orbital_energies",
            HfField::FockMatrix => "fock_matrix",
            HfField::ElectronRepulsionIntegrals => "electron_repulsion_integrals",
            HfField::ScfEnergy => "scf_energy",
            HfField::SpinMultiplicity => "spin_multiplicity",
            HfField::Multipoles => "multipoles",
            HfField::ElectronicDipole => "multipoles/elec_1",
            HfField::NuclearCharge => "multipoles/nuclear_0",
            HfField::NuclearDipole => "multipoles/nuclear_1",
        }
    }

    /// Returns the deprecated path this field may alternatively be stored under.
    fn deprecated_key(&self) -> Option<&'static str> {
        match self {
            HfField::ConvergenceTolerance => Some(DEPRECATED_THRESHOLD_KEY),
            _ => None,
        }
    }
}

impl fmt::Display for HfField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// The physical paths at which each canonical field is stored in one particular source.
#[derive(Clone, Debug)]
pub struct FieldPaths(IndexMap<HfField, &'static str>);

impl FieldPaths {
    /// Returns the physical path of a field that must be present.
    pub fn require(&self, field: HfField) -> Result<&'static str, MissingFieldError> {
        self.0.get(&field).copied().ok_or_else(|| MissingFieldError {
            field: field.key().to_string(),
        })
    }

    /// Returns the physical path of a field if it is present.
    pub fn get(&self, field: HfField) -> Option<&'static str> {
        self.0.get(&field).copied()
    }
}

/// Resolves where each canonical field is stored in `source`.
///
/// This is the only place where deprecated keys are considered: a deprecated `threshold` is
/// used for [`HfField::ConvergenceTolerance`] if, and only if, `convergence_tolerance` itself is
/// absent. Fields present under neither key are simply left out of the returned map.
pub fn resolve_field_paths<S>(source: &S) -> Result<FieldPaths, ImportError>
where
    S: ReferenceDataSource + ?Sized,
{
    let fields = HfField::MANDATORY
        .iter()
        .chain([HfField::ScfEnergy, HfField::SpinMultiplicity, HfField::Multipoles].iter())
        .chain(HfField::MULTIPOLES.iter());
    let mut paths = IndexMap::new();
    for field in fields {
        if source.contains(field.key())? {
            paths.insert(*field, field.key());
        } else if let Some(deprecated) = field.deprecated_key() {
            if source.contains(deprecated)? {
                log::debug!("Falling back to deprecated key `{deprecated}` for `{field}`.");
                paths.insert(*field, deprecated);
            }
        }
    }
    Ok(FieldPaths(paths))
}

// ========
// Importer
// ========

/// Imports Hartree-Fock data from a source, normalising deprecated keys and materialising every
/// tensor into a dense in-memory array. The source is never modified.
///
/// # Arguments
///
/// * `source` - The source from which the data are to be imported.
///
/// # Errors
///
/// Errors with [`ImportError::MissingField`] naming the first absent mandatory field or
/// multipole sub-key, or with [`ImportError::InvalidField`] if a value has the wrong kind or
/// an inconsistent shape.
pub fn import_hf_data<S>(source: &S) -> Result<HfData, ImportError>
where
    S: ReferenceDataSource + ?Sized,
{
    let paths = resolve_field_paths(source)?;
    for field in HfField::MANDATORY.iter() {
        paths.require(*field)?;
    }
    paths.require(HfField::Multipoles)?;
    for field in HfField::MULTIPOLES.iter() {
        paths.require(*field)?;
    }

    let read = |field: HfField| -> Result<SourceValue, ImportError> {
        source.materialise(paths.require(field)?)
    };
    let key = |field: HfField| field.key();

    let multipoles = Multipoles::new(
        read(HfField::ElectronicDipole)?.into_vector3(key(HfField::ElectronicDipole))?,
        read(HfField::NuclearCharge)?.into_f64(key(HfField::NuclearCharge))?,
        read(HfField::NuclearDipole)?.into_vector3(key(HfField::NuclearDipole))?,
    );

    let scf_energy = paths
        .get(HfField::ScfEnergy)
        .map(|path| source.materialise(path)?.into_f64(key(HfField::ScfEnergy)))
        .transpose()?;
    let spin_multiplicity = paths
        .get(HfField::SpinMultiplicity)
        .map(|path| source.materialise(path)?.into_u32(key(HfField::SpinMultiplicity)))
        .transpose()?;

    let mut builder = HfData::builder();
    builder
        .restricted(read(HfField::Restricted)?.into_bool(key(HfField::Restricted))?)
        .convergence_tolerance(
            read(HfField::ConvergenceTolerance)?.into_f64(key(HfField::ConvergenceTolerance))?,
        )
        .occupation(read(HfField::Occupation)?.into_array::<Ix1>(key(HfField::Occupation))?)
        .orbital_coefficients(
            read(HfField::OrbitalCoefficients)?
                .into_array::<Ix2>(key(HfField::OrbitalCoefficients))?,
        )
        .orbital_energies(
            read(HfField::OrbitalEnergies)?.into_array::<Ix1>(key(HfField::OrbitalEnergies))?,
        )
        .fock_matrix(read(HfField::FockMatrix)?.into_array::<Ix2>(key(HfField::FockMatrix))?)
        .electron_repulsion_integrals(
            read(HfField::ElectronRepulsionIntegrals)?
                .into_array::<Ix4>(key(HfField::ElectronRepulsionIntegrals))?,
        )
        .scf_energy(scf_energy)
        .spin_multiplicity(spin_multiplicity)
        .multipoles(multipoles);

    if let Some((field, reason)) = builder.inconsistent_field() {
        return Err(ImportError::invalid(field, reason));
    }
    builder
        .build()
        .map_err(|err| ImportError::invalid("hf_data", err.to_string()))
}

// ===============
// Source dispatch
// ===============

/// Enumerated type for the forms in which an external Hartree-Fock solver can hand over its
/// data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum HfSource {
    /// Data held in memory.
    Mapping(SourceMap),

    /// Data persisted in an `hfcrossref` binary container. The associated path is the file name
    /// without its `.xref.hf` extension.
    Binary(PathBuf),

    /// Data persisted in an HDF5 file. Only available with the `hdf5-container` feature.
    #[cfg(feature = "hdf5-container")]
    Hdf5(PathBuf),
}

impl HfSource {
    /// Imports the data held by this source. Any container opened here is closed again before
    /// this function returns, on success and on failure alike.
    pub fn import(&self) -> Result<HfData, ImportError> {
        match self {
            HfSource::Mapping(map) => import_hf_data(map),
            HfSource::Binary(name) => import_hf_data(&BinaryContainer::open(name)?),
            #[cfg(feature = "hdf5-container")]
            HfSource::Hdf5(path) => import_hf_data(&Hdf5Container::open(path)?),
        }
    }
}
