//! Eigenpairs and response properties produced by an ADC solver.

use std::fmt;

use derive_builder::Builder;
use indexmap::IndexMap;
use ndarray::{Array1, Array2, ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "adc_tests.rs"]
mod adc_tests;

// ==================
// Struct definitions
// ==================

/// An ADC eigenvector decomposed into named blocks, one per excitation-rank sector (*e.g.*
/// `singles` and `doubles`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeVector {
    blocks: IndexMap<String, ArrayD<f64>>,
}

impl AmplitudeVector {
    /// Constructs an amplitude vector with no blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block to this vector, returning the modified vector.
    pub fn with_block(mut self, name: &str, block: ArrayD<f64>) -> Self {
        self.blocks.insert(name.to_string(), block);
        self
    }

    /// Returns the names of the blocks in insertion order.
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// Returns a dense view of the named block.
    pub fn block(&self, name: &str) -> Option<ArrayViewD<'_, f64>> {
        self.blocks.get(name).map(|block| block.view())
    }

    /// Returns the number of blocks.
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }
}

impl FromIterator<(String, ArrayD<f64>)> for AmplitudeVector {
    fn from_iter<I: IntoIterator<Item = (String, ArrayD<f64>)>>(iter: I) -> Self {
        Self {
            blocks: iter.into_iter().collect(),
        }
    }
}

/// Response properties derived from ADC eigenpairs.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdcProperties {
    /// The oscillator strengths, one per excited state.
    #[builder(default = "None")]
    oscillator_strengths: Option<Array1<f64>>,

    /// The state dipole moments, one row per excited state.
    #[builder(default = "None")]
    state_dipole_moments: Option<Array2<f64>>,
}

impl AdcProperties {
    /// Returns a builder to construct a new [`AdcProperties`].
    pub fn builder() -> AdcPropertiesBuilder {
        AdcPropertiesBuilder::default()
    }
}

/// Enumerated type for the optional properties of an [`AdcResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdcProperty {
    /// The oscillator strengths of the excited states.
    OscillatorStrengths,

    /// The dipole moments of the excited states.
    StateDipoleMoments,
}

impl AdcProperty {
    /// All optional properties, in comparison order.
    pub const ALL: [AdcProperty; 2] = [
        AdcProperty::OscillatorStrengths,
        AdcProperty::StateDipoleMoments,
    ];
}

impl fmt::Display for AdcProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcProperty::OscillatorStrengths => write!(f, "oscillator_strengths"),
            AdcProperty::StateDipoleMoments => write!(f, "state_dipole_moments"),
        }
    }
}

/// A structure holding the eigenpairs of one ADC calculation together with any response
/// properties that have been attached to it.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct AdcResult {
    /// The eigenvalues (excitation energies).
    eigenvalues: Array1<f64>,

    /// The number of iterations taken by the eigensolver.
    n_iter: usize,

    /// The eigenvectors, one per eigenvalue.
    #[builder(setter(custom))]
    eigenvectors: Vec<AmplitudeVector>,

    /// The attached response properties.
    #[builder(default = "None")]
    properties: Option<AdcProperties>,
}

impl AdcResultBuilder {
    pub fn eigenvectors(&mut self, vs: &[AmplitudeVector]) -> &mut Self {
        self.eigenvectors = Some(vs.to_vec());
        self
    }

    fn validate(&self) -> Result<(), String> {
        let neigvals = self
            .eigenvalues
            .as_ref()
            .ok_or("No eigenvalues found.".to_string())?
            .len();
        let neigvecs = self
            .eigenvectors
            .as_ref()
            .ok_or("No eigenvectors found.".to_string())?
            .len();
        if neigvals == neigvecs {
            Ok(())
        } else {
            log::error!("{neigvals} eigenvalues but {neigvecs} eigenvectors given.");
            Err("ADC result validation failed.".to_string())
        }
    }
}

impl AdcResult {
    /// Returns a builder to construct a new [`AdcResult`].
    pub fn builder() -> AdcResultBuilder {
        AdcResultBuilder::default()
    }

    /// Returns the eigenvalues.
    pub fn eigenvalues(&self) -> &Array1<f64> {
        &self.eigenvalues
    }

    /// Returns the number of eigensolver iterations.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Returns the eigenvectors.
    pub fn eigenvectors(&self) -> &[AmplitudeVector] {
        &self.eigenvectors
    }

    /// Returns the number of states.
    pub fn n_states(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Returns `true` if the specified response property has been attached.
    pub fn has_property(&self, property: AdcProperty) -> bool {
        self.properties.as_ref().is_some_and(|props| match property {
            AdcProperty::OscillatorStrengths => props.oscillator_strengths.is_some(),
            AdcProperty::StateDipoleMoments => props.state_dipole_moments.is_some(),
        })
    }

    /// Returns the oscillator strengths, if attached.
    pub fn oscillator_strengths(&self) -> Option<&Array1<f64>> {
        self.properties
            .as_ref()
            .and_then(|props| props.oscillator_strengths.as_ref())
    }

    /// Returns the state dipole moments, if attached.
    pub fn state_dipole_moments(&self) -> Option<&Array2<f64>> {
        self.properties
            .as_ref()
            .and_then(|props| props.state_dipole_moments.as_ref())
    }

    /// Returns a dense dynamic-dimensional copy of an attached property.
    pub fn property_dense(&self, property: AdcProperty) -> Option<ArrayD<f64>> {
        match property {
            AdcProperty::OscillatorStrengths => {
                self.oscillator_strengths().map(|x| x.clone().into_dyn())
            }
            AdcProperty::StateDipoleMoments => {
                self.state_dipole_moments().map(|x| x.clone().into_dyn())
            }
        }
    }

    /// Returns a copy of this result with the given properties attached. The original result is
    /// left untouched.
    pub fn with_properties(&self, properties: AdcProperties) -> Self {
        Self {
            properties: Some(properties),
            ..self.clone()
        }
    }
}

impl fmt::Display for AdcResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AdcResult[{} states, {} iterations, blocks: {}]",
            self.n_states(),
            self.n_iter,
            self.eigenvectors
                .first()
                .map(|v| v.block_names().collect::<Vec<_>>().join(", "))
                .unwrap_or_else(|| "none".to_string())
        )
    }
}
