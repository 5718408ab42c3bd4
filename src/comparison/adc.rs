//! Comparisons of ADC eigenpairs and their response properties.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use ndarray::ArrayViewD;

use crate::comparison::{
    compare_arrays, result_pairs, ComparisonError, ComparisonFailures, ComparisonMode,
    FailureCollector, PairLabels, Quantity, StructuralMismatchError, Tolerance,
    ToleranceHierarchy, ToleranceViolationError,
};
use crate::interfaces::solver::PropertyProvider;
use crate::interfaces::source::MissingFieldError;
use crate::io::format::xref_output;
use crate::target::adc::{AdcProperty, AdcResult, AmplitudeVector};

/// Returns `true` if every entry of `block` is below `atol` in magnitude.
fn is_negligible(block: &ArrayViewD<'_, f64>, atol: f64) -> bool {
    block.iter().all(|x| x.abs() < atol)
}

fn structural(labels: &PairLabels, quantity: Quantity, detail: String) -> ComparisonError {
    StructuralMismatchError {
        labels: labels.clone(),
        quantity,
        detail,
    }
    .into()
}

/// Compares one pair of eigenvectors block by block, by magnitude.
///
/// Blocks that are negligible under the general absolute tolerance on either side are skipped:
/// in a zero block the solvers' residual noise is all that is left, and that noise need not agree.
fn compare_eigenvector_pair(
    labels: &PairLabels,
    state: usize,
    lhs: &AmplitudeVector,
    rhs: &AmplitudeVector,
    tolerances: &ToleranceHierarchy,
    collector: &mut FailureCollector,
) -> Result<(), ComparisonFailures> {
    let lhs_names = lhs.block_names().collect::<BTreeSet<_>>();
    let rhs_names = rhs.block_names().collect::<BTreeSet<_>>();
    if lhs_names != rhs_names {
        return collector.check(Err(structural(
            labels,
            Quantity::EigenvectorBlocks { state },
            format!("{lhs_names:?} vs {rhs_names:?}"),
        )));
    }

    let zero_atol = tolerances.general.atol;
    for name in lhs.block_names() {
        let (Some(lhs_block), Some(rhs_block)) = (lhs.block(name), rhs.block(name)) else {
            continue;
        };
        if is_negligible(&lhs_block, zero_atol) || is_negligible(&rhs_block, zero_atol) {
            log::debug!(
                "Block `{name}` of eigenvector {state} is negligible for {labels}; skipped."
            );
            continue;
        }
        collector.check(compare_arrays(
            labels,
            Quantity::EigenvectorBlock {
                state,
                block: name.to_string(),
            },
            lhs_block.mapv(f64::abs).view(),
            rhs_block.mapv(f64::abs).view(),
            tolerances.eigenvector,
        ))?;
    }
    Ok(())
}

fn compare_eigenpairs(
    labels: &PairLabels,
    lhs: &AdcResult,
    rhs: &AdcResult,
    tolerances: &ToleranceHierarchy,
    collector: &mut FailureCollector,
) -> Result<(), ComparisonFailures> {
    collector.check(compare_arrays(
        labels,
        Quantity::Eigenvalues,
        lhs.eigenvalues().view().into_dyn(),
        rhs.eigenvalues().view().into_dyn(),
        tolerances.eigenvalue,
    ))?;

    collector.check(if lhs.n_iter() == rhs.n_iter() {
        Ok(())
    } else {
        Err(ToleranceViolationError {
            labels: labels.clone(),
            quantity: Quantity::IterationCount,
            index: vec![],
            lhs: lhs.n_iter() as f64,
            rhs: rhs.n_iter() as f64,
            tolerance: Tolerance::exact(),
            n_violations: 1,
        }
        .into())
    })?;

    if lhs.eigenvectors().len() != rhs.eigenvectors().len() {
        collector.check(Err(structural(
            labels,
            Quantity::EigenvectorCount,
            format!(
                "{} vs {}",
                lhs.eigenvectors().len(),
                rhs.eigenvectors().len()
            ),
        )))?;
    } else {
        for (state, (lhs_vec, rhs_vec)) in lhs
            .eigenvectors()
            .iter()
            .zip(rhs.eigenvectors().iter())
            .enumerate()
        {
            compare_eigenvector_pair(labels, state, lhs_vec, rhs_vec, tolerances, collector)?;
        }
    }

    Ok(())
}

/// Compares the response properties of one pair of results, both already carrying whatever the
/// provider attached.
fn compare_adc_properties(
    labels: &PairLabels,
    lhs: &AdcResult,
    rhs: &AdcResult,
    tolerances: &ToleranceHierarchy,
    collector: &mut FailureCollector,
) -> Result<(), ComparisonFailures> {
    for property in AdcProperty::ALL {
        let lhs_prop = lhs.property_dense(property);
        let rhs_prop = rhs.property_dense(property);
        let outcome = match (lhs_prop, rhs_prop) {
            (Some(lhs_prop), Some(rhs_prop)) => compare_arrays(
                labels,
                Quantity::Property(property),
                lhs_prop.view(),
                rhs_prop.view(),
                tolerances.general,
            ),
            (None, _) => Err(ComparisonError::MissingField {
                label: labels.0.clone(),
                error: MissingFieldError {
                    field: property.to_string(),
                },
            }),
            (_, None) => Err(ComparisonError::MissingField {
                label: labels.1.clone(),
                error: MissingFieldError {
                    field: property.to_string(),
                },
            }),
        };
        collector.check(outcome)?;
    }
    Ok(())
}

/// Checks that the ADC results of every back-end agree.
///
/// For every pair of results, in order, the eigenpairs are checked:
///
/// 1. the eigenvalues are compared under the eigenvalue tier (relative slack only);
/// 2. the iteration counts must be identical;
/// 3. the eigenvectors are compared block by block by magnitude under the eigenvector tier,
///    so that the arbitrary overall sign of each eigenvector is immaterial. Both eigenvectors of
///    a state must have the same block names; blocks that are negligible on either side are
///    skipped.
///
/// Only then does `provider` attach response properties to every result, and each property is
/// compared under the general tier for every pair where both sides obtained them. A result the
/// provider fails on is reported once and never hides its eigenpair failures.
///
/// The results passed in are never modified: properties are attached to copies.
///
/// # Arguments
///
/// * `results` - The ADC results, keyed by back-end label.
/// * `atol` - The base absolute tolerance.
/// * `mode` - Whether to stop at the first failure.
/// * `provider` - The collaborator computing response properties for a result.
///
/// # Errors
///
/// Errors with the gathered failures. Fewer than two results is itself a failure.
pub fn compare_adc_results<P>(
    results: &IndexMap<String, AdcResult>,
    atol: f64,
    mode: ComparisonMode,
    provider: &P,
) -> Result<(), ComparisonFailures>
where
    P: PropertyProvider + ?Sized,
{
    let tolerances = ToleranceHierarchy::from_atol(atol);
    let pairs = result_pairs(results).map_err(|err| ComparisonFailures(vec![err]))?;

    let mut collector = FailureCollector::new(mode);
    for pair in pairs.iter() {
        log::debug!("Comparing ADC eigenpairs of {}.", pair.labels);
        compare_eigenpairs(&pair.labels, pair.lhs, pair.rhs, &tolerances, &mut collector)?;
    }

    let mut with_properties = IndexMap::with_capacity(results.len());
    for (label, result) in results.iter() {
        match provider.attach_properties(result) {
            Ok(attached) => {
                with_properties.insert(label.clone(), attached);
            }
            Err(err) => collector.check(Err(ComparisonError::Collaborator {
                label: label.clone(),
                reason: format!("{err:#}"),
            }))?,
        }
    }

    // Only pairs where both sides obtained their properties are compared here. A failed
    // attachment has already been recorded against its own label.
    if with_properties.len() >= 2 {
        for pair in result_pairs(&with_properties)
            .map_err(|err| ComparisonFailures(vec![err]))?
            .iter()
        {
            log::debug!("Comparing ADC properties of {}.", pair.labels);
            compare_adc_properties(&pair.labels, pair.lhs, pair.rhs, &tolerances, &mut collector)?;
        }
    }

    let outcome = collector.finish();
    if outcome.is_ok() {
        xref_output!("ADC results agree across {} back-end(s).", results.len());
    }
    outcome
}
