//! Weighted random sampling.

use super::no_alternatives;
use crate::experiment::{Alternative, Experiment};
use crate::Result;
use rand::Rng;

/// Draw an alternative with probability proportional to its weight.
///
/// # Errors
///
/// [`Error::Validation`](crate::Error::Validation) without alternatives.
pub fn choose_alternative<'e, R: Rng + ?Sized>(
    experiment: &'e Experiment,
    rng: &mut R,
) -> Result<&'e Alternative> {
    let alternatives = experiment.alternatives();
    let weights: Vec<f64> = alternatives.iter().map(Alternative::weight).collect();
    pick_weighted(&weights, rng)
        .map(|i| &alternatives[i])
        .ok_or_else(|| no_alternatives(experiment))
}

/// Index whose cumulative weight interval contains a uniform draw in
/// `[0, total)`. `None` for an empty slice.
///
/// Non-positive weights never win unless every weight is non-positive, in
/// which case the first index is returned.
pub fn pick_weighted<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 || !total.is_finite() {
        return Some(0);
    }

    let point = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, weight) in weights.iter().enumerate() {
        if *weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = i;
        if point < cumulative {
            return Some(i);
        }
    }
    // Float rounding can leave `point` just past the final boundary.
    Some(last_positive)
}
