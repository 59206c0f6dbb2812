//! Whiplash: Thompson sampling over alternative conversion rates.
//!
//! Each alternative is scored by a draw from
//! `Beta(participants + 7, participants - completions + 7)` and the highest
//! score wins. The constant 7 keeps untried alternatives competitive.

use super::no_alternatives;
use crate::experiment::{Alternative, Experiment};
use crate::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Beta, Distribution};

/// Additive smoothing applied to both Beta parameters.
pub const FAIRNESS_CONSTANT: f64 = 7.0;

/// Pick the alternative with the highest sampled score; ties are broken
/// uniformly at random. Completions are summed across all goals.
///
/// # Errors
///
/// [`Error::Validation`](crate::Error::Validation) without alternatives;
/// store errors.
pub fn choose_alternative<'e, R: Rng + ?Sized>(
    experiment: &'e Experiment,
    rng: &mut R,
) -> Result<&'e Alternative> {
    let mut arms = Vec::with_capacity(experiment.alternatives().len());
    for alternative in experiment.alternatives() {
        arms.push((
            alternative.participant_count()?,
            alternative.all_completed_count(experiment.goals())?,
        ));
    }
    best_arm(&arms, rng)
        .map(|i| &experiment.alternatives()[i])
        .ok_or_else(|| no_alternatives(experiment))
}

/// Index of the best-scoring `(participants, completions)` arm.
pub fn best_arm<R: Rng + ?Sized>(arms: &[(i64, i64)], rng: &mut R) -> Option<usize> {
    let scores: Vec<f64> = arms
        .iter()
        .map(|&(participants, completions)| arm_score(participants, completions, rng))
        .collect();
    let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let tied: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| **s == best)
        .map(|(i, _)| i)
        .collect();
    tied.choose(rng).copied()
}

/// One Thompson draw for an arm. Negative counts are clamped to zero.
pub fn arm_score<R: Rng + ?Sized>(participants: i64, completions: i64, rng: &mut R) -> f64 {
    let alpha = participants.max(0) as f64 + FAIRNESS_CONSTANT;
    let beta = (participants - completions).max(0) as f64 + FAIRNESS_CONSTANT;
    // Both parameters are >= 7, so construction cannot fail.
    Beta::new(alpha, beta).map_or(0.0, |dist| dist.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_score_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            let s = arm_score(50, 10, &mut rng);
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_negative_counts_clamped() {
        let mut rng = StdRng::seed_from_u64(3);
        let s = arm_score(-5, 20, &mut rng);
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn test_empty_arms() {
        assert_eq!(best_arm(&[], &mut StdRng::seed_from_u64(1)), None);
    }

    #[test]
    fn test_untried_arm_gets_explored() {
        let mut rng = StdRng::seed_from_u64(11);
        let arms = [(100, 5), (0, 0)];
        let picked_untried = (0..2_000)
            .filter(|_| best_arm(&arms, &mut rng) == Some(1))
            .count();
        assert!(picked_untried > 0);
    }

    #[test]
    fn test_prefers_the_higher_rate_arm() {
        let mut rng = StdRng::seed_from_u64(5);
        let arms = [(200, 20), (200, 180)];
        let second = (0..1_000)
            .filter(|_| best_arm(&arms, &mut rng) == Some(1))
            .count();
        assert!(second > 900, "second arm chosen {second} times");
    }
}
