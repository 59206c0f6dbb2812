//! Property-based tests for split-engine
//!
//! - Test bucketing invariants
//! - Test user key encoding
//! - Run with ProptestConfig::with_cases(64)

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use split_engine::algorithms::systematic_sampling::{block, slot_for_index};
use split_engine::algorithms::weighted_sample::pick_weighted;
use split_engine::algorithms::whiplash::best_arm;
use split_engine::algorithms::Algorithm;
use split_engine::config::Configuration;
use split_engine::estimator::simulate_win_probabilities;
use split_engine::experiment::{Experiment, ExperimentOptions, KeyKind, UserKey};
use split_engine::Engine;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Experiment or label name without colons
fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,11}"
}

/// Per-arm (participants, completions) with completions <= participants
fn arb_arms() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec(
        (0i64..500).prop_flat_map(|p| (Just(p), 0..=p)),
        1..6,
    )
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ========================================================================
    // Systematic Sampling Properties
    // ========================================================================

    /// Property: every block holds each alternative exactly M times
    #[test]
    fn prop_systematic_block_balance(
        alternatives in 1usize..8,
        magnitude in 1usize..12,
        seed in any::<u64>(),
        block_num in 0u64..1_000,
    ) {
        let block = block(alternatives, magnitude, seed, block_num);
        prop_assert_eq!(block.len(), alternatives * magnitude);
        for alt in 0..alternatives {
            prop_assert_eq!(block.iter().filter(|&&i| i == alt).count(), magnitude);
        }
    }

    /// Property: M*K consecutive slots from a block boundary are balanced
    #[test]
    fn prop_systematic_slots_balanced(
        alternatives in 1usize..6,
        magnitude in 1usize..6,
        seed in any::<u64>(),
        block_num in 0u64..100,
    ) {
        let length = (alternatives * magnitude) as u64;
        let start = block_num * length;
        let mut counts = vec![0usize; alternatives];
        for index in start..start + length {
            counts[slot_for_index(alternatives, magnitude, seed, index)] += 1;
        }
        prop_assert!(counts.iter().all(|&c| c == magnitude));
    }

    /// Property: separate experiments sharing a seed assign identically
    #[test]
    fn prop_systematic_deterministic_across_instances(
        seed in any::<u64>(),
        calls in 1usize..40,
    ) {
        let run = || {
            let engine = Engine::in_memory(Configuration::default());
            let experiment = Experiment::new(
                &engine,
                "block",
                ExperimentOptions::new()
                    .alternatives(["a", "b", "c"])
                    .algorithm(Algorithm::SystematicSampling)
                    .cohorting_block_magnitude(2)
                    .cohorting_block_seed(seed),
            );
            experiment.save().unwrap();
            (0..calls)
                .map(|_| experiment.next_alternative().unwrap().name().to_string())
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(run(), run());
    }

    // ========================================================================
    // Bandit Properties
    // ========================================================================

    /// Property: N draws yield N selections, all in range
    #[test]
    fn prop_bandit_counts_sum_to_draws(
        arms in arb_arms(),
        draws in 1usize..200,
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts = vec![0usize; arms.len()];
        for _ in 0..draws {
            counts[best_arm(&arms, &mut rng).unwrap()] += 1;
        }
        prop_assert_eq!(counts.iter().sum::<usize>(), draws);
    }

    // ========================================================================
    // Weighted Sample Properties
    // ========================================================================

    /// Property: the pick is a valid index with positive weight
    #[test]
    fn prop_weighted_pick_has_positive_weight(
        weights in prop::collection::vec(0.0f64..10.0, 1..8),
        seed in any::<u64>(),
    ) {
        prop_assume!(weights.iter().any(|w| *w > 0.0));
        let mut rng = StdRng::seed_from_u64(seed);
        let index = pick_weighted(&weights, &mut rng).unwrap();
        prop_assert!(weights[index] > 0.0);
    }

    // ========================================================================
    // Estimator Properties
    // ========================================================================

    /// Property: win probabilities form a distribution
    #[test]
    fn prop_win_probabilities_sum_to_one(
        arms in arb_arms(),
        seed in any::<u64>(),
    ) {
        let params: Vec<(f64, f64)> = arms
            .iter()
            .map(|&(p, c)| split_engine::estimator::beta_params(p, c))
            .collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let probabilities = simulate_win_probabilities(&params, 200, &mut rng).unwrap();
        prop_assert_eq!(probabilities.len(), arms.len());
        prop_assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    // ========================================================================
    // User Key Properties
    // ========================================================================

    /// Property: encoding then decoding a key is lossless
    #[test]
    fn prop_user_key_encoding_is_lossless(
        name in arb_name(),
        version in 0u64..50,
        kind in 0u8..4,
        label in "[a-z_]{1,10}",
    ) {
        prop_assume!(label != "finished");
        let key = UserKey::assignment(name, version);
        let key = match kind {
            0 => key,
            1 => key.finished(),
            2 => key.time_of_assignment(),
            _ => key.with_kind(KeyKind::Extra(label)),
        };
        prop_assert_eq!(UserKey::parse(&key.to_string()), key);
    }
}

#[test]
fn test_bandit_explores_untried_arm() {
    let mut rng = StdRng::seed_from_u64(2024);
    let arms = [(300, 30), (300, 45), (0, 0)];
    let explored = (0..5_000)
        .filter(|_| best_arm(&arms, &mut rng) == Some(2))
        .count();
    assert!(explored > 0);
}

#[test]
fn test_three_alternatives_magnitude_two() {
    let engine = Engine::in_memory(Configuration::default());
    let experiment = Experiment::new(
        &engine,
        "block",
        ExperimentOptions::new()
            .alternatives(["a", "b", "c"])
            .algorithm(Algorithm::SystematicSampling)
            .cohorting_block_magnitude(2)
            .cohorting_block_seed(17),
    );
    experiment.save().unwrap();

    let picks: Vec<String> = (0..6)
        .map(|_| experiment.next_alternative().unwrap().name().to_string())
        .collect();
    for name in ["a", "b", "c"] {
        assert_eq!(picks.iter().filter(|p| *p == name).count(), 2);
    }

    let expected: Vec<&str> = block(3, 2, 17, 0)
        .into_iter()
        .map(|i| ["a", "b", "c"][i])
        .collect();
    assert_eq!(picks, expected);
}
