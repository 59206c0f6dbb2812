//! Winner estimator benchmarks
//!
//! The Monte-Carlo estimate costs O(simulations * alternatives). These
//! numbers size `beta_probability_simulations` and the recompute interval.
//!
//! Run with: cargo bench --bench estimator_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use split_engine::config::Configuration;
use split_engine::estimator::{beta_params, simulate_win_probabilities, WinnerEstimator};
use split_engine::experiment::{Experiment, ExperimentOptions};
use split_engine::Engine;

const SIMULATIONS: [usize; 3] = [1_000, 10_000, 100_000];

/// Pure simulation kernel over 2 and 5 arms
fn bench_simulation_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate_win_probabilities");

    for arms in [2usize, 5] {
        let params: Vec<(f64, f64)> = (0..arms)
            .map(|i| beta_params(1_000, 50 + i as i64 * 10))
            .collect();
        for simulations in SIMULATIONS {
            group.bench_with_input(
                BenchmarkId::new(format!("{arms}_arms"), simulations),
                &params,
                |b, params| {
                    let mut rng = StdRng::seed_from_u64(1);
                    b.iter(|| {
                        simulate_win_probabilities(black_box(params), simulations, &mut rng)
                    });
                },
            );
        }
    }

    group.finish();
}

/// Full estimate including store reads and p_winner writes
fn bench_estimate_with_store(c: &mut Criterion) {
    let engine = Engine::in_memory(Configuration::default());
    let experiment = Experiment::new(
        &engine,
        "bench",
        ExperimentOptions::new().alternatives(["a", "b", "c"]),
    );
    experiment.save().expect("save");
    for (i, alternative) in experiment.alternatives().iter().enumerate() {
        for _ in 0..200 {
            alternative.increment_participation().expect("participation");
        }
        for _ in 0..(10 * (i + 1)) {
            alternative.increment_completion(None).expect("completion");
        }
    }

    let estimator = WinnerEstimator::new(10_000, 60);
    c.bench_function("estimate_winning_alternative_3_arms", |b| {
        b.iter(|| estimator.estimate_winning_alternative(black_box(&experiment), None));
    });
}

criterion_group!(benches, bench_simulation_kernel, bench_estimate_with_store);
criterion_main!(benches);
