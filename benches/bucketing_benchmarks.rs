//! Bucketing benchmarks (assignment hot path)
//!
//! Run with: cargo bench --bench bucketing_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use split_engine::algorithms::Algorithm;
use split_engine::config::Configuration;
use split_engine::experiment::{Experiment, ExperimentOptions};
use split_engine::trial::{Trial, TrialOptions};
use split_engine::user::User;
use split_engine::Engine;

fn experiment(engine: &Engine, algorithm: Algorithm) -> Experiment {
    let experiment = Experiment::new(
        engine,
        algorithm.as_str(),
        ExperimentOptions::new()
            .alternatives(["a", "b", "c", "d"])
            .algorithm(algorithm),
    );
    experiment.save().expect("save");
    experiment
}

/// `next_alternative` per algorithm
fn bench_next_alternative(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_alternative");
    let engine = Engine::in_memory(Configuration::default());

    for algorithm in [
        Algorithm::WeightedSample,
        Algorithm::SystematicSampling,
        Algorithm::Whiplash,
    ] {
        let experiment = experiment(&engine, algorithm);
        group.bench_with_input(
            BenchmarkId::from_parameter(algorithm),
            &experiment,
            |b, experiment| b.iter(|| black_box(experiment).next_alternative()),
        );
    }

    group.finish();
}

/// Full trial: new visitor versus returning visitor
fn bench_trial(c: &mut Criterion) {
    let mut group = c.benchmark_group("trial_choose");
    let engine = Engine::in_memory(Configuration::default());
    let experiment = experiment(&engine, Algorithm::WeightedSample);

    group.bench_function("new_visitor", |b| {
        b.iter(|| {
            let mut user = User::in_session();
            let mut trial = Trial::new(experiment.clone(), &mut user, TrialOptions::default());
            trial.choose(None).map(|a| a.name().len())
        });
    });

    let mut returning = User::in_session();
    Trial::new(experiment.clone(), &mut returning, TrialOptions::default())
        .choose(None)
        .expect("first visit");
    group.bench_function("returning_visitor", |b| {
        b.iter(|| {
            let mut trial =
                Trial::new(experiment.clone(), &mut returning, TrialOptions::default());
            trial.choose(None).map(|a| a.name().len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_next_alternative, bench_trial);
criterion_main!(benches);
