//! Benchmark tree ensemble training and TreeSHAP
//!
//! Run with: cargo bench --bench model_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand::SeedableRng;

use claimlens::pipeline::models::{
    BoostingParams, ForestParams, GradientBoosting, LinearRegression, LogisticParams,
    LogisticRegression, Loss, RandomForest,
};
use claimlens::pipeline::{ensemble_shap, FeatureMatrix};

/// Mixed dummy and continuous features with a claim flag driven by a few of them
fn generate_claim_data(n_rows: usize, n_features: usize, seed: u64) -> (FeatureMatrix, Vec<f64>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(n_rows * n_features);
    let mut y = Vec::with_capacity(n_rows);

    for _ in 0..n_rows {
        let row: Vec<f64> = (0..n_features)
            .map(|j| {
                if j % 2 == 0 {
                    f64::from(rng.gen_bool(0.3))
                } else {
                    rng.gen::<f64>() * 100.0
                }
            })
            .collect();
        let risk = 0.1 + 0.3 * row[0] + 0.004 * row[1];
        y.push(f64::from(rng.gen_bool(risk.min(0.95))));
        data.extend(row);
    }

    let names = (0..n_features).map(|j| format!("feature_{}", j)).collect();
    (FeatureMatrix::new(names, data).expect("Failed to create feature matrix"), y)
}

fn benchmark_training_by_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("training_by_rows");
    group.sample_size(10);

    let n_features = 30;
    for n_rows in [1_000, 5_000, 20_000] {
        let (x, y) = generate_claim_data(n_rows, n_features, 42);
        group.throughput(Throughput::Elements(n_rows as u64));

        let forest = ForestParams {
            n_estimators: 20,
            max_depth: Some(8),
            seed: 42,
        };
        group.bench_with_input(BenchmarkId::new("random_forest", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| RandomForest::fit_classifier(black_box(*x), black_box(*y), &forest));
        });

        let boosting = BoostingParams {
            n_rounds: 50,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::new("gradient_boosting", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| GradientBoosting::fit(black_box(*x), black_box(*y), Loss::Logistic, &boosting));
        });

        group.bench_with_input(BenchmarkId::new("logistic", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| LogisticRegression::fit(black_box(*x), black_box(*y), &LogisticParams::default()));
        });

        group.bench_with_input(BenchmarkId::new("linear", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| LinearRegression::fit(black_box(*x), black_box(*y)));
        });
    }

    group.finish();
}

fn benchmark_tree_shap(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_shap");
    group.sample_size(10);

    let (x, y) = generate_claim_data(5_000, 30, 7);
    let (sample, _) = generate_claim_data(500, 30, 8);

    for depth in [4, 6, 8] {
        let forest = RandomForest::fit_classifier(
            &x,
            &y,
            &ForestParams {
                n_estimators: 20,
                max_depth: Some(depth),
                seed: 42,
            },
        )
        .expect("Failed to fit forest");

        group.throughput(Throughput::Elements(sample.n_rows() as u64));
        group.bench_with_input(BenchmarkId::new("forest_depth", depth), &sample, |b, sample| {
            b.iter(|| ensemble_shap(&forest, black_box(sample), "rf"));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_training_by_rows, benchmark_tree_shap);
criterion_main!(benches);
