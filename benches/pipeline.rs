//! Feature pipeline benchmark: extraction and scaling of generated sessions.

#[path = "../tests/common/mod.rs"]
mod common;

use common::PayloadGenerator;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uba_sentinel::features::{feature_matrix, FeatureExtractor, StandardScaler};

fn bench_extract(c: &mut Criterion) {
    let extractor = FeatureExtractor::new();
    let payload = PayloadGenerator::new(1).normal();
    c.bench_function("extract_single", |b| {
        b.iter(|| extractor.extract(black_box(&payload)).unwrap())
    });

    let raw = serde_json::json!({ "metadata": serde_json::to_value(&payload).unwrap() });
    c.bench_function("extract_from_json", |b| {
        b.iter(|| extractor.extract_value(black_box(raw.clone())).unwrap())
    });
}

fn bench_matrix_and_scale(c: &mut Criterion) {
    let payloads = PayloadGenerator::new(2).normal_batch(1000);
    c.bench_function("feature_matrix_1000", |b| {
        b.iter(|| feature_matrix(black_box(&payloads)).unwrap())
    });

    let m = feature_matrix(&payloads).unwrap();
    let mut scaler = StandardScaler::new();
    scaler.fit(&m).unwrap();
    c.bench_function("scaler_transform_1000", |b| {
        b.iter(|| scaler.transform(black_box(&m)).unwrap())
    });
}

criterion_group!(benches, bench_extract, bench_matrix_and_scale);
criterion_main!(benches);
