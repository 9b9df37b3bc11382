//! Benchmark for noise sampling.
//!
//! TARGET: 1,000,000 2D samples per second
//!
//! Run with: cargo bench --package lodge_terrain --bench noise_benchmark

// criterion_group! generates an undocumented public function.
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lodge_terrain::noise::{FractalKind, NoiseField, NoiseSettings, SimplexNoise, WorldSeed};

fn benchmark_single_sample(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42));

    c.bench_function("simplex_2d_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.sample(black_box(x), black_box(x * 0.7)))
        });
    });

    c.bench_function("simplex_3d_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.sample_3d(black_box(x), black_box(x * 0.3), black_box(x * 0.7)))
        });
    });
}

fn benchmark_million_samples(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42));

    let mut group = c.benchmark_group("million_samples");
    group.throughput(Throughput::Elements(1_000_000));
    group.sample_size(10);

    group.bench_function("1M_simplex_2d", |b| {
        b.iter(|| {
            for i in 0..1_000_000 {
                let x = (i % 1000) as f64 * 0.1;
                let z = (i / 1000) as f64 * 0.1;
                black_box(noise.sample(x, z));
            }
        });
    });

    group.finish();
}

fn benchmark_fractal_fields(c: &mut Criterion) {
    let plain = NoiseField::new(
        WorldSeed::new(42),
        NoiseSettings::fractal(FractalKind::Plain, 3, 0.015, 0.5, 2.0),
    );
    let ridged = NoiseField::new(
        WorldSeed::new(42).offset(1000),
        NoiseSettings::fractal(FractalKind::Ridged, 4, 0.03, 0.5, 2.0),
    );

    c.bench_function("plain_field_3_octaves", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(plain.sample_2d(black_box(x), black_box(x * 0.7)))
        });
    });

    c.bench_function("ridged_field_4_octaves", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(ridged.sample_2d(black_box(x), black_box(x * 0.7)))
        });
    });
}

criterion_group!(
    benches,
    benchmark_single_sample,
    benchmark_million_samples,
    benchmark_fractal_fields
);
criterion_main!(benches);
