//! Benchmark for terrain stages and full generation.
//!
//! TARGET: 128x128x23 map in under 1 second
//!
//! Run with: cargo bench --package lodge_terrain --bench pipeline_benchmark

// criterion_group! generates an undocumented public function.
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lodge_terrain::{
    generate_terrain, CaveCarver, GeneratorConfig, HeightmapGenerator, StructuralValidator,
    VoxelGrid,
};

fn config(map_size: usize) -> GeneratorConfig {
    GeneratorConfig {
        map_size,
        seed: 42,
        ..GeneratorConfig::default()
    }
}

fn filled_grid(config: &GeneratorConfig) -> VoxelGrid {
    let heightmap = HeightmapGenerator::new(config).generate();
    let mut grid = VoxelGrid::new(config.map_size, config.grid_height, config.map_size);
    grid.fill_columns_from_heightmap(&heightmap);
    grid
}

fn benchmark_heightmap(c: &mut Criterion) {
    let cfg = config(128);
    let generator = HeightmapGenerator::new(&cfg);

    let mut group = c.benchmark_group("heightmap");
    group.throughput(Throughput::Elements(128 * 128));
    group.bench_function("128x128", |b| b.iter(|| black_box(generator.generate())));
    group.finish();
}

fn benchmark_surface_queries(c: &mut Criterion) {
    let grid = filled_grid(&config(128));

    c.bench_function("surface_height_full_map", |b| {
        b.iter(|| {
            let mut total = 0i64;
            for z in 0..128 {
                for x in 0..128 {
                    total += i64::from(grid.surface_height(x, z));
                }
            }
            black_box(total)
        });
    });
}

fn benchmark_stages(c: &mut Criterion) {
    let cfg = config(128);
    let base = filled_grid(&cfg);
    let carver = CaveCarver::new(&cfg);
    let validator = StructuralValidator::new(&cfg);

    let mut group = c.benchmark_group("stages");
    group.sample_size(10);

    group.bench_function("caves_128", |b| {
        b.iter(|| {
            let mut grid = base.clone();
            black_box(carver.carve(&mut grid))
        });
    });

    let mut carved = base.clone();
    carver.carve(&mut carved);
    group.bench_function("validation_128", |b| {
        b.iter(|| {
            let mut grid = carved.clone();
            black_box(validator.validate(&mut grid))
        });
    });

    group.finish();
}

fn benchmark_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");
    group.sample_size(10);

    for size in [64usize, 128] {
        group.bench_function(format!("{size}x{size}"), |b| {
            b.iter(|| black_box(generate_terrain(config(size))))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_heightmap,
    benchmark_surface_queries,
    benchmark_stages,
    benchmark_full_pipeline
);
criterion_main!(benches);
