// Benchmark suite for the per-particle hot path: rasterize, then score
//
// Run with: cargo bench --bench fitness_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use pso_art::fitness::image_diff;
use pso_art::{Canvas, FitnessEvaluator, FitnessNormalization, Rasterizer, Triangle, TriangleRasterizer};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// Fitness across image sizes and both normalizations
fn benchmark_fitness(c: &mut Criterion) {
    let mut group = c.benchmark_group("fitness_calculation");

    // 100×75, 400×300 (the CLI default cap) and 800×600
    for size in [100u32, 400, 800] {
        let width = size;
        let height = size * 3 / 4;
        let label = format!("{}x{}", width, height);

        let img1 = RgbaImage::from_pixel(width, height, Rgba([100, 150, 200, 255]));
        let img2 = RgbaImage::from_pixel(width, height, Rgba([110, 140, 190, 128]));

        group.bench_with_input(BenchmarkId::new("image_diff", &label), &size, |b, _| {
            b.iter(|| image_diff(black_box(&img1), black_box(&img2)))
        });

        for normalization in [FitnessNormalization::PerPixel, FitnessNormalization::PerChannel] {
            let evaluator = FitnessEvaluator::new(normalization);
            group.bench_with_input(
                BenchmarkId::new(normalization.to_string(), &label),
                &size,
                |b, _| b.iter(|| evaluator.evaluate(black_box(&img1), black_box(&img2))),
            );
        }
    }

    group.finish();
}

/// Rasterizing a particle into a reused canvas
fn benchmark_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let (width, height) = (200, 150);
    let mut rng = Pcg64Mcg::seed_from_u64(7);

    for count in [10usize, 50, 200] {
        let triangles: Vec<Triangle> = (0..count)
            .map(|_| Triangle::random(width, height, 0.8, &mut rng))
            .collect();
        let mut canvas = Canvas::new(width, height);

        group.bench_with_input(BenchmarkId::new("triangles", count), &count, |b, _| {
            b.iter(|| TriangleRasterizer.render_into(black_box(&triangles), &mut canvas))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_fitness, benchmark_render);
criterion_main!(benches);
