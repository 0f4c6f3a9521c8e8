//! Benchmarks for the kernel's per-metric distance primitives.
//!
//! Run with: `cargo bench --bench distance_bench`
//!
//! # Reproducibility
//!
//! All benchmarks use:
//! - Seed: 42 for RNG
//! - Dimensions: 128, 384, 768, 1536
//! - Distribution: Uniform [-1, 1]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rabitq_hnsw::kernel::DistanceTable;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

fn generate_vectors(count: usize, dims: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

/// Benchmark: L2 squared distance, single pair.
fn bench_l2_squared(c: &mut Criterion) {
    let table = DistanceTable::detect();
    let mut group = c.benchmark_group("l2_squared");

    for dims in [128, 384, 768, 1536] {
        let vectors = generate_vectors(2, dims, 42);
        let a = &vectors[0];
        let b = &vectors[1];

        group.throughput(Throughput::Elements(dims as u64));
        group.bench_with_input(BenchmarkId::from_parameter(dims), &dims, |bencher, _| {
            bencher.iter(|| table.l2_squared(black_box(a), black_box(b)));
        });
    }
    group.finish();
}

/// Benchmark: dot-product distance, single pair.
fn bench_dot(c: &mut Criterion) {
    let table = DistanceTable::detect();
    let mut group = c.benchmark_group("dot");

    for dims in [128, 384, 768, 1536] {
        let vectors = generate_vectors(2, dims, 42);
        let a = &vectors[0];
        let b = &vectors[1];

        group.throughput(Throughput::Elements(dims as u64));
        group.bench_with_input(BenchmarkId::from_parameter(dims), &dims, |bencher, _| {
            bencher.iter(|| table.dot(black_box(a), black_box(b)));
        });
    }
    group.finish();
}

/// Benchmark: blocked M-vs-1 L2 squared, the shape beam search exercises.
fn bench_l2_squared_block(c: &mut Criterion) {
    let table = DistanceTable::detect();
    let mut group = c.benchmark_group("l2_squared_block");
    let dims = 128;

    for m in [16, 64, 256] {
        let rows = generate_vectors(m, dims, 7);
        let refs: Vec<&[f32]> = rows.iter().map(|v| v.as_slice()).collect();
        let q = &generate_vectors(1, dims, 42)[0];
        let mut out = vec![0.0f32; m];

        group.throughput(Throughput::Elements((m * dims) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(m), &m, |bencher, _| {
            bencher.iter(|| table.l2_squared_block(black_box(&refs), black_box(q), black_box(&mut out)));
        });
    }
    group.finish();
}

/// Benchmark: Hamming distance over binary codes at the widths the RaBitQ
/// sign code actually produces.
fn bench_hamming(c: &mut Criterion) {
    let table = DistanceTable::detect();
    let mut group = c.benchmark_group("hamming");

    for bytes in [16, 48, 96, 192] {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let a: Vec<u8> = (0..bytes).map(|_| rng.gen()).collect();
        let b: Vec<u8> = (0..bytes).map(|_| rng.gen()).collect();

        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(bytes), &bytes, |bencher, _| {
            bencher.iter(|| table.hamming(black_box(&a), black_box(&b)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_l2_squared, bench_dot, bench_l2_squared_block, bench_hamming);
criterion_main!(benches);
