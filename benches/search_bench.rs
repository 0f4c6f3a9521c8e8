//! Benchmarks for graph search latency at different scales.
//!
//! Run with: `cargo bench --bench search_bench`
//!
//! # Reproducibility
//!
//! All benchmarks use:
//! - Seed: 42 for RNG
//! - Dimensions: 128
//! - Distribution: Uniform [-1, 1]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rabitq_hnsw::config::{HnswParams, MetricKind, RabitqParams};
use rabitq_hnsw::context::Context;
use rabitq_hnsw::holder::VecHolder;
use rabitq_hnsw::index::{Builder, Searcher};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

fn generate_vectors(count: usize, dims: usize, seed: u64) -> Vec<(u64, Vec<f32>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| (i as u64, (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect()))
        .collect()
}

/// Benchmark: search latency vs dataset size, at a fixed `k` and `ef`.
fn bench_search_latency(c: &mut Criterion) {
    let dims = 128;
    let k = 10;
    let seed = 42;

    let mut group = c.benchmark_group("search_latency");

    for count in [1_000, 10_000] {
        let vectors = generate_vectors(count, dims, seed);
        let holder = VecHolder::new(vectors.clone());

        let mut builder = Builder::new();
        builder
            .init(HnswParams::new(dims as u32, MetricKind::L2Squared), RabitqParams::new(), 1 << 16)
            .unwrap();
        builder.train(&holder, 1).unwrap();
        builder.build(&holder, 5).unwrap();
        let core = builder.into_core().unwrap();

        let mut searcher = Searcher::new();
        searcher.init(1 << 16, false, 0).unwrap();
        searcher.open_core(core).unwrap();

        let query = &vectors[0].1;

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            let mut ctx = Context::new();
            b.iter(|| black_box(searcher.search(black_box(query), k, &mut ctx).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark: search latency vs `ef_search`, fixed dataset size.
fn bench_search_vs_ef(c: &mut Criterion) {
    let dims = 128;
    let k = 10;
    let count = 5_000;
    let vectors = generate_vectors(count, dims, 42);
    let holder = VecHolder::new(vectors.clone());

    let mut group = c.benchmark_group("search_vs_ef");

    for ef in [32, 100, 200] {
        let mut hnsw = HnswParams::new(dims as u32, MetricKind::L2Squared);
        hnsw.ef_search = ef;

        let mut builder = Builder::new();
        builder.init(hnsw, RabitqParams::new(), 1 << 16).unwrap();
        builder.train(&holder, 1).unwrap();
        builder.build(&holder, 5).unwrap();
        let core = builder.into_core().unwrap();

        let mut searcher = Searcher::new();
        searcher.init(1 << 16, false, 0).unwrap();
        searcher.open_core(core).unwrap();

        let query = &vectors[1].1;

        group.bench_with_input(BenchmarkId::from_parameter(ef), &ef, |b, _| {
            let mut ctx = Context::new();
            b.iter(|| black_box(searcher.search(black_box(query), k, &mut ctx).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_search_latency, bench_search_vs_ef);
criterion_main!(benches);
