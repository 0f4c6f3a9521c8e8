//! Benchmarks for `Streamer::add` insertion throughput.
//!
//! Run with: `cargo bench --bench insert_bench`
//!
//! # Reproducibility
//!
//! All benchmarks use:
//! - Seed: 42 for RNG
//! - Dimensions: 128
//! - Distribution: Uniform [-1, 1]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rabitq_hnsw::config::{HnswParams, MetricKind, RabitqParams, StreamerLimits};
use rabitq_hnsw::holder::VecHolder;
use rabitq_hnsw::index::{Builder, Streamer};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

fn generate_vectors(count: usize, dims: usize, seed: u64) -> Vec<(u64, Vec<f32>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| (i as u64, (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect()))
        .collect()
}

/// Benchmark: sequential insert throughput into an already-trained,
/// empty streamer.
fn bench_insert_throughput(c: &mut Criterion) {
    let dims = 128;
    let seed = 42;

    let mut group = c.benchmark_group("insert_throughput");

    for count in [1_000, 5_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.sample_size(10);

        let train_vectors = generate_vectors(512, dims, seed);
        let train_holder = VecHolder::new(train_vectors);
        let vectors = generate_vectors(count, dims, seed + 1);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut builder = Builder::new();
                builder
                    .init(HnswParams::new(dims as u32, MetricKind::L2Squared), RabitqParams::new(), 1 << 16)
                    .unwrap();
                builder.train(&train_holder, 1).unwrap();
                let core = builder.into_core().unwrap();

                let mut streamer = Streamer::new();
                streamer.init(StreamerLimits::new(), 7).unwrap();
                streamer.open(core).unwrap();

                for (key, v) in &vectors {
                    streamer.add(black_box(*key), black_box(v)).unwrap();
                }
                black_box(&streamer);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert_throughput);
criterion_main!(benches);
