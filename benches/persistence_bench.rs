//! Benchmarks for dump/load round-trip cost at different dataset sizes.
//!
//! Run with: `cargo bench --bench persistence_bench`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rabitq_hnsw::config::{HnswParams, MetricKind, RabitqParams};
use rabitq_hnsw::holder::VecHolder;
use rabitq_hnsw::index::Builder;
use rabitq_hnsw::persist::{load, MemoryBackend};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn generate_vectors(count: usize, dims: usize, seed: u64) -> Vec<(u64, Vec<f32>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| (i as u64, (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect()))
        .collect()
}

fn bench_dump_load(c: &mut Criterion) {
    let dims = 128;
    let counts = [1_000, 5_000, 10_000];

    let mut group = c.benchmark_group("dump_load");
    group.sample_size(10);

    for count in counts {
        let vectors = generate_vectors(count, dims, 42);
        let holder = VecHolder::new(vectors);

        let mut builder = Builder::new();
        builder
            .init(HnswParams::new(dims as u32, MetricKind::L2Squared), RabitqParams::new(), 1 << 16)
            .unwrap();
        builder.train(&holder, 1).unwrap();
        builder.build(&holder, 5).unwrap();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("dump", count), &count, |b, _| {
            b.iter(|| {
                let backend = MemoryBackend::new();
                builder.dump(&backend, "bench-index").unwrap();
            });
        });

        let backend = MemoryBackend::new();
        builder.dump(&backend, "bench-index").unwrap();

        group.bench_with_input(BenchmarkId::new("load", count), &count, |b, _| {
            b.iter(|| {
                load(&backend, "bench-index", 1 << 16, true, None).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dump_load);
criterion_main!(benches);
