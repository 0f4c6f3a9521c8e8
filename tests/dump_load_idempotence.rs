//! Testable property 4 (spec.md §8): build -> dump -> load -> search
//! produces the same top-k list as build -> search, for a fixed query.

use rabitq_hnsw::config::{HnswParams, MetricKind, RabitqParams};
use rabitq_hnsw::context::Context;
use rabitq_hnsw::holder::VecHolder;
use rabitq_hnsw::index::{Builder, Searcher};
use rabitq_hnsw::persist::MemoryBackend;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn dataset(n: usize, dim: usize, seed: u64) -> Vec<(u64, Vec<f32>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| (i as u64, (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()))
        .collect()
}

#[test]
fn property4_dump_load_preserves_search_results() {
    const N: usize = 500;
    const DIM: usize = 16;
    const K: usize = 10;

    let vectors = dataset(N, DIM, 7);
    let holder = VecHolder::new(vectors.clone());
    let hnsw = HnswParams::new(DIM as u32, MetricKind::L2Squared);
    let rabitq = RabitqParams::new();

    let mut builder = Builder::new();
    builder.init(hnsw.clone(), rabitq.clone(), 1 << 10).unwrap();
    builder.train(&holder, 3).unwrap();
    builder.build(&holder, 9).unwrap();

    let backend = MemoryBackend::new();
    builder.dump(&backend, "idempotent").unwrap();

    let core = builder.into_core().unwrap();
    let mut direct_searcher = Searcher::new();
    direct_searcher.init(1 << 10, false, 0).unwrap();
    direct_searcher.open_core(core).unwrap();

    let mut loaded_searcher = Searcher::new();
    loaded_searcher.init(1 << 10, true, 0).unwrap();
    loaded_searcher
        .open(&backend, "idempotent", Some((&hnsw, &rabitq)))
        .unwrap();

    let query = &vectors[3].1;
    let mut ctx_a = Context::new();
    let mut ctx_b = Context::new();
    let before = direct_searcher.search(query, K, &mut ctx_a).unwrap();
    let after = loaded_searcher.search(query, K, &mut ctx_b).unwrap();

    assert_eq!(before, after, "dump/load must reproduce byte-identical top-k results");
}
