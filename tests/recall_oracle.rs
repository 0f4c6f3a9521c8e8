//! Testable property 3 (spec.md §8): on a dataset with `N <= 5,000` and
//! `D <= 128`, graph search recall@k against the brute-force oracle is
//! `>= 0.90` for `k=10`, `ef=100`, default `M=32`.

use rabitq_hnsw::config::{HnswParams, MetricKind, RabitqParams};
use rabitq_hnsw::context::Context;
use rabitq_hnsw::holder::VecHolder;
use rabitq_hnsw::index::{Builder, Searcher};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<(u64, Vec<f32>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| (i as u64, (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()))
        .collect()
}

#[test]
fn property3_graph_search_recall_at_10_meets_oracle() {
    const N: usize = 2_000;
    const DIM: usize = 32;
    const K: usize = 10;
    const NUM_QUERIES: usize = 50;

    let vectors = random_vectors(N, DIM, 42);
    let holder = VecHolder::new(vectors.clone());

    let mut hnsw = HnswParams::new(DIM as u32, MetricKind::L2Squared);
    hnsw.ef_search = 100;
    hnsw.max_neighbor_cnt = 32;
    hnsw.ef_construction = 100;

    let mut builder = Builder::new();
    builder.init(hnsw, RabitqParams::new(), 1 << 14).unwrap();
    builder.train(&holder, 1).unwrap();
    builder.build(&holder, 5).unwrap();
    let core = builder.into_core().unwrap();

    let mut searcher = Searcher::new();
    searcher.init(1 << 14, false, 0).unwrap();
    searcher.open_core(core).unwrap();

    let mut bf_searcher = Searcher::new();
    // Reuses the same core is impossible (`open_core` takes ownership), so
    // build a second brute-force-only searcher by forcing the threshold
    // above `N` over a freshly built, identically-seeded core.
    let mut hnsw_bf = HnswParams::new(DIM as u32, MetricKind::L2Squared);
    hnsw_bf.ef_search = 100;
    let mut bf_builder = Builder::new();
    bf_builder.init(hnsw_bf, RabitqParams::new(), 1 << 14).unwrap();
    bf_builder.train(&holder, 1).unwrap();
    bf_builder.build(&holder, 5).unwrap();
    bf_searcher.init(1 << 14, false, N as u64 + 1).unwrap();
    bf_searcher.open_core(bf_builder.into_core().unwrap()).unwrap();

    let queries = random_vectors(NUM_QUERIES, DIM, 99);

    let mut ctx = Context::new();
    let mut bf_ctx = Context::new();
    let mut total_overlap = 0usize;
    for (_, q) in &queries {
        let approx = searcher.search(q, K, &mut ctx).unwrap();
        let exact = bf_searcher.search(q, K, &mut bf_ctx).unwrap();

        let exact_keys: HashSet<u64> = exact.iter().map(|(k, _)| *k).collect();
        let overlap = approx.iter().filter(|(k, _)| exact_keys.contains(k)).count();
        total_overlap += overlap;
    }

    let recall = total_overlap as f32 / (NUM_QUERIES * K) as f32;
    assert!(
        recall >= 0.90,
        "recall@{K} = {recall:.3}, below the 0.90 floor required by spec.md property 3"
    );
}
