//! Testable property 6 (spec.md §8): for every live node and every level
//! it participates in, the neighbor list has no duplicates, no self-
//! reference, respects the per-level cap, and every entry resolves to a
//! valid encoded node.

use rabitq_hnsw::config::{HnswParams, MetricKind, RabitqParams};
use rabitq_hnsw::graph::NodeId;
use rabitq_hnsw::holder::VecHolder;
use rabitq_hnsw::index::Builder;
use std::collections::HashSet;

fn dataset(n: u64, dim: usize) -> Vec<(u64, Vec<f32>)> {
    (0..n)
        .map(|i| (i, (0..dim).map(|d| (((i * 7 + d as u64 * 3) % 29) as f32)).collect()))
        .collect()
}

#[test]
fn property6_neighbor_lists_are_well_formed() {
    const N: u64 = 300;
    const DIM: usize = 12;

    let vectors = dataset(N, DIM);
    let holder = VecHolder::new(vectors);

    let mut hnsw = HnswParams::new(DIM as u32, MetricKind::L2Squared);
    hnsw.max_neighbor_cnt = 16;

    let mut builder = Builder::new();
    builder.init(hnsw.clone(), RabitqParams::new(), 1 << 10).unwrap();
    builder.train(&holder, 1).unwrap();
    builder.build(&holder, 4).unwrap();
    let core = builder.into_core().unwrap();

    let total = core.graph.published_count();
    let mut checked_any_level_above_zero = false;

    for idx in 0..total {
        let id = NodeId(idx as u32);
        let Some(top_level) = core.graph.level_of(id) else {
            continue;
        };
        for level in 0..=top_level {
            let neighbors = core.graph.neighbors(level, id);
            let cap = hnsw.m_at(level) as usize;

            assert!(
                neighbors.len() <= cap,
                "node {idx} level {level} has {} neighbors, exceeding cap {cap}",
                neighbors.len()
            );

            assert!(
                !neighbors.contains(&id),
                "node {idx} lists itself as its own neighbor at level {level}"
            );

            let unique: HashSet<NodeId> = neighbors.iter().copied().collect();
            assert_eq!(
                unique.len(),
                neighbors.len(),
                "node {idx} level {level} has a duplicate neighbor entry"
            );

            for n in &neighbors {
                assert!(
                    core.graph.get_encoded(*n).is_some(),
                    "node {idx} level {level} references {n:?}, which has no encoded record"
                );
            }

            if level > 0 {
                checked_any_level_above_zero = true;
            }
        }
    }

    assert!(
        checked_any_level_above_zero,
        "dataset of {N} points should produce at least one node above level 0"
    );
}
