//! Beam search at a single level, greedy descent at upper levels, and the
//! distance-source abstraction both are parameterized over.

use crate::context::{BoundedHeap, Context, ScoredNode};
use crate::graph::{GraphEntity, Level, NodeId};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A query-bound source of distances to arbitrary graph nodes. Implemented
/// once per query by either the RaBitQ estimator (the common case) or an
/// exact kernel over retained raw vectors (re-rank, or `keep_raw`-only
/// graphs); the search/insert algorithm below never knows which.
pub trait DistanceSource {
    /// Distance (or distance estimate) between this source's query and `id`.
    fn distance(&mut self, id: NodeId) -> f32;
}

/// Beam search at a single level: the core primitive §4.4 specifies,
/// invoked identically by insertion and by query. `entry` seeds the
/// frontier; `ctx.frontier` is reconfigured to `ef` and used as the bounded
/// set `W`; an unbounded local min-heap plays the role of `C`.
///
/// Returns `W` sorted ascending by distance (ties broken by lower `NodeId`).
///
/// `scan_budget` bounds the number of nodes this call will mark visited
/// (`usize::MAX` for unbounded); once hit, the frontier is returned as-is
/// rather than continuing to expand. This is the engine-level cooperative
/// cap §5 describes in place of a deadline/cancellation token: callers
/// derive it from `max_scan_ratio`/`min_scan_limit`/`max_scan_limit` so a
/// pathological query is guaranteed to terminate without the algorithm
/// itself needing to know about those knobs.
pub fn beam_search_layer(
    graph: &GraphEntity,
    entry: NodeId,
    ef: usize,
    level: Level,
    dist: &mut impl DistanceSource,
    ctx: &mut Context,
    scan_budget: usize,
) -> Vec<ScoredNode> {
    ctx.frontier.reconfigure(ef);
    let mut c: BinaryHeap<Reverse<ScoredNode>> = BinaryHeap::new();
    let mut scanned: usize = 1;

    let d_entry = dist.distance(entry);
    ctx.visit.mark(entry);
    c.push(Reverse(ScoredNode { dist: d_entry, id: entry }));
    ctx.frontier.offer(ScoredNode { dist: d_entry, id: entry });

    while let Some(Reverse(cand)) = c.pop() {
        if scanned >= scan_budget {
            break;
        }
        if ctx.frontier.is_full() {
            if let Some(worst) = ctx.frontier.worst() {
                if cand.dist > worst {
                    break;
                }
            }
        }
        for n in graph.neighbors(level, cand.id) {
            if !ctx.visit.mark(n) {
                continue;
            }
            scanned += 1;
            let d = dist.distance(n);
            let frontier_has_room = !ctx.frontier.is_full();
            let better_than_worst = ctx.frontier.worst().is_none_or(|w| d < w);
            if frontier_has_room || better_than_worst {
                c.push(Reverse(ScoredNode { dist: d, id: n }));
                ctx.frontier.offer(ScoredNode { dist: d, id: n });
            }
            if scanned >= scan_budget {
                break;
            }
        }
    }
    ctx.frontier.sorted_snapshot()
}

/// Greedy "step to the best neighbor" descent used at levels above the
/// target: no frontier, no `ef`, just local hill-climbing per level until
/// no neighbor improves on the current best, then drop one level.
pub fn greedy_descend(
    graph: &GraphEntity,
    mut best: NodeId,
    from_level: Level,
    down_to_exclusive: Level,
    dist: &mut impl DistanceSource,
) -> NodeId {
    if from_level <= down_to_exclusive {
        return best;
    }
    let mut best_dist = dist.distance(best);
    let mut level = from_level;
    loop {
        loop {
            let mut improved = false;
            for n in graph.neighbors(level, best) {
                let d = dist.distance(n);
                if d < best_dist || (d == best_dist && n.0 < best.0) {
                    best = n;
                    best_dist = d;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }
        if level == down_to_exclusive + 1 {
            break;
        }
        level -= 1;
    }
    best
}

/// The common case: distance-to-query via the RaBitQ estimator, re-read
/// from the graph's own encoded nodes (no separate vector storage).
pub struct EstimatorSource<'a> {
    pub graph: &'a GraphEntity,
    pub quantizer: &'a crate::quantizer::RabitqQuantizer,
    pub query: &'a crate::quantizer::QueryEntity,
}

impl DistanceSource for EstimatorSource<'_> {
    fn distance(&mut self, id: NodeId) -> f32 {
        self.graph
            .with_encoded(id, |node| {
                let encoded = node.as_encoded_vector();
                self.quantizer.estimate(&encoded, self.query).0
            })
            .unwrap_or(f32::INFINITY)
    }
}

/// Exact distance over retained raw vectors; used for re-ranking and for
/// the brute-force oracle/fallback path. Returns `+inf` for a node that
/// never kept its raw copy, which sorts it last rather than panicking.
pub struct ExactSource<'a> {
    pub graph: &'a GraphEntity,
    pub table: &'a crate::kernel::DistanceTable,
    pub metric: crate::config::MetricKind,
    pub query: &'a [f32],
}

impl DistanceSource for ExactSource<'_> {
    fn distance(&mut self, id: NodeId) -> f32 {
        self.graph
            .with_encoded(id, |node| match &node.raw_copy {
                Some(raw) => match self.metric {
                    crate::config::MetricKind::L2Squared => self.table.l2_squared(raw, self.query),
                    crate::config::MetricKind::Euclidean => self.table.euclidean(raw, self.query),
                    crate::config::MetricKind::DotProduct => -self.table.dot(raw, self.query),
                    crate::config::MetricKind::Cosine => self.table.cosine(raw, self.query),
                    _ => self.table.l2_squared(raw, self.query),
                },
                None => f32::INFINITY,
            })
            .unwrap_or(f32::INFINITY)
    }
}

// `Option::is_none_or` landed in 1.82; this crate's MSRV is 1.70.
trait IsNoneOr<T> {
    fn is_none_or(self, f: impl FnOnce(T) -> bool) -> bool;
}
impl<T> IsNoneOr<T> for Option<T> {
    fn is_none_or(self, f: impl FnOnce(T) -> bool) -> bool {
        match self {
            Some(v) => f(v),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EncodedNode, Key};

    fn dummy() -> EncodedNode {
        EncodedNode {
            cluster_id: 0,
            f_add: 0.0,
            f_rescale: 0.0,
            err_bound: 0.0,
            one_bit_code: vec![0],
            ex_bits_code: vec![],
            raw_copy: None,
        }
    }

    /// A distance source over a fixed in-memory table, for algorithm tests
    /// that don't need a real quantizer.
    struct TableSource<'a>(&'a [f32]);
    impl DistanceSource for TableSource<'_> {
        fn distance(&mut self, id: NodeId) -> f32 {
            self.0[id.index()]
        }
    }

    fn line_graph(n: usize, level: u8) -> GraphEntity {
        // id i connects to i-1 and i+1 at every level `0..=level`; distance
        // to the query is just `i` (so node 0 is nearest).
        let g = GraphEntity::new(16);
        for k in 0..n {
            g.append_with_key(Key(k as u64), level, dummy()).unwrap();
        }
        for i in 0..n {
            let id = NodeId(i as u32);
            for lvl in 0..=level {
                if i > 0 {
                    g.add_neighbor(lvl, id, NodeId((i - 1) as u32), 8, |c| c.to_vec());
                }
                if i + 1 < n {
                    g.add_neighbor(lvl, id, NodeId((i + 1) as u32), 8, |c| c.to_vec());
                }
            }
        }
        g
    }

    #[test]
    fn beam_search_finds_nearest_along_chain() {
        let g = line_graph(10, 0);
        let dists: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut src = TableSource(&dists);
        let mut ctx = Context::new();
        ctx.begin_query(10, 3, 3);
        let w = beam_search_layer(&g, NodeId(9), 3, 0, &mut src, &mut ctx, usize::MAX);
        assert_eq!(w[0].id, NodeId(0));
        assert!(w.len() <= 3);
    }

    #[test]
    fn greedy_descend_stops_at_local_minimum() {
        let g = line_graph(10, 1);
        let dists: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut src = TableSource(&dists);
        let best = greedy_descend(&g, NodeId(9), 1, 0, &mut src);
        assert_eq!(best, NodeId(0));
    }
}
