//! The Malkov-Yashunin neighbor-selection heuristic and the 7-step
//! insertion protocol built on top of `search::{beam_search_layer,
//! greedy_descend}`.

use super::search::{beam_search_layer, greedy_descend, DistanceSource};
use crate::config::HnswParams;
use crate::context::{Context, ScoredNode};
use crate::graph::{EncodedNode, GraphEntity, Key, Level, NodeId};
use crate::quantizer::RabitqQuantizer;

/// Distances between two already-graphed nodes, needed by the heuristic to
/// decide whether a candidate duplicates a direction some closer neighbor
/// already covers. When both nodes retained a raw copy this is exact (via
/// `exact`); otherwise it falls back to the distance between their coarse
/// cluster centroids, a documented approximation — see `DESIGN.md`.
pub trait PairwiseDistance {
    /// Distance between graph nodes `a` and `b`.
    fn distance(&self, a: NodeId, b: NodeId) -> f32;
}

/// The default `PairwiseDistance` grounded on the graph entity + quantizer.
pub struct GraphPairwise<'a> {
    pub graph: &'a GraphEntity,
    pub quantizer: &'a RabitqQuantizer,
    pub exact: Option<&'a crate::kernel::DistanceTable>,
    pub metric: crate::config::MetricKind,
}

impl PairwiseDistance for GraphPairwise<'_> {
    fn distance(&self, a: NodeId, b: NodeId) -> f32 {
        let na = self.graph.get_encoded(a);
        let nb = self.graph.get_encoded(b);
        if let (Some(na), Some(nb)) = (&na, &nb) {
            if let (Some(table), Some(ra), Some(rb)) =
                (self.exact, &na.raw_copy, &nb.raw_copy)
            {
                return match self.metric {
                    crate::config::MetricKind::L2Squared => table.l2_squared(ra, rb),
                    crate::config::MetricKind::Euclidean => table.euclidean(ra, rb),
                    crate::config::MetricKind::DotProduct => -table.dot(ra, rb),
                    crate::config::MetricKind::Cosine => table.cosine(ra, rb),
                    _ => table.l2_squared(ra, rb),
                };
            }
            return self
                .quantizer
                .cluster_centroid_distance(u32::from(na.cluster_id), u32::from(nb.cluster_id));
        }
        f32::INFINITY
    }
}

/// Selects up to `m` neighbors from `candidates` (already sorted ascending
/// by distance to the query) by the Malkov-Yashunin rule: accept a
/// candidate iff no previously accepted neighbor is closer to it than the
/// query is. Falls back to filling remaining slots with the nearest
/// rejected candidates if the heuristic alone selects fewer than `m` (the
/// usual behavior real HNSW implementations use to avoid under-filled
/// neighbor lists at low `ef`).
pub fn select_neighbors_heuristic(
    candidates: &[ScoredNode],
    m: usize,
    pairwise: &impl PairwiseDistance,
) -> Vec<NodeId> {
    let mut accepted: Vec<ScoredNode> = Vec::with_capacity(m);
    let mut rejected: Vec<ScoredNode> = Vec::new();
    for &cand in candidates {
        if accepted.len() >= m {
            break;
        }
        let dominated = accepted
            .iter()
            .any(|&a| pairwise.distance(a.id, cand.id) < cand.dist);
        if dominated {
            rejected.push(cand);
        } else {
            accepted.push(cand);
        }
    }
    if accepted.len() < m {
        for cand in rejected {
            if accepted.len() >= m {
                break;
            }
            accepted.push(cand);
        }
    }
    accepted.into_iter().map(|s| s.id).collect()
}

/// Inserts one new node into the graph under a caller-chosen `key`,
/// implementing the 7-step protocol of §4.4 with the `append_with_key`
/// id-assignment path (spec.md's `Streamer.add`). `level` was already drawn
/// by the caller (`level::draw_level`); `make_source` builds a fresh
/// `DistanceSource` bound to the node's query representation, since a
/// single insertion may need several independent distance sources
/// (estimator state is query-specific).
pub fn insert_node(
    graph: &GraphEntity,
    params: &HnswParams,
    key: Key,
    level: Level,
    encoded: EncodedNode,
    pairwise: &impl PairwiseDistance,
    make_source: impl Fn() -> Box<dyn DistanceSource + '_>,
    ctx: &mut Context,
) -> crate::error::Result<NodeId> {
    // Step 1: snapshot the current entry point before the new node exists,
    // so its own distance-to-self can never be asked for.
    let prior_entry = graph.entry_point();
    let new_id = graph.append_with_key(key, level, encoded)?;
    wire_new_node(graph, params, new_id, level, prior_entry, pairwise, make_source, ctx);
    Ok(new_id)
}

/// Inserts one new node at a caller-assigned dense `NodeId`, implementing
/// the same 7-step protocol via `append_with_id` (spec.md's
/// `Streamer.add_with_id`, spec.md:149/240): `id` must equal the graph's
/// current node count or this fails `InvalidArgument` before anything is
/// wired, same as a bare `append_with_id` call.
pub fn insert_node_with_id(
    graph: &GraphEntity,
    params: &HnswParams,
    id: NodeId,
    key: Key,
    level: Level,
    encoded: EncodedNode,
    pairwise: &impl PairwiseDistance,
    make_source: impl Fn() -> Box<dyn DistanceSource + '_>,
    ctx: &mut Context,
) -> crate::error::Result<NodeId> {
    let prior_entry = graph.entry_point();
    graph.append_with_id(id, key, level, encoded)?;
    wire_new_node(graph, params, id, level, prior_entry, pairwise, make_source, ctx);
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
fn wire_new_node(
    graph: &GraphEntity,
    params: &HnswParams,
    new_id: NodeId,
    level: Level,
    prior_entry: Option<(NodeId, Level)>,
    pairwise: &impl PairwiseDistance,
    make_source: impl Fn() -> Box<dyn DistanceSource + '_>,
    ctx: &mut Context,
) {
    let Some((mut best, mut cur_level)) = prior_entry else {
        // First node in the graph: nothing to connect to.
        return;
    };

    // Step 2: greedy descent from the current top level down to level+1.
    if cur_level > level {
        let mut src = make_source();
        best = greedy_descend(graph, best, cur_level, level, src.as_mut());
        cur_level = level;
    }

    // Steps 3-6: beam search + heuristic selection + reciprocal wiring at
    // every level from min(level, cur_level) down to 0.
    let mut lvl = level.min(cur_level);
    loop {
        let ef = params.ef_construction as usize;
        let mut src = make_source();
        let w = beam_search_layer(graph, best, ef, lvl, src.as_mut(), ctx, usize::MAX);
        if let Some(nearest) = w.first() {
            best = nearest.id;
        }

        let m = params.m_at(lvl) as usize;
        let chosen = select_neighbors_heuristic(&w, m, pairwise);
        for &n in &chosen {
            graph.add_neighbor(lvl, new_id, n, m, |cands| {
                // cands already includes `new_id`'s freshly appended peer;
                // re-rank against the query distance table captured above.
                let scored: Vec<ScoredNode> = cands
                    .iter()
                    .map(|&id| ScoredNode {
                        dist: pairwise.distance(new_id, id),
                        id,
                    })
                    .collect();
                let mut scored = scored;
                scored.sort();
                select_neighbors_heuristic(&scored, m, pairwise)
            });
        }
        for &n in &chosen {
            let prune_cap = ((m as f32) * params.neighbor_prune_multiplier).round().max(m as f32) as usize;
            graph.add_neighbor(lvl, n, new_id, prune_cap, |cands| {
                let mut scored: Vec<ScoredNode> = cands
                    .iter()
                    .map(|&id| ScoredNode {
                        dist: pairwise.distance(n, id),
                        id,
                    })
                    .collect();
                scored.sort();
                select_neighbors_heuristic(&scored, m, pairwise)
            });
        }

        if lvl == 0 {
            break;
        }
        lvl -= 1;
    }

    // Step 7 (entry-point advance) already happened inside
    // `append_with_key`/`append_with_id`, which calls
    // `EntryPoint::maybe_advance` the moment the new node is published —
    // before any neighbor is wired, matching the "update entry point to
    // new" ordering without a second lock.
}
