//! K6: per-query, per-thread reusable state.
//!
//! A `Context` is cheap to create and expensive to pool: callers are meant
//! to keep one per worker thread and call [`Context::begin_query`] before
//! each search rather than allocate a fresh one. Resetting only rolls the
//! visit filter's generation counter and clears the heaps in place — no
//! underlying `Vec` is freed between queries.

use crate::graph::{Key, NodeId};
use bitvec::vec::BitVec;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// One scored candidate. Ordered ascending by distance, ties broken by the
/// lower `NodeId` (the "strict tie-breaking" rule of §4.4): the smaller
/// `ScoredNode` is always the one a min-heap should surface first and a
/// bounded max-heap should keep over the other.
#[derive(Clone, Copy, Debug)]
pub struct ScoredNode {
    /// Distance (or distance estimate) to the query.
    pub dist: f32,
    /// The candidate node.
    pub id: NodeId,
}

impl PartialEq for ScoredNode {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.id == other.id
    }
}
impl Eq for ScoredNode {}

impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.id.0.cmp(&other.id.0))
    }
}

/// A max-heap bounded at `cap` elements: once full, a new item is accepted
/// only if it beats the current worst, which is evicted in its place. Both
/// the beam search's frontier `W` and the final top-k collector use this
/// shape (§4.6's "candidate min-heap" and "top-k max-heap" are the same
/// bounded structure at two different `cap`s, `ef` and `topk`).
#[derive(Clone, Debug, Default)]
pub struct BoundedHeap {
    cap: usize,
    heap: BinaryHeap<ScoredNode>,
}

impl BoundedHeap {
    /// A heap bounded at `cap` (0 means "always full", accepting nothing).
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            heap: BinaryHeap::with_capacity(cap.min(1024)),
        }
    }

    /// Empties the heap and rebinds its capacity for the next query.
    pub fn reconfigure(&mut self, cap: usize) {
        self.heap.clear();
        self.cap = cap;
    }

    /// Whether the heap currently holds `cap` elements.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.cap
    }

    /// Number of elements currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the heap holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The worst (largest) distance currently kept, if any.
    #[must_use]
    pub fn worst(&self) -> Option<f32> {
        self.heap.peek().map(|s| s.dist)
    }

    /// Offers `item`. Accepted unconditionally while under capacity;
    /// once full, accepted only if strictly better than the current worst,
    /// which is evicted. Returns whether `item` was kept.
    pub fn offer(&mut self, item: ScoredNode) -> bool {
        if self.cap == 0 {
            return false;
        }
        if self.heap.len() < self.cap {
            self.heap.push(item);
            return true;
        }
        if let Some(worst) = self.heap.peek() {
            if item < *worst {
                self.heap.pop();
                self.heap.push(item);
                return true;
            }
        }
        false
    }

    /// Drains the heap into an ascending-by-distance vector.
    #[must_use]
    pub fn into_sorted_vec(self) -> Vec<ScoredNode> {
        self.heap.into_sorted_vec()
    }

    /// Snapshot of the current contents, ascending by distance.
    #[must_use]
    pub fn sorted_snapshot(&self) -> Vec<ScoredNode> {
        self.heap.clone().into_sorted_vec()
    }
}

/// Per-query visited-set. The dense variant never needs clearing: a
/// generation counter is bumped per query and a node is "visited" iff its
/// slot's stamp equals the current generation. The bloom variant trades a
/// small false-positive rate (nodes treated as visited when they are not)
/// for a bounded bit budget independent of `doc_count`, and must be cleared
/// on reset since a stamped bit can't be "aged out" the way a counter can.
#[derive(Debug)]
pub enum VisitFilter {
    /// `u32` generation stamp per node.
    Dense {
        stamp: Vec<u32>,
        generation: u32,
    },
    /// Fixed-size bit array addressed by two independent hashes.
    Bloom {
        bits: BitVec,
        target_fpp: f64,
    },
}

impl VisitFilter {
    /// A dense filter with no preallocated capacity (grows on first use).
    #[must_use]
    pub fn dense() -> Self {
        Self::Dense {
            stamp: Vec::new(),
            generation: 0,
        }
    }

    /// A bloom filter targeting `target_fpp` false-positive probability.
    #[must_use]
    pub fn bloom(target_fpp: f64) -> Self {
        Self::Bloom {
            bits: BitVec::new(),
            target_fpp,
        }
    }

    /// Prepares the filter for a query over a graph with `doc_count` nodes:
    /// the dense variant grows (never shrinks) and bumps its generation;
    /// the bloom variant is resized and cleared to hit `target_fpp` at the
    /// given scale.
    pub fn reset_for(&mut self, doc_count: usize) {
        match self {
            VisitFilter::Dense { stamp, generation } => {
                if stamp.len() < doc_count {
                    stamp.resize(doc_count, 0);
                }
                *generation = generation.wrapping_add(1);
                if *generation == 0 {
                    // Wrapped: every stale stamp is indistinguishable from
                    // "just visited" at generation 0, so force a hard clear.
                    stamp.iter_mut().for_each(|s| *s = 0);
                    *generation = 1;
                }
            }
            VisitFilter::Bloom { bits, target_fpp } => {
                let bit_count = bloom_bit_count(doc_count.max(1), *target_fpp);
                bits.clear();
                bits.resize(bit_count, false);
            }
        }
    }

    /// Marks `id` visited, returning `true` iff it was not already marked.
    pub fn mark(&mut self, id: NodeId) -> bool {
        match self {
            VisitFilter::Dense { stamp, generation } => {
                let idx = id.index();
                if idx >= stamp.len() {
                    stamp.resize(idx + 1, 0);
                }
                let already = stamp[idx] == *generation;
                stamp[idx] = *generation;
                !already
            }
            VisitFilter::Bloom { bits, .. } => {
                let len = bits.len().max(1);
                let (h1, h2) = bloom_hashes(id, len);
                let already = bits[h1] && bits[h2];
                bits.set(h1, true);
                bits.set(h2, true);
                !already
            }
        }
    }
}

fn bloom_bit_count(n: usize, target_fpp: f64) -> usize {
    // m = -n*ln(p) / (ln2)^2, the standard optimal-size formula for k=2.
    let n = n as f64;
    let m = -(n * target_fpp.ln()) / (std::f64::consts::LN_2 * std::f64::consts::LN_2);
    (m.ceil() as usize).max(64)
}

fn bloom_hashes(id: NodeId, len: usize) -> (usize, usize) {
    let x = u64::from(id.0);
    let h1 = x.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let h2 = x.wrapping_mul(0xC2B2_AE3D_27D4_EB4F).rotate_left(17);
    ((h1 as usize) % len, (h2 as usize) % len)
}

type KeyFilterFn = Arc<dyn Fn(Key) -> bool + Send + Sync>;
type GroupKeyFn = Arc<dyn Fn(Key) -> u64 + Send + Sync>;

/// Per-query, per-thread reusable state: the visit filter, the beam
/// search's bounded frontier, the final top-k collector, an optional
/// group-by fan-out, an optional key filter, and a generation "magic"
/// token binding this context to the entity it was last used against.
pub struct Context {
    pub(crate) visit: VisitFilter,
    pub(crate) frontier: BoundedHeap,
    pub(crate) topk: BoundedHeap,
    group_by: Option<(GroupKeyFn, std::collections::HashMap<u64, BoundedHeap>)>,
    key_filter: Option<KeyFilterFn>,
    magic: u64,
}

impl Context {
    /// A fresh context using a dense visit filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            visit: VisitFilter::dense(),
            frontier: BoundedHeap::new(0),
            topk: BoundedHeap::new(0),
            group_by: None,
            key_filter: None,
            magic: 0,
        }
    }

    /// A fresh context using a bloom visit filter at `target_fpp`.
    #[must_use]
    pub fn with_bloom_filter(target_fpp: f64) -> Self {
        Self {
            visit: VisitFilter::bloom(target_fpp),
            ..Self::new()
        }
    }

    /// Binds this context to `magic` (the owning Streamer/Searcher's
    /// generation token), clearing cached state if it has changed — the
    /// entity the context was last used against no longer exists.
    pub fn bind(&mut self, magic: u64) {
        if self.magic != magic {
            self.magic = magic;
            self.key_filter = None;
            self.group_by = None;
        }
    }

    /// Prepares the context for one query: rolls the visit filter, and
    /// resizes the frontier/top-k heaps to `ef`/`topk`.
    pub fn begin_query(&mut self, doc_count: usize, ef: usize, topk: usize) {
        self.visit.reset_for(doc_count);
        self.frontier.reconfigure(ef);
        self.topk.reconfigure(topk);
        if let Some((_, groups)) = &mut self.group_by {
            groups.clear();
        }
    }

    /// Installs a key filter predicate, replacing any previous one.
    pub fn set_key_filter(&mut self, f: impl Fn(Key) -> bool + Send + Sync + 'static) {
        self.key_filter = Some(Arc::new(f));
    }

    /// Removes the key filter.
    pub fn clear_key_filter(&mut self) {
        self.key_filter = None;
    }

    /// Whether `key` passes the current key filter (always `true` absent one).
    #[must_use]
    pub fn key_admitted(&self, key: Key) -> bool {
        match &self.key_filter {
            Some(f) => f(key),
            None => true,
        }
    }

    /// Installs a group-by classifier; each admitted candidate is also
    /// offered into its group's own `topk`-capped heap.
    pub fn set_group_by(&mut self, topk: usize, f: impl Fn(Key) -> u64 + Send + Sync + 'static) {
        self.group_by = Some((Arc::new(f), std::collections::HashMap::new()));
        let _ = topk; // group heaps are created lazily at `topk` below
    }

    /// Offers `(key, scored)` into its group heap, creating one lazily at
    /// capacity `group_topk` on first sight of that group. No-op if no
    /// group-by classifier is installed.
    pub fn offer_group(&mut self, key: Key, scored: ScoredNode, group_topk: usize) {
        if let Some((classify, groups)) = &mut self.group_by {
            let g = classify(key);
            groups
                .entry(g)
                .or_insert_with(|| BoundedHeap::new(group_topk))
                .offer(scored);
        }
    }

    /// Snapshot of every group's current top-k, ascending within each group.
    #[must_use]
    pub fn group_results(&self) -> Vec<(u64, Vec<ScoredNode>)> {
        self.group_by
            .as_ref()
            .map(|(_, groups)| {
                groups
                    .iter()
                    .map(|(g, h)| (*g, h.sorted_snapshot()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
