//! Chunked, append-only storage for encoded nodes, levels, and per-level
//! neighbor lists.
//!
//! Elements are appended into fixed-capacity chunks (`chunk_size` each, see
//! `StreamerLimits::chunk_size`); a chunk's backing buffer is reserved up
//! front and never grown past capacity, so its heap address never moves
//! once written. Growing the *directory* of chunks (pushing a new chunk)
//! takes a brief write lock; reading an already-published element never
//! blocks on that lock for longer than the index arithmetic itself needs.
//!
//! Concurrent readers and the single inserter coordinate through `len`
//! (published via release-store after the element is written, read via
//! acquire-load) exactly as §5 describes: a node is visible to searches iff
//! the search's snapshot of `doc_count` is at least the adder's id.

use super::node::{EncodedNode, Level, NodeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Per-node neighbor storage: one lock-guarded list per level the node
/// participates in (`levels[0..=node_level]`).
pub type NodeNeighbors = Vec<RwLock<Vec<NodeId>>>;

struct Chunks<T> {
    chunk_size: usize,
    data: RwLock<Vec<Vec<T>>>,
}

impl<T> Chunks<T> {
    fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            data: RwLock::new(Vec::new()),
        }
    }

    fn reserve(&self, additional: usize) {
        let mut chunks = self.data.write().unwrap();
        let have: usize = chunks.iter().map(Vec::len).sum();
        let have_cap: usize = chunks.iter().map(Vec::capacity).sum();
        let need = (have + additional).saturating_sub(have_cap);
        let mut remaining = need;
        while remaining > 0 {
            let cap = self.chunk_size.min(remaining.max(1));
            chunks.push(Vec::with_capacity(cap));
            remaining = remaining.saturating_sub(cap);
        }
    }

    /// Appends `value`, growing the chunk directory if the last chunk is full.
    fn push(&self, value: T) -> usize {
        let mut chunks = self.data.write().unwrap();
        if chunks.is_empty() || chunks.last().unwrap().len() >= self.chunk_size {
            chunks.push(Vec::with_capacity(self.chunk_size));
        }
        let chunk_idx = chunks.len() - 1;
        chunks[chunk_idx].push(value);
        let offset = chunks[chunk_idx].len() - 1;
        chunk_idx * self.chunk_size + offset
    }

    fn with<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Option<R> {
        let chunks = self.data.read().unwrap();
        let chunk_idx = index / self.chunk_size;
        let offset = index % self.chunk_size;
        chunks.get(chunk_idx)?.get(offset).map(f)
    }

    fn get_cloned(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.with(index, Clone::clone)
    }

    fn len(&self) -> usize {
        self.data.read().unwrap().iter().map(Vec::len).sum()
    }
}

/// Chunked arena backing one graph: encoded nodes, per-node level, and
/// per-(level,node) neighbor lists, indexed by `NodeId`.
pub struct GraphArena {
    nodes: Chunks<EncodedNode>,
    levels: Chunks<Level>,
    neighbors: Chunks<NodeNeighbors>,
    /// Published count: the number of nodes whose append is complete and
    /// visible to readers. Always `<= nodes.len()` (an in-flight append
    /// increments the underlying chunk before publishing here).
    published: AtomicUsize,
    /// Running total of `EncodedNode::approx_bytes()` across every appended
    /// node, for the `memory_quota` check of §5. A plain sum rather than a
    /// re-scan on every check, since the arena never shrinks.
    bytes_used: AtomicUsize,
}

impl GraphArena {
    /// Creates an empty arena with the given chunk size (elements/chunk).
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            nodes: Chunks::new(chunk_size),
            levels: Chunks::new(chunk_size),
            neighbors: Chunks::new(chunk_size),
            published: AtomicUsize::new(0),
            bytes_used: AtomicUsize::new(0),
        }
    }

    /// Preallocates chunk capacity for `n` additional nodes. Idempotent.
    pub fn reserve(&self, n: usize) {
        self.nodes.reserve(n);
        self.levels.reserve(n);
        self.neighbors.reserve(n);
    }

    /// Appends one encoded node at `level`, returning its `NodeId`. The
    /// node becomes visible to readers (via `published_count`) only after
    /// this call returns.
    pub fn append(&self, level: Level, encoded: EncodedNode) -> NodeId {
        let node_neighbors: NodeNeighbors = (0..=level).map(|_| RwLock::new(Vec::new())).collect();
        self.bytes_used.fetch_add(encoded.approx_bytes() as usize, Ordering::Relaxed);
        let idx_n = self.nodes.push(encoded);
        let idx_l = self.levels.push(level);
        let idx_g = self.neighbors.push(node_neighbors);
        debug_assert_eq!(idx_n, idx_l);
        debug_assert_eq!(idx_n, idx_g);
        let id = NodeId(idx_n as u32);
        // Release: every reader that observes the new published count has
        // already observed the fully-written node above (the write lock
        // releases in `Chunks::push` happen-before this store).
        self.published.fetch_add(1, Ordering::Release);
        id
    }

    /// Number of nodes visible to readers right now.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }

    /// Total nodes ever appended (always `>= published_count()`; equal once
    /// the in-flight append, if any, has returned).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Running total of appended nodes' `approx_bytes()`, for the
    /// `memory_quota` check.
    #[must_use]
    pub fn bytes_used(&self) -> u64 {
        self.bytes_used.load(Ordering::Relaxed) as u64
    }

    /// Whether the arena holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the encoded node at `id`, or `None` if out of range.
    #[must_use]
    pub fn get_encoded(&self, id: NodeId) -> Option<EncodedNode> {
        self.nodes.get_cloned(id.index())
    }

    /// Zero-copy access to the encoded node at `id` under a brief read lock.
    pub fn with_encoded<R>(&self, id: NodeId, f: impl FnOnce(&EncodedNode) -> R) -> Option<R> {
        self.nodes.with(id.index(), f)
    }

    /// The level a node was assigned at insertion.
    #[must_use]
    pub fn level_of(&self, id: NodeId) -> Option<Level> {
        self.levels.get_cloned(id.index())
    }

    /// Read-only snapshot of `(level, id)`'s neighbor list.
    #[must_use]
    pub fn neighbors(&self, level: Level, id: NodeId) -> Option<Vec<NodeId>> {
        self.neighbors.with(id.index(), |lists| {
            lists.get(level as usize).map(|l| l.read().unwrap().clone())
        })?
    }

    /// Runs `f` against the mutable neighbor list at `(level, id)` under
    /// that list's own lock — the only lock ever held during a neighbor
    /// mutation, never during distance computation.
    pub fn with_neighbors_mut<R>(
        &self,
        level: Level,
        id: NodeId,
        f: impl FnOnce(&mut Vec<NodeId>) -> R,
    ) -> Option<R> {
        self.neighbors.with(id.index(), |lists| {
            lists.get(level as usize).map(|l| f(&mut l.write().unwrap()))
        })?
    }

    /// All levels (`0..=L_i`) at which `id` has a neighbor list.
    #[must_use]
    pub fn level_count_of(&self, id: NodeId) -> Option<usize> {
        self.neighbors.with(id.index(), Vec::len)
    }
}
