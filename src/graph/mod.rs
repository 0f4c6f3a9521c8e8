//! K3: the graph entity — chunked node storage, the key map, and the
//! entry point, wired together behind the operations §4.3 names.

pub mod arena;
pub mod entry;
pub mod keymap;
pub mod node;

pub use arena::GraphArena;
pub use entry::EntryPoint;
pub use keymap::KeyMap;
pub use node::{EncodedNode, Key, Level, NodeId};

use crate::error::RabitqError;
use std::sync::RwLock;

/// Owns the arena, the key map, and the entry point for one graph. Reads
/// (`get_encoded`, `neighbors`) never block a writer except for the brief
/// per-list lock `add_neighbor` takes; the key map is guarded by its own
/// lock since it is touched by every insert and every tombstone.
pub struct GraphEntity {
    arena: GraphArena,
    keys: RwLock<KeyMap>,
    entry: EntryPoint,
}

impl GraphEntity {
    /// An empty graph with the given per-chunk element count.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            arena: GraphArena::new(chunk_size),
            keys: RwLock::new(KeyMap::new()),
            entry: EntryPoint::empty(),
        }
    }

    /// Preallocate arena and key-map capacity for `n` additional nodes.
    pub fn reserve(&self, n: usize) {
        self.arena.reserve(n);
        self.keys.write().unwrap().reserve(n);
    }

    /// Appends a new node under a caller-chosen key, assigning the next
    /// dense `NodeId`. Fails `DuplicateKey` if `key` already resolves to a
    /// live node.
    pub fn append_with_key(
        &self,
        key: Key,
        level: Level,
        encoded: EncodedNode,
    ) -> Result<NodeId, RabitqError> {
        // The key map is locked for the whole append so a concurrent
        // append under the same key cannot race past the liveness check;
        // the arena append itself stays lock-free for unrelated ids.
        let mut keys = self.keys.write().unwrap();
        if keys.is_live(key) {
            return Err(RabitqError::DuplicateKey(key.0));
        }
        let expected_id = NodeId(keys.total_count() as u32);
        let id = self.arena.append(level, encoded);
        debug_assert_eq!(id, expected_id);
        keys.insert(key, id)
            .map_err(|()| RabitqError::DuplicateKey(key.0))?;
        self.entry.maybe_advance(id, level);
        Ok(id)
    }

    /// Appends a node at a caller-assigned `NodeId`, used by the Streamer
    /// when the ingest layer owns id assignment. `id` must equal the
    /// current node count (dense, in-order assignment); anything else is
    /// `InvalidArgument`.
    pub fn append_with_id(
        &self,
        id: NodeId,
        key: Key,
        level: Level,
        encoded: EncodedNode,
    ) -> Result<(), RabitqError> {
        let mut keys = self.keys.write().unwrap();
        if keys.is_live(key) {
            return Err(RabitqError::DuplicateKey(key.0));
        }
        if id.index() != keys.total_count() {
            return Err(RabitqError::InvalidArgument(format!(
                "append_with_id: expected id {}, got {}",
                keys.total_count(),
                id.0
            )));
        }
        let got = self.arena.append(level, encoded);
        debug_assert_eq!(got, id);
        keys.insert(key, id)
            .map_err(|()| RabitqError::DuplicateKey(key.0))?;
        self.entry.maybe_advance(id, level);
        Ok(())
    }

    /// Clone of the encoded node at `id`.
    #[must_use]
    pub fn get_encoded(&self, id: NodeId) -> Option<EncodedNode> {
        self.arena.get_encoded(id)
    }

    /// Zero-copy access to the encoded node at `id`.
    pub fn with_encoded<R>(&self, id: NodeId, f: impl FnOnce(&EncodedNode) -> R) -> Option<R> {
        self.arena.with_encoded(id, f)
    }

    /// The level a node was assigned at insertion.
    #[must_use]
    pub fn level_of(&self, id: NodeId) -> Option<Level> {
        self.arena.level_of(id)
    }

    /// Marks `key` invalid in the map; the node stays in the graph.
    /// Returns `true` if `key` was live.
    pub fn tombstone(&self, key: Key) -> bool {
        self.keys.write().unwrap().tombstone(key)
    }

    /// Resolves a live key to its `NodeId`.
    #[must_use]
    pub fn resolve(&self, key: Key) -> Option<NodeId> {
        self.keys.read().unwrap().get(key)
    }

    /// Whether `id`'s key is still live (used to skip tombstoned nodes
    /// during result collection without mutating the visit filter).
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        let keys = self.keys.read().unwrap();
        keys.key_of(id).is_some_and(|k| keys.is_live(k))
    }

    /// Read view of `(level, id)`'s neighbor list.
    #[must_use]
    pub fn neighbors(&self, level: Level, id: NodeId) -> Vec<NodeId> {
        self.arena.neighbors(level, id).unwrap_or_default()
    }

    /// Inserts `new_neighbor` into `(level, id)`'s list under that list's
    /// lock, deduplicating and pruning to `k_prune` by `select` when the
    /// list would otherwise exceed it.
    ///
    /// `select(candidates, k) -> Vec<NodeId>` implements the
    /// diversity-preserving heuristic of §4.4; it is supplied by the
    /// caller (K4) because pruning needs distances the graph entity itself
    /// has no way to compute.
    pub fn add_neighbor(
        &self,
        level: Level,
        id: NodeId,
        new_neighbor: NodeId,
        k_prune: usize,
        select: impl FnOnce(&[NodeId]) -> Vec<NodeId>,
    ) {
        self.arena.with_neighbors_mut(level, id, |list| {
            if list.contains(&new_neighbor) || new_neighbor == id {
                return;
            }
            list.push(new_neighbor);
            if list.len() > k_prune {
                *list = select(list);
            }
        });
    }

    /// Overwrites `(level, id)`'s neighbor list wholesale, bypassing the
    /// heuristic-pruning hook. Used only by `load`, where the persisted
    /// list was already pruned at dump time.
    pub fn set_neighbors(&self, level: Level, id: NodeId, neighbors: Vec<NodeId>) {
        self.arena.with_neighbors_mut(level, id, |list| *list = neighbors);
    }

    /// Current entry point and its level.
    #[must_use]
    pub fn entry_point(&self) -> Option<(NodeId, Level)> {
        self.entry.get()
    }

    /// Restores the entry point verbatim (used only by `load`).
    pub fn set_entry_point(&self, id: NodeId, level: Level) {
        self.entry.set(id, level);
    }

    /// Number of nodes visible to readers (live + tombstoned).
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.arena.published_count()
    }

    /// Running total of appended nodes' approximate byte footprint, for the
    /// `memory_quota` check.
    #[must_use]
    pub fn bytes_used(&self) -> u64 {
        self.arena.bytes_used()
    }

    /// Number of currently live keys.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.keys.read().unwrap().live_count()
    }

    /// Node keys in `NodeId` order, for the `NODE_KEYS` dump segment.
    pub fn with_node_keys<R>(&self, f: impl FnOnce(&[Key]) -> R) -> R {
        f(self.keys.read().unwrap().node_keys())
    }

    /// Rebuilds the key map from a loaded `(node_keys, tombstoned)` pair.
    pub fn restore_keys(&self, node_keys: Vec<Key>, tombstoned: &std::collections::HashSet<Key>) {
        *self.keys.write().unwrap() = KeyMap::from_parts(node_keys, tombstoned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn append_with_key_assigns_dense_ids_and_advances_entry_point() {
        let g = GraphEntity::new(16);
        let id0 = g.append_with_key(Key(1), 0, dummy()).unwrap();
        let id1 = g.append_with_key(Key(2), 2, dummy()).unwrap();
        assert_eq!(id0, NodeId(0));
        assert_eq!(id1, NodeId(1));
        assert_eq!(g.entry_point(), Some((NodeId(1), 2)));
    }

    #[test]
    fn duplicate_key_rejected() {
        let g = GraphEntity::new(16);
        g.append_with_key(Key(1), 0, dummy()).unwrap();
        assert!(matches!(
            g.append_with_key(Key(1), 0, dummy()),
            Err(RabitqError::DuplicateKey(1))
        ));
    }

    #[test]
    fn tombstone_hides_key_but_keeps_node() {
        let g = GraphEntity::new(16);
        let id = g.append_with_key(Key(1), 0, dummy()).unwrap();
        assert!(g.tombstone(Key(1)));
        assert_eq!(g.resolve(Key(1)), None);
        assert!(g.get_encoded(id).is_some());
        assert!(!g.is_live(id));
    }

    #[test]
    fn add_neighbor_dedups_and_rejects_self() {
        let g = GraphEntity::new(16);
        let id0 = g.append_with_key(Key(1), 0, dummy()).unwrap();
        let id1 = g.append_with_key(Key(2), 0, dummy()).unwrap();
        g.add_neighbor(0, id0, id1, 10, |c| c.to_vec());
        g.add_neighbor(0, id0, id1, 10, |c| c.to_vec());
        g.add_neighbor(0, id0, id0, 10, |c| c.to_vec());
        assert_eq!(g.neighbors(0, id0), vec![id1]);
    }

    #[test]
    fn add_neighbor_prunes_over_capacity() {
        let g = GraphEntity::new(16);
        let id0 = g.append_with_key(Key(1), 0, dummy()).unwrap();
        let mut others = Vec::new();
        for k in 2..6u64 {
            others.push(g.append_with_key(Key(k), 0, dummy()).unwrap());
        }
        for &o in &others {
            g.add_neighbor(0, id0, o, 2, |c| c[..2.min(c.len())].to_vec());
        }
        assert_eq!(g.neighbors(0, id0).len(), 2);
    }
}
