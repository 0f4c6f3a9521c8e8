//! `Key`↔`NodeId` bijection with tombstone-on-delete semantics.
//!
//! A live key resolves to exactly one `NodeId`; a tombstoned key resolves to
//! none, but the node and its neighbor lists stay in the graph so traversal
//! remains connected (§3's "Invariants"). Re-adding a previously tombstoned
//! key assigns a fresh `NodeId` — the mapping is many-to-one over time, never
//! mutated in place.

use super::node::{Key, NodeId};
use std::collections::HashMap;

/// `Key`↔`NodeId` table. `node_keys` is total (every `NodeId` resolves to a
/// key, even a tombstoned one); `live` only ever holds keys that currently
/// resolve.
#[derive(Clone, Debug, Default)]
pub struct KeyMap {
    live: HashMap<Key, NodeId>,
    node_keys: Vec<Key>,
}

impl KeyMap {
    /// An empty key map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocates space for `n` additional nodes.
    pub fn reserve(&mut self, n: usize) {
        self.live.reserve(n);
        self.node_keys.reserve(n);
    }

    /// Registers `key` as live, pointing at `id`. `id` must equal
    /// `self.node_keys.len()` (the caller assigns ids densely in order).
    ///
    /// # Errors
    /// Returns `Err(())` if `key` is already live.
    pub fn insert(&mut self, key: Key, id: NodeId) -> Result<(), ()> {
        if self.live.contains_key(&key) {
            return Err(());
        }
        debug_assert_eq!(self.node_keys.len(), id.index());
        self.node_keys.push(key);
        self.live.insert(key, id);
        Ok(())
    }

    /// Looks up the live `NodeId` for `key`, if any.
    #[must_use]
    pub fn get(&self, key: Key) -> Option<NodeId> {
        self.live.get(&key).copied()
    }

    /// Whether `key` currently resolves to a live node.
    #[must_use]
    pub fn is_live(&self, key: Key) -> bool {
        self.live.contains_key(&key)
    }

    /// The key a `NodeId` was created with, live or tombstoned.
    #[must_use]
    pub fn key_of(&self, id: NodeId) -> Option<Key> {
        self.node_keys.get(id.index()).copied()
    }

    /// Removes `key` from the live set. Returns `true` if it was live.
    /// The node itself is left untouched — this never mutates the graph.
    pub fn tombstone(&mut self, key: Key) -> bool {
        self.live.remove(&key).is_some()
    }

    /// Number of nodes ever assigned, live or tombstoned.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.node_keys.len()
    }

    /// Number of currently live keys.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// All node keys in `NodeId` order, for the `NODE_KEYS` dump segment.
    #[must_use]
    pub fn node_keys(&self) -> &[Key] {
        &self.node_keys
    }

    /// Rebuilds the live-key map from a dumped `node_keys` vector and an
    /// explicit tombstone set (both produced by `load`).
    #[must_use]
    pub fn from_parts(node_keys: Vec<Key>, tombstoned: &std::collections::HashSet<Key>) -> Self {
        let mut live = HashMap::with_capacity(node_keys.len());
        for (idx, &key) in node_keys.iter().enumerate() {
            if key != Key::INVALID && !tombstoned.contains(&key) {
                live.insert(key, NodeId(idx as u32));
            }
        }
        Self { live, node_keys }
    }
}
