//! The graph's entry point: a single `NodeId` paired with the current
//! maximum level, updated transactionally under a dedicated swap mutex
//! (§5: "a single atomic NodeId plus a current max level atomic; updating
//! both transactionally is guarded by a dedicated mutex").

use super::node::{Level, NodeId};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

/// Entry point + max-level pair. Reads never block; a write (only taken
/// when a newly inserted node's level strictly exceeds the current max)
/// takes `swap` for the duration of the two-field update.
pub struct EntryPoint {
    node: AtomicU32,
    max_level: AtomicU8,
    swap: Mutex<()>,
}

impl EntryPoint {
    /// No entry point yet (an empty graph).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            node: AtomicU32::new(NodeId::INVALID.0),
            max_level: AtomicU8::new(0),
            swap: Mutex::new(()),
        }
    }

    /// Current entry point, or `None` for an empty graph.
    #[must_use]
    pub fn get(&self) -> Option<(NodeId, Level)> {
        let id = NodeId(self.node.load(Ordering::Acquire));
        if id == NodeId::INVALID {
            return None;
        }
        Some((id, self.max_level.load(Ordering::Acquire)))
    }

    /// Unconditionally installs `(id, level)` as the entry point. Used only
    /// when restoring a dumped graph, where there is no concurrent writer.
    pub fn set(&self, id: NodeId, level: Level) {
        let _guard = self.swap.lock().unwrap();
        self.node.store(id.0, Ordering::Release);
        self.max_level.store(level, Ordering::Release);
    }

    /// Installs `(id, level)` as the new entry point iff `level` strictly
    /// exceeds the current maximum (or there is no entry point yet). The
    /// check-then-set is atomic with respect to other callers of this
    /// method, but concurrent readers may observe either the old or new
    /// pair, never a torn one.
    pub fn maybe_advance(&self, id: NodeId, level: Level) {
        let _guard = self.swap.lock().unwrap();
        let current = self.node.load(Ordering::Acquire);
        if current == NodeId::INVALID.0 || level > self.max_level.load(Ordering::Acquire) {
            self.node.store(id.0, Ordering::Release);
            self.max_level.store(level, Ordering::Release);
        }
    }
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_entry_point() {
        assert_eq!(EntryPoint::empty().get(), None);
    }

    #[test]
    fn first_insert_becomes_entry_point_regardless_of_level() {
        let ep = EntryPoint::empty();
        ep.maybe_advance(NodeId(5), 0);
        assert_eq!(ep.get(), Some((NodeId(5), 0)));
    }

    #[test]
    fn only_strictly_higher_level_advances() {
        let ep = EntryPoint::empty();
        ep.maybe_advance(NodeId(0), 3);
        ep.maybe_advance(NodeId(1), 3);
        assert_eq!(ep.get(), Some((NodeId(0), 3)));
        ep.maybe_advance(NodeId(2), 4);
        assert_eq!(ep.get(), Some((NodeId(2), 4)));
    }
}
