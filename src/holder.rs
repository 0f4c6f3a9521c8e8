//! The `Holder` collaborator interface: the embedding application's own
//! vector source, used by `Builder::train`/`build` to sample and iterate
//! training/insertion data without this crate owning storage for it.

use crate::error::Result;

/// A read-only view over a caller-owned collection of `(key, vector)`
/// pairs. `Builder` never copies the whole collection: `sample` is used
/// for quantizer training and `iter` drives the build's insertion loop.
pub trait Holder: Send + Sync {
    /// Total number of vectors available.
    fn count(&self) -> usize;

    /// Vector dimensionality (every vector must agree).
    fn dimension(&self) -> u32;

    /// The raw vector bytes (little-endian, `ScalarKind`-encoded) for `key`.
    fn get_vector(&self, key: u64) -> Result<Vec<u8>>;

    /// Up to `n` sampled raw vectors (as `f32`, already decoded) for
    /// quantizer training. Implementations may subsample however they see
    /// fit (uniform, reservoir, first-`n`); determinism across repeated
    /// calls is not required.
    fn sample(&self, n: usize) -> Vec<Vec<f32>>;

    /// Iterates every `(key, vector)` pair, in whatever order the
    /// collaborator finds cheapest, for `Builder::build`'s insertion loop.
    fn iter(&self) -> Box<dyn Iterator<Item = (u64, Vec<f32>)> + '_>;
}

/// An in-memory `Holder` over a `Vec<(key, vector)>`, used by tests and
/// small embedded callers that don't need a custom collaborator.
pub struct VecHolder {
    dim: u32,
    items: Vec<(u64, Vec<f32>)>,
}

impl VecHolder {
    /// Wraps `items`; panics in debug builds if any vector's length
    /// disagrees with the first one's (a caller bug, not a runtime error).
    #[must_use]
    pub fn new(items: Vec<(u64, Vec<f32>)>) -> Self {
        let dim = items.first().map_or(0, |(_, v)| v.len() as u32);
        debug_assert!(items.iter().all(|(_, v)| v.len() as u32 == dim));
        Self { dim, items }
    }
}

impl Holder for VecHolder {
    fn count(&self) -> usize {
        self.items.len()
    }

    fn dimension(&self) -> u32 {
        self.dim
    }

    fn get_vector(&self, key: u64) -> Result<Vec<u8>> {
        self.items
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| bytemuck::cast_slice(v).to_vec())
            .ok_or(crate::error::RabitqError::KeyNotFound(key))
    }

    fn sample(&self, n: usize) -> Vec<Vec<f32>> {
        self.items.iter().take(n).map(|(_, v)| v.clone()).collect()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (u64, Vec<f32>)> + '_> {
        Box::new(self.items.iter().cloned())
    }
}
