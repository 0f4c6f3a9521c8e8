//! Identifiers and the per-node encoded-vector record.
//!
//! `Key` is the caller-supplied 64-bit primary key; `NodeId` is the dense,
//! monotonically assigned internal identifier. The mapping between them is
//! owned by [`super::keymap::KeyMap`], never by `EncodedNode` itself.

use serde::{Deserialize, Serialize};

/// Caller-supplied 64-bit primary key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Key(pub u64);

impl Key {
    /// Reserved sentinel; never a live key.
    pub const INVALID: Self = Key(u64::MAX);
}

/// Dense internal node identifier, assigned monotonically and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Reserved sentinel; never a valid node.
    pub const INVALID: Self = NodeId(u32::MAX);

    /// This id's position in a dense, zero-based array.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Graph level a node participates in, `0..=L_max`.
pub type Level = u8;

/// One node's RaBitQ code plus the estimator scalars, exactly the "Encoded
/// node" layout of the data model (§3): `cluster_id`, `f_add`/`f_rescale`,
/// `err_bound`, the 1-bit sign code, the k-bit residual code, and an
/// optional raw copy for exact re-ranking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncodedNode {
    /// Index into the trained codebook.
    pub cluster_id: u16,
    /// Additive estimator constant.
    pub f_add: f32,
    /// Scaling estimator constant.
    pub f_rescale: f32,
    /// Conservative absolute error bound on the estimate.
    pub err_bound: f32,
    /// Packed sign bits of the rotated residual.
    pub one_bit_code: Vec<u8>,
    /// Packed k-bit residual codes.
    pub ex_bits_code: Vec<u8>,
    /// Original vector, retained only when `keep_raw=true`.
    pub raw_copy: Option<Vec<f32>>,
}

impl EncodedNode {
    /// Builds a node record from a quantizer-produced code, optionally
    /// retaining the raw vector for exact re-ranking.
    #[must_use]
    pub fn new(code: &crate::quantizer::EncodedVector, raw: Option<&[f32]>) -> Self {
        Self {
            cluster_id: code.cluster_id as u16,
            f_add: code.f_add,
            f_rescale: code.f_rescale,
            err_bound: code.err_bound,
            one_bit_code: code.one_bit_code.clone(),
            ex_bits_code: code.ex_bits_code.clone(),
            raw_copy: raw.map(<[f32]>::to_vec),
        }
    }

    /// Approximate heap footprint in bytes, used by the `memory_quota` check
    /// (§5); the fixed-size fields are counted at their in-memory size, the
    /// variable-length ones at their current `Vec` length.
    #[must_use]
    pub fn approx_bytes(&self) -> u64 {
        let fixed = std::mem::size_of::<u16>() + 3 * std::mem::size_of::<f32>();
        let variable = self.one_bit_code.len()
            + self.ex_bits_code.len()
            + self.raw_copy.as_ref().map_or(0, |r| r.len() * std::mem::size_of::<f32>());
        (fixed + variable) as u64
    }

    /// Reconstitutes the quantizer-facing view of this node's code (without
    /// the raw copy), for passing into `RabitqQuantizer::estimate`.
    #[must_use]
    pub fn as_encoded_vector(&self) -> crate::quantizer::EncodedVector {
        crate::quantizer::EncodedVector {
            cluster_id: u32::from(self.cluster_id),
            f_add: self.f_add,
            f_rescale: self.f_rescale,
            err_bound: self.err_bound,
            one_bit_code: self.one_bit_code.clone(),
            ex_bits_code: self.ex_bits_code.clone(),
        }
    }
}
