//! Configuration surfaces recognized by Builder, Streamer and the quantizer.
//!
//! These are plain serde-serializable structs, not a config-file loader:
//! loading a config from disk/env is the embedding application's concern.

use serde::{Deserialize, Serialize};

/// External scalar element type of a vector, as named in the data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    /// IEEE 754 half precision.
    Fp16,
    /// IEEE 754 single precision.
    Fp32,
    /// IEEE 754 double precision.
    Fp64,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// 32-bit packed binary (Hamming).
    Bin32,
    /// 64-bit packed binary (Hamming).
    Bin64,
}

impl ScalarKind {
    /// Size in bytes of one scalar of this kind.
    #[must_use]
    pub const fn byte_width(self) -> usize {
        match self {
            ScalarKind::Fp16 | ScalarKind::Int16 => 2,
            ScalarKind::Fp32 => 4,
            ScalarKind::Fp64 => 8,
            ScalarKind::Int8 => 1,
            ScalarKind::Bin32 => 4,
            ScalarKind::Bin64 => 8,
        }
    }
}

/// The supported distance families, addressable by a stable numeric code so
/// the value survives a dump/load round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum MetricKind {
    /// Σ(a−b)².
    L2Squared = 0,
    /// sqrt of squared Euclidean.
    Euclidean = 1,
    /// Raw dot product.
    DotProduct = 2,
    /// 1 − IP on pre-normalized vectors.
    Cosine = 3,
    /// popcount(a XOR b).
    Hamming = 4,
    /// sqrt(popcount(a XOR b)).
    HammingSqrt = 5,
    /// Inner product lifted into an L2-comparable proxy.
    MipsL2 = 6,
    /// Segmented CSR-like merge-join squared Euclidean.
    SparseL2Squared = 7,
}

impl MetricKind {
    /// Decode a metric code stored in a dumped `META` segment.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::L2Squared),
            1 => Some(Self::Euclidean),
            2 => Some(Self::DotProduct),
            3 => Some(Self::Cosine),
            4 => Some(Self::Hamming),
            5 => Some(Self::HammingSqrt),
            6 => Some(Self::MipsL2),
            7 => Some(Self::SparseL2Squared),
            _ => None,
        }
    }
}

/// The orthogonal rotator construction used by the quantizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotatorKind {
    /// Kac random-walk (sequence of Givens rotations), any `D_rot`.
    Kac,
    /// Fast Hadamard Transform + random sign diagonal; requires `D_rot` to
    /// be a power of two.
    Fht,
}

/// HNSW graph-shape parameters, shared by Builder and Streamer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Target dimension of incoming vectors.
    pub dimensions: u32,
    /// Distance family the graph is built for.
    pub metric: MetricKind,
    /// Max neighbors per node at levels > 0.
    pub max_neighbor_cnt: u32,
    /// Multiplier applied to `max_neighbor_cnt` to get the level-0 cap.
    pub l0_max_neighbor_cnt_multiplier: f32,
    /// Floor on the neighbor cap after pruning (0 = no floor beyond 1).
    pub min_neighbor_cnt: u32,
    /// Multiplier applied to the cap to get the prune-time scan budget.
    pub neighbor_prune_multiplier: f32,
    /// `1/ln(scaling_factor)` feeds the level-assignment distribution;
    /// defaults to `max_neighbor_cnt` when unset.
    pub scaling_factor: u32,
    /// Candidate frontier width used while building.
    pub ef_construction: u32,
    /// Default candidate frontier width used while searching.
    pub ef_search: u32,
    /// Hard cap on graph levels.
    pub l_max: u8,
}

impl HnswParams {
    /// Construct parameters with the spec's documented defaults for the
    /// given dimensionality and metric.
    #[must_use]
    pub fn new(dimensions: u32, metric: MetricKind) -> Self {
        Self {
            dimensions,
            metric,
            max_neighbor_cnt: 32,
            l0_max_neighbor_cnt_multiplier: 2.0,
            min_neighbor_cnt: 0,
            neighbor_prune_multiplier: 1.0,
            scaling_factor: 32,
            ef_construction: 200,
            ef_search: 50,
            l_max: 32,
        }
    }

    /// Neighbor cap at level 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn m0(&self) -> u32 {
        ((self.max_neighbor_cnt as f32) * self.l0_max_neighbor_cnt_multiplier).round() as u32
    }

    /// Neighbor cap at the given level (0 uses `m0`, >0 uses `max_neighbor_cnt`).
    #[must_use]
    pub fn m_at(&self, level: u8) -> u32 {
        if level == 0 {
            self.m0()
        } else {
            self.max_neighbor_cnt
        }
    }

    /// `1/ln(scaling_factor)`, the level-assignment multiplier `mL`.
    #[must_use]
    pub fn level_mult(&self) -> f32 {
        let s = self.scaling_factor.max(2) as f32;
        1.0 / s.ln()
    }
}

/// Parameters governing RaBitQ training.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RabitqParams {
    /// Number of coarse clusters `C`, in `[1, 256]`.
    pub num_clusters: u32,
    /// Total bits per coordinate (1 sign bit + `k` residual bits), in `[1,9]`.
    pub total_bits: u32,
    /// Max vectors sampled for KMeans training.
    pub sample_count: usize,
    /// Rotator construction.
    pub rotator_kind: RotatorKind,
    /// Retain the original vector alongside its code for exact re-ranking.
    pub keep_raw: bool,
    /// Max Lloyd's-algorithm iterations during KMeans training.
    pub kmeans_max_iter: u32,
}

impl RabitqParams {
    /// Defaults per §6: `num_clusters=16`, `total_bits=7`, `sample_count=200000`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            num_clusters: 16,
            total_bits: 7,
            sample_count: 200_000,
            rotator_kind: RotatorKind::Kac,
            keep_raw: false,
            kmeans_max_iter: 25,
        }
    }

    /// Residual bit width `k = total_bits - 1`.
    #[must_use]
    pub fn residual_bits(&self) -> u32 {
        self.total_bits.saturating_sub(1)
    }
}

impl Default for RabitqParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Streamer-only resource limits layered on top of `HnswParams`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamerLimits {
    /// Hard cap on live+tombstoned document count; inserts past this fail
    /// with `IndexFull`.
    pub docs_hard_limit: u64,
    /// Soft cap; inserts past this succeed but log a warning.
    pub docs_soft_limit: u64,
    /// Byte budget for encoded-node/level/neighbor-array growth; 0 = unlimited.
    pub memory_quota: u64,
    /// Chunk size (elements) for the chunked arena.
    pub chunk_size: usize,
    /// Doc-count threshold at/under which search falls back to brute force.
    pub bruteforce_threshold: u64,
    /// Cap on the fraction of `doc_count` a single beam search may traverse.
    pub max_scan_ratio: f32,
    /// Floor on the traversal budget regardless of `max_scan_ratio`.
    pub min_scan_limit: usize,
    /// Ceiling on the traversal budget regardless of `max_scan_ratio`.
    pub max_scan_limit: usize,
    /// Use a bloom filter instead of a dense bytemap for the visit filter.
    pub bloomfilter_enable: bool,
    /// Target false-positive probability for the bloom visit filter.
    pub bloomfilter_negative_prob: f64,
    /// Verify a CRC32 per segment on load.
    pub check_crc_enable: bool,
    /// Pad under-size result lists with sentinel entries.
    pub force_padding_result_enable: bool,
    /// Number of top candidates re-ranked against `raw_copy` (exact
    /// distance) before the final top-k cut, when `keep_raw` was set at
    /// training time. `0` disables the re-rank pass, leaving the RaBitQ
    /// estimate as the returned distance (§4.5's "optional re-rank").
    pub rerank_size: usize,
}

impl StreamerLimits {
    /// Defaults per §6.
    #[must_use]
    pub fn new() -> Self {
        let hard = u64::MAX;
        Self {
            docs_hard_limit: hard,
            docs_soft_limit: hard / 10 * 9,
            memory_quota: 0,
            chunk_size: 1 << 16,
            bruteforce_threshold: 0,
            max_scan_ratio: 1.0,
            min_scan_limit: 0,
            max_scan_limit: usize::MAX,
            bloomfilter_enable: false,
            bloomfilter_negative_prob: 0.001,
            check_crc_enable: false,
            force_padding_result_enable: false,
            rerank_size: 0,
        }
    }
}

impl StreamerLimits {
    /// The traversal budget a single beam search may spend, derived from
    /// `max_scan_ratio` of `doc_count` and clamped to
    /// `[min_scan_limit, max_scan_limit]`. `usize::MAX`-saturating by
    /// design: a huge `doc_count * ratio` product degrades to "unbounded"
    /// rather than overflowing.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scan_budget(&self, doc_count: usize) -> usize {
        let ratio_budget = ((doc_count as f64) * f64::from(self.max_scan_ratio)).round();
        let ratio_budget = if ratio_budget.is_finite() && ratio_budget >= 0.0 {
            ratio_budget as usize
        } else {
            usize::MAX
        };
        ratio_budget.clamp(self.min_scan_limit, self.max_scan_limit)
    }
}

impl Default for StreamerLimits {
    fn default() -> Self {
        Self::new()
    }
}
