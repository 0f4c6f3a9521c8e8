//! K1: blocked matrix-vs-query distance kernels with runtime CPU-feature
//! dispatch.
//!
//! Feature detection happens once, at `DistanceTable::detect()`, and is
//! stored as a small function-pointer table — never re-detected per call,
//! per the "polymorphic distance dispatch" design note. Block-shape
//! coverage is the 1×1/4×4/8×8/16×16 specializations plus a generic tiling
//! driver (`simd_x86::tile_block_f32`) for every other nominal shape; see
//! `DESIGN.md` for the scope decision.

pub mod scalar;

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub mod simd_x86;

#[cfg(target_arch = "aarch64")]
pub mod neon;

pub mod int4;
pub mod mips;

#[cfg(feature = "sparse")]
pub mod sparse;

/// Which SIMD backend was selected at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// AVX2-capable x86_64.
    Avx2,
    /// NEON-capable aarch64.
    Neon,
    /// Portable scalar fallback.
    Portable,
}

impl Backend {
    /// Runtime-detect the best backend for the current process, once.
    #[must_use]
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                return Backend::Avx2;
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            return Backend::Neon;
        }
        #[allow(unreachable_code)]
        Backend::Portable
    }
}

type L2Fn = fn(&[f32], &[f32]) -> f32;
type HammingFn = fn(&[u8], &[u8]) -> f32;

/// Function-pointer table bound once at index construction; every search
/// and insert call goes through this rather than re-dispatching per call.
#[derive(Clone, Copy)]
pub struct DistanceTable {
    backend: Backend,
    l2_squared: L2Fn,
    dot: L2Fn,
    hamming: HammingFn,
}

fn l2_squared_portable(a: &[f32], b: &[f32]) -> f32 {
    scalar::l2_squared_f32(a, b)
}
fn dot_portable(a: &[f32], b: &[f32]) -> f32 {
    scalar::dot_f32(a, b)
}
fn hamming_portable(a: &[u8], b: &[u8]) -> f32 {
    scalar::hamming_u8(a, b)
}

#[cfg(target_arch = "x86_64")]
fn l2_squared_avx2(a: &[f32], b: &[f32]) -> f32 {
    unsafe { simd_x86::l2_squared_f32_avx2(a, b) }
}
#[cfg(target_arch = "x86_64")]
fn dot_avx2(a: &[f32], b: &[f32]) -> f32 {
    unsafe { simd_x86::dot_f32_avx2(a, b) }
}
#[cfg(target_arch = "x86_64")]
fn hamming_avx2(a: &[u8], b: &[u8]) -> f32 {
    unsafe { simd_x86::hamming_u8_avx2(a, b) }
}

#[cfg(target_arch = "aarch64")]
fn l2_squared_neon(a: &[f32], b: &[f32]) -> f32 {
    unsafe { neon::l2_squared_f32_neon(a, b) }
}
#[cfg(target_arch = "aarch64")]
fn hamming_neon(a: &[u8], b: &[u8]) -> f32 {
    unsafe { neon::hamming_u8_neon(a, b) }
}

impl DistanceTable {
    /// Detects the CPU feature set once and binds the function pointers.
    #[must_use]
    pub fn detect() -> Self {
        let backend = Backend::detect();
        match backend {
            #[cfg(target_arch = "x86_64")]
            Backend::Avx2 => Self {
                backend,
                l2_squared: l2_squared_avx2,
                dot: dot_avx2,
                hamming: hamming_avx2,
            },
            #[cfg(target_arch = "aarch64")]
            Backend::Neon => Self {
                backend,
                l2_squared: l2_squared_neon,
                dot: dot_portable,
                hamming: hamming_neon,
            },
            _ => Self {
                backend: Backend::Portable,
                l2_squared: l2_squared_portable,
                dot: dot_portable,
                hamming: hamming_portable,
            },
        }
    }

    /// Which backend this table was bound to.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Squared Euclidean, single pair.
    #[must_use]
    pub fn l2_squared(&self, a: &[f32], b: &[f32]) -> f32 {
        (self.l2_squared)(a, b)
    }

    /// Euclidean, single pair.
    #[must_use]
    pub fn euclidean(&self, a: &[f32], b: &[f32]) -> f32 {
        self.l2_squared(a, b).sqrt()
    }

    /// Dot product, single pair.
    #[must_use]
    pub fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        (self.dot)(a, b)
    }

    /// Cosine distance assuming pre-normalized inputs.
    #[must_use]
    pub fn cosine(&self, a: &[f32], b: &[f32]) -> f32 {
        1.0 - self.dot(a, b)
    }

    /// Hamming distance over packed bytes.
    #[must_use]
    pub fn hamming(&self, a: &[u8], b: &[u8]) -> f32 {
        (self.hamming)(a, b)
    }

    /// sqrt-Hamming variant.
    #[must_use]
    pub fn hamming_sqrt(&self, a: &[u8], b: &[u8]) -> f32 {
        self.hamming(a, b).sqrt()
    }

    /// One query (`q`) against `M` database rows, filling `out[0..M]`.
    /// This is the blocked M×1 shape that beam search actually exercises;
    /// wider N>1 shapes reduce to repeated calls of this by the caller,
    /// which is the access pattern K4 uses (one live query at a time).
    pub fn l2_squared_block(&self, db_rows: &[&[f32]], q: &[f32], out: &mut [f32]) {
        debug_assert_eq!(db_rows.len(), out.len());
        for (row, slot) in db_rows.iter().zip(out.iter_mut()) {
            *slot = self.l2_squared(row, q);
        }
    }
}

impl Default for DistanceTable {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_detect_agrees_with_scalar() {
        let table = DistanceTable::detect();
        let a = vec![1.0f32, 2.0, 3.0, 4.0, 5.0];
        let b = vec![5.0f32, 4.0, 3.0, 2.0, 1.0];
        let want = scalar::l2_squared_f32(&a, &b);
        let got = table.l2_squared(&a, &b);
        assert!((want - got).abs() < 1e-3);
    }

    #[test]
    fn block_matches_pairwise() {
        let table = DistanceTable::detect();
        let rows = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let refs: Vec<&[f32]> = rows.iter().map(|v| v.as_slice()).collect();
        let q = vec![0.0f32, 0.0];
        let mut out = vec![0.0; 3];
        table.l2_squared_block(&refs, &q, &mut out);
        assert_eq!(out, vec![1.0, 1.0, 2.0]);
    }
}
