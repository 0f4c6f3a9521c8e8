//! Deterministic pseudo-random orthogonal rotators: Kac random-walk and
//! Fast-Hadamard-plus-sign-diagonal. Both are stored as a compact recipe
//! (seed, plus a sweep count for Kac) rather than a dense `D_rot × D_rot`
//! matrix, and both are self-inverse by transpose.

use crate::config::RotatorKind;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One Givens rotation applied to coordinates `(i, j)` by angle `theta`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct Givens {
    i: u32,
    j: u32,
    cos: f32,
    sin: f32,
}

/// The rotator recipe stored in the codebook: deterministic given a seed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Rotator {
    /// Kac random walk: a fixed sequence of Givens sweeps, `4*D_rot` sweeps
    /// deep, generated from `seed`.
    Kac {
        /// Rotated dimension.
        d_rot: u32,
        /// RNG seed the sweep sequence was generated from.
        seed: u64,
        /// Number of full sweeps (`4 * d_rot`).
        sweep_count: u32,
        #[serde(skip)]
        sweeps: Vec<Vec<Givens>>,
    },
    /// Fast Hadamard Transform with a random sign diagonal. Requires
    /// `d_rot` to be a power of two.
    Fht {
        /// Rotated dimension (must be a power of two).
        d_rot: u32,
        /// RNG seed the sign diagonal was generated from.
        seed: u64,
        #[serde(skip)]
        signs: Vec<f32>,
    },
}

impl Rotator {
    /// Builds a rotator of the given kind for `d_rot` dimensions.
    ///
    /// # Panics
    /// Panics if `kind` is `Fht` and `d_rot` is not a power of two.
    #[must_use]
    pub fn build(kind: RotatorKind, d_rot: u32, seed: u64) -> Self {
        match kind {
            RotatorKind::Kac => Self::build_kac(d_rot, seed),
            RotatorKind::Fht => Self::build_fht(d_rot, seed),
        }
    }

    fn build_kac(d_rot: u32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let sweep_count = 4 * d_rot.max(1);
        let d = d_rot as usize;
        let mut sweeps = Vec::with_capacity(sweep_count as usize);
        for _ in 0..sweep_count {
            // One sweep: a random pairing of coordinates, each rotated by
            // a random angle. A derangement-free adjacent pairing after a
            // random permutation is sufficient to mix all coordinates.
            let mut order: Vec<u32> = (0..d as u32).collect();
            for idx in (1..order.len()).rev() {
                let swap_idx = rng.gen_range(0..=idx);
                order.swap(idx, swap_idx);
            }
            let mut sweep = Vec::with_capacity(d / 2);
            for pair in order.chunks_exact(2) {
                let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
                sweep.push(Givens {
                    i: pair[0],
                    j: pair[1],
                    cos: theta.cos(),
                    sin: theta.sin(),
                });
            }
            sweeps.push(sweep);
        }
        Rotator::Kac {
            d_rot,
            seed,
            sweep_count,
            sweeps,
        }
    }

    fn build_fht(d_rot: u32, seed: u64) -> Self {
        assert!(
            d_rot.is_power_of_two(),
            "FHT rotator requires a power-of-two dimension, got {d_rot}"
        );
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let signs = (0..d_rot)
            .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
            .collect();
        Rotator::Fht { d_rot, seed, signs }
    }

    /// Rebuilds the transient sweep/sign tables after deserialization
    /// (they are `#[serde(skip)]` to avoid storing a dense recipe).
    pub fn rehydrate(&mut self) {
        match self {
            Rotator::Kac { d_rot, seed, .. } => {
                *self = Self::build_kac(*d_rot, *seed);
            }
            Rotator::Fht { d_rot, seed, .. } => {
                *self = Self::build_fht(*d_rot, *seed);
            }
        }
    }

    /// Rotated dimension.
    #[must_use]
    pub fn d_rot(&self) -> u32 {
        match self {
            Rotator::Kac { d_rot, .. } | Rotator::Fht { d_rot, .. } => *d_rot,
        }
    }

    /// Applies `R·x`, writing into `out` (length `d_rot`).
    pub fn apply(&self, x: &[f32], out: &mut [f32]) {
        match self {
            Rotator::Kac { sweeps, .. } => {
                out.copy_from_slice(x);
                for sweep in sweeps {
                    for g in sweep {
                        let (i, j) = (g.i as usize, g.j as usize);
                        let xi = out[i];
                        let xj = out[j];
                        out[i] = g.cos * xi - g.sin * xj;
                        out[j] = g.sin * xi + g.cos * xj;
                    }
                }
            }
            Rotator::Fht { signs, .. } => {
                out.copy_from_slice(x);
                for (v, s) in out.iter_mut().zip(signs) {
                    *v *= s;
                }
                fht_inplace(out);
                let norm = 1.0 / (out.len() as f32).sqrt();
                for v in out.iter_mut() {
                    *v *= norm;
                }
            }
        }
    }

    /// Applies `R^T·y` (the inverse rotation), writing into `out`.
    pub fn apply_transpose(&self, y: &[f32], out: &mut [f32]) {
        match self {
            Rotator::Kac { sweeps, .. } => {
                out.copy_from_slice(y);
                for sweep in sweeps.iter().rev() {
                    for g in sweep.iter().rev() {
                        let (i, j) = (g.i as usize, g.j as usize);
                        let xi = out[i];
                        let xj = out[j];
                        // Transpose of a rotation is its negative-angle form.
                        out[i] = g.cos * xi + g.sin * xj;
                        out[j] = -g.sin * xi + g.cos * xj;
                    }
                }
            }
            Rotator::Fht { signs, .. } => {
                // FHT is its own inverse up to the normalization constant,
                // and the sign diagonal is self-inverse (±1).
                out.copy_from_slice(y);
                fht_inplace(out);
                let norm = 1.0 / (out.len() as f32).sqrt();
                for (v, s) in out.iter_mut().zip(signs) {
                    *v *= norm * s;
                }
            }
        }
    }
}

/// In-place Fast Hadamard Transform; `x.len()` must be a power of two.
fn fht_inplace(x: &mut [f32]) {
    let n = x.len();
    let mut len = 1usize;
    while len < n {
        let mut i = 0;
        while i < n {
            for j in i..i + len {
                let a = x[j];
                let b = x[j + len];
                x[j] = a + b;
                x[j + len] = a - b;
            }
            i += len * 2;
        }
        len *= 2;
    }
}
