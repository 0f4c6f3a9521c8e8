//! The immutable, post-training codebook: coarse centroids plus the
//! rotator recipe, in the rotated space.

use super::rotation::Rotator;
use crate::config::RabitqParams;
use crate::error::QuantizerError;
use serde::{Deserialize, Serialize};

/// Rounds `d` up to the rotator's block size. Kac rotators accept any
/// `d_rot`; FHT rotators require a power of two, so padding rounds up to
/// the next power of two in that case.
#[must_use]
pub fn padded_dim(d: u32, kind: crate::config::RotatorKind) -> u32 {
    match kind {
        crate::config::RotatorKind::Kac => d.max(1),
        crate::config::RotatorKind::Fht => d.max(1).next_power_of_two(),
    }
}

/// Global, immutable-after-training codebook.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Codebook {
    /// Original (unrotated, unpadded) dimension.
    pub dim: u32,
    /// Rotated/padded dimension.
    pub d_rot: u32,
    /// Number of coarse clusters.
    pub num_clusters: u32,
    /// Residual bit width `k`.
    pub residual_bits: u32,
    /// Centroids in the rotated space, `R·c_j`, each length `d_rot`.
    pub rotated_centroids: Vec<Vec<f32>>,
    /// The rotator used to produce `rotated_centroids` and to rotate
    /// incoming residuals/queries.
    pub rotator: Rotator,
}

impl Codebook {
    /// Trains centroids on `samples` (each of length `dim`, un-rotated)
    /// and constructs the rotator, producing an immutable codebook.
    pub fn train(
        samples: &[Vec<f32>],
        dim: u32,
        params: &RabitqParams,
        seed: u64,
    ) -> Result<Self, QuantizerError> {
        if params.num_clusters == 0 || params.num_clusters > 256 {
            return Err(QuantizerError::InvalidParameter(format!(
                "num_clusters must be in [1,256], got {}",
                params.num_clusters
            )));
        }
        let total_bits = params.total_bits;
        if total_bits < 1 || total_bits > 9 {
            return Err(QuantizerError::InvalidParameter(format!(
                "total_bits must be in [1,9] (1 sign bit + up to 8 residual bits), got {total_bits}"
            )));
        }
        if samples.is_empty() {
            return Err(QuantizerError::EmptySample);
        }
        for s in samples {
            if s.len() != dim as usize {
                return Err(QuantizerError::DimensionMismatch {
                    expected: dim,
                    actual: s.len() as u32,
                });
            }
        }

        let d_rot = padded_dim(dim, params.rotator_kind);
        let padded: Vec<Vec<f32>> = samples
            .iter()
            .map(|v| {
                let mut p = v.clone();
                p.resize(d_rot as usize, 0.0);
                p
            })
            .collect();

        let centroids_padded = super::kmeans::train(
            &padded,
            d_rot as usize,
            params.num_clusters,
            params.kmeans_max_iter,
            seed,
        )?;

        let rotator = Rotator::build(params.rotator_kind, d_rot, seed.wrapping_add(1));
        let mut rotated_centroids = Vec::with_capacity(centroids_padded.len());
        for c in &centroids_padded {
            let mut out = vec![0.0f32; d_rot as usize];
            rotator.apply(c, &mut out);
            rotated_centroids.push(out);
        }

        Ok(Self {
            dim,
            d_rot,
            num_clusters: rotated_centroids.len() as u32,
            residual_bits: params.residual_bits(),
            rotated_centroids,
            rotator,
        })
    }

    /// Finds the nearest centroid (in the original, unrotated space) to
    /// `x` by comparing against `R^T · rotated_centroid` — equivalently,
    /// rotate `x` once and compare in rotated space, since rotation
    /// preserves Euclidean distance.
    #[must_use]
    pub fn nearest_cluster(&self, rotated_x: &[f32]) -> u32 {
        let mut best = 0u32;
        let mut best_dist = f32::INFINITY;
        for (j, c) in self.rotated_centroids.iter().enumerate() {
            let d: f32 = rotated_x
                .iter()
                .zip(c)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            if d < best_dist {
                best_dist = d;
                best = j as u32;
            }
        }
        best
    }

    /// Rotates `x` (padded to `d_rot` with zeros) into `out`.
    pub fn rotate_padded(&self, x: &[f32], out: &mut [f32]) {
        debug_assert!(x.len() <= self.d_rot as usize);
        let mut padded = vec![0.0f32; self.d_rot as usize];
        padded[..x.len()].copy_from_slice(x);
        self.rotator.apply(&padded, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RotatorKind;

    fn base_params(total_bits: u32) -> RabitqParams {
        RabitqParams {
            num_clusters: 16,
            total_bits,
            sample_count: 64,
            rotator_kind: RotatorKind::Kac,
            keep_raw: false,
            kmeans_max_iter: 10,
        }
    }

    fn samples() -> Vec<Vec<f32>> {
        (0..32).map(|i| vec![i as f32, -(i as f32), 1.0, 0.0]).collect()
    }

    #[test]
    fn total_bits_out_of_range_is_rejected() {
        // num_clusters=16, total_bits=20 would pass a naive `C * total_bits
        // <= 511` check despite `total_bits` alone being out of its
        // documented `[1,9]` range.
        assert!(matches!(
            Codebook::train(&samples(), 4, &base_params(20), 1),
            Err(QuantizerError::InvalidParameter(_))
        ));
        assert!(matches!(
            Codebook::train(&samples(), 4, &base_params(0), 1),
            Err(QuantizerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn total_bits_at_bounds_is_accepted() {
        assert!(Codebook::train(&samples(), 4, &base_params(1), 1).is_ok());
        assert!(Codebook::train(&samples(), 4, &base_params(9), 1).is_ok());
    }
}
