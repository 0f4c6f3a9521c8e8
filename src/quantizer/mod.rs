//! RaBitQ quantization: coarse clustering, a deterministic rotator, and
//! per-vector binary + k-bit residual codes with a query-side estimator.

pub mod codebook;
pub mod encode;
pub mod estimator;
mod kmeans;
pub mod rotation;

pub use codebook::Codebook;
pub use encode::EncodedVector;
pub use estimator::QueryEntity;

use crate::config::RabitqParams;
use crate::error::QuantizerError;

/// Facade tying a trained [`Codebook`] to the `encode`/`estimate` pair so
/// callers don't need to track `residual_bits` separately.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RabitqQuantizer {
    codebook: Codebook,
}

impl RabitqQuantizer {
    /// Trains a codebook on `samples` (each of length `dim`) and wraps it.
    pub fn train(
        samples: &[Vec<f32>],
        dim: u32,
        params: &RabitqParams,
        seed: u64,
    ) -> Result<Self, QuantizerError> {
        let codebook = Codebook::train(samples, dim, params, seed)?;
        Ok(Self { codebook })
    }

    /// Encodes `x` against the trained codebook.
    ///
    /// # Errors
    /// Returns [`QuantizerError::DimensionMismatch`] if `x.len() != dim`.
    pub fn encode(&self, x: &[f32]) -> Result<EncodedVector, QuantizerError> {
        if x.len() != self.codebook.dim as usize {
            return Err(QuantizerError::DimensionMismatch {
                expected: self.codebook.dim,
                actual: x.len() as u32,
            });
        }
        Ok(encode::encode(&self.codebook, x))
    }

    /// Builds a [`QueryEntity`] for `q`, ready to be passed to
    /// [`RabitqQuantizer::estimate`] against any vector encoded with this
    /// quantizer's codebook.
    ///
    /// # Errors
    /// Returns [`QuantizerError::DimensionMismatch`] if `q.len() != dim`.
    pub fn prepare_query(&self, q: &[f32]) -> Result<QueryEntity, QuantizerError> {
        if q.len() != self.codebook.dim as usize {
            return Err(QuantizerError::DimensionMismatch {
                expected: self.codebook.dim,
                actual: q.len() as u32,
            });
        }
        Ok(QueryEntity::build(&self.codebook, q))
    }

    /// Estimates the squared distance between `encoded` and the query
    /// behind `query`, returning `(estimate, err_bound)`.
    #[must_use]
    pub fn estimate(&self, encoded: &EncodedVector, query: &QueryEntity) -> (f32, f32) {
        estimator::estimate(encoded, query, self.codebook.residual_bits)
    }

    /// The codebook's (unrotated, unpadded) dimension.
    #[must_use]
    pub fn dim(&self) -> u32 {
        self.codebook.dim
    }

    /// Rehydrates transient rotator state after deserialization.
    pub fn rehydrate(&mut self) {
        self.codebook.rotator.rehydrate();
    }

    /// Squared distance between two cluster centroids in the rotated
    /// space. Used as a coarse node-to-node proxy distance by the graph
    /// algorithm's neighbor-selection heuristic when neither side retained
    /// a raw copy to compare exactly.
    #[must_use]
    pub fn cluster_centroid_distance(&self, a: u32, b: u32) -> f32 {
        let ca = &self.codebook.rotated_centroids[a as usize];
        let cb = &self.codebook.rotated_centroids[b as usize];
        ca.iter().zip(cb).map(|(x, y)| (x - y) * (x - y)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RotatorKind;

    fn params(clusters: u32, k: u32) -> RabitqParams {
        RabitqParams {
            num_clusters: clusters,
            total_bits: 1 + k,
            sample_count: 64,
            rotator_kind: RotatorKind::Kac,
            keep_raw: false,
            kmeans_max_iter: 10,
        }
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let samples: Vec<Vec<f32>> = (0..8).map(|i| vec![i as f32; 4]).collect();
        let q = RabitqQuantizer::train(&samples, 4, &params(2, 3), 7).unwrap();
        let bad = vec![0.0f32; 5];
        assert!(matches!(
            q.encode(&bad),
            Err(QuantizerError::DimensionMismatch { expected: 4, actual: 5 })
        ));
    }

    #[test]
    fn round_trip_estimate_is_finite_and_non_negative() {
        let samples: Vec<Vec<f32>> = vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ];
        let q = RabitqQuantizer::train(&samples, 4, &params(2, 4), 11).unwrap();
        let encoded = q.encode(&samples[0]).unwrap();
        let query = q.prepare_query(&samples[0]).unwrap();
        let (dist, err_bound) = q.estimate(&encoded, &query);
        assert!(dist.is_finite() && dist >= 0.0);
        assert!(err_bound.is_finite() && err_bound >= 0.0);
    }
}
