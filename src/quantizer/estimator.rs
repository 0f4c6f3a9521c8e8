//! Query-side estimator: per-cluster rotated residuals against a query,
//! combined with a vector's [`EncodedVector`] to produce an approximate
//! squared distance plus a conservative error bound.

use super::codebook::Codebook;
use super::encode::{read_bits, EncodedVector};
use crate::kernel::scalar::hamming_u8;

/// Precomputed per-cluster state for one query: the rotated residual
/// `s_j = R(q - c_j)` reduced to a sign bitmap (for the 1-bit inner
/// product) and an 8-bit quantized shape (for the residual correction),
/// plus its squared norm.
#[derive(Clone, Debug)]
struct ClusterEstimator {
    sign_bits: Vec<u8>,
    quantized: Vec<i8>,
    q_scale: f32,
    sq_norm: f32,
}

/// All `C` per-cluster estimators for one query vector.
#[derive(Clone, Debug)]
pub struct QueryEntity {
    clusters: Vec<ClusterEstimator>,
    d_rot: usize,
}

impl QueryEntity {
    /// Rotates `q` once and derives a [`ClusterEstimator`] per centroid.
    #[must_use]
    pub fn build(codebook: &Codebook, q: &[f32]) -> Self {
        let d_rot = codebook.d_rot as usize;
        let mut rotated_q = vec![0.0f32; d_rot];
        codebook.rotate_padded(q, &mut rotated_q);

        let clusters = codebook
            .rotated_centroids
            .iter()
            .map(|c| {
                let s: Vec<f32> = rotated_q.iter().zip(c).map(|(a, b)| a - b).collect();
                let sign_bits = pack_signs(&s);
                let abs_max = s.iter().fold(0.0f32, |m, v| m.max(v.abs())).max(f32::EPSILON);
                let q_scale = abs_max / i8::MAX as f32;
                let quantized: Vec<i8> = s
                    .iter()
                    .map(|&v| (v / q_scale).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8)
                    .collect();
                let sq_norm = s.iter().map(|v| v * v).sum();
                ClusterEstimator {
                    sign_bits,
                    quantized,
                    q_scale,
                    sq_norm,
                }
            })
            .collect();

        Self { clusters, d_rot }
    }
}

/// Estimates the squared distance between `encoded` and the vector that
/// produced `query`, returning `(estimate, err_bound)`.
///
/// `err_bound` is the per-vector conservative bound stored at encode time;
/// callers deciding whether to re-rank against a raw vector compare the
/// gap between candidate estimates to this bound.
#[must_use]
pub fn estimate(encoded: &EncodedVector, query: &QueryEntity, k: u32) -> (f32, f32) {
    let cluster = &query.clusters[encoded.cluster_id as usize];
    let d_rot = query.d_rot;

    let hamming = hamming_u8(&encoded.one_bit_code, &cluster.sign_bits);
    let ip1 = (d_rot as f32 - 2.0 * hamming) * encoded.f_rescale;

    let ip_ex = if k > 0 {
        let levels = (1u32 << k) - 1;
        let scale = encoded.f_rescale * d_rot as f32;
        let mut acc = 0.0f32;
        for i in 0..d_rot {
            let code = read_bits(&encoded.ex_bits_code, i * k as usize, k);
            let decoded = (code as f32 / levels as f32) * 2.0 - 1.0;
            let residual_val = decoded * scale;
            let s_i = cluster.quantized[i] as f32 * cluster.q_scale;
            acc += residual_val * s_i;
        }
        acc
    } else {
        0.0
    };

    let estimated_sq_dist = encoded.f_add + cluster.sq_norm - 2.0 * (ip1 + ip_ex);
    (estimated_sq_dist.max(0.0), encoded.err_bound)
}

fn pack_signs(y: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; y.len().div_ceil(8)];
    for (i, &v) in y.iter().enumerate() {
        if v >= 0.0 {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RabitqParams, RotatorKind};
    use crate::quantizer::encode::encode;

    fn tiny_codebook(dim: u32, k: u32) -> Codebook {
        let samples = vec![vec![1.0; dim as usize], vec![-1.0; dim as usize]];
        let params = RabitqParams {
            num_clusters: 1,
            total_bits: 1 + k,
            sample_count: 2,
            rotator_kind: RotatorKind::Kac,
            keep_raw: false,
            kmeans_max_iter: 5,
        };
        Codebook::train(&samples, dim, &params, 42).unwrap()
    }

    #[test]
    fn self_distance_is_near_zero() {
        let codebook = tiny_codebook(8, 3);
        let x = vec![1.0f32, -0.5, 0.25, 0.75, -1.0, 0.1, 0.3, -0.2];
        let encoded = encode(&codebook, &x);
        let query = QueryEntity::build(&codebook, &x);
        let (dist, err_bound) = estimate(&encoded, &query, codebook.residual_bits);
        assert!(dist <= err_bound * err_bound + 1.0, "dist={dist} err_bound={err_bound}");
    }

    #[test]
    fn farther_point_estimates_larger_distance() {
        let codebook = tiny_codebook(8, 3);
        let near = vec![1.0f32, -0.5, 0.25, 0.75, -1.0, 0.1, 0.3, -0.2];
        let far = vec![-1.0f32, 0.5, -0.25, -0.75, 1.0, -0.1, -0.3, 0.2];
        let encoded_near = encode(&codebook, &near);
        let encoded_far = encode(&codebook, &far);
        let query = QueryEntity::build(&codebook, &near);
        let (dist_near, _) = estimate(&encoded_near, &query, codebook.residual_bits);
        let (dist_far, _) = estimate(&encoded_far, &query, codebook.residual_bits);
        assert!(dist_far > dist_near);
    }
}
