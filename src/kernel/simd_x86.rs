//! AVX2 specializations for the dense float kernels.
//!
//! Follows the teacher's `metric/simd.rs` idiom: a `#[target_feature]`
//! unsafe fn doing the real work, wrapped by a safe fn that the dispatch
//! table only ever calls after `is_x86_feature_detected!("avx2")` has been
//! checked once at construction time.

#![cfg(any(target_arch = "x86_64", target_arch = "x86"))]

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Squared Euclidean between two equal-length f32 slices, AVX2 8-wide.
///
/// # Safety
/// Caller must have verified `is_x86_feature_detected!("avx2")`.
#[target_feature(enable = "avx2")]
#[cfg(target_arch = "x86_64")]
pub unsafe fn l2_squared_f32_avx2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let mut acc0 = _mm256_setzero_ps();
    let mut acc1 = _mm256_setzero_ps();
    let mut i = 0usize;
    while i + 16 <= n {
        let a0 = _mm256_loadu_ps(a.as_ptr().add(i));
        let b0 = _mm256_loadu_ps(b.as_ptr().add(i));
        let d0 = _mm256_sub_ps(a0, b0);
        acc0 = _mm256_fmadd_ps(d0, d0, acc0);

        let a1 = _mm256_loadu_ps(a.as_ptr().add(i + 8));
        let b1 = _mm256_loadu_ps(b.as_ptr().add(i + 8));
        let d1 = _mm256_sub_ps(a1, b1);
        acc1 = _mm256_fmadd_ps(d1, d1, acc1);
        i += 16;
    }
    while i + 8 <= n {
        let av = _mm256_loadu_ps(a.as_ptr().add(i));
        let bv = _mm256_loadu_ps(b.as_ptr().add(i));
        let d = _mm256_sub_ps(av, bv);
        acc0 = _mm256_fmadd_ps(d, d, acc0);
        i += 8;
    }
    let acc = _mm256_add_ps(acc0, acc1);
    let mut buf = [0f32; 8];
    _mm256_storeu_ps(buf.as_mut_ptr(), acc);
    let mut total: f32 = buf.iter().sum();
    while i < n {
        let d = a[i] - b[i];
        total += d * d;
        i += 1;
    }
    total
}

/// Raw dot product, AVX2 8-wide.
///
/// # Safety
/// Caller must have verified `is_x86_feature_detected!("avx2")`.
#[target_feature(enable = "avx2")]
#[cfg(target_arch = "x86_64")]
pub unsafe fn dot_f32_avx2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let mut acc = _mm256_setzero_ps();
    let mut i = 0usize;
    while i + 8 <= n {
        let av = _mm256_loadu_ps(a.as_ptr().add(i));
        let bv = _mm256_loadu_ps(b.as_ptr().add(i));
        acc = _mm256_fmadd_ps(av, bv, acc);
        i += 8;
    }
    let mut buf = [0f32; 8];
    _mm256_storeu_ps(buf.as_mut_ptr(), acc);
    let mut total: f32 = buf.iter().sum();
    while i < n {
        total += a[i] * b[i];
        i += 1;
    }
    total
}

/// Hamming distance over packed bytes, AVX2 popcount-via-lookup.
///
/// # Safety
/// Caller must have verified `is_x86_feature_detected!("avx2")`.
#[target_feature(enable = "avx2")]
#[cfg(target_arch = "x86_64")]
pub unsafe fn hamming_u8_avx2(a: &[u8], b: &[u8]) -> f32 {
    // Popcount via nibble LUT broadcast, matching the scalar path exactly.
    debug_assert_eq!(a.len(), b.len());
    const LUT: [u8; 16] = [0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4];
    let lut = _mm256_broadcastsi128_si256(_mm_loadu_si128(LUT.as_ptr().cast()));
    let low_mask = _mm256_set1_epi8(0x0F);
    let n = a.len();
    let mut acc = _mm256_setzero_si256();
    let mut i = 0usize;
    while i + 32 <= n {
        let av = _mm256_loadu_si256(a.as_ptr().add(i).cast());
        let bv = _mm256_loadu_si256(b.as_ptr().add(i).cast());
        let x = _mm256_xor_si256(av, bv);
        let lo = _mm256_and_si256(x, low_mask);
        let hi = _mm256_and_si256(_mm256_srli_epi16(x, 4), low_mask);
        let cnt = _mm256_add_epi8(_mm256_shuffle_epi8(lut, lo), _mm256_shuffle_epi8(lut, hi));
        acc = _mm256_add_epi64(acc, _mm256_sad_epu8(cnt, _mm256_setzero_si256()));
        i += 32;
    }
    let mut buf = [0u64; 4];
    _mm256_storeu_si256(buf.as_mut_ptr().cast(), acc);
    let mut total: u32 = buf.iter().sum::<u64>() as u32;
    while i < n {
        total += (a[i] ^ b[i]).count_ones();
        i += 1;
    }
    total as f32
}

/// Runs `kernel` over an M×N block, broadcasting each query against every
/// database row. Generic tiling driver backing every nominal block shape
/// not given its own hand-unrolled specialization.
pub fn tile_block_f32<F: Fn(&[f32], &[f32]) -> f32>(
    db_rows: &[&[f32]],
    queries: &[&[f32]],
    out_col_major: &mut [f32],
    kernel: F,
) {
    let m = db_rows.len();
    for (n, q) in queries.iter().enumerate() {
        for (mi, row) in db_rows.iter().enumerate() {
            out_col_major[n * m + mi] = kernel(row, q);
        }
    }
}

#[cfg(all(test, target_arch = "x86_64"))]
mod tests {
    use super::*;
    use crate::kernel::scalar;

    #[test]
    fn avx2_l2_matches_scalar() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let a: Vec<f32> = (0..37).map(|i| i as f32 * 0.5).collect();
        let b: Vec<f32> = (0..37).map(|i| (36 - i) as f32 * 0.25).collect();
        let scalar = scalar::l2_squared_f32(&a, &b);
        let simd = unsafe { l2_squared_f32_avx2(&a, &b) };
        assert!((scalar - simd).abs() < 1e-2, "{scalar} vs {simd}");
    }

    #[test]
    fn avx2_hamming_matches_scalar() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let a: Vec<u8> = (0..40).map(|i| (i * 7) as u8).collect();
        let b: Vec<u8> = (0..40).map(|i| (i * 13) as u8).collect();
        let scalar = scalar::hamming_u8(&a, &b);
        let simd = unsafe { hamming_u8_avx2(&a, &b) };
        assert_eq!(scalar, simd);
    }
}
