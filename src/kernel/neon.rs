//! aarch64 NEON specializations, grounded on the teacher's `simd/neon.rs`
//! and `simd/popcount.rs`.

#![cfg(target_arch = "aarch64")]

use std::arch::aarch64::*;

/// Squared Euclidean, NEON 4-wide.
///
/// # Safety
/// Caller must have verified `is_aarch64_feature_detected!("neon")` (always
/// true on any mainstream aarch64 target, but checked for uniformity with
/// the x86 dispatch path).
#[target_feature(enable = "neon")]
pub unsafe fn l2_squared_f32_neon(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let mut acc = vdupq_n_f32(0.0);
    let mut i = 0usize;
    while i + 4 <= n {
        let av = vld1q_f32(a.as_ptr().add(i));
        let bv = vld1q_f32(b.as_ptr().add(i));
        let d = vsubq_f32(av, bv);
        acc = vfmaq_f32(acc, d, d);
        i += 4;
    }
    let mut total = vaddvq_f32(acc);
    while i < n {
        let d = a[i] - b[i];
        total += d * d;
        i += 1;
    }
    total
}

/// Hamming distance over packed bytes, NEON popcount.
///
/// # Safety
/// Caller must have verified `is_aarch64_feature_detected!("neon")`.
#[target_feature(enable = "neon")]
pub unsafe fn hamming_u8_neon(a: &[u8], b: &[u8]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let mut acc = vdupq_n_u8(0);
    let mut i = 0usize;
    let mut total: u32 = 0;
    while i + 16 <= n {
        let av = vld1q_u8(a.as_ptr().add(i));
        let bv = vld1q_u8(b.as_ptr().add(i));
        let x = veorq_u8(av, bv);
        let popcnt = vcntq_u8(x);
        acc = vaddq_u8(acc, popcnt);
        i += 16;
        if i % (16 * 255) == 0 {
            total += vaddvq_u8(acc) as u32;
            acc = vdupq_n_u8(0);
        }
    }
    total += vaddvq_u8(acc) as u32;
    while i < n {
        total += (a[i] ^ b[i]).count_ones();
        i += 1;
    }
    total as f32
}
