//! Vectorized accumulator operations.
//!
//! Delta application is a saturating i16 add/subtract over the 512-wide
//! accumulator; the forward pass clamps each lane at zero and
//! multiply-accumulates into int32 with wrapping adds. All three paths
//! (AVX2, NEON, scalar) produce bit-identical results: i32 addition wraps
//! identically regardless of lane grouping.

use super::network::HIDDEN;

/// `acc[i] = sat(acc[i] + weights[i])`.
#[inline]
pub fn add_weights(acc: &mut [i16; HIDDEN], weights: &[i16]) {
    debug_assert_eq!(weights.len(), HIDDEN);
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { add_weights_neon(acc, weights) }
    }
    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { add_weights_avx2(acc, weights) }
    }
    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx2")))]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { add_weights_avx2(acc, weights) }
        } else {
            add_weights_scalar(acc, weights);
        }
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        add_weights_scalar(acc, weights);
    }
}

/// `acc[i] = sat(acc[i] - weights[i])`.
#[inline]
pub fn sub_weights(acc: &mut [i16; HIDDEN], weights: &[i16]) {
    debug_assert_eq!(weights.len(), HIDDEN);
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { sub_weights_neon(acc, weights) }
    }
    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { sub_weights_avx2(acc, weights) }
    }
    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx2")))]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { sub_weights_avx2(acc, weights) }
        } else {
            sub_weights_scalar(acc, weights);
        }
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        sub_weights_scalar(acc, weights);
    }
}

/// `sum(max(acc[i], 0) * weights[i])` accumulated into wrapping int32.
#[inline]
#[must_use]
pub fn relu_dot(acc: &[i16; HIDDEN], weights: &[i16]) -> i32 {
    debug_assert_eq!(weights.len(), HIDDEN);
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { relu_dot_neon(acc, weights) }
    }
    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { relu_dot_avx2(acc, weights) }
    }
    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx2")))]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { relu_dot_avx2(acc, weights) }
        } else {
            relu_dot_scalar(acc, weights)
        }
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        relu_dot_scalar(acc, weights)
    }
}

// ----------------------------------------------------------------------
// Scalar fallbacks
// ----------------------------------------------------------------------

#[cfg(any(
    test,
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    all(target_arch = "x86_64", not(target_feature = "avx2"))
))]
fn add_weights_scalar(acc: &mut [i16; HIDDEN], weights: &[i16]) {
    for (a, &w) in acc.iter_mut().zip(weights) {
        *a = a.saturating_add(w);
    }
}

#[cfg(any(
    test,
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    all(target_arch = "x86_64", not(target_feature = "avx2"))
))]
fn sub_weights_scalar(acc: &mut [i16; HIDDEN], weights: &[i16]) {
    for (a, &w) in acc.iter_mut().zip(weights) {
        *a = a.saturating_sub(w);
    }
}

#[cfg(any(
    test,
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    all(target_arch = "x86_64", not(target_feature = "avx2"))
))]
fn relu_dot_scalar(acc: &[i16; HIDDEN], weights: &[i16]) -> i32 {
    let mut sum = 0i32;
    for (&a, &w) in acc.iter().zip(weights) {
        let activated = i32::from(a).max(0);
        sum = sum.wrapping_add(activated.wrapping_mul(i32::from(w)));
    }
    sum
}

// ----------------------------------------------------------------------
// NEON (aarch64)
// ----------------------------------------------------------------------

#[cfg(target_arch = "aarch64")]
unsafe fn add_weights_neon(acc: &mut [i16; HIDDEN], weights: &[i16]) {
    use std::arch::aarch64::{vld1q_s16, vqaddq_s16, vst1q_s16};
    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in (0..HIDDEN).step_by(8) {
        let a = vld1q_s16(acc_ptr.add(i));
        let w = vld1q_s16(w_ptr.add(i));
        vst1q_s16(acc_ptr.add(i), vqaddq_s16(a, w));
    }
}

#[cfg(target_arch = "aarch64")]
unsafe fn sub_weights_neon(acc: &mut [i16; HIDDEN], weights: &[i16]) {
    use std::arch::aarch64::{vld1q_s16, vqsubq_s16, vst1q_s16};
    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in (0..HIDDEN).step_by(8) {
        let a = vld1q_s16(acc_ptr.add(i));
        let w = vld1q_s16(w_ptr.add(i));
        vst1q_s16(acc_ptr.add(i), vqsubq_s16(a, w));
    }
}

#[cfg(target_arch = "aarch64")]
unsafe fn relu_dot_neon(acc: &[i16; HIDDEN], weights: &[i16]) -> i32 {
    use std::arch::aarch64::{
        vaddq_s32, vaddvq_s32, vdupq_n_s16, vdupq_n_s32, vget_high_s16, vget_low_s16,
        vld1q_s16, vmaxq_s16, vmlal_s16,
    };
    let acc_ptr = acc.as_ptr();
    let w_ptr = weights.as_ptr();
    let zero = vdupq_n_s16(0);
    let mut sum0 = vdupq_n_s32(0);
    let mut sum1 = vdupq_n_s32(0);
    for i in (0..HIDDEN).step_by(8) {
        let a = vmaxq_s16(vld1q_s16(acc_ptr.add(i)), zero);
        let w = vld1q_s16(w_ptr.add(i));
        sum0 = vmlal_s16(sum0, vget_low_s16(a), vget_low_s16(w));
        sum1 = vmlal_s16(sum1, vget_high_s16(a), vget_high_s16(w));
    }
    vaddvq_s32(vaddq_s32(sum0, sum1))
}

// ----------------------------------------------------------------------
// AVX2 (x86_64)
// ----------------------------------------------------------------------

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn add_weights_avx2(acc: &mut [i16; HIDDEN], weights: &[i16]) {
    use std::arch::x86_64::*;
    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in (0..HIDDEN).step_by(16) {
        let a = _mm256_loadu_si256(acc_ptr.add(i) as *const __m256i);
        let w = _mm256_loadu_si256(w_ptr.add(i) as *const __m256i);
        _mm256_storeu_si256(acc_ptr.add(i) as *mut __m256i, _mm256_adds_epi16(a, w));
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn sub_weights_avx2(acc: &mut [i16; HIDDEN], weights: &[i16]) {
    use std::arch::x86_64::*;
    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in (0..HIDDEN).step_by(16) {
        let a = _mm256_loadu_si256(acc_ptr.add(i) as *const __m256i);
        let w = _mm256_loadu_si256(w_ptr.add(i) as *const __m256i);
        _mm256_storeu_si256(acc_ptr.add(i) as *mut __m256i, _mm256_subs_epi16(a, w));
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn relu_dot_avx2(acc: &[i16; HIDDEN], weights: &[i16]) -> i32 {
    use std::arch::x86_64::*;
    let acc_ptr = acc.as_ptr();
    let w_ptr = weights.as_ptr();
    let zero = _mm256_setzero_si256();
    let mut sum = _mm256_setzero_si256();
    for i in (0..HIDDEN).step_by(16) {
        let a = _mm256_max_epi16(_mm256_loadu_si256(acc_ptr.add(i) as *const __m256i), zero);
        let w = _mm256_loadu_si256(w_ptr.add(i) as *const __m256i);
        // Activated lanes are non-negative i16, so the pairwise madd
        // cannot overflow its i32 lanes.
        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(a, w));
    }
    let mut lanes = [0i32; 8];
    _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, sum);
    lanes.iter().fold(0i32, |t, &x| t.wrapping_add(x))
}
