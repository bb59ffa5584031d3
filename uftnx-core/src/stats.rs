//! Robust Statistics Kernel
//!
//! ## Overview
//!
//! Pure helper functions shared by every analysis component: clamping, float
//! ordering, medians, the median-absolute-deviation sigma estimator, trailing
//! RMS envelopes and block-wise local sigma traces.
//!
//! ## Design Principles
//!
//! ### 1. Pure Functions
//! No function here keeps state between calls. Outputs are returned by value
//! or written into a caller-provided slice.
//!
//! ### 2. Robust Noise Floor
//! Signal traces from worn media are full of outliers (dropouts, spikes), so
//! the noise floor is estimated with MAD instead of standard deviation:
//!
//! ```text
//! med   = median(x)
//! MAD   = median(|x - med|)
//! sigma = scale * MAD          (scale = 1.4826 for Gaussian consistency)
//! ```
//!
//! ### 3. O(n) Envelopes
//! The trailing RMS keeps a running sum of squares that is incremented with the
//! newest sample and decremented with the one leaving the window. Partial
//! windows at the start divide by the number of samples actually seen.

use core::cmp::Ordering;

/// Clamp `x` into `[lo, hi]`. NaN maps to `lo`.
#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x.is_nan() {
        return lo;
    }
    x.max(lo).min(hi)
}

/// Ascending total order for floats, usable with `sort_by`.
#[inline]
pub fn cmp_f32_asc(a: &f32, b: &f32) -> Ordering {
    a.total_cmp(b)
}

/// Descending total order for floats.
#[inline]
pub fn cmp_f32_desc(a: &f32, b: &f32) -> Ordering {
    b.total_cmp(a)
}

/// Absolute-tolerance float comparison.
#[inline]
pub fn approx_eq(a: f32, b: f32, tolerance: f32) -> bool {
    (a - b).abs() <= tolerance
}

/// Median of an already sorted slice. Even lengths average the two central
/// values; an empty slice yields 0.
pub fn median_sorted(sorted: &[f32]) -> f32 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Sorts `values` in place and returns their median.
pub fn median_in_place(values: &mut [f32]) -> f32 {
    values.sort_unstable_by(cmp_f32_asc);
    median_sorted(values)
}

/// MAD-based sigma of `x`, allocating a temporary copy.
pub fn mad_sigma(x: &[f32], scale: f32) -> f32 {
    let mut scratch = Vec::with_capacity(x.len());
    mad_sigma_with(&mut scratch, x, scale)
}

/// MAD-based sigma of `x` using `scratch` as the sort buffer.
///
/// The scratch vector is cleared and refilled, so one buffer can be reused
/// across many windows without reallocating.
pub fn mad_sigma_with(scratch: &mut Vec<f32>, x: &[f32], scale: f32) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    scratch.clear();
    scratch.extend_from_slice(x);
    let med = median_in_place(scratch);

    for v in scratch.iter_mut() {
        *v = (*v - med).abs();
    }
    let mad = median_in_place(scratch);
    scale * mad
}

/// Trailing RMS over `window` samples, written into `out`.
///
/// `out` must be at least as long as `x`; extra entries are left untouched.
/// A zero window is treated as one.
pub fn trailing_rms_into(x: &[f32], window: usize, out: &mut [f32]) {
    let window = window.max(1);
    let mut sumsq = 0.0f64;
    let mut tail = 0usize;

    for (i, &v) in x.iter().enumerate() {
        let v = v as f64;
        sumsq += v * v;
        if i + 1 > window {
            let u = x[tail] as f64;
            sumsq -= u * u;
            tail += 1;
        }
        // Running subtraction can drift a hair below zero
        let cur = (i + 1).min(window) as f64;
        out[i] = libm::sqrt(sumsq.max(0.0) / cur) as f32;
    }
}

/// Trailing RMS over `window` samples.
pub fn trailing_rms(x: &[f32], window: usize) -> Vec<f32> {
    let mut out = vec![0.0; x.len()];
    trailing_rms_into(x, window, &mut out);
    out
}

/// Block-wise local sigma trace.
///
/// The trace is piecewise constant: every `stride` samples a new sigma is
/// estimated with MAD over the trailing `window` samples that end at the last
/// sample of the block, and that value fills the whole block. Values below
/// `sigma_min` are raised to it.
///
/// Anchoring the window at the block's last sample rather than its first
/// means the first block is estimated from up to `stride` samples instead of
/// a single one, and a block's sigma already includes any edge inside it.
pub fn local_sigma_into(
    x: &[f32],
    window: usize,
    stride: usize,
    scale: f32,
    sigma_min: f32,
    out: &mut [f32],
) {
    let n = x.len();
    let window = window.max(1);
    let stride = stride.max(1);
    let mut scratch = Vec::with_capacity(window.min(n));

    let mut i = 0;
    while i < n {
        let block_end = (i + stride).min(n);
        let start = block_end.saturating_sub(window);
        let sigma = mad_sigma_with(&mut scratch, &x[start..block_end], scale).max(sigma_min);
        out[i..block_end].fill(sigma);
        i = block_end;
    }
}

/// Value at quantile `q` (0..=1) using nearest rank on a sorted copy.
pub fn percentile(x: &[f32], q: f32) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    let mut sorted = x.to_vec();
    sorted.sort_unstable_by(cmp_f32_asc);
    let q = clamp(q, 0.0, 1.0);
    let idx = libm::roundf(q * (sorted.len() - 1) as f32) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(x: &[f32]) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    let sum: f64 = x.iter().map(|&v| v as f64).sum();
    (sum / x.len() as f64) as f32
}

/// First difference trace with `delta[0] = 0`.
pub fn delta_into(x: &[f32], out: &mut [f32]) {
    if x.is_empty() {
        return;
    }
    out[0] = 0.0;
    for i in 1..x.len() {
        out[i] = x[i] - x[i - 1];
    }
}
