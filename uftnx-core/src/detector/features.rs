//! Per-sample feature extraction.
//!
//! One delta trace and one local sigma trace feed every scale:
//!
//! ```text
//! delta[i]   = x[i] - x[i-1]
//! sigma[i]   = MAD over trailing window (block-wise) or one global MAD
//! env[s][i]  = trailing RMS of x over scale window s
//! snr[s][i]  = clamp(20·log10(|delta[i]| / sigma[i]), floor, ceil)
//! ```
//!
//! Polarity is read from the signs of significant deltas (`|delta| > 3σ`) in
//! a half-window around each sample.

use serde::{Deserialize, Serialize};

use super::DetectorConfig;
use crate::{
    constants::{MAX_SCALES, POLARITY_SIGMA_MULT},
    errors::{try_buffer, AnalysisError, AnalysisResult},
    events::Polarity,
    stats,
};

/// Features of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Input amplitude
    pub amp: f32,
    /// First difference (`0` at index 0)
    pub delta: f32,
    /// Trailing RMS per scale; unused scales stay 0
    pub env_rms: [f32; MAX_SCALES],
    /// SNR per scale; unused scales stay at the floor
    pub snr_db: [f32; MAX_SCALES],
    /// Maximum SNR over the configured scales
    pub max_snr_db: f32,
    /// Scale that produced `max_snr_db`
    pub best_scale: u8,
    /// Robust noise sigma used for this sample
    pub noise_sigma: f32,
    /// Local sign pattern
    pub polarity: Polarity,
}

impl FeatureVector {
    fn blank(amp: f32, delta: f32, sigma: f32, floor: f32) -> Self {
        Self {
            amp,
            delta,
            env_rms: [0.0; MAX_SCALES],
            snr_db: [floor; MAX_SCALES],
            max_snr_db: floor,
            best_scale: 0,
            noise_sigma: sigma,
            polarity: Polarity::Flat,
        }
    }
}

/// Compute features for every sample of `x`.
pub fn extract_features(x: &[f32], cfg: &DetectorConfig) -> AnalysisResult<Vec<FeatureVector>> {
    let n = x.len();
    let mut delta = try_buffer(n, 0.0f32)?;
    stats::delta_into(x, &mut delta);

    let mut sigma = try_buffer(n, 0.0f32)?;
    if cfg.local_sigma {
        stats::local_sigma_into(
            &delta,
            cfg.sigma_window,
            cfg.sigma_stride,
            cfg.mad_scale,
            cfg.sigma_min,
            &mut sigma,
        );
    } else {
        let global = stats::mad_sigma(&delta, cfg.mad_scale).max(cfg.sigma_min);
        sigma.fill(global);
    }

    let mut features = Vec::new();
    features
        .try_reserve_exact(n)
        .map_err(|_| AnalysisError::NoMemory { requested: n })?;
    features.extend(
        (0..n).map(|i| FeatureVector::blank(x[i], delta[i], sigma[i], cfg.snr_floor_db)),
    );

    let mut env = try_buffer(n, 0.0f32)?;
    for (s, &window) in cfg.scales.iter().enumerate() {
        stats::trailing_rms_into(x, window, &mut env);

        for (i, f) in features.iter_mut().enumerate() {
            f.env_rms[s] = env[i];
            let sig = sigma[i].max(cfg.sigma_min);
            let snr = snr_db(delta[i], sig, cfg.snr_floor_db, cfg.snr_ceil_db);
            f.snr_db[s] = snr;
            if snr > f.max_snr_db {
                f.max_snr_db = snr;
                f.best_scale = s as u8;
            }
        }
    }

    for (i, f) in features.iter_mut().enumerate() {
        f.polarity = detect_polarity(&delta, i, cfg.polarity_halfwin, sigma[i]);
    }

    Ok(features)
}

/// `20·log10(|delta| / sigma)` clamped into `[floor, ceil]`; non-finite
/// values map to the floor.
#[inline]
pub fn snr_db(delta: f32, sigma: f32, floor: f32, ceil: f32) -> f32 {
    let snr = 20.0 * libm::log10f(delta.abs() / sigma);
    if !snr.is_finite() {
        return floor;
    }
    stats::clamp(snr, floor, ceil)
}

/// Classify the sign pattern of significant deltas around `idx`.
pub fn detect_polarity(delta: &[f32], idx: usize, halfwin: usize, sigma: f32) -> Polarity {
    let n = delta.len();
    let halfwin = halfwin.max(1);
    let thr = sigma * POLARITY_SIGMA_MULT;

    let lo = idx.saturating_sub(halfwin);
    let hi = (idx + halfwin).min(n - 1);
    if hi - lo + 1 < 3 {
        return Polarity::Flat;
    }

    let sign = |d: f32| -> i8 {
        if d > thr {
            1
        } else if d < -thr {
            -1
        } else {
            0
        }
    };

    let (mut pos, mut neg, mut changes) = (0usize, 0usize, 0usize);
    let mut prev = 0i8;
    for &d in &delta[lo..=hi] {
        let s = sign(d);
        match s {
            1 => pos += 1,
            -1 => neg += 1,
            _ => continue,
        }
        if prev != 0 && s != prev {
            changes += 1;
        }
        prev = s;
    }

    let total = pos + neg;
    if total == 0 {
        return Polarity::Flat;
    }
    if changes >= 3 && total >= 4 {
        return Polarity::Oscillate;
    }

    let center = sign(delta[idx]);
    if center > 0 && neg >= 2 && pos <= 3 {
        Polarity::SpikeStep
    } else if center > 0 && pos >= 1 && neg <= 1 {
        Polarity::SpikePos
    } else if center < 0 && neg >= 1 && pos <= 1 {
        Polarity::SpikeNeg
    } else if neg > pos * 2 {
        Polarity::StepDown
    } else if pos > neg * 2 {
        Polarity::StepUp
    } else {
        Polarity::Flat
    }
}
