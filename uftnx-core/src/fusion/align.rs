//! Revolution Alignment and Median Fusion
//!
//! ## Overview
//!
//! A track read several times (one pass per revolution) gives `m` traces of
//! the same physical signal, each offset by a few samples of index jitter.
//! They are aligned to one reference, fused sample by sample, and checked for
//! label agreement:
//!
//! ```text
//! rev 0 ──┐                  ┌─ aligned 0 ──┐
//! rev 1 ──┼─ NCC lag search ─┼─ aligned 1 ──┼─ median ─→ fused
//! rev m ──┘   (vs reference) └─ aligned m ──┘
//! ```
//!
//! ## Correlation Score
//!
//! For each lag `L` in `[-max_lag, +max_lag]`:
//!
//! ```text
//!            Σ target[i] · ref[i + L]        (overlap only)
//! ncc(L) = ──────────────────────────
//!            ‖target‖ · ‖ref‖                (full-length norms)
//! ```
//!
//! The full-length denominator scores large shifts lower than an
//! overlap-normalised NCC would. Lags whose overlap is under
//! [`ALIGN_MIN_OVERLAP`] samples are skipped; ties keep the first lag seen,
//! scanning from `-max_lag` upward.
//!
//! ## Shift Convention
//!
//! The returned lag is the correction: `apply_shift(target, lag)[i] ==
//! target[i - lag]` lines the target up with the reference. A target delayed
//! by `+s` samples yields `-s`. Shifting pads with zeros, never wraps.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    errors::{try_buffer, AnalysisError, AnalysisResult},
    stats,
    traits::Sample,
};

/// Alignment configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Lag search radius in samples
    pub max_lag: usize,
    /// Fixed reference revolution
    pub reference: usize,
    /// Pick the revolution with the highest energy as reference instead
    pub auto_reference: bool,
    /// NCC above which a revolution counts as validly aligned
    pub ncc_valid_threshold: f32,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            max_lag: DEFAULT_MAX_LAG,
            reference: 0,
            auto_reference: false,
            ncc_valid_threshold: NCC_VALID_THRESHOLD,
        }
    }
}

/// Best lag and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftEstimate {
    /// Correction to apply to the target
    pub shift: isize,
    /// NCC at that lag
    pub score: f32,
}

/// Search `[-max_lag, +max_lag]` for the lag that best lines `target` up
/// with `reference`. Both slices must have the same length.
pub fn estimate_shift(reference: &[f32], target: &[f32], max_lag: usize) -> ShiftEstimate {
    let n = reference.len().min(target.len());
    let norm = |x: &[f32]| libm::sqrt(x.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>());
    let denom = norm(&reference[..n]) * norm(&target[..n]);

    let mut best = ShiftEstimate { shift: 0, score: 0.0 };
    if denom <= 0.0 {
        return best;
    }

    let max_lag = max_lag.min(n.saturating_sub(ALIGN_MIN_OVERLAP)) as isize;
    let mut best_score = f64::NEG_INFINITY;

    for lag in -max_lag..=max_lag {
        let overlap = n - lag.unsigned_abs();
        if overlap < ALIGN_MIN_OVERLAP {
            continue;
        }
        // target[i] pairs with reference[i + lag]
        let (t_start, r_start) = if lag >= 0 {
            (0, lag as usize)
        } else {
            (lag.unsigned_abs(), 0)
        };
        let dot: f64 = target[t_start..t_start + overlap]
            .iter()
            .zip(&reference[r_start..r_start + overlap])
            .map(|(&t, &r)| t as f64 * r as f64)
            .sum();
        let score = dot / denom;
        if score > best_score {
            best_score = score;
            best = ShiftEstimate {
                shift: lag,
                score: score as f32,
            };
        }
    }
    best
}

/// Shift `x` by `shift` samples with zero padding: `out[i] = x[i - shift]`.
pub fn apply_shift(x: &[f32], shift: isize) -> Vec<f32> {
    let n = x.len();
    let mut out = vec![0.0; n];
    let k = shift.unsigned_abs().min(n);
    if shift >= 0 {
        out[k..].copy_from_slice(&x[..n - k]);
    } else {
        out[..n - k].copy_from_slice(&x[k..]);
    }
    out
}

/// Element-wise median across equal-length buffers. Even counts average the
/// two central values.
pub fn fuse_median<R: AsRef<[f32]>>(buffers: &[R]) -> AnalysisResult<Vec<f32>> {
    let first = buffers
        .first()
        .ok_or(AnalysisError::MissingInput { what: "revolutions" })?;
    let n = first.as_ref().len();
    for b in buffers {
        if b.as_ref().len() != n {
            return Err(AnalysisError::LengthMismatch {
                expected: n,
                actual: b.as_ref().len(),
            });
        }
    }

    let mut fused = try_buffer(n, 0.0f32)?;
    let mut column = Vec::with_capacity(buffers.len());
    for (i, out) in fused.iter_mut().enumerate() {
        column.clear();
        column.extend(buffers.iter().map(|b| b.as_ref()[i]));
        *out = stats::median_in_place(&mut column);
    }
    Ok(fused)
}

/// Per-sample label agreement across revolutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    /// Share of revolutions voting for the most frequent label
    pub agreement: Vec<f32>,
    /// `1 - Σ p²` over label frequencies
    pub disagreement: Vec<f32>,
    /// Mean of `agreement`
    pub mean_agreement: f32,
}

/// Label agreement for `m` per-revolution label traces with values in
/// `[0, num_classes)`.
pub fn stability<R: AsRef<[u8]>>(labels: &[R], num_classes: usize) -> AnalysisResult<StabilityReport> {
    let m = labels.len();
    AnalysisError::ensure_len(m, ALIGN_MIN_REVOLUTIONS)?;
    if num_classes == 0 || num_classes > 256 {
        return Err(AnalysisError::InvalidConfig {
            reason: "class count must be in 1..=256",
        });
    }
    let n = labels[0].as_ref().len();
    if n == 0 {
        return Err(AnalysisError::MissingInput { what: "labels" });
    }
    for l in labels {
        let l = l.as_ref();
        if l.len() != n {
            return Err(AnalysisError::LengthMismatch {
                expected: n,
                actual: l.len(),
            });
        }
        if l.iter().any(|&c| c as usize >= num_classes) {
            return Err(AnalysisError::InvalidConfig {
                reason: "label outside class range",
            });
        }
    }

    let mut agreement = try_buffer(n, 0.0f32)?;
    let mut disagreement = try_buffer(n, 0.0f32)?;
    let mut counts = vec![0usize; num_classes];

    for i in 0..n {
        counts.fill(0);
        for l in labels {
            counts[l.as_ref()[i] as usize] += 1;
        }
        let mode = counts.iter().copied().max().unwrap_or(0);
        let sum_p2: f32 = counts
            .iter()
            .map(|&c| {
                let p = c as f32 / m as f32;
                p * p
            })
            .sum();
        agreement[i] = mode as f32 / m as f32;
        disagreement[i] = stats::clamp(1.0 - sum_p2, 0.0, 1.0);
    }

    let mean_agreement = stats::mean(&agreement);
    Ok(StabilityReport {
        agreement,
        disagreement,
        mean_agreement,
    })
}

/// Alignment diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// Reference revolution index
    pub reference: usize,
    /// Correction applied to each revolution (0 for the reference)
    pub shifts: Vec<isize>,
    /// NCC per revolution (1 for the reference)
    pub scores: Vec<f32>,
    /// Mean NCC across revolutions
    pub mean_ncc: f32,
    /// Lowest NCC across revolutions
    pub worst_ncc: f32,
    /// Largest `|shift|`
    pub max_abs_shift: usize,
    /// Revolutions whose NCC exceeds the validity threshold
    pub valid_count: usize,
    /// `mean_ncc × valid_count / m`
    pub quality: f32,
}

/// Aligned revolutions, their median and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    /// Each revolution shifted onto the reference
    pub aligned: Vec<Vec<f32>>,
    /// Element-wise median of `aligned`
    pub fused: Vec<f32>,
    /// Diagnostics
    pub report: AlignmentReport,
}

/// Multi-revolution aligner.
#[derive(Debug, Clone, Default)]
pub struct Aligner {
    config: AlignConfig,
}

impl Aligner {
    /// Create an aligner.
    pub fn new(config: AlignConfig) -> AnalysisResult<Self> {
        if !config.ncc_valid_threshold.is_finite() {
            return Err(AnalysisError::InvalidConfig {
                reason: "NCC validity threshold must be finite",
            });
        }
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Align revolutions in any accepted encoding.
    pub fn align_samples<T: Sample, R: AsRef<[T]>>(&self, revolutions: &[R]) -> AnalysisResult<AlignmentResult> {
        let converted: Vec<Vec<f32>> = revolutions
            .iter()
            .map(|r| T::normalize(r.as_ref()).into_owned())
            .collect();
        self.align(&converted)
    }

    /// Align every revolution to the reference and fuse them.
    pub fn align<R: AsRef<[f32]>>(&self, revolutions: &[R]) -> AnalysisResult<AlignmentResult> {
        let m = revolutions.len();
        AnalysisError::ensure_len(m, ALIGN_MIN_REVOLUTIONS)?;
        if revolutions.iter().any(|r| r.as_ref().is_empty()) {
            return Err(AnalysisError::MissingInput { what: "revolution" });
        }
        let n = revolutions[0].as_ref().len();
        AnalysisError::ensure_len(n, ALIGN_MIN_SAMPLES)?;
        for r in revolutions {
            if r.as_ref().len() != n {
                return Err(AnalysisError::LengthMismatch {
                    expected: n,
                    actual: r.as_ref().len(),
                });
            }
        }

        let reference = self.pick_reference(revolutions)?;
        let ref_buf = revolutions[reference].as_ref();

        let mut aligned = Vec::with_capacity(m);
        let mut shifts = Vec::with_capacity(m);
        let mut scores = Vec::with_capacity(m);
        for (k, rev) in revolutions.iter().enumerate() {
            if k == reference {
                aligned.push(ref_buf.to_vec());
                shifts.push(0);
                scores.push(1.0);
                continue;
            }
            let est = estimate_shift(ref_buf, rev.as_ref(), self.config.max_lag);
            aligned.push(apply_shift(rev.as_ref(), est.shift));
            shifts.push(est.shift);
            scores.push(est.score);
        }

        let fused = fuse_median(&aligned)?;

        let mean_ncc = stats::mean(&scores);
        let worst_ncc = scores.iter().copied().fold(f32::INFINITY, f32::min);
        let max_abs_shift = shifts.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        let valid_count = scores
            .iter()
            .filter(|&&s| s > self.config.ncc_valid_threshold)
            .count();
        let quality = mean_ncc * valid_count as f32 / m as f32;

        debug!(
            "alignment: m={} n={} reference={} mean_ncc={:.3} max_shift={}",
            m, n, reference, mean_ncc, max_abs_shift
        );

        Ok(AlignmentResult {
            aligned,
            fused,
            report: AlignmentReport {
                reference,
                shifts,
                scores,
                mean_ncc,
                worst_ncc,
                max_abs_shift,
                valid_count,
                quality,
            },
        })
    }

    fn pick_reference<R: AsRef<[f32]>>(&self, revolutions: &[R]) -> AnalysisResult<usize> {
        if !self.config.auto_reference {
            if self.config.reference >= revolutions.len() {
                return Err(AnalysisError::InvalidConfig {
                    reason: "reference index out of range",
                });
            }
            return Ok(self.config.reference);
        }

        let energy = |x: &[f32]| x.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>();
        let mut best = 0;
        let mut best_energy = f64::NEG_INFINITY;
        for (k, r) in revolutions.iter().enumerate() {
            let e = energy(r.as_ref());
            if e > best_energy {
                best_energy = e;
                best = k;
            }
        }
        Ok(best)
    }
}
