//! Golden Vectors
//!
//! A fixed set of named synthetic traces with expected result ranges, used
//! to catch regressions in the whole analysis chain. Noise comes from a
//! linear-congruential generator seeded per vector index, so
//! [`generate`] is byte-for-byte reproducible.
//!
//! | # | Name      | Content                                        |
//! |---|-----------|------------------------------------------------|
//! | 0 | `clean`   | DC 0.5 plus uniform noise ±0.01                |
//! | 1 | `dropout` | `clean` with zeros over samples 1500..1564     |
//! | 2 | `spikes`  | `clean` with +0.15 spikes every 512 samples    |
//! | 3 | `clipped` | 1.2-amplitude sine plus noise, clamped at ±0.99 |
//!
//! Expectations hold for the default length [`GOLDEN_LEN`] and the default
//! [`AnalysisConfig`](crate::AnalysisConfig).

use core::f32::consts::PI;

use log::debug;
use uftnx_core::{stats, AnalysisError, AnalysisResult};

use crate::{analysis::ANALYZE_MIN_SAMPLES, AnalysisReport, Analyzer};

/// Default golden-vector length
pub const GOLDEN_LEN: usize = 4096;

const NOISE_AMP: f32 = 0.01;
const SEED_BASE: u32 = 0x5EED_0000;

/// Expected results for one golden vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoldenVector {
    /// Short name
    pub name: &'static str,
    /// What the trace contains
    pub description: &'static str,
    /// Expected integrity score
    pub integrity: f32,
    /// Allowed integrity deviation
    pub integrity_tolerance: f32,
    /// Expected mean confidence
    pub confidence: f32,
    /// Allowed confidence deviation
    pub confidence_tolerance: f32,
    /// Fewest events accepted
    pub min_events: usize,
    /// Most events accepted
    pub max_events: usize,
    /// Fewest flagged samples accepted
    pub min_flagged: usize,
}

/// Every golden vector, in index order.
pub const GOLDEN_VECTORS: [GoldenVector; 4] = [
    GoldenVector {
        name: "clean",
        description: "DC level with low uniform noise",
        integrity: 1.0,
        integrity_tolerance: 0.001,
        confidence: 0.5667,
        confidence_tolerance: 0.005,
        min_events: 0,
        max_events: 2,
        min_flagged: 0,
    },
    GoldenVector {
        name: "dropout",
        description: "64-sample zero-amplitude dropout",
        integrity: 0.9644,
        integrity_tolerance: 0.005,
        confidence: 0.5628,
        confidence_tolerance: 0.005,
        min_events: 1,
        max_events: 6,
        min_flagged: 64,
    },
    GoldenVector {
        name: "spikes",
        description: "single-sample positive spikes every 512 samples",
        integrity: 1.0,
        integrity_tolerance: 0.001,
        confidence: 0.5667,
        confidence_tolerance: 0.005,
        min_events: 8,
        max_events: 24,
        min_flagged: 0,
    },
    GoldenVector {
        name: "clipped",
        description: "overdriven sine pinned at both rails",
        integrity: 0.28,
        integrity_tolerance: 0.1,
        confidence: 0.47,
        confidence_tolerance: 0.03,
        min_events: 0,
        max_events: 2048,
        min_flagged: 1200,
    },
];

/// Outcome of checking a report against a golden vector.
///
/// Codes are stable: 0 for a pass, a distinct positive code per failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValidationOutcome {
    /// Every check passed
    Pass = 0,
    /// Integrity score out of tolerance
    Integrity = 1,
    /// Mean confidence out of tolerance
    Confidence = 2,
    /// Fewer events than expected
    TooFewEvents = 3,
    /// More events than expected
    TooManyEvents = 4,
    /// Fewer flagged samples than expected
    TooFewFlagged = 5,
}

impl ValidationOutcome {
    /// Numeric code
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// True for [`ValidationOutcome::Pass`]
    pub const fn passed(&self) -> bool {
        matches!(self, ValidationOutcome::Pass)
    }
}

impl GoldenVector {
    /// Check `report` against this vector; the first failing check wins.
    pub fn validate(&self, report: &AnalysisReport) -> ValidationOutcome {
        let events = report.n_events();
        if !stats::approx_eq(
            report.integrity.integrity_score,
            self.integrity,
            self.integrity_tolerance,
        ) {
            ValidationOutcome::Integrity
        } else if !stats::approx_eq(
            report.confidence_summary.mean,
            self.confidence,
            self.confidence_tolerance,
        ) {
            ValidationOutcome::Confidence
        } else if events < self.min_events {
            ValidationOutcome::TooFewEvents
        } else if events > self.max_events {
            ValidationOutcome::TooManyEvents
        } else if report.integrity.flagged_samples < self.min_flagged {
            ValidationOutcome::TooFewFlagged
        } else {
            ValidationOutcome::Pass
        }
    }
}

/// Number of golden vectors
pub const fn count() -> usize {
    GOLDEN_VECTORS.len()
}

/// Golden vector by index
pub fn get(idx: usize) -> Option<&'static GoldenVector> {
    GOLDEN_VECTORS.get(idx)
}

struct Lcg(u32);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 8) as f32 / 16_777_216.0
    }

    fn noise(&mut self, amp: f32) -> f32 {
        (2.0 * self.next_f32() - 1.0) * amp
    }
}

/// Generate golden vector `idx` with `n` samples.
///
/// Features placed past `n` are left out.
pub fn generate(idx: usize, n: usize) -> AnalysisResult<Vec<f32>> {
    if idx >= count() {
        return Err(AnalysisError::InvalidConfig {
            reason: "unknown golden vector index",
        });
    }
    if n < ANALYZE_MIN_SAMPLES {
        return Err(AnalysisError::TooSmall {
            required: ANALYZE_MIN_SAMPLES,
            available: n,
        });
    }

    let mut rng = Lcg(SEED_BASE.wrapping_add(idx as u32));
    let mut x: Vec<f32> = (0..n).map(|_| 0.5 + rng.noise(NOISE_AMP)).collect();

    match idx {
        1 => {
            let end = n.min(1564);
            if end > 1500 {
                x[1500..end].fill(0.0);
            }
        }
        2 => {
            for i in (256..n).step_by(512) {
                x[i] += 0.15;
            }
        }
        3 => {
            for (i, v) in x.iter_mut().enumerate() {
                let phase = 2.0 * PI * i as f32 / 512.0;
                *v = stats::clamp(1.2 * phase.sin() + (*v - 0.5), -0.99, 0.99);
            }
        }
        _ => {}
    }
    Ok(x)
}

/// Generate, analyse and validate golden vector `idx` at [`GOLDEN_LEN`].
pub fn run_golden(idx: usize) -> AnalysisResult<ValidationOutcome> {
    let vector = get(idx).ok_or(AnalysisError::InvalidConfig {
        reason: "unknown golden vector index",
    })?;
    let x = generate(idx, GOLDEN_LEN)?;
    let report = Analyzer::default().analyze(&x)?;
    let outcome = vector.validate(&report);
    debug!(
        "golden {} ({}): integrity={:.4} confidence={:.4} events={} flagged={} -> {}",
        idx,
        vector.name,
        report.integrity.integrity_score,
        report.confidence_summary.mean,
        report.n_events(),
        report.integrity.flagged_samples,
        outcome.code()
    );
    Ok(outcome)
}

/// Run every golden vector, returning each name with its outcome.
pub fn run_all() -> AnalysisResult<Vec<(&'static str, ValidationOutcome)>> {
    GOLDEN_VECTORS
        .iter()
        .enumerate()
        .map(|(idx, v)| run_golden(idx).map(|o| (v.name, o)))
        .collect()
}
