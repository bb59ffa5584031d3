//! Confidence Fusion and Segment Ranking
//!
//! ## Overview
//!
//! Three independent quality signals are folded into one per-sample score:
//!
//! ```text
//! agreement (0..1)   ──→ w_a · clamp(a)                          ──┐
//! SNR (dB)           ──→ w_s · clamp((snr - floor)/(ceil - floor)) ─┼─→ Σ → confidence
//! integrity flags    ──→ w_i · {clean | flagged | repaired}       ──┘
//! ```
//!
//! Every source is optional. Missing agreement, SNR or flags fall back to
//! configured defaults (0.5, 10 dB, clean). Weights default to 0.40 / 0.35 /
//! 0.25; negative weights count as zero and the set is always renormalised
//! to sum to 1.
//!
//! ## Two Band Partitions
//!
//! The score is banded twice, for two different jobs:
//!
//! | Purpose       | HIGH   | MID        | LOW   |
//! |---------------|--------|------------|-------|
//! | Reporting     | ≥ 0.8  | [0.4, 0.8) | < 0.4 |
//! | Segmentation  | ≥ 0.7  | [0.3, 0.7) | < 0.3 |
//!
//! Reporting bands count individual samples in the summary. Segmentation
//! bands drive run-length segments, which are then ranked by mean
//! confidence across all bands (rank 0 = best).
//!
//! ## Summary
//!
//! ```text
//! overall = 0.6 · mean + 0.4 · high_count / n
//! ```

use core::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    errors::{AnalysisError, AnalysisResult},
    integrity::IntegrityFlags,
    stats,
};

/// Confidence band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    /// Trustworthy
    High,
    /// Usable with care
    Mid,
    /// Suspect
    Low,
}

impl Band {
    /// Stable uppercase name
    pub const fn name(&self) -> &'static str {
        match self {
            Band::High => "HIGH",
            Band::Mid => "MID",
            Band::Low => "LOW",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Confidence configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Raw agreement weight
    pub weight_agreement: f32,
    /// Raw SNR weight
    pub weight_snr: f32,
    /// Raw integrity weight
    pub weight_integrity: f32,
    /// SNR mapped to 0
    pub snr_floor_db: f32,
    /// SNR mapped to 1
    pub snr_ceil_db: f32,
    /// Agreement used when none is supplied
    pub default_agreement: f32,
    /// SNR used when none is supplied
    pub default_snr_db: f32,
    /// Integrity value of a clean sample
    pub integrity_clean: f32,
    /// Integrity value of a flagged sample
    pub integrity_flagged: f32,
    /// Integrity value of a flagged, repaired sample
    pub integrity_repaired: f32,
    /// Reporting HIGH threshold
    pub report_high: f32,
    /// Reporting MID threshold
    pub report_mid: f32,
    /// Segmentation HIGH threshold
    pub segment_high: f32,
    /// Segmentation LOW threshold
    pub segment_low: f32,
    /// Shortest ranked segment
    pub min_segment_len: usize,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weight_agreement: WEIGHT_AGREEMENT,
            weight_snr: WEIGHT_SNR,
            weight_integrity: WEIGHT_INTEGRITY,
            snr_floor_db: CONF_SNR_FLOOR_DB,
            snr_ceil_db: CONF_SNR_CEIL_DB,
            default_agreement: DEFAULT_AGREEMENT,
            default_snr_db: DEFAULT_SNR_DB,
            integrity_clean: INTEGRITY_CLEAN,
            integrity_flagged: INTEGRITY_FLAGGED,
            integrity_repaired: INTEGRITY_REPAIRED,
            report_high: REPORT_HIGH_THRESHOLD,
            report_mid: REPORT_MID_THRESHOLD,
            segment_high: SEGMENT_HIGH_THRESHOLD,
            segment_low: SEGMENT_LOW_THRESHOLD,
            min_segment_len: MIN_SEGMENT_LEN,
        }
    }
}

impl ConfidenceConfig {
    /// Check ranges and threshold ordering.
    pub fn validate(&self) -> AnalysisResult<()> {
        let values = [
            self.weight_agreement,
            self.weight_snr,
            self.weight_integrity,
            self.snr_floor_db,
            self.snr_ceil_db,
            self.default_agreement,
            self.default_snr_db,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidConfig {
                reason: "confidence parameters must be finite",
            });
        }
        if !(self.snr_floor_db < self.snr_ceil_db) {
            return Err(AnalysisError::InvalidConfig {
                reason: "SNR floor must be below SNR ceiling",
            });
        }
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        if !unit(self.integrity_clean) || !unit(self.integrity_flagged) || !unit(self.integrity_repaired) {
            return Err(AnalysisError::InvalidConfig {
                reason: "integrity values must be in [0, 1]",
            });
        }
        if !(self.report_mid < self.report_high) || !(self.segment_low < self.segment_high) {
            return Err(AnalysisError::InvalidConfig {
                reason: "band thresholds must be ordered",
            });
        }
        Ok(())
    }

    /// Weights after clamping negatives to zero and renormalising.
    ///
    /// A weight set that sums to zero falls back to the defaults.
    pub fn normalized_weights(&self) -> [f32; 3] {
        let raw = [
            self.weight_agreement.max(0.0),
            self.weight_snr.max(0.0),
            self.weight_integrity.max(0.0),
        ];
        let sum: f32 = raw.iter().sum();
        if !(sum > 0.0) || !sum.is_finite() {
            warn!("confidence weights sum to {sum}, using defaults");
            let d = [WEIGHT_AGREEMENT, WEIGHT_SNR, WEIGHT_INTEGRITY];
            let ds: f32 = d.iter().sum();
            return [d[0] / ds, d[1] / ds, d[2] / ds];
        }
        [raw[0] / sum, raw[1] / sum, raw[2] / sum]
    }
}

/// Per-sample score with its weighted components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSample {
    /// Combined score in `[0, 1]`
    pub confidence: f32,
    /// Weighted agreement contribution
    pub agreement: f32,
    /// Weighted SNR contribution
    pub snr: f32,
    /// Weighted integrity contribution
    pub integrity: f32,
    /// Reporting band
    pub band: Band,
}

/// Optional per-sample sources. Every supplied slice must have the same
/// length as the trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceInputs<'a> {
    /// Cross-revolution agreement in `[0, 1]`
    pub agreement: Option<&'a [f32]>,
    /// SNR in dB
    pub snr_db: Option<&'a [f32]>,
    /// Integrity flags
    pub flags: Option<&'a [IntegrityFlags]>,
}

impl<'a> ConfidenceInputs<'a> {
    /// No sources; every sample gets the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agreement trace
    pub fn with_agreement(mut self, agreement: &'a [f32]) -> Self {
        self.agreement = Some(agreement);
        self
    }

    /// Add an SNR trace
    pub fn with_snr(mut self, snr_db: &'a [f32]) -> Self {
        self.snr_db = Some(snr_db);
        self
    }

    /// Add integrity flags
    pub fn with_flags(mut self, flags: &'a [IntegrityFlags]) -> Self {
        self.flags = Some(flags);
        self
    }

    fn check(&self, n: usize) -> AnalysisResult<()> {
        let lens = [
            self.agreement.map(<[f32]>::len),
            self.snr_db.map(<[f32]>::len),
            self.flags.map(<[IntegrityFlags]>::len),
        ];
        for len in lens.into_iter().flatten() {
            if len != n {
                return Err(AnalysisError::LengthMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }
        Ok(())
    }
}

/// Contiguous run of one segmentation band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedSegment {
    /// First sample
    pub start: usize,
    /// Last sample (inclusive)
    pub end: usize,
    /// Segmentation band of every sample in the run
    pub band: Band,
    /// Mean confidence over the run
    pub mean_confidence: f32,
    /// Lowest confidence in the run
    pub min_confidence: f32,
    /// Position after sorting by mean confidence, 0 = best
    pub rank: usize,
}

impl RankedSegment {
    /// Number of samples covered
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Segments always cover at least one sample
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Trace-level confidence statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    /// Mean confidence
    pub mean: f32,
    /// Median confidence
    pub median: f32,
    /// Lowest confidence
    pub min: f32,
    /// Highest confidence
    pub max: f32,
    /// Samples in the reporting HIGH band
    pub high_count: usize,
    /// Samples in the reporting MID band
    pub mid_count: usize,
    /// Samples in the reporting LOW band
    pub low_count: usize,
    /// `0.6 · mean + 0.4 · high fraction`
    pub overall_quality: f32,
}

/// Scores, ranked segments and summary for one trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceReport {
    /// One score per sample
    pub samples: Vec<ConfidenceSample>,
    /// Ranked segments, best first
    pub segments: Vec<RankedSegment>,
    /// Summary statistics
    pub summary: ConfidenceSummary,
}

impl ConfidenceReport {
    /// Bare confidence values
    pub fn values(&self) -> Vec<f32> {
        self.samples.iter().map(|s| s.confidence).collect()
    }
}

/// Confidence fusion engine.
#[derive(Debug, Clone)]
pub struct ConfidenceFusion {
    config: ConfidenceConfig,
    weights: [f32; 3],
}

impl Default for ConfidenceFusion {
    fn default() -> Self {
        let config = ConfidenceConfig::default();
        Self {
            weights: config.normalized_weights(),
            config,
        }
    }
}

impl ConfidenceFusion {
    /// Create an engine, rejecting invalid configurations.
    pub fn new(config: ConfidenceConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.normalized_weights(),
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    /// Renormalised weights `[agreement, snr, integrity]`
    pub fn weights(&self) -> [f32; 3] {
        self.weights
    }

    /// Reporting band of a score
    pub fn report_band(&self, confidence: f32) -> Band {
        if confidence >= self.config.report_high {
            Band::High
        } else if confidence >= self.config.report_mid {
            Band::Mid
        } else {
            Band::Low
        }
    }

    /// Segmentation band of a score
    pub fn segment_band(&self, confidence: f32) -> Band {
        if confidence >= self.config.segment_high {
            Band::High
        } else if confidence < self.config.segment_low {
            Band::Low
        } else {
            Band::Mid
        }
    }

    fn integrity_value(&self, flags: IntegrityFlags) -> f32 {
        let cfg = &self.config;
        if !flags.is_anomalous() {
            cfg.integrity_clean
        } else if flags.contains(IntegrityFlags::REPAIRED) {
            cfg.integrity_repaired
        } else {
            cfg.integrity_flagged
        }
    }

    /// Score one sample from whatever sources are available.
    pub fn score(
        &self,
        agreement: Option<f32>,
        snr_db: Option<f32>,
        flags: Option<IntegrityFlags>,
    ) -> ConfidenceSample {
        let cfg = &self.config;
        let [wa, ws, wi] = self.weights;

        let a = stats::clamp(agreement.unwrap_or(cfg.default_agreement), 0.0, 1.0);
        let snr = snr_db.unwrap_or(cfg.default_snr_db);
        let s = stats::clamp(
            (snr - cfg.snr_floor_db) / (cfg.snr_ceil_db - cfg.snr_floor_db),
            0.0,
            1.0,
        );
        let i = flags.map_or(cfg.integrity_clean, |f| self.integrity_value(f));

        let agreement = wa * a;
        let snr = ws * s;
        let integrity = wi * i;
        let confidence = stats::clamp(agreement + snr + integrity, 0.0, 1.0);

        ConfidenceSample {
            confidence,
            agreement,
            snr,
            integrity,
            band: self.report_band(confidence),
        }
    }

    /// Score every sample of an `n`-sample trace.
    pub fn fuse(&self, n: usize, inputs: &ConfidenceInputs<'_>) -> AnalysisResult<Vec<ConfidenceSample>> {
        if n == 0 {
            return Err(AnalysisError::MissingInput { what: "samples" });
        }
        inputs.check(n)?;

        let mut out = Vec::new();
        out.try_reserve_exact(n)
            .map_err(|_| AnalysisError::NoMemory { requested: n })?;
        out.extend((0..n).map(|i| {
            self.score(
                inputs.agreement.map(|a| a[i]),
                inputs.snr_db.map(|s| s[i]),
                inputs.flags.map(|f| f[i]),
            )
        }));
        Ok(out)
    }

    /// Run-length segments by segmentation band, ranked by mean confidence.
    pub fn segment(&self, samples: &[ConfidenceSample]) -> Vec<RankedSegment> {
        let mut segments = Vec::new();
        let mut i = 0;
        while i < samples.len() {
            let band = self.segment_band(samples[i].confidence);
            let start = i;
            let mut sum = 0.0f64;
            let mut min = f32::INFINITY;
            while i < samples.len() && self.segment_band(samples[i].confidence) == band {
                sum += samples[i].confidence as f64;
                min = min.min(samples[i].confidence);
                i += 1;
            }
            let len = i - start;
            if len < self.config.min_segment_len {
                continue;
            }
            segments.push(RankedSegment {
                start,
                end: i - 1,
                band,
                mean_confidence: (sum / len as f64) as f32,
                min_confidence: min,
                rank: 0,
            });
        }

        // Stable: equal means keep positional order
        segments.sort_by(|a, b| stats::cmp_f32_desc(&a.mean_confidence, &b.mean_confidence));
        for (rank, seg) in segments.iter_mut().enumerate() {
            seg.rank = rank;
        }
        segments
    }

    /// Summary statistics over scored samples.
    pub fn summarize(&self, samples: &[ConfidenceSample]) -> ConfidenceSummary {
        if samples.is_empty() {
            return ConfidenceSummary::default();
        }
        let mut values: Vec<f32> = samples.iter().map(|s| s.confidence).collect();
        let mean = stats::mean(&values);
        let median = stats::median_in_place(&mut values);
        let min = values[0];
        let max = values[values.len() - 1];

        let mut summary = ConfidenceSummary {
            mean,
            median,
            min,
            max,
            ..ConfidenceSummary::default()
        };
        for s in samples {
            match s.band {
                Band::High => summary.high_count += 1,
                Band::Mid => summary.mid_count += 1,
                Band::Low => summary.low_count += 1,
            }
        }
        let high_fraction = summary.high_count as f32 / samples.len() as f32;
        summary.overall_quality = stats::clamp(0.6 * mean + 0.4 * high_fraction, 0.0, 1.0);
        summary
    }

    /// Score, segment and summarise in one call.
    pub fn analyze(&self, n: usize, inputs: &ConfidenceInputs<'_>) -> AnalysisResult<ConfidenceReport> {
        let samples = self.fuse(n, inputs)?;
        let segments = self.segment(&samples);
        let summary = self.summarize(&samples);
        debug!(
            "confidence: n={} mean={:.3} segments={} overall={:.3}",
            n,
            summary.mean,
            segments.len(),
            summary.overall_quality
        );
        Ok(ConfidenceReport {
            samples,
            segments,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = ConfidenceFusion::default().weights();
        assert!(stats::approx_eq(w.iter().sum::<f32>(), 1.0, 1e-6));
        assert!(stats::approx_eq(w[0], 0.40, 1e-6));
    }

    #[test]
    fn raw_weights_are_renormalised() {
        let cfg = ConfidenceConfig {
            weight_agreement: 2.0,
            weight_snr: -1.0,
            weight_integrity: 2.0,
            ..ConfidenceConfig::default()
        };
        let w = ConfidenceFusion::new(cfg).unwrap().weights();
        assert_eq!(w, [0.5, 0.0, 0.5]);

        let zero = ConfidenceConfig {
            weight_agreement: 0.0,
            weight_snr: 0.0,
            weight_integrity: 0.0,
            ..ConfidenceConfig::default()
        };
        let w = ConfidenceFusion::new(zero).unwrap().weights();
        assert!(stats::approx_eq(w[1], 0.35, 1e-6));
    }

    #[test]
    fn defaults_only_score() {
        let f = ConfidenceFusion::default();
        let s = f.score(None, None, None);
        // 0.4 · 0.5 + 0.35 · (10 / 30) + 0.25 · 1
        assert!(stats::approx_eq(s.confidence, 0.2 + 0.35 / 3.0 + 0.25, 1e-6));
        assert_eq!(s.band, Band::Mid);
        assert!(stats::approx_eq(s.confidence, s.agreement + s.snr + s.integrity, 1e-6));
    }

    #[test]
    fn integrity_values() {
        let f = ConfidenceFusion::default();
        let clean = f.score(Some(1.0), Some(30.0), Some(IntegrityFlags::empty()));
        assert!(stats::approx_eq(clean.confidence, 1.0, 1e-6));
        assert_eq!(clean.band, Band::High);

        let flagged = f.score(Some(1.0), Some(30.0), Some(IntegrityFlags::DROPOUT));
        assert!(stats::approx_eq(flagged.confidence, 0.75, 1e-6));

        let mut repaired = IntegrityFlags::DROPOUT;
        repaired.set(IntegrityFlags::REPAIRED);
        let r = f.score(Some(1.0), Some(30.0), Some(repaired));
        assert!(stats::approx_eq(r.integrity, 0.25 * 0.7, 1e-6));
    }

    #[test]
    fn non_finite_snr_maps_to_floor() {
        let f = ConfidenceFusion::default();
        assert_eq!(f.score(Some(0.0), Some(f32::NEG_INFINITY), None).snr, 0.0);
        assert_eq!(f.score(Some(0.0), Some(f32::NAN), None).snr, 0.0);
    }

    #[test]
    fn dual_band_thresholds() {
        let f = ConfidenceFusion::default();
        assert_eq!(f.report_band(0.75), Band::Mid);
        assert_eq!(f.segment_band(0.75), Band::High);
        assert_eq!(f.report_band(0.35), Band::Low);
        assert_eq!(f.segment_band(0.35), Band::Mid);
        assert_eq!(f.report_band(0.8), Band::High);
        assert_eq!(f.segment_band(0.29), Band::Low);
    }

    #[test]
    fn segments_rank_by_mean() {
        let f = ConfidenceFusion::default();
        let mut snr = vec![30.0f32; 40];
        snr[10..20].fill(0.0);
        snr[30..40].fill(0.0);
        let mut agreement = vec![1.0f32; 40];
        agreement[30..40].fill(0.0);
        let inputs = ConfidenceInputs::new().with_agreement(&agreement).with_snr(&snr);
        let report = f.analyze(40, &inputs).unwrap();

        // [0..10) 1.0, [10..20) 0.65, [20..30) 1.0, [30..40) 0.25
        assert_eq!(report.segments.len(), 4);
        for (i, seg) in report.segments.iter().enumerate() {
            assert_eq!(seg.rank, i);
        }
        for pair in report.segments.windows(2) {
            assert!(pair[0].mean_confidence >= pair[1].mean_confidence);
        }
        assert_eq!(report.segments[0].start, 0);
        assert_eq!(report.segments[1].start, 20);
        assert_eq!(report.segments[2].band, Band::Mid);
        assert_eq!(report.segments[3].band, Band::Low);
    }

    #[test]
    fn short_runs_are_dropped() {
        let f = ConfidenceFusion::default();
        let mut snr = vec![30.0f32; 30];
        snr[10..13].fill(0.0);
        let agreement = vec![1.0f32; 30];
        let inputs = ConfidenceInputs::new().with_agreement(&agreement).with_snr(&snr);
        let samples = f.fuse(30, &inputs).unwrap();
        let segments = f.segment(&samples);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.band == Band::High));
    }

    #[test]
    fn length_mismatch_rejected() {
        let f = ConfidenceFusion::default();
        let snr = vec![10.0f32; 5];
        let inputs = ConfidenceInputs::new().with_snr(&snr);
        assert!(matches!(
            f.fuse(6, &inputs),
            Err(AnalysisError::LengthMismatch { expected: 6, actual: 5 })
        ));
        assert!(f.fuse(0, &ConfidenceInputs::new()).is_err());
    }

    #[test]
    fn summary_counts_and_quality() {
        let f = ConfidenceFusion::default();
        let mut snr = vec![30.0f32; 10];
        snr[5..].fill(0.0);
        let agreement = vec![1.0f32; 10];
        let inputs = ConfidenceInputs::new().with_agreement(&agreement).with_snr(&snr);
        let report = f.analyze(10, &inputs).unwrap();
        let s = report.summary;
        assert_eq!(s.high_count, 5);
        assert_eq!(s.mid_count, 5);
        assert_eq!(s.low_count, 0);
        assert!(stats::approx_eq(s.max, 1.0, 1e-6));
        assert!(stats::approx_eq(s.min, 0.65, 1e-6));
        assert!(stats::approx_eq(s.mean, 0.825, 1e-6));
        assert!(stats::approx_eq(s.overall_quality, 0.6 * 0.825 + 0.4 * 0.5, 1e-6));
    }
}
