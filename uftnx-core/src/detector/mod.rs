//! Multi-Scale Event Detector
//!
//! ## Overview
//!
//! Finds and labels short features in a trace (spikes, steps, ringing) and
//! groups them into segments with pass/fail verdicts:
//!
//! ```text
//! samples ─→ features ─→ per-sample labels ─→ run-length ─→ merge ─→ verdicts
//!            (delta,      (polarity + SNR      segments     (rule    (limits)
//!             sigma,       vs thresholds)                    table)
//!             env, SNR)
//! ```
//!
//! ## Scales
//!
//! Up to [`MAX_SCALES`] trailing RMS windows, fine to coarse. The envelope
//! gates classification (a sample whose envelope never reaches
//! `min_env_rms` on any scale is left unlabelled); the SNR is taken from the
//! shared delta and sigma traces.
//!
//! ## Usage Example
//!
//! ```rust
//! use uftnx_core::detector::EventDetector;
//! use uftnx_core::events::EventLabel;
//!
//! let mut x: Vec<f32> = (0..2048)
//!     .map(|i| 0.5 + if i % 2 == 0 { 0.005 } else { -0.005 })
//!     .collect();
//! x[1000] += 0.3;
//!
//! let report = EventDetector::default().detect(&x).unwrap();
//! assert!(report.events().any(|s| s.label == EventLabel::Reflection));
//! ```

pub mod classify;
pub mod features;
pub mod merge;
pub mod verdict;

pub use classify::{classify, SampleClass};
pub use features::{detect_polarity, extract_features, FeatureVector};
pub use merge::{segment_and_merge, EventSegment, MergeConfig, MergeRule, RuleLimits};
pub use verdict::{apply_pass_fail, PassFailConfig};

use heapless::Vec as FixedVec;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    errors::{AnalysisError, AnalysisResult},
    events::{Event, EventFlags, EventLabel},
    stats,
    traits::Sample,
};

/// Detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Trailing RMS windows, fine to coarse
    pub scales: FixedVec<usize, MAX_SCALES>,
    /// MAD consistency factor
    pub mad_scale: f32,
    /// Block-wise local sigma; a single global sigma otherwise
    pub local_sigma: bool,
    /// Trailing window for the local sigma
    pub sigma_window: usize,
    /// Samples between sigma recomputations
    pub sigma_stride: usize,
    /// Sigma floor
    pub sigma_min: f32,

    /// Reflection threshold (dB)
    pub thr_reflect_db: f32,
    /// Attenuation threshold (dB)
    pub thr_atten_db: f32,
    /// Negative spike threshold (dB)
    pub thr_spike_neg_db: f32,
    /// Gain-up threshold (dB)
    pub thr_gainup_db: f32,
    /// Oscillation threshold (dB)
    pub thr_oscillation_db: f32,
    /// Broad-loss confidence reference (dB)
    pub thr_broadloss_db: f32,
    /// Envelope below which nothing is labelled
    pub min_env_rms: f32,

    /// Half-width of the polarity neighbourhood
    pub polarity_halfwin: usize,
    /// SNR floor (dB)
    pub snr_floor_db: f32,
    /// SNR ceiling (dB)
    pub snr_ceil_db: f32,

    /// Segment merge rules
    pub merge: MergeConfig,
    /// Verdict limits
    pub pass_fail: PassFailConfig,
    /// Capacity of the returned segment list
    pub max_segments: usize,
}

fn scales_from(windows: &[usize]) -> FixedVec<usize, MAX_SCALES> {
    windows.iter().take(MAX_SCALES).copied().collect()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scales: scales_from(&DEFAULT_SCALE_WINDOWS),
            mad_scale: MAD_SCALE,
            local_sigma: true,
            sigma_window: SIGMA_WINDOW,
            sigma_stride: SIGMA_STRIDE,
            sigma_min: SIGMA_MIN,
            thr_reflect_db: THR_REFLECT_SNR_DB,
            thr_atten_db: THR_ATTEN_SNR_DB,
            thr_spike_neg_db: THR_SPIKE_NEG_SNR_DB,
            thr_gainup_db: THR_GAINUP_SNR_DB,
            thr_oscillation_db: THR_OSCILLATION_SNR_DB,
            thr_broadloss_db: THR_BROADLOSS_SNR_DB,
            min_env_rms: MIN_ENV_RMS,
            polarity_halfwin: POLARITY_HALFWIN,
            snr_floor_db: SNR_FLOOR_DB,
            snr_ceil_db: SNR_CEIL_DB,
            merge: MergeConfig::default(),
            pass_fail: PassFailConfig::default(),
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }
}

impl DetectorConfig {
    /// Short windows for short traces such as a single sector.
    pub fn fine() -> Self {
        Self {
            scales: scales_from(&[32, 128, 512, 2048]),
            sigma_window: 1024,
            sigma_stride: 64,
            polarity_halfwin: 3,
            ..Self::default()
        }
    }

    /// Replace the scale list. At most [`MAX_SCALES`] windows are accepted.
    pub fn with_scales(mut self, windows: &[usize]) -> AnalysisResult<Self> {
        if windows.len() > MAX_SCALES {
            return Err(AnalysisError::InvalidConfig {
                reason: "too many scales",
            });
        }
        self.scales = scales_from(windows);
        Ok(self)
    }

    /// Check scales, windows and thresholds.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.scales.is_empty() {
            return Err(AnalysisError::InvalidConfig {
                reason: "at least one scale is required",
            });
        }
        if self.scales.iter().any(|&w| w == 0) {
            return Err(AnalysisError::InvalidConfig {
                reason: "scale windows must be non-zero",
            });
        }
        if self.sigma_window == 0 || self.sigma_stride == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "sigma window and stride must be non-zero",
            });
        }
        if !(self.sigma_min > 0.0) || !(self.mad_scale > 0.0) {
            return Err(AnalysisError::InvalidConfig {
                reason: "sigma floor and MAD scale must be positive",
            });
        }
        if !(self.snr_floor_db < self.snr_ceil_db) {
            return Err(AnalysisError::InvalidConfig {
                reason: "SNR floor must be below SNR ceiling",
            });
        }
        let thresholds = [
            self.thr_reflect_db,
            self.thr_atten_db,
            self.thr_spike_neg_db,
            self.thr_gainup_db,
            self.thr_oscillation_db,
            self.thr_broadloss_db,
            self.min_env_rms,
        ];
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(AnalysisError::InvalidConfig {
                reason: "detector thresholds must be finite",
            });
        }
        if self.max_segments == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "segment capacity must be non-zero",
            });
        }
        self.merge.validate()?;
        self.pass_fail.validate()
    }
}

impl EventSegment {
    /// Compact event record for this segment.
    ///
    /// Severity is the peak SNR relative to `snr_ceil_db`.
    pub fn to_event(&self, snr_ceil_db: f32) -> Event {
        let mut flags = EventFlags::empty();
        if self.merged {
            flags.set(EventFlags::MERGED);
        }
        Event {
            kind: self.label,
            start: self.start as u64,
            end: self.end as u64,
            confidence: self.mean_confidence,
            severity: stats::clamp(self.peak_snr_db / snr_ceil_db, 0.0, 1.0),
            peak_snr_db: self.peak_snr_db,
            verdict: Some(self.verdict),
            fail_reasons: self.fail_reasons,
            flags,
        }
    }
}

/// Everything the detector produced for one trace.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    /// One feature vector per sample
    pub features: Vec<FeatureVector>,
    /// One label per sample
    pub classes: Vec<SampleClass>,
    /// Merged segments covering the trace, capped at `max_segments`
    pub segments: Vec<EventSegment>,
    /// Segment count before the cap
    pub total_segments: usize,
    /// Merge passes that changed the segment list
    pub merge_passes: usize,
}

impl DetectionReport {
    /// Labelled segments only
    pub fn events(&self) -> impl Iterator<Item = &EventSegment> + '_ {
        self.segments.iter().filter(|s| s.label != EventLabel::None)
    }

    /// Number of labelled segments in the returned list
    pub fn event_count(&self) -> usize {
        self.events().count()
    }

    /// Labelled segments as compact event records
    pub fn to_events(&self, snr_ceil_db: f32) -> Vec<Event> {
        self.events().map(|s| s.to_event(snr_ceil_db)).collect()
    }

    /// Per-sample label codes, the input of cross-revolution stability
    pub fn label_codes(&self) -> Vec<u8> {
        self.classes.iter().map(|c| c.label.code()).collect()
    }

    /// Samples per label
    pub fn label_histogram(&self) -> [usize; 8] {
        let mut hist = [0usize; 8];
        for c in &self.classes {
            hist[c.label.code() as usize] += 1;
        }
        hist
    }
}

/// Multi-scale event detector.
#[derive(Debug, Clone, Default)]
pub struct EventDetector {
    config: DetectorConfig,
}

impl EventDetector {
    /// Create a detector, rejecting invalid configurations.
    pub fn new(config: DetectorConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect in any accepted sample encoding.
    pub fn detect_samples<T: Sample>(&self, samples: &[T]) -> AnalysisResult<DetectionReport> {
        if samples.is_empty() {
            return Err(AnalysisError::MissingInput { what: "samples" });
        }
        self.detect(&T::normalize(samples))
    }

    /// Extract features, classify, segment, merge and judge.
    pub fn detect(&self, x: &[f32]) -> AnalysisResult<DetectionReport> {
        if x.is_empty() {
            return Err(AnalysisError::MissingInput { what: "samples" });
        }
        let cfg = &self.config;

        let features = extract_features(x, cfg)?;
        let classes = classify(&features, cfg);
        let (mut segments, merge_passes) = segment_and_merge(&classes, &features, &cfg.merge);
        apply_pass_fail(&mut segments, &cfg.pass_fail);

        let total_segments = segments.len();
        if total_segments > cfg.max_segments {
            warn!(
                "detector segment list truncated: kept {} of {}",
                cfg.max_segments, total_segments
            );
            segments.truncate(cfg.max_segments);
        }

        debug!(
            "detector: n={} segments={} events={} merge_passes={}",
            x.len(),
            total_segments,
            segments.iter().filter(|s| s.label != EventLabel::None).count(),
            merge_passes
        );

        Ok(DetectionReport {
            features,
            classes,
            segments,
            total_segments,
            merge_passes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Polarity, Verdict};

    fn alternating(n: usize, dc: f32, amp: f32) -> Vec<f32> {
        (0..n)
            .map(|i| dc + if i % 2 == 0 { amp } else { -amp })
            .collect()
    }

    #[test]
    fn default_scales() {
        let cfg = DetectorConfig::default();
        assert_eq!(cfg.scales.as_slice(), &[128, 512, 2048, 8192]);
        assert!(cfg.validate().is_ok());
        assert!(DetectorConfig::fine().validate().is_ok());
    }

    #[test]
    fn too_many_scales_rejected() {
        let r = DetectorConfig::default().with_scales(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(r.is_err());
        let cfg = DetectorConfig::default().with_scales(&[]).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(
            EventDetector::default().detect(&[]),
            Err(AnalysisError::MissingInput { .. })
        ));
    }

    #[test]
    fn flat_trace_has_no_events() {
        let x = vec![0.5f32; 1024];
        let report = EventDetector::default().detect(&x).unwrap();
        assert_eq!(report.event_count(), 0);
        assert_eq!(report.segments.len(), 1);
        assert_eq!(report.segments[0].verdict, Verdict::Pass);
    }

    #[test]
    fn spike_splits_into_rise_and_fall() {
        let mut x = alternating(2048, 0.5, 0.005);
        x[1000] += 0.3;
        let report = EventDetector::default().detect(&x).unwrap();

        let events: Vec<_> = report.events().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].label, EventLabel::Reflection);
        assert_eq!(events[0].start, 1000);
        assert_eq!(events[1].label, EventLabel::Attenuation);
        assert_eq!(events[1].start, 1001);
        assert_eq!(report.features[1000].polarity, Polarity::SpikePos);
    }

    #[test]
    fn spike_then_two_step_loss_merges() {
        let mut x = alternating(2048, 0.5, 0.005);
        x[1000] += 0.3;
        x[1001] += 0.1;
        for v in &mut x[1002..] {
            *v -= 0.1;
        }
        let report = EventDetector::default().detect(&x).unwrap();

        let merged: Vec<_> = report.events().filter(|s| s.merged).collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].label, EventLabel::ReflectLoss);
        assert_eq!((merged[0].start, merged[0].end), (1000, 1002));
        assert!(report.merge_passes >= 1);
    }

    #[test]
    fn oscillation_burst_fails_pattern() {
        let mut x = alternating(2048, 0.5, 0.005);
        for (k, v) in x[1000..1020].iter_mut().enumerate() {
            *v = 0.5 + if k % 2 == 0 { 0.1 } else { -0.1 };
        }
        let report = EventDetector::default().detect(&x).unwrap();

        let osc: Vec<_> = report
            .events()
            .filter(|s| s.label == EventLabel::Oscillation)
            .collect();
        assert_eq!(osc.len(), 1);
        assert_eq!(osc[0].dominant_polarity, Polarity::Oscillate);
        assert_eq!(osc[0].verdict, Verdict::Fail);
    }

    #[test]
    fn segments_cover_trace_in_order() {
        let mut x = alternating(4096, 0.5, 0.005);
        x[500] += 0.2;
        x[2500] -= 0.2;
        let report = EventDetector::default().detect(&x).unwrap();

        assert_eq!(report.segments[0].start, 0);
        assert_eq!(report.segments.last().map(|s| s.end), Some(4095));
        for pair in report.segments.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start);
        }
    }

    #[test]
    fn segment_cap_keeps_total() {
        let mut x = alternating(4096, 0.5, 0.005);
        for k in 0..20 {
            x[100 + k * 150] += 0.3;
        }
        let cfg = DetectorConfig {
            max_segments: 5,
            ..DetectorConfig::default()
        };
        let report = EventDetector::new(cfg).unwrap().detect(&x).unwrap();
        assert_eq!(report.segments.len(), 5);
        assert!(report.total_segments > 5);
    }

    #[test]
    fn event_conversion() {
        let mut x = alternating(2048, 0.5, 0.005);
        x[1000] += 0.3;
        let report = EventDetector::default().detect(&x).unwrap();
        let events = report.to_events(SNR_CEIL_DB);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| (0.0..=1.0).contains(&e.severity)));
        assert!(events.iter().all(|e| e.verdict.is_some()));
    }
}
