//! Pass/fail evaluation of merged segments.

use serde::{Deserialize, Serialize};

use super::merge::EventSegment;
use crate::{
    constants::*,
    errors::{AnalysisError, AnalysisResult},
    events::{EventLabel, FailReasons, Polarity, Verdict},
};

/// Pass/fail limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassFailConfig {
    /// Largest acceptable peak `|delta|`
    pub max_loss: f32,
    /// Largest acceptable peak SNR for reflection-type segments
    pub max_reflectance_db: f32,
    /// Smallest acceptable peak SNR
    pub min_snr_db: f32,
    /// Longest acceptable segment in samples
    pub max_event_length: usize,
    /// Fraction of a limit at which a warning starts
    pub warn_factor: f32,
}

impl Default for PassFailConfig {
    fn default() -> Self {
        Self {
            max_loss: PF_MAX_LOSS,
            max_reflectance_db: PF_MAX_REFLECTANCE_DB,
            min_snr_db: PF_MIN_SNR_DB,
            max_event_length: PF_MAX_EVENT_LENGTH,
            warn_factor: PF_WARN_FACTOR,
        }
    }
}

impl PassFailConfig {
    /// `warn_factor` must lie in `(0, 1]`.
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.warn_factor > 0.0 && self.warn_factor <= 1.0) {
            return Err(AnalysisError::InvalidConfig {
                reason: "warn factor must be in (0, 1]",
            });
        }
        if !self.max_loss.is_finite() || !self.min_snr_db.is_finite() {
            return Err(AnalysisError::InvalidConfig {
                reason: "pass/fail limits must be finite",
            });
        }
        Ok(())
    }

    /// Verdict and reasons for one segment.
    pub fn evaluate(&self, seg: &EventSegment) -> (Verdict, FailReasons) {
        if seg.label == EventLabel::None {
            return (Verdict::Pass, FailReasons::empty());
        }

        let mut reasons = FailReasons::empty();
        let mut warn = false;

        if seg.peak_amplitude > self.max_loss {
            reasons.set(FailReasons::HIGH_LOSS);
        } else if seg.peak_amplitude > self.max_loss * self.warn_factor {
            warn = true;
        }

        if seg.peak_snr_db < self.min_snr_db {
            reasons.set(FailReasons::LOW_SNR);
        } else if seg.peak_snr_db < self.min_snr_db / self.warn_factor {
            warn = true;
        }

        if seg.len() > self.max_event_length {
            reasons.set(FailReasons::TOO_LONG);
        }

        if seg.label.is_reflective() && seg.peak_snr_db > self.max_reflectance_db {
            reasons.set(FailReasons::HIGH_REFLECTANCE);
        }

        if seg.dominant_polarity == Polarity::Oscillate {
            reasons.set(FailReasons::PATTERN);
        }

        let verdict = if !reasons.is_empty() {
            Verdict::Fail
        } else if warn {
            Verdict::Warn
        } else {
            Verdict::Pass
        };
        (verdict, reasons)
    }
}

/// Write verdicts into every segment.
pub fn apply_pass_fail(segments: &mut [EventSegment], cfg: &PassFailConfig) {
    for seg in segments.iter_mut() {
        let (verdict, reasons) = cfg.evaluate(seg);
        seg.verdict = verdict;
        seg.fail_reasons = reasons;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(label: EventLabel, len: usize, snr: f32, amp: f32) -> EventSegment {
        EventSegment {
            start: 100,
            end: 100 + len - 1,
            label,
            mean_confidence: 0.5,
            peak_snr_db: snr,
            peak_amplitude: amp,
            dominant_polarity: Polarity::SpikePos,
            merged: false,
            verdict: Verdict::Pass,
            fail_reasons: FailReasons::empty(),
        }
    }

    #[test]
    fn clean_event_passes() {
        let cfg = PassFailConfig::default();
        let (v, r) = cfg.evaluate(&segment(EventLabel::Reflection, 1, 20.0, 0.2));
        assert_eq!(v, Verdict::Pass);
        assert!(r.is_empty());
    }

    #[test]
    fn warn_band_below_limits() {
        let cfg = PassFailConfig::default();
        // 0.8 > 0.7 × 1.0 but below the 1.0 limit
        let (v, _) = cfg.evaluate(&segment(EventLabel::Attenuation, 1, 20.0, 0.8));
        assert_eq!(v, Verdict::Warn);
        // 7 dB is above 6 but below 6 / 0.7
        let (v, _) = cfg.evaluate(&segment(EventLabel::Attenuation, 1, 7.0, 0.1));
        assert_eq!(v, Verdict::Warn);
    }

    #[test]
    fn multiple_reasons_accumulate() {
        let cfg = PassFailConfig::default();
        let mut seg = segment(EventLabel::ReflectLoss, 600, 40.0, 1.5);
        seg.dominant_polarity = Polarity::Oscillate;
        let (v, r) = cfg.evaluate(&seg);
        assert_eq!(v, Verdict::Fail);
        assert!(r.contains(FailReasons::HIGH_LOSS));
        assert!(r.contains(FailReasons::TOO_LONG));
        assert!(r.contains(FailReasons::HIGH_REFLECTANCE));
        assert!(r.contains(FailReasons::PATTERN));
        assert!(!r.contains(FailReasons::LOW_SNR));
    }

    #[test]
    fn reflectance_limit_only_for_reflections() {
        let cfg = PassFailConfig::default();
        let (v, r) = cfg.evaluate(&segment(EventLabel::Attenuation, 1, 50.0, 0.1));
        assert_eq!(v, Verdict::Pass);
        assert!(!r.contains(FailReasons::HIGH_REFLECTANCE));
    }

    #[test]
    fn unlabelled_segments_always_pass() {
        let cfg = PassFailConfig::default();
        let (v, r) = cfg.evaluate(&segment(EventLabel::None, 5000, -60.0, 9.0));
        assert_eq!(v, Verdict::Pass);
        assert!(r.is_empty());
    }

    #[test]
    fn warn_factor_validated() {
        let cfg = PassFailConfig {
            warn_factor: 0.0,
            ..PassFailConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
