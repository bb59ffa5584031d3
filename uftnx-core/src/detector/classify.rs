//! Per-sample labelling from polarity, signed delta and best-scale SNR.
//!
//! Rules are tried in order and the first match wins:
//!
//! | # | Condition                                   | Label        |
//! |---|---------------------------------------------|--------------|
//! | 1 | oscillating pattern, SNR ≥ oscillation thr  | Oscillation  |
//! | 2 | spike-step pattern, delta > 0, SNR ≥ refl   | Reflection   |
//! | 3 | delta > 0, SNR ≥ refl                       | Reflection   |
//! | 4 | delta < 0, SNR ≥ atten                      | Attenuation / BroadLoss |
//! | 5 | delta > 0, step-up pattern, SNR ≥ gain-up   | GainUp       |
//! | 6 | delta < 0, neg-spike pattern, SNR ≥ spike   | SpikeNeg     |
//!
//! Samples whose envelope never reaches `min_env_rms` on any scale stay
//! unlabelled.

use serde::{Deserialize, Serialize};

use super::{features::FeatureVector, DetectorConfig};
use crate::{
    constants::CONFIDENCE_SPAN_DB,
    events::{EventLabel, Polarity},
    stats,
};

/// Label and confidence of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleClass {
    /// Assigned label
    pub label: EventLabel,
    /// `clamp((snr - threshold) / 20, 0, 1)`, 0 when unlabelled
    pub confidence: f32,
}

/// Label every sample.
pub fn classify(features: &[FeatureVector], cfg: &DetectorConfig) -> Vec<SampleClass> {
    features.iter().map(|f| classify_one(f, cfg)).collect()
}

fn confidence(snr: f32, threshold: f32) -> f32 {
    stats::clamp((snr - threshold) / CONFIDENCE_SPAN_DB, 0.0, 1.0)
}

/// Label a single sample.
pub fn classify_one(f: &FeatureVector, cfg: &DetectorConfig) -> SampleClass {
    let max_rms = f.env_rms[..cfg.scales.len()]
        .iter()
        .fold(0.0f32, |m, &v| m.max(v));
    if max_rms < cfg.min_env_rms {
        return SampleClass::default();
    }

    let snr = f.max_snr_db;
    let d = f.delta;
    let pol = f.polarity;
    let hit = |label, threshold| SampleClass {
        label,
        confidence: confidence(snr, threshold),
    };

    if pol == Polarity::Oscillate && snr >= cfg.thr_oscillation_db {
        hit(EventLabel::Oscillation, cfg.thr_oscillation_db)
    } else if pol == Polarity::SpikeStep && d > 0.0 && snr >= cfg.thr_reflect_db {
        // Compound candidates start as reflections and are joined during merge
        hit(EventLabel::Reflection, cfg.thr_reflect_db)
    } else if d > 0.0 && snr >= cfg.thr_reflect_db {
        hit(EventLabel::Reflection, cfg.thr_reflect_db)
    } else if d < 0.0 && snr >= cfg.thr_atten_db {
        if f.best_scale >= 2 && snr < cfg.thr_atten_db + 6.0 {
            hit(EventLabel::BroadLoss, cfg.thr_broadloss_db)
        } else {
            hit(EventLabel::Attenuation, cfg.thr_atten_db)
        }
    } else if d > 0.0 && snr >= cfg.thr_gainup_db && pol == Polarity::StepUp {
        hit(EventLabel::GainUp, cfg.thr_gainup_db)
    } else if d < 0.0 && pol == Polarity::SpikeNeg && snr >= cfg.thr_spike_neg_db {
        hit(EventLabel::SpikeNeg, cfg.thr_spike_neg_db)
    } else {
        SampleClass::default()
    }
}
