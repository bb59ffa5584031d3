//! Run-length segmentation and rule-driven merging.
//!
//! ## Rule Table
//!
//! Rules are an ordered list. For each segment, the first rule whose first
//! label matches is tried: the merger looks past unlabelled gaps for a
//! segment with the second label and joins the whole range when gap, lengths
//! and confidences are within limits.
//!
//! ```text
//! [REFL]··gap··[ATTEN ATTEN]   ─→   [REFLECT_LOSS ···········]
//! ```
//!
//! Merging can create new adjacencies, so passes repeat until the segment
//! count stops changing or the iteration cap is reached.

use serde::{Deserialize, Serialize};

use super::{classify::SampleClass, features::FeatureVector};
use crate::{
    constants::MAX_MERGE_ITERATIONS,
    errors::{AnalysisError, AnalysisResult},
    events::{EventLabel, FailReasons, Polarity, Verdict},
};

/// Numeric limits shared by all rule shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleLimits {
    /// Largest total length of unlabelled segments between the pair
    pub max_gap: usize,
    /// Minimum length of the first segment
    pub min_len_first: usize,
    /// Minimum length of the second segment
    pub min_len_second: usize,
    /// Minimum mean confidence of both segments
    pub min_confidence: f32,
}

impl RuleLimits {
    /// Limits with no confidence requirement.
    pub const fn new(max_gap: usize, min_len_first: usize, min_len_second: usize) -> Self {
        Self {
            max_gap,
            min_len_first,
            min_len_second,
            min_confidence: 0.0,
        }
    }
}

/// One merge rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MergeRule {
    /// Two different labels fuse into a compound label
    Join {
        /// Label of the earlier segment
        first: EventLabel,
        /// Label of the later segment
        second: EventLabel,
        /// Label of the merged segment
        into: EventLabel,
        /// Gap and length limits
        limits: RuleLimits,
    },
    /// Neighbouring segments of the same label coalesce
    Coalesce {
        /// Label on both sides and on the result
        label: EventLabel,
        /// Gap and length limits
        limits: RuleLimits,
    },
}

impl MergeRule {
    /// Label the earlier segment must carry
    pub fn first(&self) -> EventLabel {
        match *self {
            MergeRule::Join { first, .. } => first,
            MergeRule::Coalesce { label, .. } => label,
        }
    }

    /// Label the later segment must carry
    pub fn second(&self) -> EventLabel {
        match *self {
            MergeRule::Join { second, .. } => second,
            MergeRule::Coalesce { label, .. } => label,
        }
    }

    /// Label of the merged segment
    pub fn into_label(&self) -> EventLabel {
        match *self {
            MergeRule::Join { into, .. } => into,
            MergeRule::Coalesce { label, .. } => label,
        }
    }

    /// Gap and length limits
    pub fn limits(&self) -> &RuleLimits {
        match self {
            MergeRule::Join { limits, .. } | MergeRule::Coalesce { limits, .. } => limits,
        }
    }
}

/// Merge rule table plus iteration mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Ordered rules; earlier rules win
    pub rules: Vec<MergeRule>,
    /// Repeat passes until stable (capped); otherwise run one pass
    pub iterative: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                MergeRule::Join {
                    first: EventLabel::Reflection,
                    second: EventLabel::Attenuation,
                    into: EventLabel::ReflectLoss,
                    limits: RuleLimits::new(64, 1, 2),
                },
                MergeRule::Join {
                    first: EventLabel::Reflection,
                    second: EventLabel::BroadLoss,
                    into: EventLabel::ReflectLoss,
                    limits: RuleLimits::new(32, 1, 3),
                },
                MergeRule::Coalesce {
                    label: EventLabel::Attenuation,
                    limits: RuleLimits::new(16, 1, 1),
                },
                MergeRule::Coalesce {
                    label: EventLabel::Oscillation,
                    limits: RuleLimits::new(8, 2, 2),
                },
            ],
            iterative: true,
        }
    }
}

impl MergeConfig {
    /// No merging at all; raw run-length segments pass through.
    pub fn disabled() -> Self {
        Self {
            rules: Vec::new(),
            iterative: false,
        }
    }

    /// Reject rules that can never fire or would merge unlabelled runs.
    pub fn validate(&self) -> AnalysisResult<()> {
        for rule in &self.rules {
            if rule.first() == EventLabel::None || rule.second() == EventLabel::None {
                return Err(AnalysisError::InvalidConfig {
                    reason: "merge rules cannot match unlabelled segments",
                });
            }
            let limits = rule.limits();
            if limits.min_len_first == 0 || limits.min_len_second == 0 {
                return Err(AnalysisError::InvalidConfig {
                    reason: "merge rule minimum lengths must be at least 1",
                });
            }
            if !limits.min_confidence.is_finite() {
                return Err(AnalysisError::InvalidConfig {
                    reason: "merge rule confidence must be finite",
                });
            }
        }
        Ok(())
    }

    fn max_passes(&self) -> usize {
        if self.iterative {
            MAX_MERGE_ITERATIONS
        } else {
            1
        }
    }
}

/// Labelled range `[start, end]` with metrics and verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventSegment {
    /// First sample
    pub start: usize,
    /// Last sample
    pub end: usize,
    /// Segment label
    pub label: EventLabel,
    /// Summed per-sample confidence divided by the range length
    pub mean_confidence: f32,
    /// Highest `max_snr_db` inside the range
    pub peak_snr_db: f32,
    /// Highest `|delta|` inside the range
    pub peak_amplitude: f32,
    /// Most frequent polarity inside the range
    pub dominant_polarity: Polarity,
    /// Produced by at least one merge
    pub merged: bool,
    /// Pass/fail outcome
    pub verdict: Verdict,
    /// Why the segment failed
    pub fail_reasons: FailReasons,
}

impl EventSegment {
    /// Number of samples covered
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Segments always cover at least one sample
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Working segment during merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawSegment {
    pub start: usize,
    pub end: usize,
    pub label: EventLabel,
    pub conf_sum: f32,
    pub count: usize,
    pub merged: bool,
}

impl RawSegment {
    fn len(&self) -> usize {
        self.end - self.start + 1
    }

    fn mean_confidence(&self) -> f32 {
        self.conf_sum / self.count as f32
    }
}

/// Collapse per-sample classes into runs of equal label.
pub(crate) fn run_length(classes: &[SampleClass]) -> Vec<RawSegment> {
    let mut out: Vec<RawSegment> = Vec::new();
    for (i, c) in classes.iter().enumerate() {
        match out.last_mut() {
            Some(seg) if seg.label == c.label => {
                seg.end = i;
                seg.conf_sum += c.confidence;
                seg.count += 1;
            }
            _ => out.push(RawSegment {
                start: i,
                end: i,
                label: c.label,
                conf_sum: c.confidence,
                count: 1,
                merged: false,
            }),
        }
    }
    out
}

/// Try `rule` starting at `segs[i]`; returns the merged segment and the
/// index of the partner on success.
fn try_rule(segs: &[RawSegment], i: usize, rule: &MergeRule) -> Option<(RawSegment, usize)> {
    let a = &segs[i];
    let limits = rule.limits();
    if a.label != rule.first()
        || a.len() < limits.min_len_first
        || a.mean_confidence() < limits.min_confidence
    {
        return None;
    }

    let mut j = i + 1;
    let mut gap = 0;
    while j < segs.len() && segs[j].label == EventLabel::None {
        gap += segs[j].len();
        if gap > limits.max_gap {
            return None;
        }
        j += 1;
    }

    let b = segs.get(j)?;
    if b.label != rule.second()
        || b.len() < limits.min_len_second
        || b.mean_confidence() < limits.min_confidence
    {
        return None;
    }

    Some((
        RawSegment {
            start: a.start,
            end: b.end,
            label: rule.into_label(),
            conf_sum: a.conf_sum + b.conf_sum,
            count: b.end - a.start + 1,
            merged: true,
        },
        j,
    ))
}

/// One left-to-right merge pass.
pub(crate) fn merge_pass(segs: &[RawSegment], rules: &[MergeRule]) -> Vec<RawSegment> {
    let mut out = Vec::with_capacity(segs.len());
    let mut i = 0;
    while i < segs.len() {
        match rules.iter().find_map(|rule| try_rule(segs, i, rule)) {
            Some((merged, j)) => {
                out.push(merged);
                i = j + 1;
            }
            None => {
                out.push(segs[i]);
                i += 1;
            }
        }
    }
    out
}

/// Repeat merge passes until the count is stable. Returns the final list and
/// the number of passes that changed it.
pub(crate) fn merge_until_stable(
    mut segs: Vec<RawSegment>,
    cfg: &MergeConfig,
) -> (Vec<RawSegment>, usize) {
    let mut changed = 0;
    for _ in 0..cfg.max_passes() {
        let next = merge_pass(&segs, &cfg.rules);
        if next.len() == segs.len() {
            break;
        }
        segs = next;
        changed += 1;
    }
    (segs, changed)
}

/// Segment per-sample classes, merge them, and fill metrics from features.
///
/// Returns the segments and the number of merge passes that changed the
/// list. Verdicts are left at `Pass`; see [`super::verdict::apply_pass_fail`].
pub fn segment_and_merge(
    classes: &[SampleClass],
    features: &[FeatureVector],
    cfg: &MergeConfig,
) -> (Vec<EventSegment>, usize) {
    let raw = run_length(classes);
    let (merged, passes) = merge_until_stable(raw, cfg);

    let segments = merged
        .iter()
        .map(|seg| {
            let mut peak_snr = -100.0f32;
            let mut peak_amp = 0.0f32;
            let mut counts = [0usize; Polarity::COUNT];
            for f in features.get(seg.start..=seg.end).unwrap_or(&[]) {
                peak_snr = peak_snr.max(f.max_snr_db);
                peak_amp = peak_amp.max(f.delta.abs());
                counts[f.polarity as usize] += 1;
            }

            // Ties resolve to the lowest polarity code
            let mut dominant = Polarity::Flat;
            let mut best = 0;
            for (p, &c) in Polarity::ALL.iter().zip(&counts) {
                if c > best {
                    best = c;
                    dominant = *p;
                }
            }

            EventSegment {
                start: seg.start,
                end: seg.end,
                label: seg.label,
                mean_confidence: seg.mean_confidence(),
                peak_snr_db: peak_snr,
                peak_amplitude: peak_amp,
                dominant_polarity: dominant,
                merged: seg.merged,
                verdict: Verdict::Pass,
                fail_reasons: FailReasons::empty(),
            }
        })
        .collect();

    (segments, passes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(pattern: &[(EventLabel, usize, f32)]) -> Vec<SampleClass> {
        pattern
            .iter()
            .flat_map(|&(label, len, confidence)| {
                std::iter::repeat(SampleClass { label, confidence }).take(len)
            })
            .collect()
    }

    use EventLabel::*;

    #[test]
    fn run_length_groups_labels() {
        let c = classes(&[(None, 3, 0.0), (Reflection, 2, 0.5), (None, 4, 0.0)]);
        let raw = run_length(&c);
        assert_eq!(raw.len(), 3);
        assert_eq!((raw[1].start, raw[1].end), (3, 4));
        assert_eq!(raw[1].conf_sum, 1.0);
    }

    #[test]
    fn reflection_then_loss_becomes_compound() {
        let c = classes(&[
            (None, 10, 0.0),
            (Reflection, 1, 0.6),
            (None, 5, 0.0),
            (Attenuation, 2, 0.4),
            (None, 10, 0.0),
        ]);
        let (raw, passes) = merge_until_stable(run_length(&c), &MergeConfig::default());
        assert_eq!(passes, 1);
        assert_eq!(raw.len(), 3);
        let m = raw[1];
        assert_eq!(m.label, ReflectLoss);
        assert_eq!((m.start, m.end), (10, 17));
        assert!(m.merged);
        // Confidence sum spread over the whole merged range, gap included
        assert_eq!(m.count, 8);
        assert!((m.mean_confidence() - 1.4 / 8.0).abs() < 1e-6);
    }

    #[test]
    fn short_loss_does_not_merge() {
        let c = classes(&[(Reflection, 1, 0.6), (None, 3, 0.0), (Attenuation, 1, 0.4)]);
        let (raw, passes) = merge_until_stable(run_length(&c), &MergeConfig::default());
        assert_eq!(passes, 0);
        assert_eq!(raw.len(), 3);
    }

    #[test]
    fn gap_limit_is_respected() {
        let c = classes(&[(Attenuation, 2, 0.5), (None, 17, 0.0), (Attenuation, 2, 0.5)]);
        let (raw, _) = merge_until_stable(run_length(&c), &MergeConfig::default());
        assert_eq!(raw.len(), 3);

        let c = classes(&[(Attenuation, 2, 0.5), (None, 16, 0.0), (Attenuation, 2, 0.5)]);
        let (raw, _) = merge_until_stable(run_length(&c), &MergeConfig::default());
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].label, Attenuation);
    }

    #[test]
    fn iteration_reaches_fixed_point() {
        // Four attenuation runs: pass 1 joins pairs, pass 2 joins the pairs
        let c = classes(&[
            (Attenuation, 1, 0.5),
            (None, 4, 0.0),
            (Attenuation, 1, 0.5),
            (None, 4, 0.0),
            (Attenuation, 1, 0.5),
            (None, 4, 0.0),
            (Attenuation, 1, 0.5),
        ]);
        let (raw, passes) = merge_until_stable(run_length(&c), &MergeConfig::default());
        assert_eq!(raw.len(), 1);
        assert_eq!(passes, 2);

        let single = MergeConfig {
            iterative: false,
            ..MergeConfig::default()
        };
        let (raw, passes) = merge_until_stable(run_length(&c), &single);
        // [ATTEN 0..5] [gap] [ATTEN 10..15]
        assert_eq!(raw.len(), 3);
        assert_eq!(passes, 1);
    }

    #[test]
    fn oscillation_needs_two_samples_each() {
        let c = classes(&[(Oscillation, 1, 0.5), (None, 2, 0.0), (Oscillation, 3, 0.5)]);
        let (raw, _) = merge_until_stable(run_length(&c), &MergeConfig::default());
        assert_eq!(raw.len(), 3);

        let c = classes(&[(Oscillation, 2, 0.5), (None, 2, 0.0), (Oscillation, 3, 0.5)]);
        let (raw, _) = merge_until_stable(run_length(&c), &MergeConfig::default());
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn disabled_config_passes_through() {
        let c = classes(&[(Attenuation, 2, 0.5), (None, 1, 0.0), (Attenuation, 2, 0.5)]);
        let (raw, passes) = merge_until_stable(run_length(&c), &MergeConfig::disabled());
        assert_eq!(raw.len(), 3);
        assert_eq!(passes, 0);
    }

    #[test]
    fn rules_on_none_are_rejected() {
        let cfg = MergeConfig {
            rules: vec![MergeRule::Coalesce {
                label: None,
                limits: RuleLimits::new(1, 1, 1),
            }],
            iterative: true,
        };
        assert!(cfg.validate().is_err());
        assert!(MergeConfig::default().validate().is_ok());
    }
}
