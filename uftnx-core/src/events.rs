//! Event Vocabulary Shared by Detection, Streaming and Export
//!
//! ## Overview
//!
//! Both the multi-scale detector and the streaming engine describe what they
//! find with the same small set of types:
//!
//! - [`EventLabel`]: what kind of feature a run of samples looks like
//! - [`Polarity`]: the local sign pattern of first differences
//! - [`Verdict`] and [`FailReasons`]: the pass/fail outcome for a segment
//! - [`Event`]: a compact, copyable record handed to callbacks and exporters
//!
//! ## Label Vocabulary
//!
//! The labels keep their fiber-trace names because the thresholds and merge
//! rules were tuned against them. On flux traces they read as:
//!
//! ```text
//! Reflection   positive spike     (flux spike / noise burst)
//! Attenuation  negative step      (amplitude loss)
//! ReflectLoss  spike then loss    (compound defect)
//! GainUp       positive step      (amplitude recovery)
//! SpikeNeg     negative spike     (short dropout)
//! Oscillation  alternating signs  (ringing / weak bits)
//! BroadLoss    gradual loss       (media wear)
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

/// Classification label for a sample or a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventLabel {
    /// Nothing detected
    #[default]
    None = 0,
    /// Reflection-like positive spike
    Reflection = 1,
    /// Attenuation-like negative step
    Attenuation = 2,
    /// Merged compound of a spike followed by loss
    ReflectLoss = 3,
    /// Positive step
    GainUp = 4,
    /// Negative spike
    SpikeNeg = 5,
    /// Alternating-sign burst
    Oscillation = 6,
    /// Broad or gradual loss
    BroadLoss = 7,
}

impl EventLabel {
    /// All labels in discriminant order.
    pub const ALL: [EventLabel; 8] = [
        EventLabel::None,
        EventLabel::Reflection,
        EventLabel::Attenuation,
        EventLabel::ReflectLoss,
        EventLabel::GainUp,
        EventLabel::SpikeNeg,
        EventLabel::Oscillation,
        EventLabel::BroadLoss,
    ];

    /// Stable uppercase name used by the exporters.
    pub const fn name(&self) -> &'static str {
        match self {
            EventLabel::None => "NONE",
            EventLabel::Reflection => "REFLECTION",
            EventLabel::Attenuation => "ATTENUATION",
            EventLabel::ReflectLoss => "REFLECT_LOSS",
            EventLabel::GainUp => "GAIN_UP",
            EventLabel::SpikeNeg => "SPIKE_NEG",
            EventLabel::Oscillation => "OSCILLATION",
            EventLabel::BroadLoss => "BROAD_LOSS",
        }
    }

    /// Numeric code used in the binary record.
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Inverse of [`EventLabel::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Reflection-type labels are subject to the reflectance limit.
    pub const fn is_reflective(&self) -> bool {
        matches!(self, EventLabel::Reflection | EventLabel::ReflectLoss)
    }
}

impl fmt::Display for EventLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Local polarity pattern of first differences around a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Polarity {
    /// No significant deltas
    #[default]
    Flat = 0,
    /// Significant positive center, few negatives
    SpikePos = 1,
    /// Significant negative center, few positives
    SpikeNeg = 2,
    /// Negative deltas dominate
    StepDown = 3,
    /// Positive deltas dominate
    StepUp = 4,
    /// Positive center followed by several negatives
    SpikeStep = 5,
    /// Three or more sign changes
    Oscillate = 6,
}

impl Polarity {
    /// Number of polarity patterns.
    pub const COUNT: usize = 7;

    /// All patterns in discriminant order.
    pub const ALL: [Polarity; 7] = [
        Polarity::Flat,
        Polarity::SpikePos,
        Polarity::SpikeNeg,
        Polarity::StepDown,
        Polarity::StepUp,
        Polarity::SpikeStep,
        Polarity::Oscillate,
    ];

    /// Stable uppercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Polarity::Flat => "FLAT",
            Polarity::SpikePos => "SPIKE_POS",
            Polarity::SpikeNeg => "SPIKE_NEG",
            Polarity::StepDown => "STEP_DOWN",
            Polarity::StepUp => "STEP_UP",
            Polarity::SpikeStep => "SPIKE_STEP",
            Polarity::Oscillate => "OSCILLATE",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pass/fail outcome for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Verdict {
    /// Within all limits
    Pass = 0,
    /// Within limits but close to one
    Warn = 1,
    /// At least one limit exceeded
    Fail = 2,
}

impl Verdict {
    /// Stable uppercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Warn => "WARN",
            Verdict::Fail => "FAIL",
        }
    }

    /// Numeric code used in the binary record.
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Inverse of [`Verdict::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Verdict::Pass),
            1 => Some(Verdict::Warn),
            2 => Some(Verdict::Fail),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit set of reasons a segment failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FailReasons(u32);

impl FailReasons {
    /// Peak amplitude above the loss limit
    pub const HIGH_LOSS: Self = Self(1 << 0);
    /// Peak SNR below the minimum
    pub const LOW_SNR: Self = Self(1 << 1);
    /// Segment longer than the maximum event length
    pub const TOO_LONG: Self = Self(1 << 2);
    /// Reflection-type segment above the reflectance limit
    pub const HIGH_REFLECTANCE: Self = Self(1 << 3);
    /// Dominant polarity is oscillation
    pub const PATTERN: Self = Self(1 << 4);

    /// No reasons
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Build from raw bits, keeping unknown bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// True when no bit is set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Add a reason
    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// True when every bit of `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// Bit set describing where an [`Event`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EventFlags(u32);

impl EventFlags {
    /// Produced by merging two or more raw segments
    pub const MERGED: Self = Self(1 << 0);
    /// Touches the first sample of its chunk
    pub const CHUNK_START: Self = Self(1 << 1);
    /// Touches the last sample of its chunk
    pub const CHUNK_END: Self = Self(1 << 2);
    /// Overlaps samples flagged by the integrity scanner
    pub const INTEGRITY: Self = Self(1 << 3);

    /// No flags
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Build from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Add a flag
    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// True when every bit of `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// Compact event record.
///
/// `start` and `end` are inclusive absolute sample positions. Records are
/// `Copy` so callbacks and exporters can keep them without borrowing the
/// component that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// What the event looks like
    pub kind: EventLabel,
    /// First sample (inclusive)
    pub start: u64,
    /// Last sample (inclusive)
    pub end: u64,
    /// Mean confidence over the event range, 0..=1
    pub confidence: f32,
    /// How pronounced the event is, 0..=1
    pub severity: f32,
    /// Peak SNR inside the event
    pub peak_snr_db: f32,
    /// Pass/fail outcome when one was computed
    pub verdict: Option<Verdict>,
    /// Why the event failed, if it did
    pub fail_reasons: FailReasons,
    /// Provenance flags
    pub flags: EventFlags,
}

impl Event {
    /// Number of samples covered
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Events always cover at least one sample
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True when the two inclusive ranges share a sample
    pub fn overlaps(&self, other: &Event) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_codes_round_trip() {
        for label in EventLabel::ALL {
            assert_eq!(EventLabel::from_code(label.code()), Some(label));
        }
        assert_eq!(EventLabel::from_code(42), None);
    }

    #[test]
    fn label_names() {
        assert_eq!(EventLabel::ReflectLoss.to_string(), "REFLECT_LOSS");
        assert_eq!(Polarity::SpikeStep.name(), "SPIKE_STEP");
        assert_eq!(Verdict::Warn.name(), "WARN");
    }

    #[test]
    fn fail_reason_bits() {
        let mut r = FailReasons::empty();
        assert!(r.is_empty());
        r.set(FailReasons::LOW_SNR);
        r.set(FailReasons::PATTERN);
        assert!(r.contains(FailReasons::LOW_SNR));
        assert!(!r.contains(FailReasons::HIGH_LOSS));
        assert_eq!(r.bits(), 0b10010);
    }

    #[test]
    fn event_overlap() {
        let a = Event {
            kind: EventLabel::Reflection,
            start: 10,
            end: 20,
            confidence: 0.5,
            severity: 0.5,
            peak_snr_db: 20.0,
            verdict: None,
            fail_reasons: FailReasons::empty(),
            flags: EventFlags::empty(),
        };
        let mut b = a;
        b.start = 20;
        b.end = 25;
        assert!(a.overlaps(&b));
        b.start = 21;
        assert!(!a.overlaps(&b));
        assert_eq!(a.len(), 11);
    }
}
