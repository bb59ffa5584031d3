//! Integrity Scanner for Hardware Anomalies
//!
//! ## Overview
//!
//! Before any event analysis, a trace is checked for acquisition faults that
//! make samples untrustworthy. Four independent linear passes run in a fixed
//! order, each producing contiguous runs:
//!
//! ```text
//! samples ─→ 1. dropout    |amp| < threshold
//!         ─→ 2. saturation amp >= high rail / amp <= low rail
//!         ─→ 3. stuck-at   |delta| <= tiny threshold
//!         ─→ 4. dead zone  |delta| / local sigma < SNR threshold
//!                  ↓
//!         flags[n] + regions + summary
//! ```
//!
//! ## Dominance
//!
//! Later passes only consider samples earlier passes left clean, so a flat
//! run of zeros is a dropout (never also stuck-at) and a clipped plateau is
//! saturation. Regions therefore never overlap within one scan; they are
//! listed in pass order, not sorted by position.
//!
//! ## Scoring
//!
//! ```text
//! integrity = clamp(1 - flagged/n - min(0.02 × regions, 0.5), 0, 1)
//! ```
//!
//! ## Repair
//!
//! [`repair`] is a separate, explicit step: it linearly interpolates across
//! dropout and stuck-at runs from the boundary samples, sets `REPAIRED` and
//! clears `EXCLUDE`. Scanning never modifies samples.
//!
//! ## Usage Example
//!
//! ```rust
//! use uftnx_core::integrity::{IntegrityScanner, IntegrityFlags};
//!
//! let mut signal = vec![0.5f32; 256];
//! for (i, s) in signal.iter_mut().enumerate() {
//!     *s += if i % 2 == 0 { 0.01 } else { -0.01 };
//! }
//! signal[100..140].fill(0.0);
//!
//! let report = IntegrityScanner::default().scan(&signal).unwrap();
//! assert_eq!(report.summary.dropout_count, 1);
//! assert!(report.flags[120].contains(IntegrityFlags::DROPOUT));
//! ```

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    errors::{try_buffer, AnalysisError, AnalysisResult},
    stats,
    traits::{Sample, Validatable},
};

/// Per-sample integrity bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct IntegrityFlags(u8);

impl IntegrityFlags {
    /// Amplitude collapsed toward zero
    pub const DROPOUT: Self = Self(1 << 0);
    /// At or above the high rail
    pub const CLIP_HIGH: Self = Self(1 << 1);
    /// At or below the low rail
    pub const CLIP_LOW: Self = Self(1 << 2);
    /// Value not moving
    pub const STUCK: Self = Self(1 << 3);
    /// Abnormally low local SNR
    pub const DEADZONE: Self = Self(1 << 4);
    /// Value was rewritten by [`repair`]
    pub const REPAIRED: Self = Self(1 << 5);
    /// Sample should be excluded from downstream statistics
    pub const EXCLUDE: Self = Self(1 << 6);

    /// Every anomaly bit
    pub const ANOMALY_MASK: Self = Self(0b0001_1111);

    /// Bits the repair step may fix
    pub const REPAIRABLE: Self = Self(Self::DROPOUT.0 | Self::STUCK.0);

    /// No flags
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Build from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Set bits
    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear bits
    pub fn clear(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// True when every bit of `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// True when any bit of `other` is set
    pub const fn intersects(&self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// True when any anomaly bit is set
    pub const fn is_anomalous(&self) -> bool {
        self.intersects(Self::ANOMALY_MASK)
    }
}

/// Anomaly type with its type-specific metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// Amplitude collapsed toward zero
    Dropout,
    /// Pinned to a rail
    Saturated {
        /// True for the high rail, false for the low rail
        high: bool,
        /// Rail value in effect during the scan
        rail: f32,
    },
    /// Not moving
    Stuck {
        /// Value the signal is stuck at
        value: f32,
    },
    /// Low local SNR
    DeadZone {
        /// Mean `|delta| / sigma` over the region
        local_snr: f32,
    },
}

impl AnomalyKind {
    /// Stable uppercase name
    pub const fn name(&self) -> &'static str {
        match self {
            AnomalyKind::Dropout => "DROPOUT",
            AnomalyKind::Saturated { .. } => "SATURATED",
            AnomalyKind::Stuck { .. } => "STUCK",
            AnomalyKind::DeadZone { .. } => "DEADZONE",
        }
    }
}

/// Contiguous anomalous range `[start, end]` (both inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRegion {
    /// Type and metadata
    pub kind: AnomalyKind,
    /// First sample
    pub start: usize,
    /// Last sample
    pub end: usize,
    /// 0..=1
    pub severity: f32,
    /// Mean amplitude over the region (finite samples only)
    pub mean_value: f32,
}

impl AnomalyRegion {
    /// Number of samples covered
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Regions always cover at least one sample
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Run the dropout pass
    pub detect_dropout: bool,
    /// `|amp|` below this counts toward a dropout
    pub dropout_threshold: f32,
    /// Shortest flagged dropout
    pub dropout_min_run: usize,

    /// Run the saturation pass
    pub detect_saturation: bool,
    /// Fixed high rail
    pub clip_high: f32,
    /// Fixed low rail
    pub clip_low: f32,
    /// Shortest flagged saturated run
    pub clip_min_run: usize,
    /// Derive rails from amplitude percentiles instead of the fixed values
    pub auto_rails: bool,
    /// Percentile used for the auto high rail
    pub auto_rail_high_percentile: f32,
    /// Percentile used for the auto low rail
    pub auto_rail_low_percentile: f32,

    /// Run the stuck-at pass
    pub detect_stuck: bool,
    /// Largest `|delta|` still counted as stuck
    pub stuck_threshold: f32,
    /// Shortest flagged stuck run
    pub stuck_min_run: usize,

    /// Run the dead-zone pass
    pub detect_deadzone: bool,
    /// Local SNR below which a sample is dead
    pub deadzone_snr_threshold: f32,
    /// Shortest flagged dead zone
    pub deadzone_min_run: usize,
    /// Trailing window for the local sigma
    pub deadzone_window: usize,
    /// Samples between sigma recomputations
    pub deadzone_stride: usize,

    /// Set `EXCLUDE` on every anomalous sample
    pub mark_exclude: bool,
    /// Capacity of the region list
    pub max_regions: usize,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            detect_dropout: true,
            dropout_threshold: DROPOUT_THRESHOLD,
            dropout_min_run: DROPOUT_MIN_RUN,
            detect_saturation: true,
            clip_high: CLIP_HIGH_RAIL,
            clip_low: CLIP_LOW_RAIL,
            clip_min_run: CLIP_MIN_RUN,
            auto_rails: false,
            auto_rail_high_percentile: AUTO_RAIL_HIGH_PERCENTILE,
            auto_rail_low_percentile: AUTO_RAIL_LOW_PERCENTILE,
            detect_stuck: true,
            stuck_threshold: STUCK_DELTA_THRESHOLD,
            stuck_min_run: STUCK_MIN_RUN,
            detect_deadzone: true,
            deadzone_snr_threshold: DEADZONE_SNR_THRESHOLD,
            deadzone_min_run: DEADZONE_MIN_RUN,
            deadzone_window: DEADZONE_WINDOW,
            deadzone_stride: DEADZONE_STRIDE,
            mark_exclude: true,
            max_regions: DEFAULT_MAX_REGIONS,
        }
    }
}

impl IntegrityConfig {
    /// Shorter minimum runs; catches brief glitches at the cost of more
    /// regions on noisy media.
    pub fn strict() -> Self {
        Self {
            dropout_min_run: 4,
            clip_min_run: 2,
            stuck_min_run: 4,
            deadzone_min_run: 32,
            ..Self::default()
        }
    }

    /// Settings for raw flux intervals in nanoseconds.
    ///
    /// Intervals are never near zero on healthy media and have no fixed
    /// rails, so rails come from the data and thresholds are in ns.
    pub fn flux_intervals() -> Self {
        Self {
            dropout_threshold: 1.0,
            auto_rails: true,
            stuck_threshold: 0.5,
            ..Self::default()
        }
    }

    /// Check that thresholds and run lengths are usable.
    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.dropout_threshold.is_valid() || self.dropout_threshold < 0.0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "dropout threshold must be finite and non-negative",
            });
        }
        if self.dropout_min_run == 0
            || self.clip_min_run == 0
            || self.stuck_min_run == 0
            || self.deadzone_min_run == 0
        {
            return Err(AnalysisError::InvalidConfig {
                reason: "minimum run lengths must be at least 1",
            });
        }
        if !self.auto_rails && !(self.clip_low < self.clip_high) {
            return Err(AnalysisError::InvalidConfig {
                reason: "low rail must be below high rail",
            });
        }
        if !(0.0..=1.0).contains(&self.auto_rail_high_percentile)
            || !(0.0..=1.0).contains(&self.auto_rail_low_percentile)
            || self.auto_rail_low_percentile >= self.auto_rail_high_percentile
        {
            return Err(AnalysisError::InvalidConfig {
                reason: "auto rail percentiles must satisfy 0 <= low < high <= 1",
            });
        }
        if self.deadzone_window == 0 || self.deadzone_stride == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "dead-zone window and stride must be non-zero",
            });
        }
        if !self.stuck_threshold.is_valid() || !self.deadzone_snr_threshold.is_valid() {
            return Err(AnalysisError::InvalidConfig {
                reason: "thresholds must be finite",
            });
        }
        Ok(())
    }
}

/// Aggregate scan results. Counts are true totals even when the region list
/// was truncated.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntegritySummary {
    /// Samples scanned
    pub n_samples: usize,
    /// Samples with any anomaly bit
    pub flagged_samples: usize,
    /// `flagged_samples / n_samples`
    pub flagged_fraction: f32,
    /// Dropout regions
    pub dropout_count: usize,
    /// Saturated regions (both rails)
    pub saturated_count: usize,
    /// Stuck-at regions
    pub stuck_count: usize,
    /// Dead-zone regions
    pub deadzone_count: usize,
    /// All regions found
    pub total_regions: usize,
    /// Samples flagged as dropout
    pub dropout_samples: usize,
    /// Samples flagged as saturated
    pub saturated_samples: usize,
    /// Samples flagged as stuck
    pub stuck_samples: usize,
    /// Samples flagged as dead zone
    pub deadzone_samples: usize,
    /// High rail in effect
    pub rail_high: f32,
    /// Low rail in effect
    pub rail_low: f32,
    /// True when the region list hit `max_regions`
    pub regions_truncated: bool,
    /// Single 0..=1 quality figure
    pub integrity_score: f32,
}

/// Output of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    /// One mask per input sample
    pub flags: Vec<IntegrityFlags>,
    /// Anomaly regions in pass order, capped at `max_regions`
    pub regions: Vec<AnomalyRegion>,
    /// Totals and score
    pub summary: IntegritySummary,
}

impl IntegrityReport {
    /// Regions of one anomaly type, in scan order
    pub fn regions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AnomalyRegion> + 'a {
        self.regions.iter().filter(move |r| r.kind.name() == name)
    }
}

/// Integrity score from counts.
pub fn integrity_score(flagged: usize, n: usize, regions: usize) -> f32 {
    if n == 0 {
        return 0.0;
    }
    let penalty = (REGION_PENALTY * regions as f32).min(REGION_PENALTY_CAP);
    stats::clamp(1.0 - flagged as f32 / n as f32 - penalty, 0.0, 1.0)
}

/// Bounded region list that still counts everything pushed into it.
struct RegionSink {
    regions: Vec<AnomalyRegion>,
    capacity: usize,
    total: usize,
}

impl RegionSink {
    fn new(capacity: usize) -> Self {
        Self {
            regions: Vec::with_capacity(capacity.min(64)),
            capacity,
            total: 0,
        }
    }

    fn push(&mut self, region: AnomalyRegion) {
        self.total += 1;
        if self.regions.len() < self.capacity {
            self.regions.push(region);
        }
    }
}

/// Call `on_run(start, end)` for every maximal run of indices where `pred`
/// holds and whose length is at least `min_run`.
fn for_each_run(
    n: usize,
    min_run: usize,
    pred: impl Fn(usize) -> bool,
    mut on_run: impl FnMut(usize, usize),
) {
    let mut i = 0;
    while i < n {
        if !pred(i) {
            i += 1;
            continue;
        }
        let start = i;
        while i < n && pred(i) {
            i += 1;
        }
        if i - start >= min_run {
            on_run(start, i - 1);
        }
    }
}

fn finite_mean(x: &[f32]) -> f32 {
    let (sum, count) = x
        .iter()
        .filter(|v| v.is_valid())
        .fold((0.0f64, 0usize), |(s, c), &v| (s + v as f64, c + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

fn length_severity(len: usize, scale: usize) -> f32 {
    stats::clamp(len as f32 / scale.max(1) as f32, 0.0, 1.0)
}

/// Integrity scanner.
#[derive(Debug, Clone, Default)]
pub struct IntegrityScanner {
    config: IntegrityConfig,
}

impl IntegrityScanner {
    /// Create a scanner, rejecting invalid configurations.
    pub fn new(config: IntegrityConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &IntegrityConfig {
        &self.config
    }

    /// Scan samples in any accepted encoding.
    pub fn scan_samples<T: Sample>(&self, samples: &[T]) -> AnalysisResult<IntegrityReport> {
        if samples.is_empty() {
            return Err(AnalysisError::MissingInput { what: "samples" });
        }
        AnalysisError::ensure_len(samples.len(), INTEGRITY_MIN_SAMPLES)?;
        self.scan(&T::normalize(samples))
    }

    /// Scan float amplitude samples.
    pub fn scan(&self, x: &[f32]) -> AnalysisResult<IntegrityReport> {
        if x.is_empty() {
            return Err(AnalysisError::MissingInput { what: "samples" });
        }
        AnalysisError::ensure_len(x.len(), INTEGRITY_MIN_SAMPLES)?;

        let cfg = &self.config;
        let n = x.len();
        let mut flags = try_buffer(n, IntegrityFlags::empty())?;
        let mut sink = RegionSink::new(cfg.max_regions);
        let mut summary = IntegritySummary {
            n_samples: n,
            ..IntegritySummary::default()
        };

        if cfg.detect_dropout {
            self.scan_dropout(x, &mut flags, &mut sink, &mut summary);
        }

        let (rail_low, rail_high) = self.rails(x);
        summary.rail_low = rail_low;
        summary.rail_high = rail_high;
        if cfg.detect_saturation {
            self.scan_saturation(x, rail_low, rail_high, &mut flags, &mut sink, &mut summary);
        }
        if cfg.detect_stuck {
            self.scan_stuck(x, &mut flags, &mut sink, &mut summary);
        }
        if cfg.detect_deadzone {
            self.scan_deadzone(x, &mut flags, &mut sink, &mut summary)?;
        }

        let mut flagged = 0;
        for f in flags.iter_mut() {
            if f.is_anomalous() {
                flagged += 1;
                if cfg.mark_exclude {
                    f.set(IntegrityFlags::EXCLUDE);
                }
            }
        }

        summary.flagged_samples = flagged;
        summary.flagged_fraction = flagged as f32 / n as f32;
        summary.total_regions = sink.total;
        summary.regions_truncated = sink.total > sink.regions.len();
        summary.integrity_score = integrity_score(flagged, n, sink.total);

        if summary.regions_truncated {
            warn!(
                "integrity region list truncated: kept {} of {}",
                sink.regions.len(),
                sink.total
            );
        }
        debug!(
            "integrity scan: n={} flagged={} regions={} score={:.3}",
            n, flagged, sink.total, summary.integrity_score
        );

        Ok(IntegrityReport {
            flags,
            regions: sink.regions,
            summary,
        })
    }

    fn rails(&self, x: &[f32]) -> (f32, f32) {
        let cfg = &self.config;
        if !cfg.auto_rails {
            return (cfg.clip_low, cfg.clip_high);
        }
        let finite: Vec<f32> = x.iter().copied().filter(|v| v.is_valid()).collect();
        (
            stats::percentile(&finite, cfg.auto_rail_low_percentile),
            stats::percentile(&finite, cfg.auto_rail_high_percentile),
        )
    }

    fn scan_dropout(
        &self,
        x: &[f32],
        flags: &mut [IntegrityFlags],
        sink: &mut RegionSink,
        summary: &mut IntegritySummary,
    ) {
        let thr = self.config.dropout_threshold;
        let min_run = self.config.dropout_min_run;
        let is_dropout = |i: usize| !x[i].is_valid() || x[i].abs() < thr;

        for_each_run(x.len(), min_run, is_dropout, |start, end| {
            for f in &mut flags[start..=end] {
                f.set(IntegrityFlags::DROPOUT);
            }
            let len = end - start + 1;
            summary.dropout_count += 1;
            summary.dropout_samples += len;
            sink.push(AnomalyRegion {
                kind: AnomalyKind::Dropout,
                start,
                end,
                severity: length_severity(len, min_run * 8),
                mean_value: finite_mean(&x[start..=end]),
            });
        });
    }

    fn scan_saturation(
        &self,
        x: &[f32],
        rail_low: f32,
        rail_high: f32,
        flags: &mut [IntegrityFlags],
        sink: &mut RegionSink,
        summary: &mut IntegritySummary,
    ) {
        let min_run = self.config.clip_min_run;
        for (high, rail, bit) in [
            (true, rail_high, IntegrityFlags::CLIP_HIGH),
            (false, rail_low, IntegrityFlags::CLIP_LOW),
        ] {
            let snapshot: Vec<bool> = flags.iter().map(|f| f.is_anomalous()).collect();
            let pinned = |i: usize| {
                !snapshot[i] && x[i].is_valid() && if high { x[i] >= rail } else { x[i] <= rail }
            };

            for_each_run(x.len(), min_run, pinned, |start, end| {
                for f in &mut flags[start..=end] {
                    f.set(bit);
                }
                let len = end - start + 1;
                summary.saturated_count += 1;
                summary.saturated_samples += len;
                sink.push(AnomalyRegion {
                    kind: AnomalyKind::Saturated { high, rail },
                    start,
                    end,
                    severity: length_severity(len, min_run * 16),
                    mean_value: finite_mean(&x[start..=end]),
                });
            });
        }
    }

    fn scan_stuck(
        &self,
        x: &[f32],
        flags: &mut [IntegrityFlags],
        sink: &mut RegionSink,
        summary: &mut IntegritySummary,
    ) {
        let thr = self.config.stuck_threshold;
        let min_run = self.config.stuck_min_run;
        let snapshot: Vec<bool> = flags.iter().map(|f| f.is_anomalous()).collect();
        let not_moving = |i: usize| {
            i >= 1 && !snapshot[i] && x[i].is_valid() && (x[i] - x[i - 1]).abs() <= thr
        };

        for_each_run(x.len(), min_run, not_moving, |run_start, end| {
            // Include the sample the run is anchored on when it is still clean
            let start = if run_start >= 1 && !snapshot[run_start - 1] {
                run_start - 1
            } else {
                run_start
            };
            for f in &mut flags[start..=end] {
                f.set(IntegrityFlags::STUCK);
            }
            let len = end - start + 1;
            summary.stuck_count += 1;
            summary.stuck_samples += len;
            sink.push(AnomalyRegion {
                kind: AnomalyKind::Stuck { value: x[start] },
                start,
                end,
                severity: length_severity(len, min_run * 8),
                mean_value: finite_mean(&x[start..=end]),
            });
        });
    }

    fn scan_deadzone(
        &self,
        x: &[f32],
        flags: &mut [IntegrityFlags],
        sink: &mut RegionSink,
        summary: &mut IntegritySummary,
    ) -> AnalysisResult<()> {
        let cfg = &self.config;
        let n = x.len();

        let mut delta = try_buffer(n, 0.0f32)?;
        let clean: Vec<f32> = x.iter().map(|&v| if v.is_valid() { v } else { 0.0 }).collect();
        stats::delta_into(&clean, &mut delta);

        let mut sigma = try_buffer(n, 0.0f32)?;
        stats::local_sigma_into(
            &delta,
            cfg.deadzone_window,
            cfg.deadzone_stride,
            MAD_SCALE,
            SIGMA_MIN,
            &mut sigma,
        );

        let snr: Vec<f32> = delta
            .iter()
            .zip(&sigma)
            .map(|(d, s)| d.abs() / s)
            .collect();

        let thr = cfg.deadzone_snr_threshold;
        let snapshot: Vec<bool> = flags.iter().map(|f| f.is_anomalous()).collect();
        let dead = |i: usize| !snapshot[i] && snr[i] < thr;

        for_each_run(n, cfg.deadzone_min_run, dead, |start, end| {
            for f in &mut flags[start..=end] {
                f.set(IntegrityFlags::DEADZONE);
            }
            let len = end - start + 1;
            let local_snr = stats::mean(&snr[start..=end]);
            summary.deadzone_count += 1;
            summary.deadzone_samples += len;
            sink.push(AnomalyRegion {
                kind: AnomalyKind::DeadZone { local_snr },
                start,
                end,
                severity: stats::clamp(1.0 - local_snr / thr.max(SIGMA_MIN), 0.0, 1.0),
                mean_value: finite_mean(&x[start..=end]),
            });
        });
        Ok(())
    }
}

/// Interpolate across dropout and stuck-at runs in place.
///
/// Each run is replaced by a straight line between the samples just outside
/// it. A run touching one end of the buffer is filled with the single
/// available boundary value; a run covering the whole buffer is left alone.
/// Repaired samples get `REPAIRED` and lose `EXCLUDE`. Returns the number of
/// samples rewritten.
pub fn repair(samples: &mut [f32], flags: &mut [IntegrityFlags]) -> AnalysisResult<usize> {
    if samples.is_empty() {
        return Err(AnalysisError::MissingInput { what: "samples" });
    }
    if flags.len() != samples.len() {
        return Err(AnalysisError::LengthMismatch {
            expected: samples.len(),
            actual: flags.len(),
        });
    }
    AnalysisError::ensure_len(samples.len(), INTEGRITY_MIN_SAMPLES)?;

    let n = samples.len();
    let mut repaired = 0;
    let mut i = 0;

    while i < n {
        if !flags[i].intersects(IntegrityFlags::REPAIRABLE) {
            i += 1;
            continue;
        }
        let start = i;
        while i < n && flags[i].intersects(IntegrityFlags::REPAIRABLE) {
            i += 1;
        }
        let end = i - 1;

        let left = start.checked_sub(1).map(|j| samples[j]).filter(|v| v.is_valid());
        let right = (end + 1 < n).then(|| samples[end + 1]).filter(|v| v.is_valid());

        let fill = |k: usize| -> Option<f32> {
            match (left, right) {
                (Some(l), Some(r)) => {
                    let span = (end + 2 - start) as f32;
                    let t = (k + 1 - start) as f32 / span;
                    Some(l + (r - l) * t)
                }
                (Some(l), None) => Some(l),
                (None, Some(r)) => Some(r),
                (None, None) => None,
            }
        };

        for k in start..=end {
            if let Some(v) = fill(k) {
                samples[k] = v;
                flags[k].set(IntegrityFlags::REPAIRED);
                flags[k].clear(IntegrityFlags::EXCLUDE);
                repaired += 1;
            }
        }
    }

    debug!("integrity repair: {} samples rewritten", repaired);
    Ok(repaired)
}
