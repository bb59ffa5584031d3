//! Constants for the UFT-NX Analysis Core
//!
//! Centralised numeric defaults used by every component. Each constant names
//! its unit in the identifier where one applies (`_DB`, `_SAMPLES`).
//!
//! ## Organization
//!
//! - **Statistics**: robust estimator parameters
//! - **Integrity**: anomaly thresholds and minimum run lengths
//! - **Detector**: multi-scale window sizes and per-label SNR thresholds
//! - **Alignment**: revolution limits and correlation parameters
//! - **Confidence**: component weights and band thresholds
//! - **Streaming**: ring and chunk sizing

// ===== STATISTICS =====

/// MAD to Gaussian sigma consistency factor.
///
/// For normally distributed data, `1.4826 * MAD` is an unbiased estimate of
/// the standard deviation.
pub const MAD_SCALE: f32 = 1.4826;

/// Smallest sigma any estimator will report.
///
/// Keeps `|delta| / sigma` finite on perfectly flat input.
pub const SIGMA_MIN: f32 = 1e-12;

// ===== INTEGRITY =====

/// Minimum samples accepted by the integrity scanner.
pub const INTEGRITY_MIN_SAMPLES: usize = 4;

/// Amplitude magnitude below which a sample counts toward a dropout run.
pub const DROPOUT_THRESHOLD: f32 = 0.01;

/// Shortest dropout run that is flagged.
pub const DROPOUT_MIN_RUN: usize = 8;

/// Fixed high clipping rail for normalised amplitude.
pub const CLIP_HIGH_RAIL: f32 = 0.98;

/// Fixed low clipping rail for normalised amplitude.
pub const CLIP_LOW_RAIL: f32 = -0.98;

/// Shortest saturated run that is flagged.
pub const CLIP_MIN_RUN: usize = 4;

/// Upper percentile used when rails are derived from the data.
pub const AUTO_RAIL_HIGH_PERCENTILE: f32 = 0.999;

/// Lower percentile used when rails are derived from the data.
pub const AUTO_RAIL_LOW_PERCENTILE: f32 = 0.001;

/// Largest sample-to-sample change still treated as "not moving".
pub const STUCK_DELTA_THRESHOLD: f32 = 1e-6;

/// Shortest stuck-at run that is flagged.
pub const STUCK_MIN_RUN: usize = 8;

/// Local SNR (`|delta| / sigma`) below which a sample is considered dead.
pub const DEADZONE_SNR_THRESHOLD: f32 = 0.05;

/// Shortest dead-zone run that is flagged.
pub const DEADZONE_MIN_RUN: usize = 64;

/// Trailing window for the dead-zone sigma estimate.
pub const DEADZONE_WINDOW: usize = 1024;

/// Samples between dead-zone sigma recomputations.
pub const DEADZONE_STRIDE: usize = 256;

/// Integrity penalty per anomaly region.
pub const REGION_PENALTY: f32 = 0.02;

/// Upper bound on the accumulated region penalty.
pub const REGION_PENALTY_CAP: f32 = 0.5;

/// Default capacity of the region list.
pub const DEFAULT_MAX_REGIONS: usize = 256;

// ===== DETECTOR =====

/// Maximum number of analysis scales.
pub const MAX_SCALES: usize = 8;

/// Default window sizes, fine to coarse.
pub const DEFAULT_SCALE_WINDOWS: [usize; 4] = [128, 512, 2048, 8192];

/// Trailing window for the detector's local sigma.
pub const SIGMA_WINDOW: usize = 4096;

/// Samples between local sigma recomputations.
pub const SIGMA_STRIDE: usize = 256;

/// Reflection-like spike threshold.
pub const THR_REFLECT_SNR_DB: f32 = 12.0;

/// Attenuation-like step threshold.
pub const THR_ATTEN_SNR_DB: f32 = 10.0;

/// Negative spike threshold.
pub const THR_SPIKE_NEG_SNR_DB: f32 = 12.0;

/// Gain-up step threshold.
pub const THR_GAINUP_SNR_DB: f32 = 10.0;

/// Oscillation threshold.
pub const THR_OSCILLATION_SNR_DB: f32 = 8.0;

/// Broad/gradual loss threshold.
pub const THR_BROADLOSS_SNR_DB: f32 = 6.0;

/// Envelope RMS below which a sample is never classified.
pub const MIN_ENV_RMS: f32 = 1e-4;

/// Half-width of the polarity neighbourhood.
pub const POLARITY_HALFWIN: usize = 5;

/// Significance multiplier applied to sigma when reading polarity.
pub const POLARITY_SIGMA_MULT: f32 = 3.0;

/// Detector SNR floor.
pub const SNR_FLOOR_DB: f32 = -60.0;

/// Detector SNR ceiling.
pub const SNR_CEIL_DB: f32 = 60.0;

/// SNR span mapped onto the [0, 1] classification confidence.
pub const CONFIDENCE_SPAN_DB: f32 = 20.0;

/// Hard cap on fixed-point merge iterations.
pub const MAX_MERGE_ITERATIONS: usize = 8;

/// Default cap on the segment list.
pub const DEFAULT_MAX_SEGMENTS: usize = 16_384;

/// Pass/fail: maximum single-event loss (peak |delta| as proxy).
pub const PF_MAX_LOSS: f32 = 1.0;

/// Pass/fail: maximum reflectance (peak SNR of reflection-type events).
pub const PF_MAX_REFLECTANCE_DB: f32 = 35.0;

/// Pass/fail: minimum acceptable peak SNR.
pub const PF_MIN_SNR_DB: f32 = 6.0;

/// Pass/fail: longest acceptable single event.
pub const PF_MAX_EVENT_LENGTH: usize = 500;

/// Pass/fail: warn once a metric reaches this fraction of its limit.
pub const PF_WARN_FACTOR: f32 = 0.7;

// ===== ALIGNMENT =====

/// Minimum revolutions for alignment.
pub const ALIGN_MIN_REVOLUTIONS: usize = 2;

/// Minimum samples per revolution.
pub const ALIGN_MIN_SAMPLES: usize = 32;

/// Lags whose overlap is shorter than this are skipped.
pub const ALIGN_MIN_OVERLAP: usize = 16;

/// Default lag search radius.
pub const DEFAULT_MAX_LAG: usize = 64;

/// NCC above which a revolution counts as validly aligned.
pub const NCC_VALID_THRESHOLD: f32 = 0.8;

// ===== CONFIDENCE =====

/// Weight of the cross-revolution agreement component.
pub const WEIGHT_AGREEMENT: f32 = 0.40;

/// Weight of the SNR component.
pub const WEIGHT_SNR: f32 = 0.35;

/// Weight of the integrity component.
pub const WEIGHT_INTEGRITY: f32 = 0.25;

/// SNR mapped to a zero SNR component.
pub const CONF_SNR_FLOOR_DB: f32 = 0.0;

/// SNR mapped to a full SNR component.
pub const CONF_SNR_CEIL_DB: f32 = 30.0;

/// Agreement assumed when no multi-revolution input exists.
pub const DEFAULT_AGREEMENT: f32 = 0.5;

/// SNR assumed when no SNR trace is supplied.
pub const DEFAULT_SNR_DB: f32 = 10.0;

/// Integrity value for a clean sample.
pub const INTEGRITY_CLEAN: f32 = 1.0;

/// Integrity value for a flagged sample.
pub const INTEGRITY_FLAGGED: f32 = 0.0;

/// Integrity value for a flagged sample that was repaired.
pub const INTEGRITY_REPAIRED: f32 = 0.7;

/// Reporting band: HIGH at or above this confidence.
pub const REPORT_HIGH_THRESHOLD: f32 = 0.8;

/// Reporting band: MID at or above this confidence.
pub const REPORT_MID_THRESHOLD: f32 = 0.4;

/// Segmentation band: HIGH at or above this confidence.
pub const SEGMENT_HIGH_THRESHOLD: f32 = 0.7;

/// Segmentation band: LOW below this confidence.
pub const SEGMENT_LOW_THRESHOLD: f32 = 0.3;

/// Segments shorter than this are discarded from the ranking.
pub const MIN_SEGMENT_LEN: usize = 8;

// ===== STREAMING =====

/// Default ring capacity in samples.
pub const DEFAULT_RING_CAPACITY: usize = 65_536;

/// Default chunk size in samples.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 256;

/// Smallest remainder a flush will still analyse.
pub const MIN_FLUSH_SAMPLES: usize = 4;

/// Streaming detector: threshold as a multiple of mean |delta|.
pub const STREAM_THRESHOLD_K: f32 = 4.0;

/// Streaming detector: quiet samples tolerated inside one event.
pub const STREAM_EVENT_GAP: usize = 2;

/// Streaming detector: sign changes that mark an event as oscillation.
pub const STREAM_OSCILLATION_CHANGES: usize = 3;
