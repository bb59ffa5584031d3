//! Whole-buffer analysis: integrity, detection and confidence in one call.

use log::debug;
use serde::{Deserialize, Serialize};
use uftnx_core::{
    detector::DetectorConfig,
    fusion::{ConfidenceConfig, ConfidenceSummary, RankedSegment},
    integrity::{IntegrityConfig, IntegritySummary},
    stats, AnalysisError, AnalysisResult, ConfidenceFusion, ConfidenceInputs, Event, EventDetector,
    IntegrityFlags, IntegrityScanner, Sample,
};

use crate::ReportResult;

/// Fewest samples [`Analyzer::analyze`] accepts.
pub const ANALYZE_MIN_SAMPLES: usize = 16;

/// Per-event penalty in the overall quality score
const EVENT_PENALTY: f32 = 0.02;

/// Configuration for every stage run by [`Analyzer`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Integrity scanner parameters
    pub integrity: IntegrityConfig,
    /// Multi-scale detector parameters
    pub detector: DetectorConfig,
    /// Confidence fusion parameters
    pub confidence: ConfidenceConfig,
}

impl AnalysisConfig {
    /// Parse a configuration; missing fields take their defaults.
    pub fn from_json(text: &str) -> ReportResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every nested configuration.
    pub fn validate(&self) -> AnalysisResult<()> {
        self.integrity.validate()?;
        self.detector.validate()?;
        self.confidence.validate()
    }
}

/// Everything [`Analyzer::analyze`] found in one trace.
///
/// The report owns its arrays; nothing borrows the input buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    /// Library version that produced the report
    pub version: &'static str,
    /// Samples analysed
    pub n_samples: usize,
    /// Per-sample integrity flags
    pub flags: Vec<IntegrityFlags>,
    /// Integrity totals and score
    pub integrity: IntegritySummary,
    /// Per-sample confidence
    pub confidence: Vec<f32>,
    /// Confidence statistics
    pub confidence_summary: ConfidenceSummary,
    /// Detected events, in trace order
    pub events: Vec<Event>,
    /// Confidence segments, best first
    pub segments: Vec<RankedSegment>,
    /// Combined quality score, 0..=1
    pub overall_quality: f32,
}

impl AnalysisReport {
    /// Number of detected events
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// Number of ranked segments
    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }
}

/// `0.4 · integrity + 0.4 · mean confidence + 0.2 · (1 − 0.02 · events)`,
/// clamped to `[0, 1]`.
pub fn overall_quality(integrity: f32, mean_confidence: f32, events: usize) -> f32 {
    let event_term = 1.0 - EVENT_PENALTY * events as f32;
    stats::clamp(
        0.4 * integrity + 0.4 * mean_confidence + 0.2 * event_term,
        0.0,
        1.0,
    )
}

/// Runs the integrity scanner, the detector and confidence fusion over a
/// complete buffer.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    scanner: IntegrityScanner,
    detector: EventDetector,
    fusion: ConfidenceFusion,
}

impl Analyzer {
    /// Build every stage, rejecting invalid configurations.
    pub fn new(config: &AnalysisConfig) -> AnalysisResult<Self> {
        Ok(Self {
            scanner: IntegrityScanner::new(config.integrity.clone())?,
            detector: EventDetector::new(config.detector.clone())?,
            fusion: ConfidenceFusion::new(config.confidence)?,
        })
    }

    /// Analyse samples in any accepted encoding.
    pub fn analyze_samples<T: Sample>(&self, samples: &[T]) -> AnalysisResult<AnalysisReport> {
        if samples.is_empty() {
            return Err(AnalysisError::MissingInput { what: "samples" });
        }
        self.analyze(&T::normalize(samples))
    }

    /// Analyse a float amplitude trace.
    ///
    /// Confidence is scored from the integrity flags alone; there is no
    /// alignment stage here, so agreement and SNR take their defaults.
    pub fn analyze(&self, x: &[f32]) -> AnalysisResult<AnalysisReport> {
        if x.is_empty() {
            return Err(AnalysisError::MissingInput { what: "samples" });
        }
        if x.len() < ANALYZE_MIN_SAMPLES {
            return Err(AnalysisError::TooSmall {
                required: ANALYZE_MIN_SAMPLES,
                available: x.len(),
            });
        }
        let n = x.len();

        let integrity = self.scanner.scan(x)?;
        let detection = self.detector.detect(x)?;
        let confidence = self
            .fusion
            .analyze(n, &ConfidenceInputs::new().with_flags(&integrity.flags))?;

        let events = detection.to_events(self.detector.config().snr_ceil_db);
        let quality = overall_quality(
            integrity.summary.integrity_score,
            confidence.summary.mean,
            events.len(),
        );
        debug!(
            "analyze: n={} events={} integrity={:.3} confidence={:.3} quality={:.3}",
            n,
            events.len(),
            integrity.summary.integrity_score,
            confidence.summary.mean,
            quality
        );

        Ok(AnalysisReport {
            version: crate::VERSION,
            n_samples: n,
            confidence: confidence.values(),
            flags: integrity.flags,
            integrity: integrity.summary,
            confidence_summary: confidence.summary,
            events,
            segments: confidence.segments,
            overall_quality: quality,
        })
    }
}

/// Analyse `x` with the default configuration.
pub fn analyze(x: &[f32]) -> AnalysisResult<AnalysisReport> {
    Analyzer::default().analyze(x)
}
