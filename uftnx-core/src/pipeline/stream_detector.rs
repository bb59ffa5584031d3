//! Single-scale threshold detector for streaming chunks.
//!
//! The multi-scale detector re-analyses trailing windows that reach back
//! thousands of samples, which does not compose across chunk boundaries. The
//! streaming engine uses this cheaper approximation instead:
//!
//! ```text
//! sigma = mean |delta|              (floored at SIGMA_MIN)
//! thr   = k · sigma
//! run   = crossings of |delta| > thr, joined across gaps of ≤ max_gap
//! kind  = Oscillation if the run changes sign ≥ oscillation_changes times,
//!         otherwise Reflection (positive peak) or Attenuation
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    errors::{AnalysisError, AnalysisResult},
    events::{Event, EventFlags, EventLabel, FailReasons},
    integrity::IntegrityFlags,
    stats,
};

/// Streaming detector parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDetectorConfig {
    /// Threshold as a multiple of mean `|delta|`
    pub threshold_k: f32,
    /// Quiet samples tolerated inside one event
    pub max_gap: usize,
    /// Sign changes that make a run an oscillation
    pub oscillation_changes: usize,
}

impl Default for StreamDetectorConfig {
    fn default() -> Self {
        Self {
            threshold_k: STREAM_THRESHOLD_K,
            max_gap: STREAM_EVENT_GAP,
            oscillation_changes: STREAM_OSCILLATION_CHANGES,
        }
    }
}

impl StreamDetectorConfig {
    /// Threshold multiple must be positive.
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.threshold_k > 0.0) || !self.threshold_k.is_finite() {
            return Err(AnalysisError::InvalidConfig {
                reason: "stream threshold multiple must be positive",
            });
        }
        if self.oscillation_changes == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "oscillation sign-change count must be non-zero",
            });
        }
        Ok(())
    }
}

/// Fast per-chunk detector. Owns its delta scratch buffer.
#[derive(Debug, Clone)]
pub struct StreamDetector {
    config: StreamDetectorConfig,
    delta: Vec<f32>,
}

impl StreamDetector {
    /// Create a detector with room for `capacity` samples per chunk.
    pub fn new(config: StreamDetectorConfig, capacity: usize) -> AnalysisResult<Self> {
        config.validate()?;
        let delta = crate::errors::try_buffer(capacity, 0.0f32)?;
        Ok(Self { config, delta })
    }

    /// Active configuration
    pub fn config(&self) -> &StreamDetectorConfig {
        &self.config
    }

    /// Detect events in `x`, appending them to `out` with absolute positions
    /// (`offset` is the absolute index of `x[0]`). Returns the number added.
    pub fn detect(
        &mut self,
        x: &[f32],
        offset: u64,
        flags: Option<&[IntegrityFlags]>,
        out: &mut Vec<Event>,
    ) -> usize {
        let n = x.len();
        if n < 2 {
            return 0;
        }
        if self.delta.len() < n {
            self.delta.resize(n, 0.0);
        }
        let delta = &mut self.delta[..n];
        stats::delta_into(x, delta);

        let sum: f64 = delta[1..].iter().map(|d| d.abs() as f64).sum();
        let sigma = ((sum / (n - 1) as f64) as f32).max(SIGMA_MIN);
        let thr = self.config.threshold_k * sigma;

        let before = out.len();
        let mut i = 1;
        while i < n {
            if delta[i].abs() <= thr {
                i += 1;
                continue;
            }

            let start = i;
            let mut end = i;
            let mut peak = delta[i];
            let mut last_sign = delta[i] > 0.0;
            let mut changes = 0;

            let mut j = i + 1;
            while j < n && j - end <= self.config.max_gap + 1 {
                let d = delta[j];
                if d.abs() > thr {
                    let sign = d > 0.0;
                    if sign != last_sign {
                        changes += 1;
                        last_sign = sign;
                    }
                    if d.abs() > peak.abs() {
                        peak = d;
                    }
                    end = j;
                }
                j += 1;
            }

            let kind = if changes >= self.config.oscillation_changes {
                EventLabel::Oscillation
            } else if peak > 0.0 {
                EventLabel::Reflection
            } else {
                EventLabel::Attenuation
            };

            let mut event_flags = EventFlags::empty();
            if start <= 1 {
                event_flags.set(EventFlags::CHUNK_START);
            }
            if end == n - 1 {
                event_flags.set(EventFlags::CHUNK_END);
            }
            if flags.is_some_and(|f| f[start..=end].iter().any(IntegrityFlags::is_anomalous)) {
                event_flags.set(EventFlags::INTEGRITY);
            }

            let severity = stats::clamp(1.0 - thr / peak.abs(), 0.0, 1.0);
            let peak_snr_db = stats::clamp(
                20.0 * libm::log10f(peak.abs() / sigma),
                SNR_FLOOR_DB,
                SNR_CEIL_DB,
            );

            out.push(Event {
                kind,
                start: offset + start as u64,
                end: offset + end as u64,
                confidence: severity,
                severity,
                peak_snr_db,
                verdict: None,
                fail_reasons: FailReasons::empty(),
                flags: event_flags,
            });

            i = end + 1;
        }
        out.len() - before
    }
}
