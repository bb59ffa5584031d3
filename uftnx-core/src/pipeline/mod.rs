//! Streaming Pipeline Engine
//!
//! ## Overview
//!
//! Samples arrive in pushes of any size; analysis runs on fixed-size,
//! overlapping chunks taken from a ring buffer:
//!
//! ```text
//! push ─→ RingBuffer ─→ chunk (peek) ─→ integrity ─→ [repair] ─→ fast detector
//!                            │                                       │
//!                            │              confidence (flags only) ←┘
//!                            │                        │
//!                            │          back-fill event confidence
//!                            ↓                        ↓
//!              consume(chunk - overlap)     on_event × k, then on_chunk
//! ```
//!
//! Only `chunk_size - overlap` samples are retired per chunk, so the next
//! chunk re-examines the trailing `overlap` samples. Events already reported
//! from an earlier chunk are not reported again, and an event that runs into
//! the end of a non-final chunk from inside the overlap is left for the next
//! chunk, which sees it whole.
//!
//! ## State Machine
//!
//! ```text
//!         push              flush                 (completes)
//! Idle ──────────→ Running ──────────→ Flushing ──────────────→ Done
//!   ↑                                                             │
//!   └──────────────────────────── reset ─────────────────────────┘
//! ```
//!
//! `reset` is accepted from any state; it clears statistics and buffered
//! samples but keeps every allocation and registered callback.
//!
//! ## Thread Safety
//!
//! None. One instance is driven by one caller. Callbacks run synchronously
//! inside `push` / `flush`, and for every chunk all event callbacks fire
//! before the chunk callback.
//!
//! ## Usage Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use uftnx_core::pipeline::{PipelineConfig, StreamPipeline};
//!
//! let seen = Arc::new(Mutex::new(0usize));
//! let counter = Arc::clone(&seen);
//!
//! let mut pipeline = StreamPipeline::new(PipelineConfig::default()).unwrap();
//! pipeline.on_chunk(move |chunk| *counter.lock().unwrap() += chunk.len);
//!
//! let x: Vec<f32> = (0..10_000).map(|i| 0.5 + 0.01 * ((i % 7) as f32)).collect();
//! pipeline.push(&x).unwrap();
//! pipeline.flush().unwrap();
//!
//! assert_eq!(pipeline.stats().samples_processed, 10_000);
//! assert!(*seen.lock().unwrap() >= 10_000);
//! ```

mod engine;
pub mod stream_detector;

pub use engine::StreamPipeline;
pub use stream_detector::{StreamDetector, StreamDetectorConfig};

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    errors::{AnalysisError, AnalysisResult},
    events::Event,
    fusion::{ConfidenceConfig, ConfidenceSummary},
    integrity::{IntegrityConfig, IntegritySummary},
};

/// Lifecycle state of a [`StreamPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PipelineState {
    /// Constructed or reset, nothing pushed yet
    #[default]
    Idle,
    /// Accepting samples
    Running,
    /// Analysing the remainder
    Flushing,
    /// Flushed; only `reset` is accepted
    Done,
}

impl PipelineState {
    /// Lowercase state name
    pub const fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Flushing => "flushing",
            PipelineState::Done => "done",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ring buffer capacity in samples
    pub ring_capacity: usize,
    /// Samples per analysed chunk
    pub chunk_size: usize,
    /// Trailing samples re-examined by the next chunk
    pub overlap: usize,
    /// Run the integrity scanner on each chunk
    pub enable_integrity: bool,
    /// Interpolate over repairable anomalies before detection
    pub auto_repair: bool,
    /// Run the fast detector on each chunk
    pub enable_detection: bool,
    /// Score each chunk and back-fill event confidence
    pub enable_confidence: bool,
    /// Integrity scanner parameters
    pub integrity: IntegrityConfig,
    /// Fast detector parameters
    pub detector: StreamDetectorConfig,
    /// Confidence parameters
    pub confidence: ConfidenceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_RING_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            enable_integrity: true,
            auto_repair: false,
            enable_detection: true,
            enable_confidence: true,
            integrity: IntegrityConfig::default(),
            detector: StreamDetectorConfig::default(),
            confidence: ConfidenceConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Small ring and chunks for constrained hosts.
    pub fn low_memory() -> Self {
        Self {
            ring_capacity: 8192,
            chunk_size: 1024,
            overlap: 64,
            ..Self::default()
        }
    }

    /// Check sizing and nested configurations.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.chunk_size < 16 {
            return Err(AnalysisError::InvalidConfig {
                reason: "chunk size must be at least 16 samples",
            });
        }
        if self.overlap >= self.chunk_size {
            return Err(AnalysisError::InvalidConfig {
                reason: "overlap must be smaller than the chunk size",
            });
        }
        if self.ring_capacity < self.chunk_size {
            return Err(AnalysisError::InvalidConfig {
                reason: "ring capacity must hold at least one chunk",
            });
        }
        self.integrity.validate()?;
        self.detector.validate()?;
        self.confidence.validate()
    }
}

/// Running totals since construction or the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Samples accepted by `push`
    pub samples_pushed: u64,
    /// Samples retired after analysis
    pub samples_processed: u64,
    /// Samples lost to ring overflow
    pub samples_dropped: u64,
    /// Chunks analysed
    pub chunks_processed: u64,
    /// Events reported through callbacks
    pub events_reported: u64,
    /// Events suppressed as repeats from the overlap region
    pub events_suppressed: u64,
    /// Flagged samples summed over chunks (overlap counted per chunk)
    pub flagged_samples: u64,
    /// Samples rewritten by auto-repair
    pub repaired_samples: u64,
    /// Mean chunk integrity score
    pub mean_integrity: f32,
    /// Mean chunk confidence
    pub mean_confidence: f32,
    /// Lowest sample confidence seen
    pub min_confidence: f32,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self {
            samples_pushed: 0,
            samples_processed: 0,
            samples_dropped: 0,
            chunks_processed: 0,
            events_reported: 0,
            events_suppressed: 0,
            flagged_samples: 0,
            repaired_samples: 0,
            mean_integrity: 1.0,
            mean_confidence: 0.0,
            min_confidence: 1.0,
        }
    }
}

/// Result of one analysed chunk, handed to chunk callbacks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkReport<'a> {
    /// Chunk sequence number, from 0
    pub index: u64,
    /// Absolute position of the first sample
    pub offset: u64,
    /// Samples in the chunk
    pub len: usize,
    /// True for the chunk produced by `flush`
    pub is_final: bool,
    /// Integrity summary when the scanner ran
    pub integrity: Option<IntegritySummary>,
    /// Confidence summary when fusion ran
    pub confidence: Option<ConfidenceSummary>,
    /// Events detected in the chunk, before repeat suppression
    pub detected: usize,
    /// Events newly reported from this chunk
    pub events: &'a [Event],
}
