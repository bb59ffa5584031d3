//! Signal-quality core for UFT-NX
//!
//! Scores flux and amplitude traces read from worn media: flags hardware
//! anomalies, finds and labels events, aligns repeated revolutions, and turns
//! all of it into per-sample confidence. A chunked streaming engine runs the
//! same checks on unbounded input.
//!
//! Key constraints:
//! - Single-threaded, synchronous calls
//! - Buffers allocated once per component and reused
//! - Allocation failures surface as errors, never aborts
//!
//! ```no_run
//! use uftnx_core::{EventDetector, IntegrityScanner};
//!
//! let trace: Vec<f32> = vec![0.5; 4096];
//!
//! let integrity = IntegrityScanner::default().scan(&trace).unwrap();
//! let detection = EventDetector::default().detect(&trace).unwrap();
//! println!(
//!     "integrity {:.3}, {} events",
//!     integrity.summary.integrity_score,
//!     detection.event_count()
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod constants;
pub mod detector;
pub mod errors;
pub mod events;
pub mod fusion;
pub mod integrity;
pub mod pipeline;
pub mod stats;
pub mod traits;

// Public API
pub use detector::{DetectionReport, DetectorConfig, EventDetector};
pub use errors::{AnalysisError, AnalysisResult, ErrorKind};
pub use events::{Event, EventFlags, EventLabel, Verdict};
pub use fusion::{Aligner, ConfidenceFusion, ConfidenceInputs};
pub use integrity::{IntegrityFlags, IntegrityReport, IntegrityScanner};
pub use pipeline::{PipelineConfig, StreamPipeline};
pub use traits::{PipelineObserver, Sample};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
