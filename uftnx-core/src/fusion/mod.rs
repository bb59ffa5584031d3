//! Multi-Revolution Fusion and Confidence
//!
//! Two halves:
//!
//! - [`align`]: lag search against a reference revolution, zero-padded
//!   shifting, per-sample median fusion and label stability.
//! - [`confidence`]: per-sample confidence from agreement, SNR and integrity,
//!   plus band segmentation and ranking.
//!
//! ## Usage Example
//!
//! ```rust
//! use uftnx_core::fusion::{Aligner, ConfidenceFusion, ConfidenceInputs};
//!
//! let base: Vec<f32> = (0..256).map(|i| ((i as f32) * 0.21).sin()).collect();
//! let mut late = vec![0.0f32; 256];
//! late[3..].copy_from_slice(&base[..253]);
//!
//! let result = Aligner::default().align(&[&base, &late]).unwrap();
//! assert_eq!(result.report.shifts[1], -3);
//!
//! let conf = ConfidenceFusion::default()
//!     .analyze(result.fused.len(), &ConfidenceInputs::new())
//!     .unwrap();
//! assert_eq!(conf.samples.len(), 256);
//! ```

pub mod align;
pub mod confidence;

pub use align::{
    apply_shift, estimate_shift, fuse_median, stability, AlignConfig, Aligner, AlignmentReport,
    AlignmentResult, ShiftEstimate, StabilityReport,
};
pub use confidence::{
    Band, ConfidenceConfig, ConfidenceFusion, ConfidenceInputs, ConfidenceReport, ConfidenceSample,
    ConfidenceSummary, RankedSegment,
};
