//! Whole-trace analysis, export encodings and golden vectors for UFT-NX
//!
//! This crate sits on top of `uftnx-core`. It runs the integrity scanner,
//! the multi-scale detector and confidence fusion over one complete buffer,
//! packages the results into an [`AnalysisReport`], and encodes that report
//! as JSON, CSV or a fixed-layout binary blob.
//!
//! Every encoder follows the same two-call protocol: pass `None` to learn the
//! required byte count, then pass a buffer at least that large.
//!
//! ```no_run
//! use uftnx_report::{analyze, ExportFormat};
//!
//! let trace: Vec<f32> = vec![0.5; 4096];
//! let report = analyze(&trace).unwrap();
//!
//! let needed = report.export(ExportFormat::Json, None).unwrap();
//! let mut buf = vec![0u8; needed];
//! report.export(ExportFormat::Json, Some(&mut buf)).unwrap();
//! ```
//!
//! The [`golden`] module holds deterministic synthetic traces with expected
//! result ranges, used as regression fixtures.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod analysis;
pub mod export;
pub mod golden;

pub use analysis::{
    analyze, overall_quality, AnalysisConfig, AnalysisReport, Analyzer, ANALYZE_MIN_SAMPLES,
};
pub use export::{BinaryHeader, BinaryRecord, ExportFormat};
pub use golden::{GoldenVector, ValidationOutcome};

use std::io;

use thiserror::Error;
use uftnx_core::AnalysisError;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors from operations that touch files or JSON configuration.
///
/// Pure in-memory operations return [`AnalysisError`] directly.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Analysis or encoding failed
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Reading or writing a file failed
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Configuration JSON could not be parsed or produced
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for file and configuration operations
pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn analysis_errors_convert() {
        let err: ReportError = AnalysisError::MissingInput { what: "samples" }.into();
        assert!(matches!(err, ReportError::Analysis(_)));
        assert!(err.to_string().contains("samples"));
    }
}
