//! Error Types for Signal Analysis Operations
//!
//! ## Design Philosophy
//!
//! Errors are returned from every public operation and may be stored inside
//! pipeline statistics, so they follow a few rules:
//!
//! 1. **Small Size**: every variant carries inline data only (counts and
//!    `&'static str` reasons), no `String`.
//!
//! 2. **Copy Semantics**: errors implement `Copy` so they can be returned from
//!    hot paths and compared in tests without cloning.
//!
//! 3. **Closed Taxonomy**: each variant maps onto exactly one [`ErrorKind`].
//!    Callers that only need the coarse category (or the legacy negative
//!    integer code) match on the kind instead of the variant.
//!
//! ## Error Categories
//!
//! ### Input Problems
//! - `MissingInput`: a required buffer was absent or empty
//! - `TooSmall`: sample count or revolution count below the stated minimum
//! - `LengthMismatch`: parallel buffers disagree in length
//!
//! ### Configuration Problems
//! - `InvalidConfig`: a config value is outside the supported set
//! - `InvalidState`: the operation is not allowed in the current pipeline state
//!
//! ### Output Problems
//! - `Format`: an export encoding could not be produced or parsed
//! - `BufferTooSmall`: the caller's output buffer cannot hold the encoding
//!
//! ### System Issues
//! - `NoMemory`: a working buffer could not be reserved
//! - `Internal`: an invariant inside a sub-call failed
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use uftnx_core::{AnalysisError, ErrorKind, IntegrityScanner};
//!
//! let scanner = IntegrityScanner::default();
//! match scanner.scan(&[0.5, 0.4]) {
//!     Ok(report) => println!("score {}", report.summary.integrity_score),
//!     Err(e) if e.kind() == ErrorKind::TooSmall => {
//!         // Not enough samples to say anything useful
//!     }
//!     Err(e) => eprintln!("scan failed ({}): {e}", e.code()),
//! }
//! ```

use thiserror::Error;

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Coarse error taxonomy shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required input was absent
    Null,
    /// Sample or revolution count below the component minimum
    TooSmall,
    /// Allocation failed
    NoMemory,
    /// Configuration value outside the supported set
    InvalidConfig,
    /// Export format error
    Format,
    /// Unexpected failure inside a sub-call
    Internal,
}

impl ErrorKind {
    /// Negative sentinel code for callers that speak integer status codes.
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::Null => -1,
            ErrorKind::TooSmall => -2,
            ErrorKind::NoMemory => -3,
            ErrorKind::InvalidConfig => -4,
            ErrorKind::Format => -5,
            ErrorKind::Internal => -6,
        }
    }

    /// Short uppercase name, stable across releases.
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::Null => "NULL",
            ErrorKind::TooSmall => "TOO_SMALL",
            ErrorKind::NoMemory => "NO_MEMORY",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::Format => "FORMAT",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Analysis errors - kept small and `Copy`
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AnalysisError {
    /// A required input buffer was not supplied or is empty
    #[error("missing input: {what}")]
    MissingInput {
        /// Which argument was missing
        what: &'static str,
    },

    /// Not enough samples (or revolutions) for the operation
    #[error("input too small: need {required}, have {available}")]
    TooSmall {
        /// Minimum count accepted by the operation
        required: usize,
        /// Count actually supplied
        available: usize,
    },

    /// A working buffer could not be reserved
    #[error("allocation of {requested} elements failed")]
    NoMemory {
        /// Number of elements that were requested
        requested: usize,
    },

    /// Configuration value outside the supported set
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration
        reason: &'static str,
    },

    /// Parallel buffers disagree in length
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length every buffer must share
        expected: usize,
        /// Length of the offending buffer
        actual: usize,
    },

    /// Operation not permitted in the current state
    #[error("operation not allowed in state {state}")]
    InvalidState {
        /// Name of the state the object was in
        state: &'static str,
    },

    /// Export encoding could not be produced or parsed
    #[error("format error: {reason}")]
    Format {
        /// What went wrong while encoding or decoding
        reason: &'static str,
    },

    /// Caller-supplied output buffer is too small
    #[error("output buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes needed for the full encoding
        required: usize,
        /// Bytes available in the caller's buffer
        available: usize,
    },

    /// Invariant violated inside a sub-call
    #[error("internal error: {reason}")]
    Internal {
        /// Description of the violated invariant
        reason: &'static str,
    },
}

impl AnalysisError {
    /// Map the variant onto the closed taxonomy.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MissingInput { .. } => ErrorKind::Null,
            AnalysisError::TooSmall { .. } => ErrorKind::TooSmall,
            AnalysisError::NoMemory { .. } => ErrorKind::NoMemory,
            AnalysisError::InvalidConfig { .. }
            | AnalysisError::LengthMismatch { .. }
            | AnalysisError::InvalidState { .. } => ErrorKind::InvalidConfig,
            AnalysisError::Format { .. } | AnalysisError::BufferTooSmall { .. } => ErrorKind::Format,
            AnalysisError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Negative integer code of the error kind
    pub const fn code(&self) -> i32 {
        self.kind().code()
    }

    /// Shorthand used by every entry point that enforces a minimum length.
    pub(crate) fn ensure_len(available: usize, required: usize) -> AnalysisResult<()> {
        if available < required {
            Err(AnalysisError::TooSmall { required, available })
        } else {
            Ok(())
        }
    }
}

/// Allocate a zero-initialised working buffer, reporting allocation failure
/// as [`AnalysisError::NoMemory`] instead of aborting.
pub(crate) fn try_buffer<T: Clone>(len: usize, fill: T) -> AnalysisResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| AnalysisError::NoMemory { requested: len })?;
    buf.resize(len, fill);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(AnalysisError::MissingInput { what: "x" }.kind(), ErrorKind::Null);
        assert_eq!(AnalysisError::TooSmall { required: 4, available: 1 }.code(), -2);
        assert_eq!(
            AnalysisError::LengthMismatch { expected: 3, actual: 2 }.kind(),
            ErrorKind::InvalidConfig
        );
        assert_eq!(
            AnalysisError::BufferTooSmall { required: 64, available: 0 }.kind(),
            ErrorKind::Format
        );
        assert_eq!(ErrorKind::Internal.name(), "INTERNAL");
    }

    #[test]
    fn ensure_len_rejects_short_input() {
        assert!(AnalysisError::ensure_len(3, 4).is_err());
        assert!(AnalysisError::ensure_len(4, 4).is_ok());
    }

    #[test]
    fn try_buffer_fills() {
        let buf = try_buffer(5, 0u8).unwrap();
        assert_eq!(buf, vec![0u8; 5]);
    }
}
