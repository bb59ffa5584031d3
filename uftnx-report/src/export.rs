//! Export Encodings
//!
//! ## Formats
//!
//! ### JSON
//! One object with stable field names:
//! ```json
//! {"version":"0.1.0","samples":4096,
//!  "integrity":{"score":1.0,"flagged":0,"dropouts":0,"saturated":0,"stuck":0,"deadzones":0},
//!  "confidence":{"mean":0.57,"median":0.57,"min":0.57,"max":0.57,
//!                "high_count":0,"mid_count":4096,"low_count":0},
//!  "overall_quality":0.83,"events":[...],"segments":[...]}
//! ```
//!
//! ### CSV
//! ```csv
//! # UFT-NX Analysis Export (CSV)
//! # samples=4096,integrity=1.0000,confidence=0.5667,quality=0.8267,events=1
//! type,start,end,confidence,severity,flags
//! REFLECTION,256,256,0.5667,0.4118,0
//! ```
//!
//! ### Binary
//! Little-endian, a 64-byte header followed by `n_events` 24-byte records:
//! ```text
//! 0..4    magic "UFTx"          32..36  integrity score f32
//! 4..8    version u32           36..40  mean confidence f32
//! 8..12   sections u8 + pad     40..44  overall quality f32
//! 12..20  n_samples u64         44..64  reserved 5 × u32
//! 20..24  n_events u32
//! 24..28  n_segments u32        record: kind u8, verdict u8 (0xFF none),
//! 28..32  record size u32               reserved u16, start u32, end u32,
//!                                       confidence f32, severity f32, flags u32
//! ```
//!
//! ## Two-call protocol
//!
//! [`AnalysisReport::export`] with `None` returns the byte count; called again
//! with a buffer at least that long it writes the encoding and returns the
//! same count.

use std::{fmt::Write as _, fs, path::Path};

use log::debug;
use serde::Serialize;
use uftnx_core::{AnalysisError, AnalysisResult, Event, EventFlags, EventLabel, Verdict};

use crate::{AnalysisReport, ReportResult};

/// Magic bytes at offset 0 of every binary export
pub const BINARY_MAGIC: [u8; 4] = *b"UFTx";

/// Binary layout version
pub const BINARY_VERSION: u32 = 1;

/// Header size in bytes
pub const BINARY_HEADER_LEN: usize = 64;

/// Event record size in bytes
pub const BINARY_RECORD_LEN: usize = 24;

/// Section bit: integrity summary present
pub const SECTION_INTEGRITY: u8 = 1 << 0;
/// Section bit: confidence summary present
pub const SECTION_CONFIDENCE: u8 = 1 << 1;
/// Section bit: event records present
pub const SECTION_EVENTS: u8 = 1 << 2;

/// First CSV line
pub const CSV_TITLE: &str = "# UFT-NX Analysis Export (CSV)";

/// CSV column header
pub const CSV_HEADER: &str = "type,start,end,confidence,severity,flags";

const NO_VERDICT: u8 = 0xFF;

/// Supported export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Single JSON object
    Json,
    /// Commented summary plus one row per event
    Csv,
    /// Fixed header plus packed event records
    Binary,
}

impl ExportFormat {
    /// Format for a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            "bin" | "uftx" => Some(ExportFormat::Binary),
            _ => None,
        }
    }

    /// Canonical file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Binary => "bin",
        }
    }
}

#[derive(Serialize)]
struct JsonIntegrity {
    score: f32,
    flagged: usize,
    dropouts: usize,
    saturated: usize,
    stuck: usize,
    deadzones: usize,
}

#[derive(Serialize)]
struct JsonConfidence {
    mean: f32,
    median: f32,
    min: f32,
    max: f32,
    high_count: usize,
    mid_count: usize,
    low_count: usize,
}

#[derive(Serialize)]
struct JsonEvent {
    #[serde(rename = "type")]
    kind: &'static str,
    start: u64,
    end: u64,
    confidence: f32,
    severity: f32,
    peak_snr_db: f32,
    verdict: Option<&'static str>,
    flags: u32,
}

#[derive(Serialize)]
struct JsonSegment {
    start: usize,
    end: usize,
    band: &'static str,
    mean_confidence: f32,
    min_confidence: f32,
    rank: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'a str,
    samples: usize,
    integrity: JsonIntegrity,
    confidence: JsonConfidence,
    overall_quality: f32,
    events: Vec<JsonEvent>,
    segments: Vec<JsonSegment>,
}

impl<'a> From<&'a AnalysisReport> for JsonReport<'a> {
    fn from(r: &'a AnalysisReport) -> Self {
        let i = &r.integrity;
        let c = &r.confidence_summary;
        Self {
            version: r.version,
            samples: r.n_samples,
            integrity: JsonIntegrity {
                score: i.integrity_score,
                flagged: i.flagged_samples,
                dropouts: i.dropout_count,
                saturated: i.saturated_count,
                stuck: i.stuck_count,
                deadzones: i.deadzone_count,
            },
            confidence: JsonConfidence {
                mean: c.mean,
                median: c.median,
                min: c.min,
                max: c.max,
                high_count: c.high_count,
                mid_count: c.mid_count,
                low_count: c.low_count,
            },
            overall_quality: r.overall_quality,
            events: r
                .events
                .iter()
                .map(|e| JsonEvent {
                    kind: e.kind.name(),
                    start: e.start,
                    end: e.end,
                    confidence: e.confidence,
                    severity: e.severity,
                    peak_snr_db: e.peak_snr_db,
                    verdict: e.verdict.map(|v| v.name()),
                    flags: e.flags.bits(),
                })
                .collect(),
            segments: r
                .segments
                .iter()
                .map(|s| JsonSegment {
                    start: s.start,
                    end: s.end,
                    band: s.band.name(),
                    mean_confidence: s.mean_confidence,
                    min_confidence: s.min_confidence,
                    rank: s.rank,
                })
                .collect(),
        }
    }
}

/// Decoded binary header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryHeader {
    /// Layout version
    pub version: u32,
    /// `SECTION_*` bits
    pub sections: u8,
    /// Samples analysed
    pub n_samples: u64,
    /// Event records following the header
    pub n_events: u32,
    /// Ranked segments in the report (not encoded)
    pub n_segments: u32,
    /// Size of one event record
    pub record_size: u32,
    /// Integrity score
    pub integrity_score: f32,
    /// Mean confidence
    pub mean_confidence: f32,
    /// Overall quality
    pub overall_quality: f32,
}

impl BinaryHeader {
    fn from_report(r: &AnalysisReport) -> Self {
        let mut sections = SECTION_INTEGRITY | SECTION_CONFIDENCE;
        if !r.events.is_empty() {
            sections |= SECTION_EVENTS;
        }
        Self {
            version: BINARY_VERSION,
            sections,
            n_samples: r.n_samples as u64,
            n_events: saturating_u32(r.events.len() as u64),
            n_segments: saturating_u32(r.segments.len() as u64),
            record_size: BINARY_RECORD_LEN as u32,
            integrity_score: r.integrity.integrity_score,
            mean_confidence: r.confidence_summary.mean,
            overall_quality: r.overall_quality,
        }
    }

    /// Encoded header bytes.
    pub fn to_bytes(&self) -> [u8; BINARY_HEADER_LEN] {
        let mut b = [0u8; BINARY_HEADER_LEN];
        b[0..4].copy_from_slice(&BINARY_MAGIC);
        b[4..8].copy_from_slice(&self.version.to_le_bytes());
        b[8] = self.sections;
        b[12..20].copy_from_slice(&self.n_samples.to_le_bytes());
        b[20..24].copy_from_slice(&self.n_events.to_le_bytes());
        b[24..28].copy_from_slice(&self.n_segments.to_le_bytes());
        b[28..32].copy_from_slice(&self.record_size.to_le_bytes());
        b[32..36].copy_from_slice(&self.integrity_score.to_le_bytes());
        b[36..40].copy_from_slice(&self.mean_confidence.to_le_bytes());
        b[40..44].copy_from_slice(&self.overall_quality.to_le_bytes());
        b
    }

    /// Decode a header, checking the magic before anything else.
    pub fn parse(bytes: &[u8]) -> AnalysisResult<Self> {
        if bytes.len() < BINARY_MAGIC.len() || bytes[0..4] != BINARY_MAGIC {
            return Err(AnalysisError::Format {
                reason: "missing UFTx magic",
            });
        }
        if bytes.len() < BINARY_HEADER_LEN {
            return Err(AnalysisError::Format {
                reason: "truncated header",
            });
        }
        let header = Self {
            version: read_u32(bytes, 4),
            sections: bytes[8],
            n_samples: u64::from_le_bytes(array(bytes, 12)),
            n_events: read_u32(bytes, 20),
            n_segments: read_u32(bytes, 24),
            record_size: read_u32(bytes, 28),
            integrity_score: read_f32(bytes, 32),
            mean_confidence: read_f32(bytes, 36),
            overall_quality: read_f32(bytes, 40),
        };
        if header.version != BINARY_VERSION {
            return Err(AnalysisError::Format {
                reason: "unsupported binary version",
            });
        }
        if header.record_size as usize != BINARY_RECORD_LEN {
            return Err(AnalysisError::Format {
                reason: "unexpected record size",
            });
        }
        Ok(header)
    }
}

/// One packed event record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryRecord {
    /// Event label
    pub kind: EventLabel,
    /// Verdict, when one was computed
    pub verdict: Option<Verdict>,
    /// First sample, saturated to `u32`
    pub start: u32,
    /// Last sample, saturated to `u32`
    pub end: u32,
    /// Event confidence
    pub confidence: f32,
    /// Event severity
    pub severity: f32,
    /// Provenance flags
    pub flags: EventFlags,
}

impl From<&Event> for BinaryRecord {
    fn from(e: &Event) -> Self {
        Self {
            kind: e.kind,
            verdict: e.verdict,
            start: saturating_u32(e.start),
            end: saturating_u32(e.end),
            confidence: e.confidence,
            severity: e.severity,
            flags: e.flags,
        }
    }
}

impl BinaryRecord {
    /// Encoded record bytes.
    pub fn to_bytes(&self) -> [u8; BINARY_RECORD_LEN] {
        let mut b = [0u8; BINARY_RECORD_LEN];
        b[0] = self.kind.code();
        b[1] = self.verdict.map_or(NO_VERDICT, |v| v.code());
        b[4..8].copy_from_slice(&self.start.to_le_bytes());
        b[8..12].copy_from_slice(&self.end.to_le_bytes());
        b[12..16].copy_from_slice(&self.confidence.to_le_bytes());
        b[16..20].copy_from_slice(&self.severity.to_le_bytes());
        b[20..24].copy_from_slice(&self.flags.bits().to_le_bytes());
        b
    }

    /// Decode one record.
    pub fn parse(bytes: &[u8]) -> AnalysisResult<Self> {
        if bytes.len() < BINARY_RECORD_LEN {
            return Err(AnalysisError::Format {
                reason: "truncated event record",
            });
        }
        let kind = EventLabel::from_code(bytes[0]).ok_or(AnalysisError::Format {
            reason: "unknown event label",
        })?;
        let verdict = match bytes[1] {
            NO_VERDICT => None,
            code => Some(Verdict::from_code(code).ok_or(AnalysisError::Format {
                reason: "unknown verdict",
            })?),
        };
        Ok(Self {
            kind,
            verdict,
            start: read_u32(bytes, 4),
            end: read_u32(bytes, 8),
            confidence: read_f32(bytes, 12),
            severity: read_f32(bytes, 16),
            flags: EventFlags::from_bits(read_u32(bytes, 20)),
        })
    }
}

/// Decode a complete binary export into its header and event records.
pub fn decode_binary(bytes: &[u8]) -> AnalysisResult<(BinaryHeader, Vec<BinaryRecord>)> {
    let header = BinaryHeader::parse(bytes)?;
    let n = header.n_events as usize;
    let required = BINARY_HEADER_LEN + n * BINARY_RECORD_LEN;
    if bytes.len() < required {
        return Err(AnalysisError::Format {
            reason: "truncated event records",
        });
    }
    let records = bytes[BINARY_HEADER_LEN..required]
        .chunks_exact(BINARY_RECORD_LEN)
        .map(BinaryRecord::parse)
        .collect::<AnalysisResult<Vec<_>>>()?;
    Ok((header, records))
}

impl AnalysisReport {
    /// Encode into `buf`, or report the required size when `buf` is `None`.
    ///
    /// Returns the encoded length. A buffer shorter than that fails with
    /// [`AnalysisError::BufferTooSmall`] and is left untouched.
    pub fn export(&self, format: ExportFormat, buf: Option<&mut [u8]>) -> AnalysisResult<usize> {
        let bytes = self.to_bytes(format)?;
        let Some(buf) = buf else {
            return Ok(bytes.len());
        };
        if buf.len() < bytes.len() {
            return Err(AnalysisError::BufferTooSmall {
                required: bytes.len(),
                available: buf.len(),
            });
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self, format: ExportFormat) -> AnalysisResult<Vec<u8>> {
        match format {
            ExportFormat::Json => self.to_json().map(String::into_bytes),
            ExportFormat::Csv => Ok(self.to_csv().into_bytes()),
            ExportFormat::Binary => Ok(self.to_binary()),
        }
    }

    /// JSON encoding.
    pub fn to_json(&self) -> AnalysisResult<String> {
        serde_json::to_string(&JsonReport::from(self)).map_err(|_| AnalysisError::Format {
            reason: "JSON encoding failed",
        })
    }

    /// CSV encoding.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(128 + self.events.len() * 48);
        // Writing to a String cannot fail
        let _ = writeln!(out, "{CSV_TITLE}");
        let _ = writeln!(
            out,
            "# samples={},integrity={:.4},confidence={:.4},quality={:.4},events={}",
            self.n_samples,
            self.integrity.integrity_score,
            self.confidence_summary.mean,
            self.overall_quality,
            self.events.len()
        );
        let _ = writeln!(out, "{CSV_HEADER}");
        for e in &self.events {
            let _ = writeln!(
                out,
                "{},{},{},{:.4},{:.4},{}",
                e.kind.name(),
                e.start,
                e.end,
                e.confidence,
                e.severity,
                e.flags.bits()
            );
        }
        out
    }

    /// Binary encoding.
    pub fn to_binary(&self) -> Vec<u8> {
        let header = BinaryHeader::from_report(self);
        let n = header.n_events as usize;
        let mut out = Vec::with_capacity(BINARY_HEADER_LEN + n * BINARY_RECORD_LEN);
        out.extend_from_slice(&header.to_bytes());
        for e in self.events.iter().take(n) {
            out.extend_from_slice(&BinaryRecord::from(e).to_bytes());
        }
        out
    }

    /// Encode and write to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>, format: ExportFormat) -> ReportResult<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(format)?;
        fs::write(path, &bytes)?;
        debug!(
            "exported {} bytes as {} to {}",
            bytes.len(),
            format.extension(),
            path.display()
        );
        Ok(())
    }
}

fn saturating_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

fn array<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(array(bytes, at))
}

fn read_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes(array(bytes, at))
}
