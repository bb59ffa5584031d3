//! Core traits for sample inputs and pipeline observers
//!
//! Keep them simple: one trait for the accepted input encodings, one for
//! receiving streaming results.

use std::borrow::Cow;

use crate::events::Event;
use crate::pipeline::ChunkReport;

/// Sample encodings accepted at every entry point.
///
/// Disk-format codecs hand the core flat arrays in one of three encodings.
/// All of them are normalised to `f32` amplitude before analysis; the
/// conversion is lossy and one-way.
///
/// | Encoding | Meaning                       | Conversion        |
/// |----------|-------------------------------|-------------------|
/// | `f32`    | amplitude                     | identity          |
/// | `u32`    | flux interval in nanoseconds  | direct cast       |
/// | `i16`    | signed analog reading         | `/ 32768`         |
pub trait Sample: Copy {
    /// Convert one sample to float amplitude.
    fn to_amplitude(self) -> f32;

    /// Normalise a whole buffer. Non-float encodings allocate a temporary
    /// buffer; caller data is never mutated.
    fn normalize(samples: &[Self]) -> Cow<'_, [f32]> {
        Cow::Owned(samples.iter().map(|&s| s.to_amplitude()).collect())
    }
}

impl Sample for f32 {
    #[inline]
    fn to_amplitude(self) -> f32 {
        self
    }

    fn normalize(samples: &[Self]) -> Cow<'_, [f32]> {
        Cow::Borrowed(samples)
    }
}

impl Sample for u32 {
    #[inline]
    fn to_amplitude(self) -> f32 {
        self as f32
    }
}

impl Sample for i16 {
    #[inline]
    fn to_amplitude(self) -> f32 {
        self as f32 / 32768.0
    }
}

/// Trait for values that must be finite to be analysed
pub trait Validatable {
    /// Check if the value is usable (not NaN, not infinite)
    fn is_valid(&self) -> bool;
}

impl Validatable for f32 {
    fn is_valid(&self) -> bool {
        self.is_finite()
    }
}

/// Receiver for streaming pipeline output.
///
/// Both methods run synchronously on the thread that called `push` or
/// `flush`. For every chunk, all `on_event` calls happen before its
/// `on_chunk` call.
pub trait PipelineObserver {
    /// One detected event, in detection order.
    fn on_event(&mut self, _event: &Event) {}

    /// One processed chunk, in input order.
    fn on_chunk(&mut self, _chunk: &ChunkReport<'_>) {}
}
