//! Fixed-Capacity Ring Buffer for Streaming Samples
//!
//! ## Overview
//!
//! The streaming engine accepts samples in arbitrarily sized pushes and
//! analyses them in fixed-size overlapping chunks. This ring buffer sits in
//! between: it owns one allocation made at construction time and never grows.
//!
//! ## Design Rationale
//!
//! ### Drop on Overflow
//!
//! Unlike a history buffer, a sample ring must not overwrite unread data:
//! losing the oldest samples silently would shift every absolute offset the
//! engine reports. Instead `write` copies as many samples as fit and returns
//! the count; the remainder is dropped and counted. Callers size the ring to a
//! few chunk lengths so this never happens in practice.
//!
//! ### Peek / Consume
//!
//! Chunk analysis needs the oldest `chunk` samples as one contiguous slice,
//! but only `chunk - overlap` of them are retired afterwards:
//!
//! ```text
//!  read                                  write
//!   ↓                                      ↓
//! ┌────┬────┬────┬────┬────┬────┬────┬────┬────┬────┐
//! │ s0 │ s1 │ s2 │ s3 │ s4 │ s5 │ s6 │ s7 │    │    │
//! └────┴────┴────┴────┴────┴────┴────┴────┴────┴────┘
//!   └──── peek(6) copies s0..s5 ────┘
//!   └ consume(4) ┘   s4, s5 stay for the next chunk
//! ```
//!
//! ### Memory Layout
//!
//! ```text
//! RingBuffer
//! ├── data:      capacity × 4 bytes (allocated once)
//! ├── head:      read position (oldest sample)
//! ├── write_pos: next write position
//! └── len:       samples currently stored
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use uftnx_core::buffer::RingBuffer;
//!
//! let mut ring = RingBuffer::with_capacity(8).unwrap();
//! assert_eq!(ring.write(&[1.0, 2.0, 3.0]), 3);
//!
//! let mut chunk = [0.0; 2];
//! assert_eq!(ring.peek(&mut chunk), 2);
//! assert_eq!(chunk, [1.0, 2.0]);
//!
//! ring.consume(1);
//! assert_eq!(ring.len(), 2);
//! ```

use crate::errors::{try_buffer, AnalysisError, AnalysisResult};

/// Fixed-capacity circular sample buffer.
///
/// ## Internal Invariants
///
/// - `head < capacity` and `write_pos < capacity` (for non-zero capacity)
/// - `len <= capacity`
/// - `write_pos == (head + len) % capacity`
///
/// ## Thread Safety
///
/// Not synchronised. One pipeline instance owns one ring and is driven from a
/// single thread.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<f32>,
    head: usize,
    write_pos: usize,
    len: usize,
    total_written: u64,
    total_dropped: u64,
}

impl RingBuffer {
    /// Allocate a ring holding up to `capacity` samples.
    pub fn with_capacity(capacity: usize) -> AnalysisResult<Self> {
        if capacity == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "ring capacity must be non-zero",
            });
        }
        Ok(Self {
            data: try_buffer(capacity, 0.0)?,
            head: 0,
            write_pos: 0,
            len: 0,
            total_written: 0,
            total_dropped: 0,
        })
    }

    /// Copy as many samples as fit; returns how many were written.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let cap = self.capacity();
        let count = samples.len().min(cap - self.len);

        // At most two contiguous copies: up to the end, then from the start
        let first = count.min(cap - self.write_pos);
        self.data[self.write_pos..self.write_pos + first].copy_from_slice(&samples[..first]);
        let second = count - first;
        self.data[..second].copy_from_slice(&samples[first..count]);

        self.write_pos = (self.write_pos + count) % cap;
        self.len += count;
        self.total_written += count as u64;
        self.total_dropped += (samples.len() - count) as u64;
        count
    }

    /// Linearise the oldest `out.len()` samples into `out` without consuming
    /// them. Returns how many were copied.
    pub fn peek(&self, out: &mut [f32]) -> usize {
        let cap = self.capacity();
        let count = out.len().min(self.len);

        let first = count.min(cap - self.head);
        out[..first].copy_from_slice(&self.data[self.head..self.head + first]);
        let second = count - first;
        out[first..count].copy_from_slice(&self.data[..second]);
        count
    }

    /// Retire up to `count` of the oldest samples. Returns how many were
    /// retired.
    pub fn consume(&mut self, count: usize) -> usize {
        let count = count.min(self.len);
        self.head = (self.head + count) % self.capacity();
        self.len -= count;
        count
    }

    /// Forget all stored samples, keeping the allocation.
    pub fn clear(&mut self) {
        self.head = 0;
        self.write_pos = 0;
        self.len = 0;
        self.total_written = 0;
        self.total_dropped = 0;
    }

    /// Samples currently stored
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Maximum samples the ring can hold
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Samples that can still be written
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Read position (oldest stored sample)
    pub fn head(&self) -> usize {
        self.head
    }

    /// Next write position
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Samples accepted since construction or the last `clear`
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Samples dropped on overflow since construction or the last `clear`
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    /// Iterate stored samples from oldest to newest
    pub fn iter(&self) -> RingIter<'_> {
        RingIter { ring: self, index: 0 }
    }

    /// Sample by logical index (0 = oldest)
    pub fn get(&self, index: usize) -> Option<f32> {
        if index >= self.len {
            return None;
        }
        Some(self.data[(self.head + index) % self.capacity()])
    }
}

/// Iterator over ring contents, oldest first
pub struct RingIter<'a> {
    ring: &'a RingBuffer,
    index: usize,
}

impl<'a> Iterator for RingIter<'a> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let v = self.ring.get(self.index)?;
        self.index += 1;
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring() {
        let ring = RingBuffer::with_capacity(5).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.free(), 5);
        assert!(ring.get(0).is_none());
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(RingBuffer::with_capacity(0).is_err());
    }

    #[test]
    fn overflow_is_dropped_not_overwritten() {
        let mut ring = RingBuffer::with_capacity(4).unwrap();
        assert_eq!(ring.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 4);
        assert!(ring.is_full());
        assert_eq!(ring.total_dropped(), 2);
        let values: Vec<f32> = ring.iter().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn peek_linearises_across_wrap() {
        let mut ring = RingBuffer::with_capacity(5).unwrap();
        ring.write(&[0.0, 1.0, 2.0, 3.0]);
        ring.consume(3);
        ring.write(&[4.0, 5.0, 6.0, 7.0]);
        // Physical: [5, 6, 7, 3, 4] with head = 3
        assert_eq!(ring.head(), 3);
        let mut out = [0.0; 5];
        assert_eq!(ring.peek(&mut out), 5);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0, 7.0]);
        // Peek does not consume
        assert_eq!(ring.len(), 5);
    }

    #[test]
    fn consume_is_bounded() {
        let mut ring = RingBuffer::with_capacity(3).unwrap();
        ring.write(&[1.0, 2.0]);
        assert_eq!(ring.consume(10), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut ring = RingBuffer::with_capacity(3).unwrap();
        ring.write(&[1.0, 2.0]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 3);
        assert_eq!(ring.write_pos(), 0);
    }
}
