use log::{debug, trace, warn};

use super::{
    stream_detector::StreamDetector, ChunkReport, PipelineConfig, PipelineState, PipelineStats,
};
use crate::{
    buffer::RingBuffer,
    constants::MIN_FLUSH_SAMPLES,
    errors::{try_buffer, AnalysisError, AnalysisResult},
    events::{Event, EventFlags},
    fusion::{ConfidenceFusion, ConfidenceInputs},
    integrity::{self, IntegrityFlags, IntegrityScanner},
    traits::{PipelineObserver, Sample},
};

type EventCallback = Box<dyn FnMut(&Event)>;
type ChunkCallback = Box<dyn FnMut(&ChunkReport<'_>)>;

/// Chunked streaming analysis engine.
///
/// Owns its ring, chunk scratch and per-chunk event buffer; all are sized at
/// construction and reused for every chunk.
pub struct StreamPipeline {
    config: PipelineConfig,
    state: PipelineState,
    ring: RingBuffer,
    chunk: Vec<f32>,
    detected: Vec<Event>,
    reported: Vec<Event>,
    scanner: IntegrityScanner,
    detector: StreamDetector,
    fusion: ConfidenceFusion,
    /// Absolute position of the ring head
    consumed: u64,
    last_reported_end: Option<u64>,
    stats: PipelineStats,
    on_event: Option<EventCallback>,
    on_chunk: Option<ChunkCallback>,
    observer: Option<Box<dyn PipelineObserver>>,
}

impl core::fmt::Debug for StreamPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StreamPipeline")
            .field("state", &self.state)
            .field("buffered", &self.ring.len())
            .field("consumed", &self.consumed)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl StreamPipeline {
    /// Create a pipeline, validating the configuration and allocating every
    /// buffer up front.
    pub fn new(config: PipelineConfig) -> AnalysisResult<Self> {
        config.validate()?;
        let ring = RingBuffer::with_capacity(config.ring_capacity)?;
        let chunk = try_buffer(config.chunk_size, 0.0f32)?;
        let scanner = IntegrityScanner::new(config.integrity.clone())?;
        let detector = StreamDetector::new(config.detector, config.chunk_size)?;
        let fusion = ConfidenceFusion::new(config.confidence)?;

        Ok(Self {
            config,
            state: PipelineState::Idle,
            ring,
            chunk,
            detected: Vec::new(),
            reported: Vec::new(),
            scanner,
            detector,
            fusion,
            consumed: 0,
            last_reported_end: None,
            stats: PipelineStats::default(),
            on_event: None,
            on_chunk: None,
            observer: None,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Running statistics
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Samples waiting in the ring
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    /// Register the per-event callback, replacing any previous one.
    pub fn on_event<F>(&mut self, callback: F)
    where
        F: FnMut(&Event) + 'static,
    {
        self.on_event = Some(Box::new(callback));
    }

    /// Register the per-chunk callback, replacing any previous one.
    pub fn on_chunk<F>(&mut self, callback: F)
    where
        F: FnMut(&ChunkReport<'_>) + 'static,
    {
        self.on_chunk = Some(Box::new(callback));
    }

    /// Attach an observer. It is called after the closures.
    pub fn set_observer(&mut self, observer: Box<dyn PipelineObserver>) {
        self.observer = Some(observer);
    }

    /// Detach and return the observer.
    pub fn take_observer(&mut self) -> Option<Box<dyn PipelineObserver>> {
        self.observer.take()
    }

    /// Push samples in any accepted encoding.
    pub fn push_samples<T: Sample>(&mut self, samples: &[T]) -> AnalysisResult<usize> {
        self.push(&T::normalize(samples))
    }

    /// Buffer samples and analyse every complete chunk. Returns the number
    /// of chunks processed during this call.
    pub fn push(&mut self, samples: &[f32]) -> AnalysisResult<usize> {
        match self.state {
            PipelineState::Idle => self.state = PipelineState::Running,
            PipelineState::Running => {}
            state => return Err(AnalysisError::InvalidState { state: state.name() }),
        }

        let mut chunks = 0;
        let mut rest = samples;
        while !rest.is_empty() {
            let written = self.ring.write(rest);
            self.stats.samples_pushed += written as u64;
            rest = &rest[written..];

            while self.ring.len() >= self.config.chunk_size {
                self.process_chunk(self.config.chunk_size, false)?;
                chunks += 1;
            }

            if written == 0 {
                // Ring full with less than a chunk buffered: only reachable
                // when capacity and chunk size disagree, so drop the rest.
                warn!("ring buffer full, dropping {} samples", rest.len());
                self.stats.samples_dropped += rest.len() as u64;
                break;
            }
        }
        Ok(chunks)
    }

    /// Analyse whatever remains and finish. Returns the number of chunks
    /// processed during this call (0 or 1).
    pub fn flush(&mut self) -> AnalysisResult<usize> {
        if self.state == PipelineState::Done {
            return Err(AnalysisError::InvalidState {
                state: self.state.name(),
            });
        }
        self.state = PipelineState::Flushing;

        let remainder = self.ring.len();
        let mut chunks = 0;
        if remainder >= MIN_FLUSH_SAMPLES {
            self.process_chunk(remainder, true)?;
            chunks = 1;
        } else if remainder > 0 {
            warn!("flush remainder of {remainder} samples too small to analyse, discarding");
            self.ring.consume(remainder);
            self.consumed += remainder as u64;
            self.stats.samples_dropped += remainder as u64;
        }

        self.state = PipelineState::Done;
        debug!(
            "pipeline flushed: chunks={} samples={} events={}",
            self.stats.chunks_processed, self.stats.samples_processed, self.stats.events_reported
        );
        Ok(chunks)
    }

    /// Return to `Idle`, clearing buffered samples and statistics. Buffers
    /// and callbacks are kept.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.detected.clear();
        self.reported.clear();
        self.consumed = 0;
        self.last_reported_end = None;
        self.stats = PipelineStats::default();
        self.state = PipelineState::Idle;
    }

    fn process_chunk(&mut self, len: usize, is_final: bool) -> AnalysisResult<()> {
        let offset = self.consumed;
        let index = self.stats.chunks_processed;

        let copied = self.ring.peek(&mut self.chunk[..len]);
        if copied != len {
            return Err(AnalysisError::Internal {
                reason: "ring returned a short chunk",
            });
        }
        let x = &mut self.chunk[..len];

        // Integrity, then optional repair
        let mut flags: Option<Vec<IntegrityFlags>> = None;
        let mut integrity_summary = None;
        if self.config.enable_integrity {
            let mut report = self.scanner.scan(x)?;
            if self.config.auto_repair && report.summary.flagged_samples > 0 {
                let repaired = integrity::repair(x, &mut report.flags)?;
                self.stats.repaired_samples += repaired as u64;
            }
            self.stats.flagged_samples += report.summary.flagged_samples as u64;
            integrity_summary = Some(report.summary);
            flags = Some(report.flags);
        }

        self.detected.clear();
        if self.config.enable_detection {
            self.detector.detect(x, offset, flags.as_deref(), &mut self.detected);
        }

        let mut confidence_summary = None;
        if self.config.enable_confidence {
            let mut inputs = ConfidenceInputs::new();
            if let Some(f) = flags.as_deref() {
                inputs = inputs.with_flags(f);
            }
            let samples = self.fusion.fuse(len, &inputs)?;
            for event in &mut self.detected {
                let lo = (event.start - offset) as usize;
                let hi = (event.end - offset) as usize;
                let span = &samples[lo..=hi];
                let sum: f64 = span.iter().map(|s| s.confidence as f64).sum();
                event.confidence = (sum / span.len() as f64) as f32;
            }
            let summary = self.fusion.summarize(&samples);
            self.stats.min_confidence = self.stats.min_confidence.min(summary.min);
            confidence_summary = Some(summary);
        }

        // Events running into the end of a non-final chunk are cut short;
        // when they start inside the overlap the next chunk sees them whole.
        // Repeats from the overlap region were reported by an earlier chunk.
        let carry_from = offset + (len - self.config.overlap) as u64;
        self.reported.clear();
        for event in &self.detected {
            if !is_final && event.flags.contains(EventFlags::CHUNK_END) && event.start >= carry_from
            {
                trace!("deferring event at {} to the next chunk", event.start);
                continue;
            }
            if self.last_reported_end.is_some_and(|end| event.start <= end) {
                self.stats.events_suppressed += 1;
                continue;
            }
            self.last_reported_end = Some(event.end);
            self.reported.push(*event);
        }

        let report = ChunkReport {
            index,
            offset,
            len,
            is_final,
            integrity: integrity_summary,
            confidence: confidence_summary,
            detected: self.detected.len(),
            events: &self.reported,
        };

        for event in report.events {
            if let Some(cb) = self.on_event.as_mut() {
                cb(event);
            }
            if let Some(observer) = self.observer.as_mut() {
                observer.on_event(event);
            }
        }
        if let Some(cb) = self.on_chunk.as_mut() {
            cb(&report);
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.on_chunk(&report);
        }

        // Incremental means over chunks
        let count = (index + 1) as f32;
        if let Some(s) = integrity_summary {
            self.stats.mean_integrity += (s.integrity_score - self.stats.mean_integrity) / count;
        }
        if let Some(s) = confidence_summary {
            self.stats.mean_confidence += (s.mean - self.stats.mean_confidence) / count;
        }
        self.stats.events_reported += self.reported.len() as u64;
        self.stats.chunks_processed += 1;

        let advance = if is_final {
            len
        } else {
            len - self.config.overlap
        };
        self.ring.consume(advance);
        self.consumed += advance as u64;
        self.stats.samples_processed += advance as u64;

        trace!(
            "chunk {}: offset={} len={} detected={} reported={}",
            index,
            offset,
            len,
            self.detected.len(),
            self.reported.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn small() -> PipelineConfig {
        PipelineConfig {
            ring_capacity: 1024,
            chunk_size: 256,
            overlap: 32,
            ..PipelineConfig::default()
        }
    }

    fn carrier(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| 0.5 + if i % 2 == 0 { 0.005 } else { -0.005 })
            .collect()
    }

    #[test]
    fn state_machine() {
        let mut p = StreamPipeline::new(small()).unwrap();
        assert_eq!(p.state(), PipelineState::Idle);
        p.push(&carrier(100)).unwrap();
        assert_eq!(p.state(), PipelineState::Running);
        p.flush().unwrap();
        assert_eq!(p.state(), PipelineState::Done);
        assert!(matches!(
            p.push(&carrier(10)),
            Err(AnalysisError::InvalidState { state: "done" })
        ));
        assert!(p.flush().is_err());

        p.reset();
        assert_eq!(p.state(), PipelineState::Idle);
        assert_eq!(p.stats().samples_pushed, 0);
        assert_eq!(p.buffered(), 0);
    }

    #[test]
    fn chunks_advance_by_stride() {
        let mut p = StreamPipeline::new(small()).unwrap();
        let offsets = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&offsets);
        p.on_chunk(move |c| sink.borrow_mut().push((c.offset, c.len, c.is_final)));

        // 256 + 224 + 224 = 704 fits three full chunks in 720 samples
        assert_eq!(p.push(&carrier(720)).unwrap(), 3);
        assert_eq!(p.buffered(), 720 - 3 * 224);
        assert_eq!(p.flush().unwrap(), 1);

        let offsets = offsets.borrow();
        assert_eq!(offsets[0], (0, 256, false));
        assert_eq!(offsets[1], (224, 256, false));
        assert_eq!(offsets[2], (448, 256, false));
        assert_eq!(offsets[3], (672, 48, true));
        assert_eq!(p.stats().samples_processed, 720);
    }

    #[test]
    fn tiny_remainder_is_discarded() {
        let mut p = StreamPipeline::new(small()).unwrap();
        p.push(&carrier(3)).unwrap();
        assert_eq!(p.flush().unwrap(), 0);
        assert_eq!(p.stats().chunks_processed, 0);
        assert_eq!(p.stats().samples_dropped, 3);
    }

    #[test]
    fn events_fire_before_their_chunk() {
        let mut p = StreamPipeline::new(small()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let events = Rc::clone(&log);
        let chunks = Rc::clone(&log);
        p.on_event(move |e| events.borrow_mut().push(format!("event@{}", e.start)));
        p.on_chunk(move |c| chunks.borrow_mut().push(format!("chunk{}", c.index)));

        let mut x = carrier(600);
        x[100] += 0.3;
        p.push(&x).unwrap();
        p.flush().unwrap();

        let log = log.borrow();
        assert_eq!(log[0], "event@100");
        assert_eq!(log[1], "chunk0");
        assert_eq!(log.iter().filter(|s| s.starts_with("event")).count(), 1);
    }

    #[test]
    fn overlap_events_are_reported_once() {
        let mut p = StreamPipeline::new(small()).unwrap();
        let starts = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&starts);
        p.on_event(move |e| sink.borrow_mut().push(e.start));

        // 240 lies in the overlap of chunk 0 and chunk 1
        let mut x = carrier(600);
        x[240] += 0.3;
        p.push(&x).unwrap();
        p.flush().unwrap();

        assert_eq!(*starts.borrow(), vec![240]);
        assert!(p.stats().events_suppressed >= 1);
    }

    #[test]
    fn event_at_chunk_end_is_reported_whole() {
        let mut p = StreamPipeline::new(small()).unwrap();
        let spans = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&spans);
        p.on_event(move |e| sink.borrow_mut().push((e.start, e.end, e.flags)));

        // Chunk 0 ends at 255, inside the ringing on 248..264
        let mut x = carrier(600);
        for i in 248..264 {
            x[i] += if i % 2 == 0 { 0.3 } else { -0.3 };
        }
        p.push(&x).unwrap();
        p.flush().unwrap();

        let spans = spans.borrow();
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].0, spans[0].1), (248, 264));
        assert!(!spans[0].2.contains(EventFlags::CHUNK_END));
        assert_eq!(p.stats().events_suppressed, 0);
    }

    #[test]
    fn event_confidence_is_backfilled() {
        let mut p = StreamPipeline::new(small()).unwrap();
        let conf = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&conf);
        p.on_event(move |e| sink.borrow_mut().push(e.confidence));

        let mut x = carrier(300);
        x[100] += 0.3;
        p.push(&x).unwrap();
        p.flush().unwrap();

        // Clean samples with default agreement and SNR
        let expected = 0.4 * 0.5 + 0.35 * (10.0 / 30.0) + 0.25;
        let conf = conf.borrow();
        assert_eq!(conf.len(), 1);
        assert!((conf[0] - expected).abs() < 1e-4);
    }

    struct Counter(Rc<RefCell<(usize, usize)>>);

    impl PipelineObserver for Counter {
        fn on_event(&mut self, _event: &Event) {
            self.0.borrow_mut().0 += 1;
        }

        fn on_chunk(&mut self, _chunk: &ChunkReport<'_>) {
            self.0.borrow_mut().1 += 1;
        }
    }

    #[test]
    fn observer_sees_everything() {
        let mut p = StreamPipeline::new(small()).unwrap();
        let counts = Rc::new(RefCell::new((0, 0)));
        p.set_observer(Box::new(Counter(Rc::clone(&counts))));

        let mut x = carrier(720);
        x[50] += 0.3;
        x[600] -= 0.3;
        p.push(&x).unwrap();
        p.flush().unwrap();

        assert_eq!(*counts.borrow(), (2, 4));
        assert!(p.take_observer().is_some());
    }

    #[test]
    fn analog_samples_are_accepted() {
        let mut p = StreamPipeline::new(small()).unwrap();
        let x: Vec<i16> = (0..512).map(|i| if i % 2 == 0 { 100 } else { -100 }).collect();
        assert_eq!(p.push_samples(&x).unwrap(), 2);
        assert_eq!(p.stats().samples_pushed, 512);
    }
}
