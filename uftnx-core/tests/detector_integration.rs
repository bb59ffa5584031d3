//! Integration tests for the multi-scale event detector.

mod common;

use uftnx_core::{
    constants::MAX_SCALES,
    detector::{classify, DetectorConfig, EventDetector, FeatureVector, MergeConfig},
    events::{EventLabel, Polarity, Verdict},
    fusion::stability,
    AnalysisError,
};

use common::carrier;

fn spiky(positions: &[usize]) -> Vec<f32> {
    let mut x = carrier(4096, 0.5, 0.005);
    for &p in positions {
        x[p] += 0.3;
    }
    x
}

#[test]
fn finds_every_isolated_spike() {
    let positions = [500, 1500, 2500, 3500];
    let report = EventDetector::default().detect(&spiky(&positions)).unwrap();

    for p in positions {
        assert!(
            report
                .events()
                .any(|s| s.label == EventLabel::Reflection && s.start == p),
            "no reflection at {p}"
        );
    }
    assert!(report
        .segments
        .iter()
        .filter(|s| s.label == EventLabel::None)
        .all(|s| s.verdict == Verdict::Pass));
}

#[test]
fn segments_tile_the_trace() {
    let report = EventDetector::default().detect(&spiky(&[1000, 3000])).unwrap();
    assert_eq!(report.segments.first().map(|s| s.start), Some(0));
    assert_eq!(report.segments.last().map(|s| s.end), Some(4095));
    for pair in report.segments.windows(2) {
        assert_eq!(pair[0].end + 1, pair[1].start);
    }
    assert_eq!(report.total_segments, report.segments.len());
    assert_eq!(report.label_histogram().iter().sum::<usize>(), 4096);
}

#[test]
fn events_convert_to_records() {
    let report = EventDetector::default().detect(&spiky(&[2048])).unwrap();
    let events = report.to_events(60.0);
    assert_eq!(events.len(), report.event_count());
    for e in &events {
        assert!((0.0..=1.0).contains(&e.severity));
        assert!((0.0..=1.0).contains(&e.confidence));
        assert!(e.verdict.is_some());
    }
}

#[test]
fn encodings_agree() {
    let x: Vec<i16> = (0..4096)
        .map(|i| {
            let base = if i % 2 == 0 { 200 } else { -200 };
            if i == 1200 { base + 12_000 } else { base }
        })
        .collect();
    let normalized: Vec<f32> = x.iter().map(|&v| v as f32 / 32768.0).collect();

    let detector = EventDetector::default();
    let a = detector.detect_samples(&x).unwrap();
    let b = detector.detect(&normalized).unwrap();
    assert_eq!(a.segments, b.segments);
}

#[test]
fn repeated_reads_are_stable() {
    let x = spiky(&[700, 2100]);
    let detector = EventDetector::default();
    let labels: Vec<Vec<u8>> = (0..3)
        .map(|_| detector.detect(&x).unwrap().label_codes())
        .collect();

    let s = stability(&labels, EventLabel::ALL.len()).unwrap();
    assert!(s.agreement.iter().all(|&a| a == 1.0));
    assert!(s.disagreement.iter().all(|&d| d == 0.0));
    assert_eq!(s.mean_agreement, 1.0);
}

#[test]
fn disabled_merging_keeps_raw_runs() {
    let mut x = spiky(&[1000]);
    x[1001] += 0.1;
    for v in &mut x[1002..] {
        *v -= 0.1;
    }

    let merged = EventDetector::default().detect(&x).unwrap();
    let cfg = DetectorConfig {
        merge: MergeConfig::disabled(),
        ..DetectorConfig::default()
    };
    let raw = EventDetector::new(cfg).unwrap().detect(&x).unwrap();

    assert!(merged.events().any(|s| s.label == EventLabel::ReflectLoss));
    assert!(!raw.events().any(|s| s.label == EventLabel::ReflectLoss));
    assert!(raw.segments.len() > merged.segments.len());
}

#[test]
fn rejects_bad_configs() {
    let no_scales = DetectorConfig::default().with_scales(&[]).unwrap();
    assert!(matches!(
        EventDetector::new(no_scales),
        Err(AnalysisError::InvalidConfig { .. })
    ));
    assert!(DetectorConfig::default().with_scales(&[64; 9]).is_err());
    assert!(EventDetector::default().detect(&[]).is_err());
}

/// Weak negative step whose strongest response sits on `best_scale`.
fn weak_loss(best_scale: u8, snr_db: f32) -> FeatureVector {
    FeatureVector {
        amp: 0.45,
        delta: -0.05,
        env_rms: [0.5; MAX_SCALES],
        snr_db: [snr_db; MAX_SCALES],
        max_snr_db: snr_db,
        best_scale,
        noise_sigma: 0.01,
        polarity: Polarity::StepDown,
    }
}

#[test]
fn coarse_scale_weak_loss_is_broad() {
    let cfg = DetectorConfig::default().with_scales(&[64, 256, 1024]).unwrap();
    cfg.validate().unwrap();

    let features = [weak_loss(2, 12.0), weak_loss(0, 12.0), weak_loss(2, 16.0)];
    let classes = classify(&features, &cfg);

    assert_eq!(classes[0].label, EventLabel::BroadLoss);
    assert!((classes[0].confidence - 0.3).abs() < 1e-6);
    // Fine-scale or strong losses stay attenuation
    assert_eq!(classes[1].label, EventLabel::Attenuation);
    assert_eq!(classes[2].label, EventLabel::Attenuation);
}
