//! Integration tests for revolution alignment, median fusion and
//! confidence scoring.

mod common;

use uftnx_core::{
    fusion::{
        apply_shift, estimate_shift, fuse_median, AlignConfig, Aligner, ConfidenceFusion,
        ConfidenceInputs,
    },
    AnalysisError,
};

use common::{delayed, mse, noisy, two_tone, TestRng};

#[test]
fn recovers_known_delays() {
    let reference = two_tone(2048);
    for s in [1usize, 5, 17, 40] {
        let target = delayed(&reference, s);
        let est = estimate_shift(&reference, &target, 64);
        assert_eq!(est.shift, -(s as isize), "delay {s}");
        assert!(est.score > 0.9, "delay {s}: score {}", est.score);
    }
}

#[test]
fn recovered_shift_realigns_target() {
    let reference = two_tone(1024);
    let target = delayed(&reference, 9);
    let est = estimate_shift(&reference, &target, 32);
    let back = apply_shift(&target, est.shift);
    // Only the zero-padded tail differs
    assert_eq!(&back[..1024 - 9], &reference[..1024 - 9]);
    assert!(back[1024 - 9..].iter().all(|&v| v == 0.0));
}

#[test]
fn median_fusion_beats_every_input() {
    let clean = two_tone(2048);
    let mut rng = TestRng::new(2024);
    let copies: Vec<Vec<f32>> = (0..5).map(|_| noisy(&clean, 0.05, &mut rng)).collect();

    let result = Aligner::default().align(&copies).unwrap();
    assert!(result.report.shifts.iter().all(|&s| s == 0));

    let fused_err = mse(&result.fused, &clean);
    for (k, copy) in copies.iter().enumerate() {
        assert!(fused_err < mse(copy, &clean), "copy {k}");
    }
}

#[test]
fn aligner_reports_per_revolution_shifts() {
    let base = two_tone(2048);
    let revs = vec![base.clone(), delayed(&base, 3), delayed(&base, 11)];
    let result = Aligner::default().align(&revs).unwrap();

    let report = &result.report;
    assert_eq!(report.reference, 0);
    assert_eq!(report.shifts, vec![0, -3, -11]);
    assert_eq!(report.max_abs_shift, 11);
    assert_eq!(report.valid_count, 3);
    assert!(report.quality > 0.9);
    assert_eq!(result.aligned.len(), 3);
    assert_eq!(result.fused.len(), 2048);
}

#[test]
fn flux_revolutions_are_accepted() {
    let base: Vec<u32> = (0..512).map(|i| 4000 + ((i * 37) % 200) as u32).collect();
    let cfg = AlignConfig {
        max_lag: 8,
        ..AlignConfig::default()
    };
    let result = Aligner::new(cfg).unwrap().align_samples(&[&base, &base]).unwrap();
    assert_eq!(result.report.shifts, vec![0, 0]);
    assert_eq!(result.fused[10], base[10] as f32);
}

#[test]
fn fused_agreement_feeds_confidence() {
    let a = vec![1.0f32; 64];
    let b = vec![0.0f32; 64];
    let fused = fuse_median(&[&a, &a, &b]).unwrap();
    assert!(fused.iter().all(|&v| v == 1.0));

    let agreement = vec![2.0 / 3.0; 64];
    let conf = ConfidenceFusion::default()
        .analyze(64, &ConfidenceInputs::new().with_agreement(&agreement))
        .unwrap();
    let expected = 0.4 * (2.0 / 3.0) + 0.35 * (10.0 / 30.0) + 0.25;
    assert!((conf.summary.mean - expected).abs() < 1e-5);
}

#[test]
fn alignment_input_validation() {
    let one = vec![two_tone(256)];
    assert!(matches!(
        Aligner::default().align(&one),
        Err(AnalysisError::TooSmall { required: 2, available: 1 })
    ));

    let short = vec![vec![0.0f32; 16], vec![0.0f32; 16]];
    assert!(matches!(
        Aligner::default().align(&short),
        Err(AnalysisError::TooSmall { .. })
    ));

    let ragged = vec![vec![0.0f32; 64], vec![0.0f32; 65]];
    assert!(matches!(
        Aligner::default().align(&ragged),
        Err(AnalysisError::LengthMismatch { .. })
    ));
}
