//! Golden-vector regression checks.

use uftnx_core::IntegrityFlags;
use uftnx_report::{
    analyze,
    golden::{self, GoldenVector, ValidationOutcome, GOLDEN_LEN, GOLDEN_VECTORS},
};

fn report(idx: usize) -> uftnx_report::AnalysisReport {
    analyze(&golden::generate(idx, GOLDEN_LEN).unwrap()).unwrap()
}

#[test]
fn every_golden_vector_passes() {
    for (name, outcome) in golden::run_all().unwrap() {
        assert_eq!(outcome, ValidationOutcome::Pass, "golden vector {name}");
    }
}

#[test]
fn generation_is_byte_identical() {
    for idx in 0..golden::count() {
        let a: Vec<u8> = golden::generate(idx, GOLDEN_LEN)
            .unwrap()
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let b: Vec<u8> = golden::generate(idx, GOLDEN_LEN)
            .unwrap()
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(a, b, "vector {idx}");
    }
}

#[test]
fn each_check_has_its_own_code() {
    let clean = report(0);
    let spikes = report(2);

    // clean trace against the dropout expectations: integrity is too high
    assert_eq!(GOLDEN_VECTORS[1].validate(&clean).code(), 1);
    // clean trace against the spike expectations: no events
    assert_eq!(GOLDEN_VECTORS[2].validate(&clean).code(), 3);
    // spike trace against the clean expectations: too many events
    assert_eq!(GOLDEN_VECTORS[0].validate(&spikes).code(), 4);

    let confident = GoldenVector {
        confidence: 0.9,
        ..GOLDEN_VECTORS[0]
    };
    assert_eq!(confident.validate(&clean), ValidationOutcome::Confidence);

    let flagged = GoldenVector {
        min_flagged: 10,
        ..GOLDEN_VECTORS[0]
    };
    assert_eq!(flagged.validate(&clean), ValidationOutcome::TooFewFlagged);
}

#[test]
fn dropout_vector_is_flagged_and_detected() {
    let r = report(1);
    assert!(r.flags[1500..1564]
        .iter()
        .all(|f| f.contains(IntegrityFlags::DROPOUT)));
    assert_eq!(r.flags[100], IntegrityFlags::empty());
    assert_eq!(r.integrity.dropout_count, 1);
    assert!(r.events.iter().any(|e| e.start <= 1500 && e.end >= 1500));
    assert!(r.confidence[1530] < r.confidence[100]);
}

#[test]
fn spike_vector_reports_every_spike() {
    let r = report(2);
    for k in (256..GOLDEN_LEN).step_by(512) {
        assert!(
            r.events.iter().any(|e| e.start as usize == k),
            "no event at spike {k}"
        );
    }
}

#[test]
fn clipped_vector_hits_both_rails() {
    let r = report(3);
    assert!(r.flags.iter().any(|f| f.contains(IntegrityFlags::CLIP_HIGH)));
    assert!(r.flags.iter().any(|f| f.contains(IntegrityFlags::CLIP_LOW)));
    assert!(r.integrity.saturated_count >= 16);
    assert!(r.overall_quality < report(0).overall_quality);
}
