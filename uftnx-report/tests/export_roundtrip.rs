//! File and in-memory export round trips.

use std::fs;

use uftnx_report::{
    analyze,
    export::{decode_binary, BINARY_HEADER_LEN, BINARY_RECORD_LEN, CSV_HEADER},
    golden, AnalysisConfig, BinaryHeader, ExportFormat, ReportError,
};

fn spikes_report() -> uftnx_report::AnalysisReport {
    let x = golden::generate(2, golden::GOLDEN_LEN).unwrap();
    analyze(&x).unwrap()
}

#[test]
fn json_events_match_report() {
    let report = spikes_report();
    assert!(report.n_events() > 0);

    let text = report.to_json().unwrap();
    let v: serde_json::Value = serde_json::from_str(&text).unwrap();
    let events = v["events"].as_array().unwrap();
    assert_eq!(events.len(), report.n_events());
    assert_eq!(v["segments"].as_array().unwrap().len(), report.n_segments());

    for (json, event) in events.iter().zip(&report.events) {
        assert_eq!(json["type"], event.kind.name());
        assert_eq!(json["start"], event.start);
        assert_eq!(json["end"], event.end);
    }
}

#[test]
fn binary_header_counts_samples() {
    for n in [64usize, 1000, 4096] {
        let x: Vec<f32> = (0..n)
            .map(|i| 0.5 + if i % 2 == 0 { 0.005 } else { -0.005 })
            .collect();
        let report = analyze(&x).unwrap();
        let bytes = report.to_binary();
        let header = BinaryHeader::parse(&bytes).unwrap();
        assert_eq!(header.n_samples, n as u64);
        assert_eq!(
            bytes.len(),
            BINARY_HEADER_LEN + header.n_events as usize * BINARY_RECORD_LEN
        );
    }
}

#[test]
fn binary_records_follow_events() {
    let report = spikes_report();
    let (header, records) = decode_binary(&report.to_binary()).unwrap();
    assert_eq!(header.n_events as usize, report.n_events());
    assert_eq!(header.integrity_score, report.integrity.integrity_score);
    for (rec, event) in records.iter().zip(&report.events) {
        assert_eq!(rec.kind, event.kind);
        assert_eq!(rec.start as u64, event.start);
        assert_eq!(rec.confidence, event.confidence);
        assert_eq!(rec.severity, event.severity);
    }
}

#[test]
fn files_match_in_memory_encodings() {
    let report = spikes_report();
    let dir = tempfile::tempdir().unwrap();

    for format in [ExportFormat::Json, ExportFormat::Csv, ExportFormat::Binary] {
        let path = dir.path().join(format!("trace.{}", format.extension()));
        report.write_to(&path, format).unwrap();

        let ext = path.extension().and_then(|e| e.to_str()).unwrap();
        assert_eq!(ExportFormat::from_extension(ext), Some(format));

        let on_disk = fs::read(&path).unwrap();
        assert_eq!(on_disk, report.to_bytes(format).unwrap());
        assert_eq!(on_disk.len(), report.export(format, None).unwrap());
    }

    let csv = fs::read_to_string(dir.path().join("trace.csv")).unwrap();
    assert_eq!(csv.lines().nth(2), Some(CSV_HEADER));
    assert_eq!(csv.lines().count(), 3 + report.n_events());
}

#[test]
fn unwritable_path_is_io_error() {
    let report = spikes_report();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("trace.json");
    assert!(matches!(
        report.write_to(&path, ExportFormat::Json),
        Err(ReportError::Io(_))
    ));
}

#[test]
fn config_file_round_trip() {
    let mut config = AnalysisConfig::default();
    config.integrity.dropout_min_run = 16;
    config.confidence.min_segment_len = 24;

    let file = tempfile::NamedTempFile::new().unwrap();
    fs::write(file.path(), config.to_json().unwrap()).unwrap();

    let text = fs::read_to_string(file.path()).unwrap();
    let loaded = AnalysisConfig::from_json(&text).unwrap();
    assert_eq!(loaded, config);
}
