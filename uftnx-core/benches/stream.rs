use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uftnx_core::{EventDetector, IntegrityScanner, PipelineConfig, StreamPipeline};

fn trace(n: usize) -> Vec<f32> {
    let mut state = 12_345u32;
    (0..n)
        .map(|i| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (state >> 8) as f32 / 16_777_216.0 - 0.5;
            let spike = if i % 997 == 0 { 0.3 } else { 0.0 };
            0.5 + 0.02 * noise + spike
        })
        .collect()
}

fn bench_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_pipeline");
    for n in [16_384usize, 131_072] {
        let x = trace(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("push_flush", n), &x, |b, x| {
            let mut pipeline = StreamPipeline::new(PipelineConfig::default()).unwrap();
            b.iter(|| {
                pipeline.reset();
                for block in x.chunks(1000) {
                    pipeline.push(black_box(block)).unwrap();
                }
                pipeline.flush().unwrap();
            })
        });
    }
    group.finish();
}

fn bench_components(c: &mut Criterion) {
    let x = trace(65_536);
    let scanner = IntegrityScanner::default();
    let detector = EventDetector::default();

    c.bench_function("integrity_scan_64k", |b| {
        b.iter(|| scanner.scan(black_box(&x)).unwrap())
    });
    c.bench_function("detect_64k", |b| {
        b.iter(|| detector.detect(black_box(&x)).unwrap())
    });
}

criterion_group!(benches, bench_stream, bench_components);
criterion_main!(benches);
