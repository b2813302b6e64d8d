/// Benchmarks for the timing harness and null sink.
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fetchbench::sink::{ChunkSink, DevNullStore};
use fetchbench::timer::{DiagnosticTimer, MValue};

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("timing_guard", |b| {
        b.iter_batched(
            DiagnosticTimer::new,
            |mut timer| {
                let _guard = timer.time([
                    ("nworkers", MValue::from(8)),
                    ("source", "bench".into()),
                ]);
            },
            BatchSize::SmallInput,
        )
    });
    let mut timer = DiagnosticTimer::new();
    for trial in 0..1000 {
        timer.time([("trial", MValue::from(trial))]);
    }
    c.bench_function("dataframe(1000)", |b| b.iter(|| black_box(timer.dataframe())));
    let store = DevNullStore::new();
    for size_k in [64, 1024] {
        let data = Bytes::from(vec![0_u8; size_k * 1024]);
        let name = format!("dev_null_store({})", size_k * 1024);
        c.bench_function(&name, |b| {
            b.iter(|| {
                store
                    .write_chunk(black_box(&[0, 0]), data.clone())
                    .unwrap();
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
