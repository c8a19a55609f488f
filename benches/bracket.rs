use criterion::{black_box, criterion_group, criterion_main, Criterion};
use perf_bracket::measurement::{serialize, SyntheticBackend};
use perf_bracket::registry::{baseline_group, baseline_group_with};
use perf_bracket::measure;

fn bench_bracket_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("bracket");

    group.bench_function("serialize", |b| b.iter(serialize));

    group.bench_function("synthetic_measure_empty", |b| {
        let mut counters = baseline_group_with(SyntheticBackend::new()).unwrap();
        b.iter(|| black_box(measure(&mut counters, || black_box(1u64 + 1)).unwrap().output));
    });

    // Live counters are skipped when perf_event is not accessible.
    match baseline_group() {
        Ok(mut counters) => {
            group.bench_function("perf_measure_empty", |b| {
                b.iter(|| black_box(measure(&mut counters, || black_box(1u64 + 1)).unwrap().output));
            });
            group.bench_function("perf_enable_disable_read", |b| {
                b.iter(|| {
                    counters.enable().unwrap();
                    counters.disable().unwrap();
                    black_box(counters.read_events().unwrap())
                });
            });
        }
        Err(e) => eprintln!("skipping live counter benches: {}", e),
    }

    group.finish();
}

criterion_group!(benches, bench_bracket_overhead);
criterion_main!(benches);
