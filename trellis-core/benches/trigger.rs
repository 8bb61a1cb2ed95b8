//! Benchmarks for dependency tracking and propagation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trellis_core::{computed, effect, reactive, Raw, Value};

// =============================================================================
// Propagation
// =============================================================================

fn bench_effect_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect_rerun");

    for subscribers in [1usize, 16, 256] {
        let state = reactive(&Raw::object_from([("n", 0)]));
        let effects: Vec<_> = (0..subscribers)
            .map(|_| {
                let state = state.clone();
                effect(move || {
                    black_box(state.get("n"));
                })
            })
            .collect();

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                let mut n = 0.0;
                b.iter(|| {
                    n += 1.0;
                    state.set("n", n);
                });
            },
        );

        for e in &effects {
            e.stop();
        }
    }

    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let state = reactive(&Raw::object_from([("n", 0)]));
    let doubled = computed({
        let state = state.clone();
        move || state.get("n").as_f64().unwrap_or_default() * 2.0
    });
    let quadrupled = computed({
        let doubled = doubled.clone();
        move || doubled.value() * 2.0
    });

    c.bench_function("computed_chain_write_then_read", |b| {
        let mut n = 0.0;
        b.iter(|| {
            n += 1.0;
            state.set("n", n);
            black_box(quadrupled.value())
        });
    });
}

// =============================================================================
// Proxy access
// =============================================================================

fn bench_tracked_reads(c: &mut Criterion) {
    let raw = Raw::object_from((0..64).map(|i| (format!("k{i}"), Value::from(i))));
    let state = reactive(&raw);
    let keys: Vec<String> = (0..64).map(|i| format!("k{i}")).collect();

    c.bench_function("tracked_read_64_keys", |b| {
        b.iter(|| {
            let e = effect({
                let state = state.clone();
                let keys = keys.clone();
                move || {
                    for key in &keys {
                        black_box(state.get(key.as_str()));
                    }
                }
            });
            e.stop();
        });
    });
}

fn bench_array_push(c: &mut Criterion) {
    c.bench_function("array_push_1000", |b| {
        b.iter(|| {
            let list = reactive(&Raw::array());
            for i in 0..1000 {
                list.push(i);
            }
            black_box(list.len())
        });
    });
}

criterion_group!(
    benches,
    bench_effect_rerun,
    bench_computed_chain,
    bench_tracked_reads,
    bench_array_push
);
criterion_main!(benches);
