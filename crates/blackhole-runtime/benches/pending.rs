use blackhole_runtime::worker::PendingWrites;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Remapping queued write indices after a connection in the middle of the
/// registry is removed.
fn forget(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending forget");
    for queued in [14usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(queued), &queued, |b, &queued| {
            b.iter(|| {
                let mut pending = PendingWrites::new();
                for i in 0..queued {
                    pending.push(i % 64).unwrap();
                }
                pending.forget(32);
                black_box(pending.len());
            });
        });
    }
    group.finish();
}

/// LIFO push/pop at the write budget.
fn push_pop(c: &mut Criterion) {
    c.bench_function("pending push+pop 14", |b| {
        let mut pending = PendingWrites::with_capacity(14).unwrap();
        b.iter(|| {
            for i in 0..14usize {
                pending.push(i).unwrap();
            }
            while let Some(i) = pending.pop() {
                black_box(i);
            }
        });
    });
}

criterion_group!(benches, forget, push_pop);
criterion_main!(benches);
