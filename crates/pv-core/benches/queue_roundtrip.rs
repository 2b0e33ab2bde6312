use criterion::{criterion_group, criterion_main, Criterion};
use pv_core::TransportQueue;

fn push_pop_roundtrip(c: &mut Criterion) {
    let queue = TransportQueue::<f64>::new(4, 32);
    let mut input = pv_core::Buffer::<f64>::empty(32);
    let mut output = pv_core::Buffer::<f64>::empty(32);

    c.bench_function("transport_queue_push_pop_roundtrip", |b| {
        b.iter(|| {
            queue.push_overwrite(&mut input);
            queue.pop(&mut output);
        });
    });
}

fn push_overwrite_under_pressure(c: &mut Criterion) {
    let queue = TransportQueue::<f64>::new(2, 32);
    let mut input = pv_core::Buffer::<f64>::empty(32);

    c.bench_function("transport_queue_push_overwrite_saturated", |b| {
        b.iter(|| {
            queue.push_overwrite(&mut input);
        });
    });
}

criterion_group!(benches, push_pop_roundtrip, push_overwrite_under_pressure);
criterion_main!(benches);
