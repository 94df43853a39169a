//! Benchmarks for subscribe/emit/cancel on the core primitive.
//!
//! Run with: cargo bench -p rivulet-core --bench emit_bench

use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rivulet_core::{Cleanup, Emitter, Message, Sink, create_source};

fn counting_sink(total: &Rc<Cell<u64>>) -> Sink<u64, ()> {
    let total = Rc::clone(total);
    Sink::new(move |msg| {
        if let Message::Data(v) = msg {
            total.set(total.get().wrapping_add(v));
        }
    })
}

fn bench_sync_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("core/sync_emit");
    for count in [1u64, 100, 10_000] {
        let source = create_source(move |out: Emitter<u64, ()>| {
            for v in 0..count {
                out.next(v)?;
            }
            out.complete()?;
            Ok(Cleanup::none())
        });
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            let total = Rc::new(Cell::new(0));
            b.iter(|| {
                source.subscribe(counting_sink(&total)).unwrap();
                black_box(total.get());
            });
        });
    }
    group.finish();
}

fn bench_subscribe_cancel(c: &mut Criterion) {
    let source = create_source(|_out: Emitter<u64, ()>| Ok(Cleanup::new(|| {})));
    c.bench_function("core/subscribe_cancel", |b| {
        let total = Rc::new(Cell::new(0));
        b.iter(|| {
            let talkback = source.subscribe(counting_sink(&total)).unwrap();
            talkback.cancel().unwrap();
            black_box(talkback.is_terminated());
        });
    });
}

criterion_group!(benches, bench_sync_emit, bench_subscribe_cancel);
criterion_main!(benches);
