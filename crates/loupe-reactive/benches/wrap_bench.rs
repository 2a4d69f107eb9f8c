//! Benchmarks for the wrap fast path and read interception overhead.
//!
//! Run with: cargo bench -p loupe-reactive --bench wrap_bench

use criterion::{Criterion, criterion_group, criterion_main};
use loupe_reactive::Reactivity;
use loupe_value::{Obj, PropKey, Value};
use std::hint::black_box;

fn bench_first_wrap(c: &mut Criterion) {
    c.bench_function("wrap/first", |b| {
        let rt = Reactivity::new();
        b.iter(|| {
            let x = Value::Obj(Obj::record());
            black_box(rt.to_mutable(x))
        });
    });
}

fn bench_rewrap_fast_path(c: &mut Criterion) {
    c.bench_function("wrap/rewrap", |b| {
        let rt = Reactivity::new();
        let x = Value::Obj(Obj::record());
        let _keep = rt.to_mutable(x.clone());
        b.iter(|| black_box(rt.to_mutable(x.clone())));
    });
}

fn bench_unwrap(c: &mut Criterion) {
    c.bench_function("wrap/unwrap", |b| {
        let rt = Reactivity::new();
        let x = Value::Obj(Obj::record());
        let m = rt.to_mutable(x);
        b.iter(|| black_box(rt.unwrap(m.clone())));
    });
}

fn bench_read_through_wrapper(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let rt = Reactivity::new();
    let raw = Obj::record();
    let key = PropKey::name("field");
    raw.raw_set(&key, Value::Int(42));
    let wrapper = rt
        .to_mutable(Value::Obj(raw.clone()))
        .into_obj()
        .expect("wrapper");

    group.bench_function("raw", |b| b.iter(|| black_box(raw.raw_get(&key))));
    group.bench_function("intercepted", |b| b.iter(|| black_box(wrapper.get(&key))));
    group.finish();
}

criterion_group!(
    benches,
    bench_first_wrap,
    bench_rewrap_fast_path,
    bench_unwrap,
    bench_read_through_wrapper
);
criterion_main!(benches);
