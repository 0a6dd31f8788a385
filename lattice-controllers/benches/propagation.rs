//! Benchmark: change propagation through signals, memos and controllers

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lattice_controllers::reactive::{Effect, Memo, Signal};
use lattice_controllers::{
    Application, Controller, ControllerDefinition, Element, ReactivityConfig, ValueType,
};

struct Inert;

impl Controller for Inert {}

fn benchmark_signal_fan_out(c: &mut Criterion) {
    let source = Signal::new(0u64);
    let effects: Vec<Effect> = (0..64)
        .map(|_| {
            let source = source.clone();
            Effect::new(move || {
                black_box(source.get());
            })
        })
        .collect();

    let mut next = 0u64;
    c.bench_function("signal_fan_out_64", |b| {
        b.iter(|| {
            next += 1;
            source.set(next);
        })
    });
    drop(effects);
}

fn benchmark_memo_chain(c: &mut Criterion) {
    let source = Signal::new(0u64);
    let mut tail = {
        let source = source.clone();
        Memo::new(move || source.get() + 1)
    };
    for _ in 0..32 {
        let previous = tail.clone();
        tail = Memo::new(move || previous.get() + 1);
    }
    let _effect = {
        let tail = tail.clone();
        Effect::new(move || {
            black_box(tail.get());
        })
    };

    let mut next = 0u64;
    c.bench_function("memo_chain_32", |b| {
        b.iter(|| {
            next += 1;
            source.set(next);
        })
    });
}

fn benchmark_controller_value_write(c: &mut Criterion) {
    let app = Application::new(ReactivityConfig {
        reflect_values: false,
        ..ReactivityConfig::default()
    });
    app.register(
        ControllerDefinition::new("counter").value("count", ValueType::Number),
        || Inert,
    )
    .unwrap();
    let counter = app.mount("counter", Element::new("div")).unwrap();
    let weak = counter.downgrade();
    counter
        .effect(move || {
            if let Some(counter) = weak.upgrade() {
                black_box(counter.value("count").ok());
            }
        })
        .unwrap();

    let mut next = 0u64;
    c.bench_function("controller_value_write", |b| {
        b.iter(|| {
            next += 1;
            counter.set_value("count", next).unwrap();
        })
    });
}

criterion_group!(
    benches,
    benchmark_signal_fan_out,
    benchmark_memo_chain,
    benchmark_controller_value_write
);
criterion_main!(benches);
