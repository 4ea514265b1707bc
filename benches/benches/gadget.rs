// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_gadget` + `understory_emitter`.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::cell::Cell;
use std::rc::Rc;

use understory_emitter::Emitter;
use understory_gadget::{Class, ClassBuilder, Context, PropertyBuilder, Props, ReactiveArray, Value};

fn point_class() -> Class {
    ClassBuilder::new("Point")
        .property(PropertyBuilder::new("x").default(0).build())
        .property(PropertyBuilder::new("y").default(0).build())
        .property(PropertyBuilder::new("label").default("point").build())
        .build()
}

fn bench_construct(c: &mut Criterion) {
    let ctx = Context::new();
    let point = point_class();
    let sub = point
        .extend("Point3")
        .property(PropertyBuilder::new("z").default(0).build())
        .build();
    let holder = ClassBuilder::new("Holder")
        .property(PropertyBuilder::new("child").link().build())
        .build();
    ctx.defaults().add("Point", "label", "override");

    let mut group = c.benchmark_group("gadget/construct");

    group.bench_function("defaults", |b| {
        b.iter(|| black_box(point.construct_in(&ctx, &Props::new()).unwrap()));
    });

    group.bench_function("props", |b| {
        let props = Props::new().with("x", 1).with("y", 2).with("label", "p");
        b.iter(|| black_box(point.construct_in(&ctx, &props).unwrap()));
    });

    group.bench_function("inherited_override", |b| {
        b.iter(|| black_box(sub.construct_in(&ctx, &Props::new()).unwrap()));
    });

    group.bench_function("linked_child", |b| {
        b.iter_batched(
            || point.construct_in(&ctx, &Props::new()).unwrap(),
            |child| {
                let props = Props::new().with("child", child);
                black_box(holder.construct_in(&ctx, &props).unwrap())
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_access(c: &mut Criterion) {
    let ctx = Context::new();
    let point = point_class();
    let mut group = c.benchmark_group("gadget/access");

    group.bench_function("get", |b| {
        let g = point.construct_in(&ctx, &Props::new()).unwrap();
        b.iter(|| black_box(g.get("label")));
    });

    group.bench_function("set_same", |b| {
        let g = point.construct_in(&ctx, &Props::new()).unwrap();
        b.iter(|| g.set("x", black_box(0)).unwrap());
    });

    for listeners in [0_usize, 1, 8] {
        group.bench_function(BenchmarkId::new("set_notify", listeners), |b| {
            let g = point.construct_in(&ctx, &Props::new()).unwrap();
            let hits = Rc::new(Cell::new(0_u64));
            for _ in 0..listeners {
                let hits = hits.clone();
                g.on_modified(move |_| hits.set(hits.get() + 1));
            }
            let mut n = 0_i64;
            b.iter(|| {
                n += 1;
                g.set("x", n).unwrap();
            });
            black_box(hits.get());
        });
    }

    // A chain of linked gadgets; each write relays to every ancestor.
    let depth: usize = 8;
    group.bench_function(BenchmarkId::new("set_relayed", depth), |b| {
        let node = ClassBuilder::new("Node")
            .property(PropertyBuilder::new("value").default(0).build())
            .property(PropertyBuilder::new("child").link().build())
            .build();
        let leaf = node.construct_in(&ctx, &Props::new()).unwrap();
        let mut top = leaf.clone();
        for _ in 0..depth {
            top = node
                .construct_in(&ctx, &Props::new().with("child", top))
                .unwrap();
        }
        let hits = Rc::new(Cell::new(0_u64));
        let sink = hits.clone();
        top.on_modified(move |_| sink.set(sink.get() + 1));
        let mut n = 0_i64;
        b.iter(|| {
            n += 1;
            leaf.set("value", n).unwrap();
        });
        black_box(hits.get());
    });

    group.finish();
}

fn bench_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("gadget/array");

    for len in [16_usize, 256] {
        let values: Vec<Value> = (0..len as i64).map(Value::from).collect();

        group.bench_function(BenchmarkId::new("push", len), |b| {
            b.iter_batched(
                ReactiveArray::new,
                |array| {
                    for v in &values {
                        array.push(v.clone()).unwrap();
                    }
                    array
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(BenchmarkId::new("splice_middle", len), |b| {
            b.iter_batched(
                || ReactiveArray::from_values(values.iter().cloned()),
                |array| {
                    array
                        .splice(len / 2, 2, [Value::from(-1), Value::from(-2), Value::from(-3)])
                        .unwrap();
                    array
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(BenchmarkId::new("shift", len), |b| {
            b.iter_batched(
                || ReactiveArray::from_values(values.iter().cloned()),
                |array| {
                    black_box(array.shift());
                    array
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_emitter(c: &mut Criterion) {
    let mut group = c.benchmark_group("emitter/trigger");

    for listeners in [1_usize, 16] {
        group.bench_function(BenchmarkId::from_parameter(listeners), |b| {
            let emitter: Emitter<u64> = Emitter::new((), "tick");
            let total = Rc::new(Cell::new(0_u64));
            for _ in 0..listeners {
                let total = total.clone();
                emitter.listen(move |e| total.set(total.get() + e.payload));
            }
            b.iter(|| black_box(emitter.trigger(black_box(1))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_construct, bench_access, bench_array, bench_emitter);
criterion_main!(benches);
