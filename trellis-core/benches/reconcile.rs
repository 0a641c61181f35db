//! Keyed-list reconciliation benchmarks.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trellis_core::reactive::Signal;
use trellis_core::testing::MemoryRenderer;
use trellis_core::{component, create_app, element, AppConfig, Application, Instance, PropsView};

fn mount_list(len: usize) -> (Application, Signal<Vec<usize>>) {
    let items = Signal::new((0..len).collect::<Vec<_>>());
    let read = items.clone();
    let renderer = Rc::new(MemoryRenderer::new());
    let host = renderer.create_root();
    let app = create_app(
        component(move |_props: PropsView| {
            let read = read.clone();
            Instance::new(move || {
                element("ul").children(
                    read.get()
                        .into_iter()
                        .map(|n| element("li").key(n).child(n.to_string())),
                )
            })
        }),
        AppConfig::new(renderer).auto_update(false),
    );
    if let Err(err) = app.mount(host) {
        panic!("mount failed: {err}");
    }
    (app, items)
}

fn bench_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_reverse");
    for len in [10usize, 100, 1000] {
        let (app, items) = mount_list(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                items.modify(|list| list.reverse());
                black_box(app.render()).ok();
            })
        });
    }
    group.finish();
}

fn bench_rotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_rotate");
    for len in [10usize, 100, 1000] {
        let (app, items) = mount_list(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                items.modify(|list| list.rotate_right(1));
                black_box(app.render()).ok();
            })
        });
    }
    group.finish();
}

fn bench_append_remove(c: &mut Criterion) {
    let (app, items) = mount_list(100);
    c.bench_function("append_remove_100", |b| {
        b.iter(|| {
            items.modify(|list| list.push(100));
            black_box(app.render()).ok();
            items.modify(|list| {
                list.pop();
            });
            black_box(app.render()).ok();
        })
    });
}

criterion_group!(benches, bench_reverse, bench_rotate, bench_append_remove);
criterion_main!(benches);
