use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use pantry::storage::{MemoryBackend, StorageBackend};
use pantry::{Action, LocalStorageEventBridge, Origin};

fn backend_write_benchmark(c: &mut Criterion) {
    let backend = MemoryBackend::new();

    c.bench_function("backend_write", |b| {
        let mut i = 0;
        b.iter(|| {
            backend.replace("counter", &black_box(i).to_string()).unwrap();
            i += 1;
        });
    });
}

fn plain_set_item_benchmark(c: &mut Criterion) {
    let page = Origin::in_memory("bench").open_page("bench/");

    c.bench_function("set_item_unintercepted", |b| {
        let mut i = 0;
        b.iter(|| {
            page.local_storage()
                .set_item("counter", &black_box(i).to_string())
                .unwrap();
            i += 1;
        });
    });
}

fn bridged_set_item_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_item_bridged");

    for bridge_count in [1, 10, 100].iter() {
        let page = Origin::in_memory("bench").open_page("bench/");
        let _bridges: Vec<_> = (0..*bridge_count)
            .map(|_| {
                LocalStorageEventBridge::mount_on(&page, |action: Action| {
                    black_box(action);
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(bridge_count),
            bridge_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    page.local_storage()
                        .set_item("counter", &black_box(i).to_string())
                        .unwrap();
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn mount_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("mount");

    for entry_count in [0, 100, 1000].iter() {
        let page = Origin::in_memory("bench").open_page("bench/");
        for i in 0..*entry_count {
            page.local_storage()
                .set_item(&format!("key{i}"), "value")
                .unwrap();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(entry_count),
            entry_count,
            |b, _| {
                b.iter(|| {
                    let bridge = LocalStorageEventBridge::mount_on(&page, |action: Action| {
                        black_box(action);
                    });
                    bridge.unmount();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    backend_write_benchmark,
    plain_set_item_benchmark,
    bridged_set_item_benchmark,
    mount_benchmark,
);
criterion_main!(benches);
