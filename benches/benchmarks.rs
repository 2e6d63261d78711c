use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

use draftstore::{handler, ActionInfo, Node, Store, TurnQueue};

#[derive(Clone)]
struct State {
    counter: usize,
    items: Arc<Vec<usize>>,
}

fn state() -> State {
    State {
        counter: 0,
        items: Arc::new((0..10_000).collect()),
    }
}

fn store_read_benchmark(c: &mut Criterion) {
    let store = Store::new(state(), Arc::new(TurnQueue::new()));

    c.bench_function("store_get_state", |b| {
        b.iter(|| {
            black_box(store.get_state());
        });
    });
}

fn store_update_benchmark(c: &mut Criterion) {
    let store = Store::new(state(), Arc::new(TurnQueue::new()));
    let action = ActionInfo::new("bench", "set");

    c.bench_function("store_update_shared_items", |b| {
        let mut i = 0;
        b.iter(|| {
            store.update(|d| d.modify(|s| s.counter = black_box(i)), action.clone());
            i += 1;
        });
    });
}

fn nested_update_benchmark(c: &mut Criterion) {
    let store = Store::new(state(), Arc::new(TurnQueue::new()));
    let inner = store.clone();
    let action = ActionInfo::new("bench", "nested");

    c.bench_function("store_update_nested_x10", |b| {
        b.iter(|| {
            store.update(
                |_| {
                    for _ in 0..10 {
                        inner.update(|d| d.modify(|s| s.counter += 1), action.clone());
                    }
                },
                action.clone(),
            );
        });
    });
}

fn store_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let store = Store::new(state(), Arc::new(TurnQueue::new()));
        let action = ActionInfo::new("bench", "fanout");

        for _ in 0..*subscriber_count {
            store.subscribe(handler(|_: &Arc<State>, _: &ActionInfo| {
                // Empty subscriber
            }));
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.update(|d| d.modify(|s| s.counter = black_box(i)), action.clone());
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn async_draft_benchmark(c: &mut Criterion) {
    let queue = Arc::new(TurnQueue::new());
    let store = Store::new(state(), queue.clone());
    let action = ActionInfo::new("bench", "leg");

    c.bench_function("async_draft_commit", |b| {
        b.iter(|| {
            if let Ok(draft) = store.start_async_draft(action.clone()) {
                draft.modify(|s| s.counter += 1);
            }
            queue.run_until_idle();
        });
    });
}

fn tree_path_write_benchmark(c: &mut Criterion) {
    let rows: Vec<_> = (0..1_000).map(|i| json!({ "id": i, "done": false })).collect();
    let base = Node::from(json!({ "rows": rows, "meta": { "title": "bench" } }));

    c.bench_function("tree_set_deep_path", |b| {
        b.iter(|| {
            let mut next = base.clone();
            let _ = next.set(black_box("/rows/500/done"), Node::from(true));
            black_box(next);
        });
    });
}

criterion_group!(
    benches,
    store_read_benchmark,
    store_update_benchmark,
    nested_update_benchmark,
    store_subscribe_benchmark,
    async_draft_benchmark,
    tree_path_write_benchmark,
);
criterion_main!(benches);
