use std::{hint::black_box, sync::Arc};

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use nazar::{message, Hub};

#[derive(Clone, Debug, Default)]
struct Tick {
    price: u64,
}

#[derive(Clone, Debug, Default)]
struct TradeTick {
    tick: Tick,
}

message!(Tick);
message!(TradeTick { tick: Tick });

struct Owner;

fn hub_with_subscribers(n: usize) -> (Hub, Vec<Arc<Owner>>) {
    let hub = Hub::new();
    let owners: Vec<_> = (0..n).map(|_| Arc::new(Owner)).collect();
    for owner in &owners {
        hub.subscribe(owner, |t: &Tick| {
            black_box(t.price);
        });
    }
    (hub, owners)
}

fn bench_subscribe(c: &mut Criterion) {
    let hub = Hub::new();
    let owner = Arc::new(Owner);
    c.bench_function("hub_subscribe", |b| {
        b.iter(|| {
            black_box(hub.subscribe(&owner, |_: &Tick| {}));
        })
    });
}

fn bench_unsubscribe(c: &mut Criterion) {
    c.bench_function("hub_unsubscribe_100", |b| {
        b.iter_batched(
            || {
                let hub = Hub::new();
                let owner = Arc::new(Owner);
                for _ in 0..100 {
                    hub.subscribe(&owner, |_: &Tick| {});
                }
                (hub, owner)
            },
            |(hub, owner)| black_box(hub.unsubscribe(&owner)),
            BatchSize::SmallInput,
        )
    });
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub_publish");
    for n in [0, 1, 10, 100] {
        let (hub, _owners) = hub_with_subscribers(n);
        group.bench_with_input(BenchmarkId::new("exact", n), &n, |b, _| {
            b.iter(|| hub.publish(black_box(&Tick { price: 1 })).unwrap())
        });
        // Подписчики на Tick получают вложенное значение TradeTick.
        group.bench_with_input(BenchmarkId::new("derived", n), &n, |b, _| {
            let msg = TradeTick {
                tick: Tick { price: 2 },
            };
            b.iter(|| hub.publish(black_box(&msg)).unwrap())
        });
    }
    group.finish();
}

fn bench_publish_async(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (hub, _owners) = hub_with_subscribers(10);
    c.bench_function("hub_publish_async_10_subs", |b| {
        b.to_async(&runtime)
            .iter(|| async { hub.publish_async(&Tick { price: 3 }).await.unwrap() })
    });
}

fn bench_prune(c: &mut Criterion) {
    c.bench_function("hub_prune_1000_dead", |b| {
        b.iter_batched(
            || {
                let (hub, owners) = hub_with_subscribers(1000);
                drop(owners);
                hub
            },
            |hub| black_box(hub.prune()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_subscribe,
    bench_unsubscribe,
    bench_publish,
    bench_publish_async,
    bench_prune,
);
criterion_main!(benches);
