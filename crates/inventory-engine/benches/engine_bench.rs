use common::{ActorId, Money};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory_engine::InventoryEngine;
use stock_ledger::{InMemoryLedgerStore, NewItem};

fn bench_create(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("engine/create", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = InventoryEngine::new(InMemoryLedgerStore::new());
                engine
                    .create(NewItem::new(
                        "Gummy Bears",
                        "Gummies",
                        Money::from_cents(199),
                        150,
                    ))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_purchase(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = InventoryEngine::new(InMemoryLedgerStore::new());
    let buyer = ActorId::new();

    // Deep stock so the bench never drains it.
    let item_id = rt.block_on(async {
        engine
            .create(NewItem::new(
                "Jelly Beans",
                "Jelly",
                Money::from_cents(350),
                1_000_000_000,
            ))
            .await
            .unwrap()
            .item
            .id
    });

    c.bench_function("engine/purchase", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.purchase(item_id, 1, buyer).await.unwrap();
            });
        });
    });
}

fn bench_full_stock_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("engine/full_create_purchase_restock", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = InventoryEngine::new(InMemoryLedgerStore::new());
                let actor = ActorId::new();
                let item_id = engine
                    .create(NewItem::new(
                        "Caramel Chews",
                        "Caramel",
                        Money::from_cents(299),
                        100,
                    ))
                    .await
                    .unwrap()
                    .item
                    .id;

                engine.purchase(item_id, 5, actor).await.unwrap();
                engine.restock(item_id, 5, actor).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_create, bench_purchase, bench_full_stock_cycle);
criterion_main!(benches);
