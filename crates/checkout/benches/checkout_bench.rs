use std::sync::Arc;

use checkout::{CartService, CheckoutRequest, CheckoutSettings, OrderBuilder, OrderStateMachine};
use common::{Principal, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Address, Money, Product};
use storage::{CheckoutStore, InMemoryStore};

fn address() -> Address {
    Address {
        first_name: "Bench".to_string(),
        last_name: "User".to_string(),
        email: "bench@example.com".to_string(),
        phone: "5550000000".to_string(),
        street: "1 Bench St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        country: "US".to_string(),
        zip_code: "62701".to_string(),
    }
}

fn request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: address(),
        billing_address: address(),
        payment_method: "card".to_string(),
    }
}

async fn seeded_store(products: usize) -> InMemoryStore {
    let store = InMemoryStore::new();
    for i in 0..products {
        store
            .upsert_product(Product {
                id: ProductId::new(format!("SKU-{i:03}")),
                name: format!("Product {i}"),
                price: Money::from_cents(1_299),
                in_stock: true,
                stock_quantity: 1_000_000,
            })
            .await
            .unwrap();
    }
    store
}

fn bench_create_order_5_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(seeded_store(5));
    let carts = CartService::new(store.clone());
    let builder = OrderBuilder::new(store, Arc::new(CheckoutSettings::default()));

    c.bench_function("checkout/create_order_5_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let user = Principal::customer(UserId::new());
                for i in 0..5 {
                    carts
                        .add_item(&user, &ProductId::new(format!("SKU-{i:03}")), 2)
                        .await
                        .unwrap();
                }
                builder.create_order(&user, request()).await.unwrap();
            });
        });
    });
}

fn bench_create_and_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(seeded_store(1));
    let settings = Arc::new(CheckoutSettings::default());
    let carts = CartService::new(store.clone());
    let builder = OrderBuilder::new(store.clone(), settings.clone());
    let machine = OrderStateMachine::new(store, settings);

    c.bench_function("checkout/create_and_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                let user = Principal::customer(UserId::new());
                carts
                    .add_item(&user, &ProductId::new("SKU-000"), 3)
                    .await
                    .unwrap();
                let order = builder.create_order(&user, request()).await.unwrap();
                machine.cancel_order(order.id, &user).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_create_order_5_lines, bench_create_and_cancel);
criterion_main!(benches);
