//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p storage --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{CartId, UserId};
use domain::{
    Address, CartSnapshot, Money, Order, OrderItem, OrderNumber, OrderStatus, PaymentStatus,
    PricingPolicy, Product,
};
use serial_test::serial;
use sqlx::PgPool;
use storage::{CheckoutStore, OrderPlacement, OrderQuery, PostgresStore, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, cart_items, carts, products")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn product(id: &str, price: i64, stock: u32) -> Product {
    Product {
        id: id.into(),
        name: format!("Product {id}"),
        price: Money::from_cents(price),
        in_stock: true,
        stock_quantity: stock,
    }
}

fn address() -> Address {
    Address {
        first_name: "Pat".to_string(),
        last_name: "Customer".to_string(),
        email: "pat@example.com".to_string(),
        phone: "5559876543".to_string(),
        street: "77 Harbor Ave".to_string(),
        city: "Seattle".to_string(),
        state: "WA".to_string(),
        country: "US".to_string(),
        zip_code: "98101".to_string(),
    }
}

fn placement(cart: &CartSnapshot) -> OrderPlacement {
    let items = cart
        .lines
        .iter()
        .map(|l| OrderItem::new(l.product_id.clone(), l.quantity, l.unit_price))
        .collect();
    let order = Order::place(
        cart.user_id,
        OrderNumber::generate("TEST", Utc::now()),
        address(),
        address(),
        "card".to_string(),
        items,
        &PricingPolicy::default(),
    )
    .unwrap();

    OrderPlacement {
        order,
        cart_id: cart.cart_id,
    }
}

async fn cart_with(store: &PostgresStore, user: UserId, lines: &[(&str, u32, i64)]) -> CartSnapshot {
    let mut cart = None;
    for (id, quantity, price) in lines {
        cart = Some(
            store
                .add_cart_item(user, &(*id).into(), *quantity, Money::from_cents(*price))
                .await
                .unwrap(),
        );
    }
    cart.unwrap()
}

async fn stock(store: &PostgresStore, id: &str) -> u32 {
    store
        .get_product(&id.into())
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

mod catalog {
    use super::*;

    #[tokio::test]
    #[serial]
    async fn upsert_and_adjust_stock() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 5)).await.unwrap();

        assert_eq!(store.adjust_stock(&"A".into(), -3).await.unwrap(), 2);
        assert!(matches!(
            store.adjust_stock(&"A".into(), -3).await,
            Err(StoreError::InsufficientStock { .. })
        ));
        assert_eq!(store.adjust_stock(&"A".into(), 3).await.unwrap(), 5);
        assert!(matches!(
            store.adjust_stock(&"missing".into(), -1).await,
            Err(StoreError::NotFound { .. })
        ));

        let mut updated = product("A", 1200, 0);
        updated.in_stock = false;
        store.upsert_product(updated.clone()).await.unwrap();
        assert_eq!(store.get_product(&"A".into()).await.unwrap(), Some(updated));
    }
}

mod carts {
    use super::*;

    #[tokio::test]
    #[serial]
    async fn add_merges_and_keeps_line_order() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 10)).await.unwrap();
        store.upsert_product(product("B", 250, 10)).await.unwrap();
        let user = UserId::new();

        let cart = cart_with(&store, user, &[("B", 1, 250), ("A", 2, 1000), ("B", 2, 300)]).await;

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].product_id.as_str(), "B");
        assert_eq!(cart.lines[0].quantity, 3);
        assert_eq!(cart.lines[0].unit_price.cents(), 250);
        assert_eq!(cart.cached_total.cents(), 2750);
        assert_eq!(cart.cached_items, 5);
    }

    #[tokio::test]
    #[serial]
    async fn add_unknown_product_is_not_found() {
        let store = get_test_store().await;

        let result = store
            .add_cart_item(UserId::new(), &"nope".into(), 1, Money::from_cents(100))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    #[serial]
    async fn set_quantity_and_remove() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 10)).await.unwrap();
        let user = UserId::new();
        cart_with(&store, user, &[("A", 2, 1000)]).await;

        let cart = store
            .set_cart_item_quantity(user, &"A".into(), 4)
            .await
            .unwrap();
        assert_eq!(cart.cached_total.cents(), 4000);

        let cart = store
            .set_cart_item_quantity(user, &"A".into(), 0)
            .await
            .unwrap();
        assert!(cart.is_empty());
        assert!(cart.cached_total.is_zero());

        assert!(matches!(
            store.set_cart_item_quantity(user, &"A".into(), 1).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}

mod placement {
    use super::*;

    #[tokio::test]
    #[serial]
    async fn place_order_reserves_stock_and_clears_cart() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 5)).await.unwrap();
        let user = UserId::new();
        let cart = cart_with(&store, user, &[("A", 2, 1000)]).await;

        let order = store.place_order(placement(&cart)).await.unwrap();

        assert_eq!(stock(&store, "A").await, 3);
        let cart = store.cart_snapshot(user).await.unwrap().unwrap();
        assert!(cart.is_empty());
        assert!(cart.cached_total.is_zero());
        assert_eq!(cart.cached_items, 0);

        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.order_number, order.order_number);
        assert_eq!(stored.items, order.items);
        assert_eq!(stored.total.cents(), 3159);
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert_eq!(stored.shipping_address, address());
    }

    #[tokio::test]
    #[serial]
    async fn failure_after_stock_reservation_rolls_back() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 5)).await.unwrap();
        let user = UserId::new();
        let cart = cart_with(&store, user, &[("A", 2, 1000)]).await;

        // Stock is reserved first; the unknown cart fails the clear step.
        let mut bad = placement(&cart);
        bad.cart_id = CartId::new();
        let result = store.place_order(bad).await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(stock(&store, "A").await, 5);
        assert_eq!(
            store.cart_snapshot(user).await.unwrap().unwrap().lines.len(),
            1
        );
        let page = store.list_orders(OrderQuery::all(1, 10)).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    #[serial]
    async fn insufficient_stock_on_second_line_releases_first() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 5)).await.unwrap();
        store.upsert_product(product("B", 500, 10)).await.unwrap();
        let user = UserId::new();
        let cart = cart_with(&store, user, &[("A", 2, 1000), ("B", 3, 500)]).await;
        store.adjust_stock(&"B".into(), -9).await.unwrap();

        let result = store.place_order(placement(&cart)).await;

        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock { ref product_id }) if product_id == "B"
        ));
        assert_eq!(stock(&store, "A").await, 5);
        assert_eq!(stock(&store, "B").await, 1);
    }

    #[tokio::test]
    #[serial]
    async fn concurrent_over_demand_only_one_succeeds() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 5)).await.unwrap();
        let first = cart_with(&store, UserId::new(), &[("A", 3, 1000)]).await;
        let second = cart_with(&store, UserId::new(), &[("A", 3, 1000)]).await;

        let (a, b) = tokio::join!(
            store.place_order(placement(&first)),
            store.place_order(placement(&second))
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert!(matches!(
            a.err().or(b.err()),
            Some(StoreError::InsufficientStock { .. })
        ));
        assert_eq!(stock(&store, "A").await, 2);
    }

    #[tokio::test]
    #[serial]
    async fn many_concurrent_buyers_never_oversell() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 4)).await.unwrap();

        let mut carts = Vec::new();
        for _ in 0..8 {
            carts.push(cart_with(&store, UserId::new(), &[("A", 1, 1000)]).await);
        }

        let results =
            futures_util::future::join_all(carts.iter().map(|c| store.place_order(placement(c))))
                .await;

        let placed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(placed, 4);
        assert_eq!(stock(&store, "A").await, 0);
    }
}

mod lifecycle {
    use super::*;

    async fn placed_order(store: &PostgresStore) -> Order {
        store.upsert_product(product("A", 1000, 5)).await.unwrap();
        let cart = cart_with(store, UserId::new(), &[("A", 2, 1000)]).await;
        store.place_order(placement(&cart)).await.unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn cancel_restores_stock_exactly_once() {
        let store = get_test_store().await;
        let order = placed_order(&store).await;
        assert_eq!(stock(&store, "A").await, 3);

        let (a, b) = tokio::join!(store.cancel_order(order.id), store.cancel_order(order.id));

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(
            a.err().or(b.err()),
            Some(StoreError::StaleState { .. })
        ));
        assert_eq!(stock(&store, "A").await, 5);

        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    #[serial]
    async fn cancel_shipped_order_is_stale() {
        let store = get_test_store().await;
        let order = placed_order(&store).await;
        store
            .update_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        assert!(matches!(
            store.cancel_order(order.id).await,
            Err(StoreError::StaleState { .. })
        ));
        assert_eq!(stock(&store, "A").await, 3);
    }

    #[tokio::test]
    #[serial]
    async fn cancel_unknown_order_is_not_found() {
        let store = get_test_store().await;

        assert!(matches!(
            store.cancel_order(common::OrderId::new()).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn payment_intent_and_paid_guard() {
        let store = get_test_store().await;
        let order = placed_order(&store).await;

        let order = store
            .attach_payment_intent(order.id, "pi_123")
            .await
            .unwrap();
        assert_eq!(order.payment_intent_id.as_deref(), Some("pi_123"));

        let paid = store.mark_order_paid(order.id).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, OrderStatus::Confirmed);

        assert!(matches!(
            store.mark_order_paid(order.id).await,
            Err(StoreError::StaleState { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn cancelled_order_cannot_be_paid() {
        let store = get_test_store().await;
        let order = placed_order(&store).await;
        store.cancel_order(order.id).await.unwrap();

        assert!(matches!(
            store.mark_order_paid(order.id).await,
            Err(StoreError::StaleState { .. })
        ));
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert_eq!(stock(&store, "A").await, 5);
    }

    #[tokio::test]
    #[serial]
    async fn racing_cancel_and_payment_never_revive_order() {
        let store = get_test_store().await;
        let order = placed_order(&store).await;

        let (cancelled, paid) =
            tokio::join!(store.cancel_order(order.id), store.mark_order_paid(order.id));

        // Payment confirms a pending order, which stays cancellable, so the
        // cancel commits whichever write lands first.
        assert!(cancelled.is_ok());
        assert!(matches!(paid, Ok(_) | Err(StoreError::StaleState { .. })));

        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stock(&store, "A").await, 5);
    }

    #[tokio::test]
    #[serial]
    async fn cancelled_status_is_final() {
        let store = get_test_store().await;
        let order = placed_order(&store).await;
        store.cancel_order(order.id).await.unwrap();

        assert!(matches!(
            store
                .update_order_status(order.id, OrderStatus::Pending)
                .await,
            Err(StoreError::StaleState { .. })
        ));
        assert!(matches!(
            store.cancel_order(order.id).await,
            Err(StoreError::StaleState { .. })
        ));
        assert_eq!(stock(&store, "A").await, 5);
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    #[serial]
    async fn list_orders_paginates_newest_first() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 100)).await.unwrap();
        let user = UserId::new();
        let other = UserId::new();

        let mut ids = Vec::new();
        for owner in [user, other, user, user] {
            let cart = cart_with(&store, owner, &[("A", 1, 1000)]).await;
            ids.push(store.place_order(placement(&cart)).await.unwrap().id);
        }
        store
            .update_order_status(ids[0], OrderStatus::Delivered)
            .await
            .unwrap();

        let first = store.list_orders(OrderQuery::all(1, 3)).await.unwrap();
        assert_eq!(first.total, 4);
        assert_eq!(first.total_pages(), 2);
        assert_eq!(first.items.len(), 3);
        assert_eq!(first.items[0].id, ids[3]);
        assert_eq!(first.items[0].items.len(), 1);

        let second = store.list_orders(OrderQuery::all(2, 3)).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].id, ids[0]);

        let mine = store
            .list_orders(OrderQuery::for_user(user, 1, 10))
            .await
            .unwrap();
        assert_eq!(mine.total, 3);

        let delivered = store
            .list_orders(
                OrderQuery::for_user(user, 1, 10).with_status(Some(OrderStatus::Delivered)),
            )
            .await
            .unwrap();
        assert_eq!(delivered.total, 1);
        assert_eq!(delivered.items[0].id, ids[0]);
    }
}

mod accounts {
    use super::*;

    #[tokio::test]
    #[serial]
    async fn close_account_refused_with_active_orders() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 5)).await.unwrap();
        let user = UserId::new();
        let cart = cart_with(&store, user, &[("A", 1, 1000)]).await;
        store.place_order(placement(&cart)).await.unwrap();

        assert!(matches!(
            store.close_account(user).await,
            Err(StoreError::ActiveOrders { count: 1 })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn close_account_anonymizes_and_deletes_cart() {
        let store = get_test_store().await;
        store.upsert_product(product("A", 1000, 5)).await.unwrap();
        let user = UserId::new();
        let cart = cart_with(&store, user, &[("A", 1, 1000)]).await;
        let order = store.place_order(placement(&cart)).await.unwrap();
        store.cancel_order(order.id).await.unwrap();
        cart_with(&store, user, &[("A", 1, 1000)]).await;

        assert_eq!(store.close_account(user).await.unwrap(), 1);

        assert!(store.cart_snapshot(user).await.unwrap().is_none());
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.shipping_address.first_name, "Deleted");
        assert_eq!(stored.billing_address.phone, "0000000000");
        assert_eq!(stored.shipping_address.city, "Seattle");
        assert_eq!(stored.total, order.total);
        assert_eq!(stored.items, order.items);
    }
}
