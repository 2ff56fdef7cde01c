use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, OrderId, ProductId, UserId};
use domain::{CartSnapshot, Money, Order, OrderStatus, PaymentStatus, Product};
use tokio::sync::Mutex;

use crate::{
    Result, StoreError,
    store::{CheckoutStore, OrderPlacement, OrderQuery, Page},
};

/// Points inside composite operations where a fault can be injected.
///
/// A fault aborts the operation after the named step has been applied to
/// the staged state, so nothing is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// `place_order`: stock decremented, cart not yet cleared.
    AfterStockReservation,

    /// `cancel_order`: stock restored, status not yet committed.
    AfterStockRestored,

    /// `close_account`: cart deleted, orders not yet anonymized.
    AfterCartDeleted,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    carts: HashMap<UserId, CartSnapshot>,
    /// Insertion order; listings read it back to front.
    orders: Vec<Order>,
}

impl MemoryState {
    fn order(&self, id: OrderId) -> Result<&Order> {
        self.orders
            .iter()
            .find(|order| order.id == id)
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order> {
        self.orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    fn cart_by_id_mut(&mut self, cart_id: CartId) -> Result<&mut CartSnapshot> {
        self.carts
            .values_mut()
            .find(|cart| cart.cart_id == cart_id)
            .ok_or_else(|| StoreError::not_found("cart", cart_id))
    }

    fn adjust_stock(&mut self, id: &ProductId, delta: i64) -> Result<u32> {
        let product = self
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("product", id))?;

        let current = i64::from(product.stock_quantity);
        if delta < 0 && (!product.in_stock || current + delta < 0) {
            return Err(StoreError::InsufficientStock {
                product_id: id.to_string(),
            });
        }

        product.stock_quantity = u32::try_from(current + delta).map_err(|_| {
            StoreError::DataCorruption(format!("stock for {id} out of range: {}", current + delta))
        })?;
        Ok(product.stock_quantity)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: MemoryState,
    armed: Option<FailPoint>,
}

impl Inner {
    /// Fails if `point` is armed, disarming it.
    fn trip(&mut self, point: FailPoint) -> Result<()> {
        if self.armed == Some(point) {
            self.armed = None;
            return Err(StoreError::FaultInjected(point));
        }
        Ok(())
    }
}

/// In-memory checkout store for tests and database-less runs.
///
/// Composite operations work on a staged copy of the state and swap it in
/// only when every step succeeds, giving the same all-or-nothing behaviour
/// as a database transaction.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next operation that reaches `point` fail.
    pub async fn fail_next(&self, point: FailPoint) {
        self.inner.lock().await.armed = Some(point);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.lock().await.state.orders.len()
    }
}

#[async_trait]
impl CheckoutStore for InMemoryStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.inner.lock().await.state.products.get(id).cloned())
    }

    async fn upsert_product(&self, product: Product) -> Result<Product> {
        let mut inner = self.inner.lock().await;
        inner
            .state
            .products
            .insert(product.id.clone(), product.clone());
        Ok(product)
    }

    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32> {
        self.inner.lock().await.state.adjust_stock(id, delta)
    }

    async fn cart_snapshot(&self, user_id: UserId) -> Result<Option<CartSnapshot>> {
        Ok(self.inner.lock().await.state.carts.get(&user_id).cloned())
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<CartSnapshot> {
        let mut inner = self.inner.lock().await;
        if !inner.state.products.contains_key(product_id) {
            return Err(StoreError::not_found("product", product_id));
        }

        let mut cart = inner
            .state
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| CartSnapshot::empty(CartId::new(), user_id));

        cart.merge_line(product_id.clone(), quantity, unit_price)
            .map_err(|_| StoreError::InvalidQuantity(quantity))?;
        inner.state.carts.insert(user_id, cart.clone());
        Ok(cart)
    }

    async fn set_cart_item_quantity(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot> {
        let mut inner = self.inner.lock().await;
        let cart = inner
            .state
            .carts
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("cart", user_id))?;

        if !cart.set_line_quantity(product_id, quantity) {
            return Err(StoreError::not_found("cart item", product_id));
        }
        Ok(cart.clone())
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.state.cart_by_id_mut(cart_id)?.clear();
        Ok(())
    }

    async fn place_order(&self, placement: OrderPlacement) -> Result<Order> {
        let OrderPlacement { order, cart_id } = placement;
        let mut inner = self.inner.lock().await;
        let mut staged = inner.state.clone();

        if staged
            .orders
            .iter()
            .any(|existing| existing.order_number == order.order_number)
        {
            return Err(StoreError::Conflict(format!(
                "order number {} already exists",
                order.order_number
            )));
        }

        let mut lines: Vec<_> = order.items.iter().collect();
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        for item in lines {
            staged.adjust_stock(&item.product_id, -i64::from(item.quantity))?;
        }

        inner.trip(FailPoint::AfterStockReservation)?;

        staged.cart_by_id_mut(cart_id)?.clear();
        staged.orders.push(order.clone());

        inner.state = staged;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner.state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>> {
        let inner = self.inner.lock().await;
        let matching: Vec<&Order> = inner
            .state
            .orders
            .iter()
            .rev()
            .filter(|order| query.matches(order))
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            page: query.page,
            limit: query.limit,
            total,
        })
    }

    async fn cancel_order(&self, id: OrderId) -> Result<Order> {
        let mut inner = self.inner.lock().await;
        let mut staged = inner.state.clone();

        let order = staged.order(id)?.clone();
        if !order.status.can_cancel() {
            return Err(StoreError::StaleState { order_id: id });
        }

        for item in &order.items {
            match staged.adjust_stock(&item.product_id, i64::from(item.quantity)) {
                Ok(_) => {}
                Err(StoreError::NotFound { .. }) => {
                    tracing::warn!(
                        order_id = %id,
                        product_id = %item.product_id,
                        "Product missing while restoring stock, skipping"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        inner.trip(FailPoint::AfterStockRestored)?;

        let order = staged.order_mut(id)?;
        order.apply_cancellation(Utc::now());
        let cancelled = order.clone();

        inner.state = staged;
        Ok(cancelled)
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut inner = self.inner.lock().await;
        let order = inner.state.order_mut(id)?;
        if order.status == OrderStatus::Cancelled {
            return Err(StoreError::StaleState { order_id: id });
        }

        order.apply_status(status, Utc::now());
        Ok(order.clone())
    }

    async fn attach_payment_intent(&self, id: OrderId, intent_id: &str) -> Result<Order> {
        let mut inner = self.inner.lock().await;
        let order = inner.state.order_mut(id)?;
        order.attach_payment_intent(intent_id, Utc::now());
        Ok(order.clone())
    }

    async fn mark_order_paid(&self, id: OrderId) -> Result<Order> {
        let mut inner = self.inner.lock().await;
        let order = inner.state.order_mut(id)?;
        if order.payment_status == PaymentStatus::Paid || !order.status.can_cancel() {
            return Err(StoreError::StaleState { order_id: id });
        }

        order.apply_payment(Utc::now());
        Ok(order.clone())
    }

    async fn close_account(&self, user_id: UserId) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut staged = inner.state.clone();

        let active = staged
            .orders
            .iter()
            .filter(|order| order.user_id == user_id && order.status.is_active())
            .count() as u64;
        if active > 0 {
            return Err(StoreError::ActiveOrders { count: active });
        }

        staged.carts.remove(&user_id);
        inner.trip(FailPoint::AfterCartDeleted)?;

        let now = Utc::now();
        let mut anonymized = 0;
        for order in staged.orders.iter_mut().filter(|o| o.user_id == user_id) {
            order.anonymize(now);
            anonymized += 1;
        }

        inner.state = staged;
        Ok(anonymized)
    }
}
