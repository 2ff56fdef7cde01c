use async_trait::async_trait;
use common::{CartId, OrderId, ProductId, UserId};
use domain::{CartSnapshot, Money, Order, OrderStatus, Product};

use crate::Result;

/// Everything needed to persist a new order in one transaction.
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    /// The fully priced order, status `pending`/`pending`.
    pub order: Order,

    /// The cart the order was built from. It is emptied on commit.
    pub cart_id: CartId,
}

/// Filter and pagination for order listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    /// Restrict to one user's orders.
    pub user_id: Option<UserId>,

    /// Restrict to one status.
    pub status: Option<OrderStatus>,

    /// 1-based page number.
    pub page: u32,

    /// Page size.
    pub limit: u32,
}

impl OrderQuery {
    pub const MAX_LIMIT: u32 = 100;

    /// Creates a query for all orders.
    pub fn all(page: u32, limit: u32) -> Self {
        Self {
            user_id: None,
            status: None,
            page,
            limit,
        }
    }

    /// Creates a query for one user's orders.
    pub fn for_user(user_id: UserId, page: u32, limit: u32) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::all(page, limit)
        }
    }

    /// Restricts the query to a single status.
    pub fn with_status(mut self, status: Option<OrderStatus>) -> Self {
        self.status = status;
        self
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub(crate) fn matches(&self, order: &Order) -> bool {
        self.user_id.is_none_or(|user_id| order.user_id == user_id)
            && self.status.is_none_or(|status| order.status == status)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// `ceil(total / limit)`.
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Transactional persistence for the checkout workflow.
///
/// All implementations must be thread-safe (Send + Sync). Composite
/// operations either commit every effect or none.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Fetches a product with its current price and stock.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Creates or replaces a product.
    async fn upsert_product(&self, product: Product) -> Result<Product>;

    /// Changes a product's stock by `delta`, returning the new quantity.
    ///
    /// Negative deltas are conditional: they fail with `InsufficientStock`
    /// if the product is not in stock or has fewer units than requested.
    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32>;

    /// Returns the user's cart, if one exists.
    async fn cart_snapshot(&self, user_id: UserId) -> Result<Option<CartSnapshot>>;

    /// Adds a product to the user's cart, creating the cart if needed.
    ///
    /// An existing line for the same product has its quantity increased and
    /// keeps its original unit price.
    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<CartSnapshot>;

    /// Sets the quantity of an existing cart line. Zero removes the line.
    async fn set_cart_item_quantity(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot>;

    /// Deletes every line of a cart and zeroes its cached totals.
    async fn clear_cart(&self, cart_id: CartId) -> Result<()>;

    /// Persists a new order.
    ///
    /// In one transaction: inserts the order and its items, decrements stock
    /// for every item (conditional on sufficient stock), and clears the cart.
    async fn place_order(&self, placement: OrderPlacement) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders newest first.
    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>>;

    /// Cancels an order and restores the stock of every item.
    ///
    /// The status update is guarded on the order still being cancellable;
    /// if it is not, returns `StaleState` and restores nothing.
    async fn cancel_order(&self, id: OrderId) -> Result<Order>;

    /// Overwrites the lifecycle status.
    ///
    /// A cancelled order is never moved again; returns `StaleState`.
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Records the processor's payment intent reference.
    async fn attach_payment_intent(&self, id: OrderId, intent_id: &str) -> Result<Order>;

    /// Sets payment status `paid` and status `confirmed`.
    ///
    /// Guarded on the payment status not already being `paid` and the order
    /// still being cancellable (`pending`, `confirmed` or `processing`);
    /// otherwise returns `StaleState`.
    async fn mark_order_paid(&self, id: OrderId) -> Result<Order>;

    /// Deletes the user's cart and anonymizes the addresses on their orders.
    ///
    /// Refused with `ActiveOrders` while any order is pending, confirmed or
    /// processing. Returns the number of anonymized orders.
    async fn close_account(&self, user_id: UserId) -> Result<u64>;
}
