//! Response bodies. Amounts are integer cents.

use chrono::{DateTime, Utc};
use domain::{Address, CartSnapshot, Order, OrderItem, OrderStatus, PaymentStatus, Product};
use serde::Serialize;
use storage::Page;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub payment_intent_id: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub items: Vec<OrderItemResponse>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total.cents(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            payment_intent_id: order.payment_intent_id,
            shipping_address: order.shipping_address,
            billing_address: order.billing_address,
            items: order.items.into_iter().map(Into::into).collect(),
            subtotal_cents: order.subtotal.cents(),
            tax_cents: order.tax.cents(),
            shipping_cents: order.shipping.cents(),
            total_cents: order.total.cents(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPageResponse {
    pub orders: Vec<OrderResponse>,
    pub pagination: Pagination,
}

impl From<Page<Order>> for OrderPageResponse {
    fn from(page: Page<Order>) -> Self {
        let pagination = Pagination {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages(),
        };

        Self {
            orders: page.items.into_iter().map(Into::into).collect(),
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    /// Absent until the user first adds something.
    pub cart_id: Option<String>,
    pub items: Vec<CartItemResponse>,
    pub total_cents: i64,
    pub total_items: u32,
}

impl CartResponse {
    pub fn empty() -> Self {
        Self {
            cart_id: None,
            items: Vec::new(),
            total_cents: 0,
            total_items: 0,
        }
    }
}

impl From<CartSnapshot> for CartResponse {
    fn from(cart: CartSnapshot) -> Self {
        Self {
            cart_id: Some(cart.cart_id.to_string()),
            total_cents: cart.cached_total.cents(),
            total_items: cart.cached_items,
            items: cart
                .lines
                .into_iter()
                .map(|line| CartItemResponse {
                    line_total_cents: line.line_total().cents(),
                    product_id: line.product_id.to_string(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub in_stock: bool,
    pub stock_quantity: u32,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            price_cents: product.price.cents(),
            in_stock: product.in_stock,
            stock_quantity: product.stock_quantity,
        }
    }
}
