//! Converts a user's cart into a placed order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{Principal, ProductId};
use domain::{Address, Order, OrderError, OrderItem, OrderNumber};
use serde::Deserialize;
use storage::{CheckoutStore, OrderPlacement, StoreError};

use crate::error::{CheckoutError, Result};
use crate::settings::CheckoutSettings;

/// Input of an order creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: String,
}

impl CheckoutRequest {
    /// Checks both addresses and the payment method.
    pub fn validate(&self) -> std::result::Result<(), OrderError> {
        self.shipping_address.validate("shippingAddress")?;
        self.billing_address.validate("billingAddress")?;

        if self.payment_method.trim().is_empty() {
            return Err(OrderError::MissingField {
                field: "paymentMethod".to_string(),
            });
        }

        Ok(())
    }
}

/// Builds orders from cart snapshots.
///
/// Prices are taken from the cart lines (captured when each product was
/// added); stock is checked against the live catalog and then reserved by
/// the store in the same transaction that inserts the order and clears the
/// cart.
#[derive(Clone)]
pub struct OrderBuilder<S: CheckoutStore> {
    store: S,
    settings: Arc<CheckoutSettings>,
}

impl<S: CheckoutStore> OrderBuilder<S> {
    pub fn new(store: S, settings: Arc<CheckoutSettings>) -> Self {
        Self { store, settings }
    }

    /// Creates an order from the principal's cart.
    #[tracing::instrument(skip(self, principal, request), fields(user_id = %principal.user_id))]
    pub async fn create_order(&self, principal: &Principal, request: CheckoutRequest) -> Result<Order> {
        let start = Instant::now();
        let result = self.build_and_place(principal, request).await;
        metrics::histogram!("order_creation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.total,
                    "order created"
                );
            }
            Err(err) => {
                metrics::counter!("order_creation_failures_total").increment(1);
                tracing::debug!(error = %err, "order creation rejected");
            }
        }

        result
    }

    async fn build_and_place(&self, principal: &Principal, request: CheckoutRequest) -> Result<Order> {
        request.validate()?;

        let cart = self
            .store
            .cart_snapshot(principal.user_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("cart"))?;

        if cart.is_empty() {
            return Err(OrderError::EmptyCart.into());
        }

        let mut names: HashMap<ProductId, String> = HashMap::with_capacity(cart.lines.len());
        let mut items = Vec::with_capacity(cart.lines.len());

        for line in &cart.lines {
            let product = self
                .store
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| CheckoutError::not_found(format!("product {}", line.product_id)))?;

            if !product.can_fulfil(line.quantity) {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id.to_string(),
                    product_name: product.name,
                }
                .into());
            }

            items.push(OrderItem::new(
                line.product_id.clone(),
                line.quantity,
                line.unit_price,
            ));
            names.insert(product.id, product.name);
        }

        let line_sum = cart.subtotal();
        if line_sum != cart.cached_total {
            tracing::warn!(
                cart_id = %cart.cart_id,
                cached = %cart.cached_total,
                computed = %line_sum,
                "cart cached total disagrees with its lines"
            );
        }

        let order = Order::place(
            principal.user_id,
            OrderNumber::generate(&self.settings.order_number_prefix, Utc::now()),
            request.shipping_address,
            request.billing_address,
            request.payment_method.trim().to_string(),
            items,
            &self.settings.pricing,
        )?;

        self.store
            .place_order(OrderPlacement {
                order,
                cart_id: cart.cart_id,
            })
            .await
            .map_err(|err| match err {
                // Lost a race for the last units after the catalog check above.
                StoreError::InsufficientStock { product_id } => {
                    let product_name = names
                        .get(&ProductId::new(product_id.as_str()))
                        .cloned()
                        .unwrap_or_else(|| product_id.clone());
                    OrderError::InsufficientStock {
                        product_id,
                        product_name,
                    }
                    .into()
                }
                other => other.into(),
            })
    }
}
