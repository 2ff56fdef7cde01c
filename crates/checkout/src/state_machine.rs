//! Order lifecycle operations.

use std::sync::Arc;

use common::{OrderId, Principal};
use domain::{Order, OrderError, OrderStatus};
use storage::{CheckoutStore, OrderQuery, Page, StoreError};

use crate::error::{CheckoutError, Result};
use crate::settings::CheckoutSettings;

/// Reads and moves orders through their lifecycle.
///
/// ```text
/// pending → confirmed → processing → shipped → delivered
///    └──────────┴────────────┴──→ cancelled
/// ```
#[derive(Clone)]
pub struct OrderStateMachine<S: CheckoutStore> {
    store: S,
    settings: Arc<CheckoutSettings>,
}

impl<S: CheckoutStore> OrderStateMachine<S> {
    pub fn new(store: S, settings: Arc<CheckoutSettings>) -> Self {
        Self { store, settings }
    }

    /// Returns an order visible to `principal`.
    ///
    /// Orders of other users are reported as missing unless the principal
    /// is an admin.
    #[tracing::instrument(skip(self, principal))]
    pub async fn get_order(&self, order_id: OrderId, principal: &Principal) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|order| principal.can_access(order.user_id))
            .ok_or_else(|| CheckoutError::not_found(format!("order {order_id}")))
    }

    /// Lists orders newest first.
    ///
    /// Non-admin principals only ever see their own orders.
    #[tracing::instrument(skip(self, principal))]
    pub async fn list_orders(&self, principal: &Principal, mut query: OrderQuery) -> Result<Page<Order>> {
        if !principal.is_admin {
            query.user_id = Some(principal.user_id);
        }

        Ok(self.store.list_orders(query).await?)
    }

    /// Cancels an order and restores its stock.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn cancel_order(&self, order_id: OrderId, principal: &Principal) -> Result<Order> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found(format!("order {order_id}")))?;

        order.ensure_cancellable_by(principal)?;
        self.cancel(order).await
    }

    /// Sets an order's status (admin only).
    ///
    /// Unless strict transitions are configured any status is accepted, but
    /// a cancelled order is final. Cancelling a cancellable order goes
    /// through the cancellation path so its stock is restored.
    #[tracing::instrument(skip(self, principal))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        principal: &Principal,
        status: &str,
    ) -> Result<Order> {
        if !principal.is_admin {
            return Err(OrderError::Forbidden.into());
        }

        let next: OrderStatus = status.parse()?;
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found(format!("order {order_id}")))?;

        order.check_status_change(next, self.settings.strict_status_transitions)?;

        if next == OrderStatus::Cancelled && order.status.can_cancel() {
            return self.cancel(order).await;
        }

        match self.store.update_order_status(order_id, next).await {
            Ok(updated) => {
                tracing::info!(from = %order.status, to = %next, "order status updated");
                Ok(updated)
            }
            Err(StoreError::StaleState { .. }) => {
                // Cancelled concurrently; the stock is already back on sale.
                let from = self
                    .store
                    .get_order(order_id)
                    .await?
                    .map_or(OrderStatus::Cancelled, |current| current.status);
                Err(OrderError::InvalidTransition { from, to: next }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn cancel(&self, order: Order) -> Result<Order> {
        match self.store.cancel_order(order.id).await {
            Ok(cancelled) => {
                metrics::counter!("orders_cancelled_total").increment(1);
                tracing::info!(order_id = %cancelled.id, "order cancelled");
                Ok(cancelled)
            }
            Err(StoreError::StaleState { .. }) => {
                // Another request moved the order first; report where it is now.
                let status = self
                    .store
                    .get_order(order.id)
                    .await?
                    .map_or(order.status, |current| current.status);
                Err(OrderError::NotCancellable { status }.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}
