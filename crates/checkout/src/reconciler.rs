//! Reconciles orders with the payment processor.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use common::{OrderId, Principal};
use domain::{Order, OrderError, OrderStatus};
use serde::Serialize;
use storage::{CheckoutStore, StoreError};

use crate::error::{CheckoutError, Result};
use crate::services::{IntentRequest, IntentStatus, PaymentError, PaymentProcessor, is_intent_id};
use crate::settings::CheckoutSettings;

/// What the client needs to complete a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandle {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// Creates payment intents for orders and marks orders paid once the
/// processor reports the intent as succeeded.
///
/// The processor is the source of truth: a client's claim that it paid is
/// only accepted after re-reading the live intent.
#[derive(Clone)]
pub struct PaymentReconciler<S: CheckoutStore, P: PaymentProcessor> {
    store: S,
    processor: P,
    settings: Arc<CheckoutSettings>,
}

impl<S: CheckoutStore, P: PaymentProcessor> PaymentReconciler<S, P> {
    pub fn new(store: S, processor: P, settings: Arc<CheckoutSettings>) -> Self {
        Self {
            store,
            processor,
            settings,
        }
    }

    /// Creates a payment intent for the order total.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn create_intent(&self, order_id: OrderId, principal: &Principal) -> Result<PaymentHandle> {
        let order = self.owned_order(order_id, principal).await?;
        order.ensure_payable()?;

        let request = IntentRequest {
            amount: order.total,
            currency: self.settings.currency.clone(),
            metadata: BTreeMap::from([
                ("order_id".to_string(), order.id.to_string()),
                ("user_id".to_string(), order.user_id.to_string()),
            ]),
        };

        let intent = self.bounded(self.processor.create_intent(request)).await?;
        self.store.attach_payment_intent(order.id, &intent.id).await?;

        metrics::counter!("payment_intents_created_total").increment(1);
        tracing::info!(intent_id = %intent.id, amount = %order.total, "payment intent created");

        Ok(PaymentHandle {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
        })
    }

    /// Marks the order paid if the processor confirms the intent succeeded.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        principal: &Principal,
        intent_id: &str,
    ) -> Result<Order> {
        if !is_intent_id(intent_id) {
            return Err(CheckoutError::Validation(
                "Invalid payment intent id".to_string(),
            ));
        }

        let order = self.owned_order(order_id, principal).await?;
        order.ensure_payable()?;

        let intent = self.bounded(self.processor.retrieve_intent(intent_id)).await?;

        let expected_order = order.id.to_string();
        if intent.metadata.get("order_id") != Some(&expected_order) || intent.amount != order.total {
            tracing::warn!(intent_id, "payment intent does not match order");
            return Err(OrderError::IntentMismatch.into());
        }

        if intent.status != IntentStatus::Succeeded {
            metrics::counter!("payment_confirmations_rejected_total").increment(1);
            tracing::info!(intent_id, status = %intent.status, "payment not completed");
            return Err(OrderError::PaymentNotCompleted {
                status: intent.status.to_string(),
            }
            .into());
        }

        match self.store.mark_order_paid(order.id).await {
            Ok(paid) => {
                metrics::counter!("payments_confirmed_total").increment(1);
                tracing::info!(intent_id, "payment confirmed");
                Ok(paid)
            }
            Err(StoreError::StaleState { .. }) => Err(self.lost_race(order).await),
            Err(err) => Err(err.into()),
        }
    }

    /// The order changed while the processor was queried; report why it can
    /// no longer be marked paid.
    async fn lost_race(&self, order: Order) -> CheckoutError {
        let current = match self.store.get_order(order.id).await {
            Ok(current) => current.unwrap_or(order),
            Err(err) => return err.into(),
        };

        match current.ensure_payable() {
            Err(rule) => rule.into(),
            Ok(()) => OrderError::InvalidTransition {
                from: current.status,
                to: OrderStatus::Confirmed,
            }
            .into(),
        }
    }

    /// Loads an order owned by `principal`. Orders of other users are
    /// reported as missing, admins included.
    async fn owned_order(&self, order_id: OrderId, principal: &Principal) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|order| order.is_owned_by(principal.user_id))
            .ok_or_else(|| CheckoutError::not_found(format!("order {order_id}")))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, PaymentError>>,
    ) -> std::result::Result<T, PaymentError> {
        let limit = self.settings.payment_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| PaymentError::Timeout(limit))?
    }
}
