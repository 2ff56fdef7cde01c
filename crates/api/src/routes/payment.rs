//! Payment intent creation and confirmation.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::{PaymentHandle, PaymentProcessor};
use serde::Deserialize;
use storage::CheckoutStore;

use super::dto::OrderResponse;
use super::{Envelope, ValidJson, ok, ok_with_message, parse_order_id};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub order_id: String,
    pub payment_intent_id: String,
}

/// POST /payment/create-intent
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.user_id))]
pub async fn create_intent<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    ValidJson(req): ValidJson<CreateIntentRequest>,
) -> Result<Json<Envelope<PaymentHandle>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let order_id = parse_order_id(&req.order_id)?;
    let handle = state.payments.create_intent(order_id, &principal).await?;
    Ok(ok(handle))
}

/// POST /payment/confirm
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.user_id))]
pub async fn confirm<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    ValidJson(req): ValidJson<ConfirmPaymentRequest>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let order_id = parse_order_id(&req.order_id)?;
    let intent_id = req.payment_intent_id.trim();
    if intent_id.is_empty() {
        return Err(ApiError::BadRequest("paymentIntentId is required".to_string()));
    }

    let order = state
        .payments
        .confirm_payment(order_id, &principal, intent_id)
        .await?;
    Ok(ok_with_message("Payment confirmed", order.into()))
}
