//! Order creation, lookup and cancellation.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CheckoutRequest, PaymentProcessor};
use storage::CheckoutStore;

use super::dto::OrderResponse;
use super::{Envelope, ValidJson, ok, ok_with_message, parse_order_id};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /orders — turn the caller's cart into an order.
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.user_id))]
pub async fn create<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    ValidJson(req): ValidJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<Envelope<OrderResponse>>), ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let order = state.builder.create_order(&principal, req).await?;

    Ok((
        StatusCode::CREATED,
        ok_with_message("Order created", OrderResponse::from(order)),
    ))
}

/// GET /orders/{id} — an order of the caller (any order for admins).
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn get<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.orders.get_order(order_id, &principal).await?;
    Ok(ok(order.into()))
}

/// PUT /orders/{id}/cancel — cancel and restore stock.
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn cancel<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.orders.cancel_order(order_id, &principal).await?;
    Ok(ok_with_message("Order cancelled", order.into()))
}
