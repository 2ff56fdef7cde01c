//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::PaymentProcessor;
use common::ProductId;
use serde::Deserialize;
use storage::CheckoutStore;

use super::dto::CartResponse;
use super::{Envelope, ValidJson, message, ok, ok_with_message};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub product_id: String,
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

fn product_id(raw: &str) -> Result<ProductId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("productId is required".to_string()));
    }
    Ok(ProductId::new(trimmed))
}

/// GET /cart — the caller's cart, empty if none exists yet.
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn get<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Envelope<CartResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let cart = state
        .carts
        .get_cart(&principal)
        .await?
        .map_or_else(CartResponse::empty, CartResponse::from);
    Ok(ok(cart))
}

/// POST /cart/add
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.user_id))]
pub async fn add<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    ValidJson(req): ValidJson<AddToCartRequest>,
) -> Result<Json<Envelope<CartResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let product_id = product_id(&req.product_id)?;
    let cart = state
        .carts
        .add_item(&principal, &product_id, req.quantity)
        .await?;
    Ok(ok_with_message("Item added to cart", cart.into()))
}

/// PUT /cart/update — set a line's quantity; zero removes it.
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.user_id))]
pub async fn update<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    ValidJson(req): ValidJson<UpdateCartRequest>,
) -> Result<Json<Envelope<CartResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let product_id = product_id(&req.product_id)?;
    let cart = state
        .carts
        .update_item(&principal, &product_id, req.quantity)
        .await?;
    Ok(ok_with_message("Cart updated", cart.into()))
}

/// DELETE /cart/remove/{productId}
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn remove<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    Path(raw_product_id): Path<String>,
) -> Result<Json<Envelope<CartResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let product_id = product_id(&raw_product_id)?;
    let cart = state.carts.remove_item(&principal, &product_id).await?;
    Ok(ok_with_message("Item removed from cart", cart.into()))
}

/// DELETE /cart/clear
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn clear<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Envelope<()>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    state.carts.clear(&principal).await?;
    Ok(message("Cart cleared"))
}
