//! Admin endpoints: order listing, status updates, product upserts.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::PaymentProcessor;
use common::ProductId;
use domain::{Money, Product};
use serde::Deserialize;
use storage::CheckoutStore;

use super::dto::{OrderPageResponse, OrderResponse, ProductResponse};
use super::{Envelope, ListParams, ValidJson, ValidQuery, ok, ok_with_message, parse_order_id};
use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProductRequest {
    pub name: String,
    pub price_cents: i64,
    #[serde(default = "in_stock_default")]
    pub in_stock: bool,
    pub stock_quantity: u32,
}

fn in_stock_default() -> bool {
    true
}

/// GET /admin/orders?page&limit&status
#[tracing::instrument(skip(state, principal))]
pub async fn list_orders<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AdminUser(principal): AdminUser,
    ValidQuery(params): ValidQuery<ListParams>,
) -> Result<Json<Envelope<OrderPageResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let query = params.into_query(DEFAULT_PAGE_SIZE)?;
    let page = state.orders.list_orders(&principal, query).await?;
    Ok(ok(page.into()))
}

/// PUT /admin/orders/{id}/status
#[tracing::instrument(skip(state, principal, req))]
pub async fn update_status<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AdminUser(principal): AdminUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateStatusRequest>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .update_status(order_id, &principal, req.status.trim())
        .await?;
    Ok(ok_with_message("Order status updated", order.into()))
}

/// PUT /admin/products/{id}
#[tracing::instrument(skip(state, principal, req))]
pub async fn upsert_product<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AdminUser(principal): AdminUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpsertProductRequest>,
) -> Result<Json<Envelope<ProductResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let product = Product {
        id: ProductId::new(id.trim()),
        name: req.name.trim().to_string(),
        price: Money::from_cents(req.price_cents),
        in_stock: req.in_stock,
        stock_quantity: req.stock_quantity,
    };

    let saved = state.catalog.upsert_product(&principal, product).await?;
    Ok(ok(saved.into()))
}
