//! The caller's own order history and account closure.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::PaymentProcessor;
use serde::Serialize;
use storage::CheckoutStore;

use super::dto::OrderPageResponse;
use super::{Envelope, ListParams, ValidQuery, ok, ok_with_message};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountClosedResponse {
    pub anonymized_orders: u64,
}

/// GET /user/orders?page&limit&status
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn orders<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
    ValidQuery(params): ValidQuery<ListParams>,
) -> Result<Json<Envelope<OrderPageResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let mut query = params.into_query(DEFAULT_PAGE_SIZE)?;
    query.user_id = Some(principal.user_id);

    let page = state.orders.list_orders(&principal, query).await?;
    Ok(ok(page.into()))
}

/// DELETE /user/account
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn close_account<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Envelope<AccountClosedResponse>>, ApiError>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let anonymized_orders = state.accounts.close_account(&principal).await?;
    Ok(ok_with_message(
        "Account closed",
        AccountClosedResponse { anonymized_orders },
    ))
}
