//! Shared application state.

use std::sync::Arc;

use axum::extract::FromRef;
use checkout::{
    AccountService, CartService, CatalogService, CheckoutSettings, OrderBuilder,
    OrderStateMachine, PaymentProcessor, PaymentReconciler,
};
use storage::CheckoutStore;

use crate::auth::TokenIssuer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CheckoutStore, P: PaymentProcessor> {
    pub builder: OrderBuilder<S>,
    pub orders: OrderStateMachine<S>,
    pub payments: PaymentReconciler<S, P>,
    pub carts: CartService<S>,
    pub catalog: CatalogService<S>,
    pub accounts: AccountService<S>,
    pub tokens: TokenIssuer,
}

impl<S, P> AppState<S, P>
where
    S: CheckoutStore + Clone,
    P: PaymentProcessor,
{
    /// Wires every service to the same store.
    pub fn new(store: S, processor: P, settings: CheckoutSettings, tokens: TokenIssuer) -> Self {
        let settings = Arc::new(settings);

        Self {
            builder: OrderBuilder::new(store.clone(), settings.clone()),
            orders: OrderStateMachine::new(store.clone(), settings.clone()),
            payments: PaymentReconciler::new(store.clone(), processor, settings),
            carts: CartService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            accounts: AccountService::new(store),
            tokens,
        }
    }
}

impl<S: CheckoutStore, P: PaymentProcessor> FromRef<Arc<AppState<S, P>>> for TokenIssuer {
    fn from_ref(state: &Arc<AppState<S, P>>) -> Self {
        state.tokens.clone()
    }
}
