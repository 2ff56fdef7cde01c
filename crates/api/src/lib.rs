//! HTTP API for the storefront checkout backend.
//!
//! Exposes cart, order, payment and admin endpoints over the checkout
//! services, with bearer-token auth, structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use checkout::PaymentProcessor;
use metrics_exporter_prometheus::PrometheusHandle;
use storage::CheckoutStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use auth::{AdminUser, AuthUser, TokenIssuer};
pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P>(state: Arc<AppState<S, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, P>))
        .route("/orders/{id}", get(routes::orders::get::<S, P>))
        .route("/orders/{id}/cancel", put(routes::orders::cancel::<S, P>))
        .route(
            "/payment/create-intent",
            post(routes::payment::create_intent::<S, P>),
        )
        .route("/payment/confirm", post(routes::payment::confirm::<S, P>))
        .route("/cart", get(routes::cart::get::<S, P>))
        .route("/cart/add", post(routes::cart::add::<S, P>))
        .route("/cart/update", put(routes::cart::update::<S, P>))
        .route(
            "/cart/remove/{product_id}",
            delete(routes::cart::remove::<S, P>),
        )
        .route("/cart/clear", delete(routes::cart::clear::<S, P>))
        .route("/user/orders", get(routes::user::orders::<S, P>))
        .route("/user/account", delete(routes::user::close_account::<S, P>))
        .route("/admin/orders", get(routes::admin::list_orders::<S, P>))
        .route(
            "/admin/orders/{id}/status",
            put(routes::admin::update_status::<S, P>),
        )
        .route(
            "/admin/products/{id}",
            put(routes::admin::upsert_product::<S, P>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
