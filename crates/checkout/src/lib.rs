//! Checkout workflow for the storefront.
//!
//! The order-creation and payment-confirmation flow:
//! 1. [`OrderBuilder`] converts the user's cart into an immutable order,
//!    reserving stock and clearing the cart in one store transaction
//! 2. [`OrderStateMachine`] moves orders through their lifecycle,
//!    restoring stock on cancellation
//! 3. [`PaymentReconciler`] creates a processor payment intent for the
//!    order total and marks the order paid only after the processor
//!    reports the intent as succeeded
//!
//! [`CartService`], [`CatalogService`] and [`AccountService`] cover the
//! surrounding cart, product and account-closure operations.

pub mod account;
pub mod builder;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod reconciler;
pub mod services;
pub mod settings;
pub mod state_machine;

pub use account::AccountService;
pub use builder::{CheckoutRequest, OrderBuilder};
pub use cart::CartService;
pub use catalog::CatalogService;
pub use error::{CheckoutError, Result};
pub use reconciler::{PaymentHandle, PaymentReconciler};
pub use services::{
    InMemoryPaymentProcessor, IntentRequest, IntentStatus, PaymentError, PaymentIntent,
    PaymentProcessor, StripeConfig, StripePaymentProcessor, is_intent_id,
};
pub use settings::CheckoutSettings;
pub use state_machine::OrderStateMachine;
