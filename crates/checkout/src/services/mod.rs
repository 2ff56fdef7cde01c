//! External service adapters used by the checkout workflow.

pub mod payment;
pub mod stripe;

pub use payment::{
    InMemoryPaymentProcessor, IntentRequest, IntentStatus, PaymentError, PaymentIntent,
    PaymentProcessor, is_intent_id,
};
pub use stripe::{StripeConfig, StripePaymentProcessor};
