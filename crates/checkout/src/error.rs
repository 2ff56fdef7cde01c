//! Checkout error types.

use domain::OrderError;
use storage::StoreError;
use thiserror::Error;

use crate::services::PaymentError;

/// Errors that can occur during checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Rule(#[from] OrderError),

    /// The referenced order, cart or product does not exist (or is not
    /// visible to the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// Request input failed validation.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Store(StoreError),

    /// Payment processor failure.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

impl CheckoutError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            StoreError::InsufficientStock { product_id } => Self::Rule(OrderError::InsufficientStock {
                product_name: product_id.clone(),
                product_id,
            }),
            StoreError::InvalidQuantity(quantity) => {
                Self::Rule(OrderError::InvalidQuantity { quantity })
            }
            StoreError::ActiveOrders { count } => Self::Rule(OrderError::ActiveOrders { count }),
            StoreError::Conflict(message) => Self::Conflict(message),
            other => Self::Store(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
