use common::OrderId;
use thiserror::Error;

use crate::memory::FailPoint;

/// Errors that can occur when interacting with the checkout store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A conditional stock decrement matched no row.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: String },

    /// Cart lines must hold at least one unit.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// A unique constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A guarded update found the order no longer in the expected state.
    #[error("Order {order_id} changed concurrently")]
    StaleState { order_id: OrderId },

    /// Account closure refused while orders are still open.
    #[error("User has {count} active order(s)")]
    ActiveOrders { count: u64 },

    /// A configured fault fired inside a transaction.
    #[error("Injected failure at {0:?}")]
    FaultInjected(FailPoint),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    DataCorruption(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
