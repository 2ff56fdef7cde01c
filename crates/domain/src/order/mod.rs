//! Order aggregate and related types.

mod aggregate;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{Address, Money, OrderItem, OrderNumber};

use thiserror::Error;

/// Business-rule violations in the checkout domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// A required input field is blank.
    #[error("{field} is required")]
    MissingField { field: String },

    /// A field is present but malformed.
    #[error("{field} {reason}")]
    InvalidField { field: String, reason: String },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A product is out of stock or has fewer units than requested.
    #[error("Insufficient stock for {product_name}")]
    InsufficientStock {
        product_id: String,
        product_name: String,
    },

    /// The order is shipped, delivered or already cancelled.
    #[error("Order cannot be cancelled in {status} status")]
    NotCancellable { status: OrderStatus },

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Order is cancelled")]
    OrderCancelled,

    /// The processor reports the intent in a status other than `succeeded`.
    #[error("Payment not completed (intent status: {status})")]
    PaymentNotCompleted { status: String },

    /// Unknown status string.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The principal is neither the owner nor an admin.
    #[error("Not allowed to modify this order")]
    Forbidden,

    /// The payment intent was created for a different order.
    #[error("Payment intent does not belong to this order")]
    IntentMismatch,

    /// The account still has orders in flight.
    #[error("Account has {count} active order(s)")]
    ActiveOrders { count: u64 },
}
