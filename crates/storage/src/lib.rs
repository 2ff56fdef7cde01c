//! Persistence for the storefront checkout.
//!
//! [`CheckoutStore`] is the seam between the checkout services and the
//! database. Every composite write (order placement, cancellation, payment
//! confirmation, account closure) is a single transaction in each
//! implementation.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryStore};
pub use postgres::PostgresStore;
pub use store::{CheckoutStore, OrderPlacement, OrderQuery, Page};
