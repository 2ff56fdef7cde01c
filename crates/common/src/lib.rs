//! Shared types used across the checkout crates.

pub mod types;

pub use types::{CartId, OrderId, Principal, ProductId, UserId};
