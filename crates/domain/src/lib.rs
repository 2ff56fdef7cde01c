//! Domain layer for the storefront checkout.
//!
//! This crate provides the core checkout types:
//! - Order aggregate with its lifecycle and payment state machines
//! - Money, Address and order number value objects
//! - Pricing policy (tax and shipping)
//! - Cart snapshot and catalog product views

pub mod cart;
pub mod catalog;
pub mod order;
pub mod pricing;

pub use cart::{CartLine, CartSnapshot};
pub use catalog::Product;
pub use order::{
    Address, Money, Order, OrderError, OrderItem, OrderNumber, OrderStatus, PaymentStatus,
};
pub use pricing::{OrderTotals, PricingPolicy};
