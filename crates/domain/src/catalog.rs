//! Catalog view of a product.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::order::Money;

/// A product with its current price and stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub in_stock: bool,
    pub stock_quantity: u32,
}

impl Product {
    /// Returns true if `quantity` units can be sold right now.
    pub fn can_fulfil(&self, quantity: u32) -> bool {
        self.in_stock && self.stock_quantity >= quantity
    }
}
