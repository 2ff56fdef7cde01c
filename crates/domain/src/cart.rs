//! Shopping cart snapshot.

use common::{CartId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::order::{Money, OrderError};

/// One cart line. The unit price is captured when the product is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Read-only copy of a user's cart.
///
/// Lines keep insertion order and never repeat a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,

    /// Running total maintained by the cart on every change.
    pub cached_total: Money,

    /// Running unit count maintained by the cart on every change.
    pub cached_items: u32,
}

impl CartSnapshot {
    /// Creates an empty cart for `user_id`.
    pub fn empty(cart_id: CartId, user_id: UserId) -> Self {
        Self {
            cart_id,
            user_id,
            lines: Vec::new(),
            cached_total: Money::zero(),
            cached_items: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of `unit_price * quantity` over all lines.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Returns the quantity already in the cart for `product_id`.
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.lines
            .iter()
            .find(|line| &line.product_id == product_id)
            .map_or(0, |line| line.quantity)
    }

    /// Adds `quantity` of a product, merging with an existing line.
    ///
    /// A merged line keeps its original unit price. Cached totals are
    /// recomputed.
    pub fn merge_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }

        match self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => line.quantity += quantity,
            None => self.lines.push(CartLine {
                product_id,
                quantity,
                unit_price,
            }),
        }

        self.refresh_totals();
        Ok(())
    }

    /// Sets the quantity of an existing line. Zero removes the line.
    ///
    /// Returns false if the product is not in the cart.
    pub fn set_line_quantity(&mut self, product_id: &ProductId, quantity: u32) -> bool {
        let Some(index) = self
            .lines
            .iter()
            .position(|line| &line.product_id == product_id)
        else {
            return false;
        };

        if quantity == 0 {
            self.lines.remove(index);
        } else {
            self.lines[index].quantity = quantity;
        }

        self.refresh_totals();
        true
    }

    /// Removes every line and zeroes the cached totals.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.refresh_totals();
    }

    fn refresh_totals(&mut self) {
        self.cached_total = self.subtotal();
        self.cached_items = self.total_items();
    }
}
