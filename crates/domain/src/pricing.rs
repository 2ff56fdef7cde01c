//! Order total computation.

use serde::{Deserialize, Serialize};

use crate::order::Money;

/// Monetary totals of an order. `total == subtotal + tax + shipping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

/// Tax and shipping rules applied to a cart subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Tax rate in basis points (800 = 8%).
    pub tax_rate_bps: u32,

    /// Subtotals at or above this amount ship free.
    pub free_shipping_threshold: Money,

    /// Shipping fee charged below the threshold.
    pub flat_shipping_fee: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bps: 800,
            free_shipping_threshold: Money::from_cents(10_000),
            flat_shipping_fee: Money::from_cents(999),
        }
    }
}

impl PricingPolicy {
    /// Computes tax, shipping and the grand total for a subtotal.
    pub fn quote(&self, subtotal: Money) -> OrderTotals {
        let tax = subtotal.apply_basis_points(self.tax_rate_bps);
        let shipping = if subtotal >= self.free_shipping_threshold {
            Money::zero()
        } else {
            self.flat_shipping_fee
        };

        OrderTotals {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_below_free_shipping() {
        let totals = PricingPolicy::default().quote(Money::from_cents(2000));

        assert_eq!(totals.tax.cents(), 160);
        assert_eq!(totals.shipping.cents(), 999);
        assert_eq!(totals.total.cents(), 3159);
    }

    #[test]
    fn test_quote_above_free_shipping() {
        let totals = PricingPolicy::default().quote(Money::from_cents(15_000));

        assert_eq!(totals.tax.cents(), 1200);
        assert_eq!(totals.shipping.cents(), 0);
        assert_eq!(totals.total.cents(), 16_200);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = PricingPolicy::default();

        assert_eq!(policy.quote(Money::from_cents(10_000)).shipping.cents(), 0);
        assert_eq!(policy.quote(Money::from_cents(9_999)).shipping.cents(), 999);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        let totals = PricingPolicy::default().quote(Money::from_cents(1999));
        assert_eq!(totals.tax.cents(), 160);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let policy = PricingPolicy {
            tax_rate_bps: 725,
            free_shipping_threshold: Money::from_cents(5000),
            flat_shipping_fee: Money::from_cents(450),
        };

        for cents in [0, 1, 99, 4999, 5000, 123_457] {
            let t = policy.quote(Money::from_cents(cents));
            assert_eq!(t.total, t.subtotal + t.tax + t.shipping);
        }
    }
}
