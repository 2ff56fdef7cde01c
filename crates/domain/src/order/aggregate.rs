//! Order aggregate.

use chrono::{DateTime, Utc};
use common::{OrderId, Principal, UserId};
use serde::{Deserialize, Serialize};

use crate::pricing::{OrderTotals, PricingPolicy};

use super::{Address, Money, OrderError, OrderItem, OrderNumber, OrderStatus, PaymentStatus};

/// A placed order.
///
/// Line items and monetary totals are fixed at creation. After that only the
/// lifecycle status, the payment status, the payment intent reference and
/// (on account closure) the personal address fields change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new `pending`/`pending` order from priced lines.
    ///
    /// Totals are computed from the line totals with `pricing`.
    pub fn place(
        user_id: UserId,
        order_number: OrderNumber,
        shipping_address: Address,
        billing_address: Address,
        payment_method: String,
        items: Vec<OrderItem>,
        pricing: &PricingPolicy,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        if let Some(item) = items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: item.quantity,
            });
        }

        let subtotal: Money = items.iter().map(|item| item.line_total).sum();
        let OrderTotals {
            subtotal,
            tax,
            shipping,
            total,
        } = pricing.quote(subtotal);
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            user_id,
            order_number,
            status: OrderStatus::Pending,
            shipping_address,
            billing_address,
            payment_method,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: None,
            subtotal,
            tax,
            shipping,
            total,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the order's totals.
    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            tax: self.tax,
            shipping: self.shipping,
            total: self.total,
        }
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Checks that `principal` may cancel this order now.
    pub fn ensure_cancellable_by(&self, principal: &Principal) -> Result<(), OrderError> {
        if !principal.can_access(self.user_id) {
            return Err(OrderError::Forbidden);
        }

        if !self.status.can_cancel() {
            return Err(OrderError::NotCancellable {
                status: self.status,
            });
        }

        Ok(())
    }

    /// Checks that a payment may still be started or confirmed.
    pub fn ensure_payable(&self) -> Result<(), OrderError> {
        if self.is_paid() {
            return Err(OrderError::AlreadyPaid);
        }

        if self.status == OrderStatus::Cancelled {
            return Err(OrderError::OrderCancelled);
        }

        Ok(())
    }

    /// Checks an admin status change. Without `strict` any status is accepted,
    /// except that a cancelled order stays cancelled: its stock has already
    /// been released.
    pub fn check_status_change(&self, next: OrderStatus, strict: bool) -> Result<(), OrderError> {
        let already_cancelled = self.status == OrderStatus::Cancelled;
        if already_cancelled || (strict && !self.status.can_transition_to(next)) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        Ok(())
    }

    pub fn apply_status(&mut self, next: OrderStatus, at: DateTime<Utc>) {
        self.status = next;
        self.updated_at = at;
    }

    pub fn apply_cancellation(&mut self, at: DateTime<Utc>) {
        self.apply_status(OrderStatus::Cancelled, at);
    }

    /// Marks the order paid and confirmed.
    pub fn apply_payment(&mut self, at: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Paid;
        self.status = OrderStatus::Confirmed;
        self.updated_at = at;
    }

    pub fn attach_payment_intent(&mut self, intent_id: impl Into<String>, at: DateTime<Utc>) {
        self.payment_intent_id = Some(intent_id.into());
        self.updated_at = at;
    }

    /// Overwrites personal contact fields of both addresses.
    pub fn anonymize(&mut self, at: DateTime<Utc>) {
        self.shipping_address = self.shipping_address.anonymized();
        self.billing_address = self.billing_address.anonymized();
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            phone: "5550001111".to_string(),
            street: "1 Compiler Rd".to_string(),
            city: "Arlington".to_string(),
            state: "VA".to_string(),
            country: "US".to_string(),
            zip_code: "22201".to_string(),
        }
    }

    fn place(user_id: UserId, items: Vec<OrderItem>) -> Result<Order, OrderError> {
        Order::place(
            user_id,
            OrderNumber::generate("TEST", Utc::now()),
            address(),
            address(),
            "card".to_string(),
            items,
            &PricingPolicy::default(),
        )
    }

    #[test]
    fn test_place_order_computes_totals() {
        let order = place(
            UserId::new(),
            vec![OrderItem::new("SKU-A", 2, Money::from_cents(1000))],
        )
        .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.subtotal.cents(), 2000);
        assert_eq!(order.tax.cents(), 160);
        assert_eq!(order.shipping.cents(), 999);
        assert_eq!(order.total.cents(), 3159);
        assert_eq!(order.total_quantity(), 2);
        assert!(order.payment_intent_id.is_none());
    }

    #[test]
    fn test_place_order_without_items_fails() {
        assert_eq!(place(UserId::new(), vec![]), Err(OrderError::EmptyCart));
    }

    #[test]
    fn test_place_order_zero_quantity_fails() {
        let result = place(
            UserId::new(),
            vec![OrderItem::new("SKU-A", 0, Money::from_cents(1000))],
        );
        assert_eq!(result, Err(OrderError::InvalidQuantity { quantity: 0 }));
    }

    #[test]
    fn test_cancel_rules() {
        let owner = UserId::new();
        let mut order = place(
            owner,
            vec![OrderItem::new("SKU-A", 1, Money::from_cents(500))],
        )
        .unwrap();

        assert!(order.ensure_cancellable_by(&Principal::customer(owner)).is_ok());
        assert!(order.ensure_cancellable_by(&Principal::admin(UserId::new())).is_ok());
        assert_eq!(
            order.ensure_cancellable_by(&Principal::customer(UserId::new())),
            Err(OrderError::Forbidden)
        );

        order.apply_status(OrderStatus::Shipped, Utc::now());
        assert_eq!(
            order.ensure_cancellable_by(&Principal::customer(owner)),
            Err(OrderError::NotCancellable {
                status: OrderStatus::Shipped
            })
        );
    }

    #[test]
    fn test_payment_rules() {
        let mut order = place(
            UserId::new(),
            vec![OrderItem::new("SKU-A", 1, Money::from_cents(500))],
        )
        .unwrap();
        assert!(order.ensure_payable().is_ok());

        order.apply_payment(Utc::now());
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.ensure_payable(), Err(OrderError::AlreadyPaid));

        let mut cancelled = place(
            UserId::new(),
            vec![OrderItem::new("SKU-A", 1, Money::from_cents(500))],
        )
        .unwrap();
        cancelled.apply_cancellation(Utc::now());
        assert_eq!(cancelled.ensure_payable(), Err(OrderError::OrderCancelled));
    }

    #[test]
    fn test_status_change_policy() {
        let order = place(
            UserId::new(),
            vec![OrderItem::new("SKU-A", 1, Money::from_cents(500))],
        )
        .unwrap();

        assert!(order.check_status_change(OrderStatus::Delivered, false).is_ok());
        assert_eq!(
            order.check_status_change(OrderStatus::Delivered, true),
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered
            })
        );
        assert!(order.check_status_change(OrderStatus::Confirmed, true).is_ok());
    }

    #[test]
    fn test_cancelled_order_is_final_in_both_policies() {
        let mut order = place(
            UserId::new(),
            vec![OrderItem::new("SKU-A", 1, Money::from_cents(500))],
        )
        .unwrap();
        order.apply_cancellation(Utc::now());

        for strict in [false, true] {
            for next in [OrderStatus::Pending, OrderStatus::Shipped, OrderStatus::Cancelled] {
                assert_eq!(
                    order.check_status_change(next, strict),
                    Err(OrderError::InvalidTransition {
                        from: OrderStatus::Cancelled,
                        to: next
                    })
                );
            }
        }
    }

    #[test]
    fn test_anonymize_keeps_money_and_lines() {
        let mut order = place(
            UserId::new(),
            vec![OrderItem::new("SKU-A", 3, Money::from_cents(700))],
        )
        .unwrap();
        let totals = order.totals();

        order.anonymize(Utc::now());

        assert_eq!(order.shipping_address.email, "deleted@deleted.com");
        assert_eq!(order.billing_address.first_name, "Deleted");
        assert_eq!(order.totals(), totals);
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn test_serialization() {
        let order = place(
            UserId::new(),
            vec![OrderItem::new("SKU-A", 1, Money::from_cents(500))],
        )
        .unwrap();

        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
