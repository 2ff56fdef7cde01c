//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderError;

/// Money amount represented in cents to avoid floating point issues.
///
/// The currency is fixed by configuration; amounts never carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * i64::from(quantity),
        }
    }

    /// Applies a rate expressed in basis points (1/100 of a percent),
    /// rounding half away from zero to the nearest cent.
    ///
    /// `Money::from_cents(1999).apply_basis_points(800)` is 159.92 cents,
    /// which rounds to 160.
    pub fn apply_basis_points(&self, basis_points: u32) -> Money {
        let scaled = i128::from(self.cents) * i128::from(basis_points);
        let half = 5_000i128;
        let rounded = if scaled >= 0 {
            (scaled + half) / 10_000
        } else {
            (scaled - half) / 10_000
        };
        Money {
            cents: rounded as i64,
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// A postal address with contact details.
///
/// Embedded twice per order (shipping and billing). Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(alias = "address")]
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(alias = "zip")]
    pub zip_code: String,
}

impl Address {
    pub const ANONYMIZED_FIRST_NAME: &'static str = "Deleted";
    pub const ANONYMIZED_LAST_NAME: &'static str = "User";
    pub const ANONYMIZED_EMAIL: &'static str = "deleted@deleted.com";
    pub const ANONYMIZED_PHONE: &'static str = "0000000000";

    /// Checks that every field is present and not blank.
    ///
    /// `role` prefixes the reported field name, e.g. `shippingAddress.city`.
    pub fn validate(&self, role: &'static str) -> Result<(), OrderError> {
        let fields: [(&'static str, &str); 9] = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
            ("zipCode", &self.zip_code),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(OrderError::MissingField {
                    field: format!("{role}.{name}"),
                });
            }
        }

        if !self.email.contains('@') {
            return Err(OrderError::InvalidField {
                field: format!("{role}.email"),
                reason: "must be an email address".to_string(),
            });
        }

        Ok(())
    }

    /// Returns a copy with personal contact fields overwritten.
    ///
    /// Street, city, state, country and zip code are retained.
    pub fn anonymized(&self) -> Address {
        Address {
            first_name: Self::ANONYMIZED_FIRST_NAME.to_string(),
            last_name: Self::ANONYMIZED_LAST_NAME.to_string(),
            email: Self::ANONYMIZED_EMAIL.to_string(),
            phone: Self::ANONYMIZED_PHONE.to_string(),
            ..self.clone()
        }
    }
}

/// Human-facing order number: `PREFIX-YYYYMMDD-XXXXXXXX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    const SUFFIX_LEN: usize = 8;

    /// Generates a new order number for the given date.
    ///
    /// The suffix is the first eight hex digits of a random UUID, upper-cased.
    pub fn generate(prefix: &str, at: DateTime<Utc>) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        let suffix = token[..Self::SUFFIX_LEN].to_ascii_uppercase();
        Self(format!("{prefix}-{}-{suffix}", at.format("%Y%m%d")))
    }

    /// Wraps a stored order number without validation.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the value matches `PREFIX-YYYYMMDD-XXXXXXXX`.
    pub fn is_well_formed(&self) -> bool {
        let mut parts = self.0.rsplitn(3, '-');
        let (Some(suffix), Some(date), Some(prefix)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        !prefix.is_empty()
            && date.len() == 8
            && date.bytes().all(|b| b.is_ascii_digit())
            && suffix.len() == Self::SUFFIX_LEN
            && suffix.bytes().all(|b| b.is_ascii_alphanumeric())
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit captured when the product was added to the cart.
    pub unit_price: Money,

    /// `quantity * unit_price`, computed once at creation.
    pub line_total: Money,
}

impl OrderItem {
    /// Creates a new order item, computing its line total.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
            line_total: unit_price.multiply(quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn address() -> Address {
        Address {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "5551234567".to_string(),
            street: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "Greater London".to_string(),
            country: "GB".to_string(),
            zip_code: "N1 9GU".to_string(),
        }
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [100, 250, 5].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 355);
    }

    #[test]
    fn test_basis_points_rounds_half_up() {
        assert_eq!(Money::from_cents(2000).apply_basis_points(800).cents(), 160);
        assert_eq!(Money::from_cents(1999).apply_basis_points(800).cents(), 160);
        // 0.0625 * 8 = 0.5 cent, rounds up
        assert_eq!(Money::from_cents(625).apply_basis_points(8).cents(), 1);
        assert_eq!(Money::from_cents(624).apply_basis_points(8).cents(), 0);
        assert_eq!(Money::zero().apply_basis_points(800).cents(), 0);
    }

    #[test]
    fn test_money_serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_cents(3159)).unwrap();
        assert_eq!(json, "3159");
    }

    #[test]
    fn test_order_item_line_total() {
        let item = OrderItem::new("SKU-001", 3, Money::from_cents(1000));
        assert_eq!(item.line_total.cents(), 3000);
    }

    #[test]
    fn test_address_validation_accepts_complete_address() {
        assert!(address().validate("shippingAddress").is_ok());
    }

    #[test]
    fn test_address_validation_names_blank_field() {
        let mut addr = address();
        addr.city = "   ".to_string();

        let err = addr.validate("billingAddress").unwrap_err();
        assert!(matches!(
            err,
            OrderError::MissingField { ref field } if field == "billingAddress.city"
        ));
    }

    #[test]
    fn test_address_validation_rejects_bad_email() {
        let mut addr = address();
        addr.email = "nope".to_string();
        assert!(matches!(
            addr.validate("shippingAddress"),
            Err(OrderError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_address_accepts_original_field_names() {
        let json = serde_json::json!({
            "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com",
            "phone": "1", "address": "12 Analytical Way", "city": "London",
            "state": "LDN", "country": "GB", "zipCode": "N1"
        });
        let addr: Address = serde_json::from_value(json).unwrap();
        assert_eq!(addr.street, "12 Analytical Way");
    }

    #[test]
    fn test_address_anonymized_keeps_location() {
        let anon = address().anonymized();
        assert_eq!(anon.first_name, "Deleted");
        assert_eq!(anon.last_name, "User");
        assert_eq!(anon.email, "deleted@deleted.com");
        assert_eq!(anon.phone, "0000000000");
        assert_eq!(anon.city, "London");
        assert_eq!(anon.zip_code, "N1 9GU");
    }

    #[test]
    fn test_order_number_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        let number = OrderNumber::generate("BIZOE", at);

        assert!(number.as_str().starts_with("BIZOE-20260307-"));
        assert_eq!(number.as_str().len(), "BIZOE-20260307-".len() + 8);
        assert!(number.is_well_formed());
    }

    #[test]
    fn test_order_numbers_differ() {
        let at = Utc::now();
        assert_ne!(
            OrderNumber::generate("ORD", at),
            OrderNumber::generate("ORD", at)
        );
    }

    #[test]
    fn test_order_number_well_formed_checks() {
        assert!(OrderNumber::from_stored("MY-SHOP-20260101-ABCDEF12").is_well_formed());
        assert!(!OrderNumber::from_stored("BIZOE-2026011-ABCDEF12").is_well_formed());
        assert!(!OrderNumber::from_stored("BIZOE-20260101-ABC").is_well_formed());
        assert!(!OrderNumber::from_stored("20260101-ABCDEF12").is_well_formed());
    }
}
