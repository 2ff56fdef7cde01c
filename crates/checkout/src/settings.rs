//! Tunables shared by the checkout services.

use std::time::Duration;

use domain::PricingPolicy;

/// Checkout settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Tax and shipping rules.
    pub pricing: PricingPolicy,

    /// Prefix of generated order numbers.
    pub order_number_prefix: String,

    /// ISO currency code sent to the payment processor.
    pub currency: String,

    /// Upper bound on every payment processor call.
    pub payment_timeout: Duration,

    /// Enforce the forward lifecycle graph on admin status updates.
    pub strict_status_transitions: bool,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            order_number_prefix: "BIZOE".to_string(),
            currency: "usd".to_string(),
            payment_timeout: Duration::from_secs(10),
            strict_status_transitions: false,
        }
    }
}
