//! Account closure.

use common::Principal;
use storage::CheckoutStore;

use crate::error::Result;

#[derive(Clone)]
pub struct AccountService<S: CheckoutStore> {
    store: S,
}

impl<S: CheckoutStore> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Deletes the principal's cart and anonymizes their order addresses.
    ///
    /// Refused while any order is still pending, confirmed or processing.
    /// Returns the number of anonymized orders.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn close_account(&self, principal: &Principal) -> Result<u64> {
        let anonymized = self.store.close_account(principal.user_id).await?;
        metrics::counter!("accounts_closed_total").increment(1);
        tracing::info!(anonymized, "account closed");
        Ok(anonymized)
    }
}
