//! Product catalog maintenance.

use common::{Principal, ProductId};
use domain::{OrderError, Product};
use storage::CheckoutStore;

use crate::error::{CheckoutError, Result};

/// Admin-side product upserts and lookups.
#[derive(Clone)]
pub struct CatalogService<S: CheckoutStore> {
    store: S,
}

impl<S: CheckoutStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found(format!("product {product_id}")))
    }

    /// Creates or replaces a product (admin only).
    #[tracing::instrument(skip(self, principal, product), fields(product_id = %product.id))]
    pub async fn upsert_product(&self, principal: &Principal, product: Product) -> Result<Product> {
        if !principal.is_admin {
            return Err(OrderError::Forbidden.into());
        }

        if product.name.trim().is_empty() {
            return Err(OrderError::MissingField {
                field: "name".to_string(),
            }
            .into());
        }

        if product.price.is_negative() {
            return Err(OrderError::InvalidField {
                field: "priceCents".to_string(),
                reason: "must not be negative".to_string(),
            }
            .into());
        }

        let saved = self.store.upsert_product(product).await?;
        tracing::info!(stock = saved.stock_quantity, price = %saved.price, "product saved");
        Ok(saved)
    }
}
