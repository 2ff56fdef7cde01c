//! Shopping cart operations.

use common::{Principal, ProductId};
use domain::{CartSnapshot, OrderError, Product};
use storage::CheckoutStore;

use crate::error::{CheckoutError, Result};

/// Manages the principal's cart.
///
/// Every change that adds units checks the live catalog first, and prices
/// are captured when a product is first added.
#[derive(Clone)]
pub struct CartService<S: CheckoutStore> {
    store: S,
}

impl<S: CheckoutStore> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the principal's cart, if one exists.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn get_cart(&self, principal: &Principal) -> Result<Option<CartSnapshot>> {
        Ok(self.store.cart_snapshot(principal.user_id).await?)
    }

    /// Adds `quantity` units of a product, merging with an existing line.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn add_item(
        &self,
        principal: &Principal,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity }.into());
        }

        let product = self.product(product_id).await?;
        let in_cart = self
            .store
            .cart_snapshot(principal.user_id)
            .await?
            .map_or(0, |cart| cart.quantity_of(product_id));

        ensure_stock(&product, in_cart.saturating_add(quantity))?;

        let cart = self
            .store
            .add_cart_item(principal.user_id, product_id, quantity, product.price)
            .await?;
        tracing::debug!(items = cart.cached_items, total = %cart.cached_total, "cart item added");
        Ok(cart)
    }

    /// Sets the quantity of an existing line. Zero removes the line.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn update_item(
        &self,
        principal: &Principal,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot> {
        if quantity > 0 {
            let product = self.product(product_id).await?;
            ensure_stock(&product, quantity)?;
        }

        Ok(self
            .store
            .set_cart_item_quantity(principal.user_id, product_id, quantity)
            .await?)
    }

    /// Removes a line from the cart.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn remove_item(&self, principal: &Principal, product_id: &ProductId) -> Result<CartSnapshot> {
        Ok(self
            .store
            .set_cart_item_quantity(principal.user_id, product_id, 0)
            .await?)
    }

    /// Empties the principal's cart.
    #[tracing::instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn clear(&self, principal: &Principal) -> Result<()> {
        let cart = self
            .store
            .cart_snapshot(principal.user_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("cart"))?;

        self.store.clear_cart(cart.cart_id).await?;
        Ok(())
    }

    async fn product(&self, product_id: &ProductId) -> Result<Product> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found(format!("product {product_id}")))
    }
}

fn ensure_stock(product: &Product, quantity: u32) -> Result<()> {
    if product.can_fulfil(quantity) {
        return Ok(());
    }

    Err(OrderError::InsufficientStock {
        product_id: product.id.to_string(),
        product_name: product.name.clone(),
    }
    .into())
}
