//! Shopping cart
//!
//! Local-only: nothing here talks to the server. Items are keyed by product
//! id and keep insertion order. The cart is persisted as a JSON array under
//! `CART_KEY` in the same store as the credentials, and is left alone on
//! logout.

use marketplace_auth::KeyValueStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Product;

/// Storage key for the persisted cart.
pub const CART_KEY: &str = "cart";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn subtotal(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of `product`, merging with an existing line. Quantities
    /// saturate at `u32::MAX`.
    pub fn add(&mut self, product: Product) {
        match self.items.iter_mut().find(|i| i.product.id == product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.items.push(CartItem {
                product,
                quantity: 1,
            }),
        }
    }

    pub fn remove(&mut self, product_id: &str) {
        self.items.retain(|i| i.product.id != product_id);
    }

    /// Set a line's quantity. Zero removes the line; unknown ids are ignored.
    pub fn update_quantity(&mut self, product_id: &str, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.product.id == product_id) {
            item.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of price times quantity over all lines.
    pub fn total(&self) -> f64 {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Number of units across all lines.
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Read the persisted cart. A missing key is an empty cart.
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let Some(raw) = store.get(CART_KEY).await? else {
            return Ok(Self::default());
        };
        let items: Vec<CartItem> = serde_json::from_str(&raw)
            .map_err(|e| Error::Decode(format!("stored cart: {e}")))?;
        debug!(lines = items.len(), "loaded cart");
        Ok(Self { items })
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(&self.items)
            .map_err(|e| Error::Storage(format!("encode cart: {e}")))?;
        store.set(CART_KEY, raw).await?;
        debug!(lines = self.items.len(), "saved cart");
        Ok(())
    }
}
