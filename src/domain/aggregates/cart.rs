//! Cart Aggregate

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::product::{Product, ProductVariant};
use crate::domain::value_objects::{Money, Quantity};

/// One selected variant. `product` and `variant` are snapshots taken when
/// the item was added; totals never re-read the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub variant: ProductVariant,
    pub quantity: u32,
}

impl CartItem {
    pub fn variant_id(&self) -> Uuid { self.variant.id }
    pub fn unit_price(&self) -> Money { self.variant.wholesale_price }
    pub fn line_total(&self) -> Money { self.variant.wholesale_price.multiply(self.quantity) }
}

/// Items in insertion order, at most one per variant id, every quantity >= 1.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    /// Rebuilds a cart from stored items, merging duplicate variants and
    /// dropping zero quantities.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items.into_iter().filter(|i| i.quantity > 0) {
            cart.merge(item);
        }
        cart
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn get(&self, variant_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.variant.id == variant_id) }

    pub fn add_item(&mut self, product: Product, variant: ProductVariant, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        self.merge(CartItem { product, variant, quantity });
        Ok(())
    }

    fn merge(&mut self, item: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.variant.id == item.variant.id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
    }

    /// Sets an absolute quantity. Zero or below removes the item; returns
    /// whether anything changed.
    pub fn update_quantity(&mut self, variant_id: Uuid, quantity: i64) -> bool {
        let quantity = Quantity::from_input(quantity);
        if quantity.is_zero() { return self.remove_item(variant_id); }
        match self.items.iter_mut().find(|i| i.variant.id == variant_id) {
            Some(item) if item.quantity != quantity.value() => { item.quantity = quantity.value(); true }
            _ => false,
        }
    }

    pub fn remove_item(&mut self, variant_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.variant.id != variant_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) { self.items.clear(); }

    pub fn total_amount(&self) -> Money { self.items.iter().map(CartItem::line_total).sum() }
    pub fn total_items(&self) -> u64 { self.items.iter().map(|i| u64::from(i.quantity)).sum() }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
}
