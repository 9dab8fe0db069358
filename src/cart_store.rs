//! Cart store: the session's cart plus its persisted copy.
//!
//! Every mutation rewrites the whole item list under [`CART_STORAGE_KEY`].
//! Reading it back never fails: undecodable entries are dropped one by one
//! and an unreadable blob yields an empty cart.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartError, CartItem, Product, ProductVariant};
use crate::domain::value_objects::Money;
use crate::storage::CartStorage;

pub const CART_STORAGE_KEY: &str = "wholesaleCart";

pub struct CartStore {
    cart: Cart,
    storage: Arc<dyn CartStorage>,
}

impl CartStore {
    /// Opens the store, rehydrating whatever was persisted for this session.
    pub fn open(storage: Arc<dyn CartStorage>) -> Self {
        let cart = match storage.get_item(CART_STORAGE_KEY) {
            Ok(Some(saved)) => restore(&saved),
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(error = %e, "could not read saved cart, starting empty");
                Cart::new()
            }
        };
        Self { cart, storage }
    }

    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn items(&self) -> &[CartItem] { self.cart.items() }
    pub fn is_empty(&self) -> bool { self.cart.is_empty() }

    pub fn add_to_cart(&mut self, product: Product, variant: ProductVariant, quantity: u32) -> Result<(), CartError> {
        let variant_id = variant.id;
        self.cart.add_item(product, variant, quantity)?;
        debug!(%variant_id, quantity, "added to cart");
        self.persist();
        Ok(())
    }

    /// Absolute quantity; values of zero or below remove the item.
    pub fn update_quantity(&mut self, variant_id: Uuid, quantity: i64) {
        if self.cart.update_quantity(variant_id, quantity) { self.persist(); }
    }

    pub fn remove_from_cart(&mut self, variant_id: Uuid) {
        if self.cart.remove_item(variant_id) { self.persist(); }
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
        self.persist();
    }

    pub fn total_amount(&self) -> Money { self.cart.total_amount() }
    pub fn total_items(&self) -> u64 { self.cart.total_items() }

    /// A failed write keeps the in-memory cart; the next mutation retries.
    fn persist(&self) {
        let saved = match serde_json::to_string(self.cart.items()) {
            Ok(saved) => saved,
            Err(e) => { warn!(error = %e, "could not serialize cart"); return; }
        };
        if let Err(e) = self.storage.set_item(CART_STORAGE_KEY, &saved) {
            warn!(error = %e, "could not persist cart");
        }
    }
}

fn restore(saved: &str) -> Cart {
    let entries: Vec<Value> = match serde_json::from_str(saved) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "saved cart is malformed, starting empty");
            return Cart::new();
        }
    };
    let items = entries.into_iter().filter_map(|entry| match serde_json::from_value::<CartItem>(entry) {
        Ok(item) => Some(item),
        Err(e) => { debug!(error = %e, "dropping unreadable cart entry"); None }
    });
    Cart::from_items(items)
}
