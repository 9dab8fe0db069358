//! Partner-facing catalog and staged variant selections.

use std::collections::HashMap;

use futures::future::try_join_all;
use tracing::debug;
use uuid::Uuid;

use crate::cart_store::CartStore;
use crate::data::{DataClient, Select, Table};
use crate::domain::aggregates::{Product, ProductVariant, ProductWithVariants};
use crate::domain::value_objects::Quantity;
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct Catalog {
    data: DataClient,
}

impl Catalog {
    pub fn new(data: DataClient) -> Self { Self { data } }

    /// Available products by name, each with its available variants in sort
    /// order. Products left with no variants are not listed.
    pub async fn available_products(&self) -> Result<Vec<ProductWithVariants>> {
        let products: Vec<Product> = self.data.select(&Select::from(Table::Products).eq("is_available", true).order_by("name")).await?;
        let entries = try_join_all(products.into_iter().map(|product| async move {
            let variants = self.listed_variants(product.id).await?;
            Ok::<_, StorefrontError>(ProductWithVariants { product, variants })
        })).await?;
        let listed: Vec<_> = entries.into_iter().filter(|p| !p.variants.is_empty()).collect();
        debug!(count = listed.len(), "catalog loaded");
        Ok(listed)
    }

    async fn listed_variants(&self, product_id: Uuid) -> Result<Vec<ProductVariant>> {
        let query = Select::from(Table::ProductVariants).eq("product_id", product_id).eq("is_available", true).order_by("sort_order");
        Ok(self.data.select(&query).await?)
    }

    /// One catalog entry, as `available_products` would list it.
    pub async fn product(&self, product_id: Uuid) -> Result<ProductWithVariants> {
        let product: Product = self.data.select_one(&Select::from(Table::Products).eq("id", product_id)).await?
            .ok_or(StorefrontError::NotFound("product"))?;
        let variants = if product.is_available { self.listed_variants(product_id).await? } else { Vec::new() };
        if variants.is_empty() { return Err(StorefrontError::Unavailable(product.name)); }
        Ok(ProductWithVariants { product, variants })
    }

    /// Product and variant snapshot for adding a variant to a cart.
    pub async fn variant(&self, variant_id: Uuid) -> Result<(Product, ProductVariant)> {
        let variant: ProductVariant = self.data.select_one(&Select::from(Table::ProductVariants).eq("id", variant_id)).await?
            .ok_or(StorefrontError::NotFound("variant"))?;
        let product: Product = self.data.select_one(&Select::from(Table::Products).eq("id", variant.product_id)).await?
            .ok_or(StorefrontError::NotFound("product"))?;
        if !product.is_available || !variant.is_available {
            return Err(StorefrontError::Unavailable(product.name));
        }
        Ok((product, variant))
    }
}

/// Quantities a partner has staged per variant before adding them to the cart.
#[derive(Clone, Debug, Default)]
pub struct VariantSelection {
    quantities: HashMap<Uuid, Quantity>,
}

impl VariantSelection {
    pub fn new() -> Self { Self::default() }

    pub fn quantity(&self, variant_id: Uuid) -> u32 { self.quantities.get(&variant_id).map_or(0, Quantity::value) }

    /// Moves the staged quantity by `delta`, never below zero.
    pub fn adjust(&mut self, variant_id: Uuid, delta: i64) -> u32 {
        let next = self.quantities.get(&variant_id).copied().unwrap_or_default().adjust(delta);
        self.quantities.insert(variant_id, next);
        next.value()
    }

    pub fn total_for(&self, product: &ProductWithVariants) -> u64 {
        product.variants.iter().map(|v| u64::from(self.quantity(v.id))).sum()
    }

    /// Adds every positive selection for `product` to the cart, then resets
    /// that product's selections. Returns the number of lines added.
    pub fn commit(&mut self, product: &ProductWithVariants, cart: &mut CartStore) -> usize {
        let mut added = 0;
        for variant in &product.variants {
            let quantity = self.quantity(variant.id);
            if quantity > 0 && cart.add_to_cart(product.product.clone(), variant.clone(), quantity).is_ok() {
                added += 1;
            }
            self.quantities.insert(variant.id, Quantity::default());
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use serde_json::json;
    use crate::storage::MemoryStorage;
    use crate::test_support::{memory_client, product, variant};

    #[tokio::test]
    async fn test_available_products() {
        let (db, data) = memory_client();
        let rows = data.insert_all::<_, Product>(Table::Products, &[
            json!({"name": "Zeta", "sku": "Z", "price": 10, "wholesale_price": 5}),
            json!({"name": "Alpha", "sku": "A", "price": 10, "wholesale_price": 5}),
            json!({"name": "Hidden", "sku": "H", "price": 10, "wholesale_price": 5, "is_available": false}),
            json!({"name": "Bare", "sku": "B", "price": 10, "wholesale_price": 5}),
        ]).await.unwrap();
        let (zeta, alpha, hidden) = (&rows[0], &rows[1], &rows[2]);
        data.insert_all::<_, ProductVariant>(Table::ProductVariants, &[
            json!({"product_id": zeta.id, "name": "Two", "sku": "Z2", "wholesale_price": 5, "rrp_price": 9, "sort_order": 2}),
            json!({"product_id": zeta.id, "name": "One", "sku": "Z1", "wholesale_price": 5, "rrp_price": 9, "sort_order": 1}),
            json!({"product_id": zeta.id, "name": "Off", "sku": "Z0", "wholesale_price": 5, "rrp_price": 9, "is_available": false}),
            json!({"product_id": alpha.id, "name": "Only", "sku": "A1", "wholesale_price": 5, "rrp_price": 9}),
            json!({"product_id": hidden.id, "name": "Only", "sku": "H1", "wholesale_price": 5, "rrp_price": 9}),
        ]).await.unwrap();
        assert_eq!(db.count(Table::ProductVariants).await, 5);

        let listed = Catalog::new(data).available_products().await.unwrap();
        assert_eq!(listed.iter().map(|p| p.product.name.as_str()).collect::<Vec<_>>(), vec!["Alpha", "Zeta"]);
        assert_eq!(listed[1].variants.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(), vec!["One", "Two"]);
    }

    #[tokio::test]
    async fn test_variant_lookup() {
        let (_db, data) = memory_client();
        let product: Product = data.insert_one(Table::Products, &json!({"name": "Widget", "sku": "W", "price": 10, "wholesale_price": 5})).await.unwrap();
        let red: ProductVariant = data.insert_one(Table::ProductVariants, &json!({"product_id": product.id, "name": "Red", "sku": "W-R", "wholesale_price": 5, "rrp_price": 9})).await.unwrap();
        let catalog = Catalog::new(data);

        let (p, v) = catalog.variant(red.id).await.unwrap();
        assert_eq!((p.id, v.id), (product.id, red.id));
        assert!(matches!(catalog.variant(Uuid::new_v4()).await, Err(StorefrontError::NotFound("variant"))));
    }

    #[tokio::test]
    async fn test_single_product_entry() {
        let (_db, data) = memory_client();
        let widget: Product = data.insert_one(Table::Products, &json!({"name": "Widget", "sku": "W", "price": 10, "wholesale_price": 5})).await.unwrap();
        let bare: Product = data.insert_one(Table::Products, &json!({"name": "Bare", "sku": "B", "price": 10, "wholesale_price": 5})).await.unwrap();
        let _: ProductVariant = data.insert_one(Table::ProductVariants, &json!({"product_id": widget.id, "name": "Red", "sku": "W-R", "wholesale_price": 5, "rrp_price": 9})).await.unwrap();
        let catalog = Catalog::new(data);

        assert_eq!(catalog.product(widget.id).await.unwrap().variants.len(), 1);
        assert!(matches!(catalog.product(bare.id).await, Err(StorefrontError::Unavailable(_))));
        assert!(matches!(catalog.product(Uuid::new_v4()).await, Err(StorefrontError::NotFound("product"))));
    }

    #[test]
    fn test_selection_commit() {
        let p = product("Widget");
        let entry = ProductWithVariants { variants: vec![variant(&p, "Red", 1000, 1500), variant(&p, "Blue", 1000, 1500)], product: p };
        let (red, blue) = (entry.variants[0].id, entry.variants[1].id);
        let mut selection = VariantSelection::new();
        assert_eq!(selection.adjust(red, -1), 0);
        assert_eq!(selection.adjust(red, 3), 3);
        assert_eq!(selection.total_for(&entry), 3);

        let mut cart = CartStore::open(Arc::new(MemoryStorage::new()));
        assert_eq!(selection.commit(&entry, &mut cart), 1);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(selection.quantity(red), 0);
        assert_eq!(selection.quantity(blue), 0);

        selection.adjust(red, 2);
        selection.commit(&entry, &mut cart);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_items(), 5);
    }
}
