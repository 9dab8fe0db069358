//! Admin product management.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::data::{DataClient, Filter, Select, Table};
use crate::domain::aggregates::{Product, ProductDraft, ProductVariant, ProductWithVariants};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::publisher::EventPublisher;
use crate::{Result, StorefrontError};

#[derive(Serialize)]
struct AvailabilityPatch {
    is_available: bool,
}

/// Every product (available or not) with all of its variants. The cached
/// list is changed only after the backend call succeeded.
pub struct ProductBoard {
    data: DataClient,
    events: EventPublisher,
    products: Vec<ProductWithVariants>,
}

impl ProductBoard {
    pub fn new(data: DataClient, events: EventPublisher) -> Self { Self { data, events, products: Vec::new() } }

    pub fn products(&self) -> &[ProductWithVariants] { &self.products }

    pub async fn refresh(&mut self) -> Result<&[ProductWithVariants]> {
        let products: Vec<Product> = self.data.select(&Select::from(Table::Products).order_by("name")).await?;
        let mut entries = Vec::with_capacity(products.len());
        for product in products {
            let variants = self.variants(product.id).await?;
            entries.push(ProductWithVariants { product, variants });
        }
        self.products = entries;
        Ok(&self.products)
    }

    async fn variants(&self, product_id: Uuid) -> Result<Vec<ProductVariant>> {
        Ok(self.data.select(&Select::from(Table::ProductVariants).eq("product_id", product_id).order_by("sort_order")).await?)
    }

    pub async fn toggle_availability(&mut self, product_id: Uuid) -> Result<bool> {
        let entry = self.products.iter_mut().find(|p| p.product.id == product_id).ok_or(StorefrontError::NotFound("product"))?;
        let is_available = !entry.product.is_available;
        self.data.update(Table::Products, &[Filter::eq("id", product_id)], &AvailabilityPatch { is_available }).await?;
        entry.product.is_available = is_available;
        self.events.publish(DomainEvent::Product(ProductEvent::AvailabilityChanged { product_id, is_available })).await;
        Ok(is_available)
    }

    /// Deletes a product; its variants go with it.
    pub async fn delete(&mut self, product_id: Uuid) -> Result<()> {
        let removed = self.data.delete(Table::Products, &[Filter::eq("id", product_id)]).await?;
        if removed == 0 { return Err(StorefrontError::NotFound("product")); }
        self.products.retain(|p| p.product.id != product_id);
        info!(%product_id, "product deleted");
        self.events.publish(DomainEvent::Product(ProductEvent::Deleted { product_id })).await;
        Ok(())
    }

    /// Creates a product (`existing == None`) or edits one. Editing replaces
    /// the whole variant list with the draft's.
    pub async fn save(&mut self, existing: Option<Uuid>, draft: &ProductDraft) -> Result<ProductWithVariants> {
        draft.check()?;
        let product_id = match existing {
            Some(id) => {
                let updated = self.data.update(Table::Products, &[Filter::eq("id", id)], &draft.product_row()).await?;
                if updated == 0 { return Err(StorefrontError::NotFound("product")); }
                self.data.delete(Table::ProductVariants, &[Filter::eq("product_id", id)]).await?;
                id
            }
            None => self.data.insert_one::<_, Product>(Table::Products, &draft.product_row()).await?.id,
        };
        let _: Vec<ProductVariant> = self.data.insert_all(Table::ProductVariants, &draft.variant_rows(product_id)).await?;

        let product: Product = self.data.select_one(&Select::from(Table::Products).eq("id", product_id)).await?.ok_or(StorefrontError::NotFound("product"))?;
        let saved = ProductWithVariants { variants: self.variants(product_id).await?, product };
        match self.products.iter_mut().find(|p| p.product.id == product_id) {
            Some(slot) => *slot = saved.clone(),
            None => self.products.push(saved.clone()),
        }
        info!(%product_id, variants = saved.variants.len(), "product saved");
        self.events.publish(DomainEvent::Product(ProductEvent::Saved { product_id, variant_count: saved.variants.len() })).await;
        Ok(saved)
    }
}
