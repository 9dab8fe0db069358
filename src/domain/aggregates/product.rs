//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};
use crate::domain::value_objects::{Money, Sku};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sku: Sku,
    pub price: Money,
    pub wholesale_price: Money,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub sku: Sku,
    pub wholesale_price: Money,
    pub rrp_price: Money,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog entry: the product row plus its variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub min_wholesale: Money,
    pub max_wholesale: Money,
    pub min_rrp: Money,
    pub max_rrp: Money,
}

/// Min/max wholesale and retail prices across `variants`, `None` when empty.
pub fn price_range(variants: &[ProductVariant]) -> Option<PriceRange> {
    let first = variants.first()?;
    let seed = PriceRange {
        min_wholesale: first.wholesale_price, max_wholesale: first.wholesale_price,
        min_rrp: first.rrp_price, max_rrp: first.rrp_price,
    };
    Some(variants.iter().skip(1).fold(seed, |r, v| PriceRange {
        min_wholesale: r.min_wholesale.min(v.wholesale_price),
        max_wholesale: r.max_wholesale.max(v.wholesale_price),
        min_rrp: r.min_rrp.min(v.rrp_price),
        max_rrp: r.max_rrp.max(v.rrp_price),
    }))
}

/// Image URLs for a product: the (possibly comma-joined) `image_url` field
/// followed by the `image_urls` list. Order kept, duplicates kept.
pub fn product_images(product: &Product) -> Vec<String> {
    let mut images = Vec::new();
    if let Some(url) = product.image_url.as_deref().filter(|u| !u.is_empty()) {
        if url.contains(',') {
            images.extend(url.split(',').map(|u| u.trim().to_string()));
        } else {
            images.push(url.to_string());
        }
    }
    if let Some(urls) = &product.image_urls {
        images.extend(urls.iter().cloned());
    }
    images
}

/// Admin form for creating or editing a product together with its variants.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ProductDraft {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, message = "Product SKU is required"))]
    pub sku: String,
    pub price: Money,
    pub wholesale_price: Money,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default = "available")]
    pub is_available: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[validate(length(min = 1, message = "Products must have at least one variant"))]
    pub variants: Vec<VariantDraft>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct VariantDraft {
    #[validate(length(min = 1, message = "All variants must have a name and SKU"))]
    pub name: String,
    #[validate(length(min = 1, message = "All variants must have a name and SKU"))]
    pub sku: String,
    pub wholesale_price: Money,
    pub rrp_price: Money,
    #[serde(default = "available")]
    pub is_available: bool,
}

fn available() -> bool { true }

/// Row written to `products` on insert or update.
#[derive(Clone, Debug, Serialize)]
pub struct ProductRow<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub sku: &'a str,
    pub price: Money,
    pub wholesale_price: Money,
    pub image_url: Option<&'a str>,
    pub image_urls: Option<&'a [String]>,
    pub is_available: bool,
    pub category: Option<&'a str>,
}

/// Row written to `product_variants`.
#[derive(Clone, Debug, Serialize)]
pub struct VariantRow<'a> {
    pub product_id: Uuid,
    pub name: &'a str,
    pub sku: &'a str,
    pub wholesale_price: Money,
    pub rrp_price: Money,
    pub is_available: bool,
    pub sort_order: i32,
}

impl ProductDraft {
    /// Validates the product fields and then every variant.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        self.variants.iter().try_for_each(Validate::validate)
    }

    pub fn product_row(&self) -> ProductRow<'_> {
        ProductRow {
            name: self.name.trim(), description: &self.description, sku: self.sku.trim(),
            price: self.price, wholesale_price: self.wholesale_price,
            image_url: self.image_url.as_deref(), image_urls: self.image_urls.as_deref(),
            is_available: self.is_available, category: self.category.as_deref(),
        }
    }

    /// Variant rows in form order; `sort_order` is the position in the form.
    pub fn variant_rows(&self, product_id: Uuid) -> Vec<VariantRow<'_>> {
        self.variants.iter().zip(0..).map(|(v, idx)| VariantRow {
            product_id, name: v.name.trim(), sku: v.sku.trim(),
            wholesale_price: v.wholesale_price, rrp_price: v.rrp_price,
            is_available: v.is_available, sort_order: idx,
        }).collect()
    }
}
