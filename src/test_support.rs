//! Builders shared by unit tests.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::data::{DataClient, MemoryDataService};
use crate::domain::aggregates::{PartnerStatus, Product, ProductVariant, Profile, Registration};
use crate::domain::value_objects::{Money, Sku};

pub fn product(name: &str) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(), name: name.into(), description: format!("{name} description"),
        sku: Sku::new(name.to_uppercase()), price: Money::from_cents(5000),
        wholesale_price: Money::from_cents(3000), image_url: None, image_urls: None,
        is_available: true, category: None, created_at: now, updated_at: now,
    }
}

pub fn variant(product: &Product, name: &str, wholesale_cents: u64, rrp_cents: u64) -> ProductVariant {
    let now = Utc::now();
    ProductVariant {
        id: Uuid::new_v4(), product_id: product.id, name: name.into(),
        sku: Sku::new(format!("{}-{}", product.sku, name.to_uppercase())),
        wholesale_price: Money::from_cents(wholesale_cents), rrp_price: Money::from_cents(rrp_cents),
        is_available: true, sort_order: 0, created_at: now, updated_at: now,
    }
}

pub fn partner(status: PartnerStatus) -> Profile {
    let now = Utc::now();
    Profile {
        id: Uuid::new_v4(), email: "buyer@scootshop.example".into(), company_name: "Scoot Shop".into(),
        contact_name: "Sam Lee".into(), phone: "555-0100".into(), address: "1 Main St".into(),
        city: "Portland".into(), state: "OR".into(), zip: "97201".into(), country: "US".into(),
        tax_id: None, status, is_admin: false, created_at: now, updated_at: now,
    }
}

pub fn registration() -> Registration {
    Registration {
        email: "buyer@scootshop.example".into(), password: "secret1".into(),
        confirm_password: "secret1".into(), company_name: "Scoot Shop".into(),
        contact_name: "Sam Lee".into(), phone: "555-0100".into(), address: "1 Main St".into(),
        city: "Portland".into(), state: "OR".into(), zip: "97201".into(),
        country: "US".into(), tax_id: Some(String::new()),
    }
}

pub fn memory_client() -> (Arc<MemoryDataService>, DataClient) {
    let db = Arc::new(MemoryDataService::new());
    (db.clone(), DataClient::new(db))
}
