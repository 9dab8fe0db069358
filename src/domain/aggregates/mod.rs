//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod profile;

pub use product::{price_range, product_images, PriceRange, Product, ProductDraft, ProductVariant, ProductWithVariants, VariantDraft};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
pub use cart::{Cart, CartError, CartItem};
pub use profile::{PartnerStatus, Profile, Registration};
