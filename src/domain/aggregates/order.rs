//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use crate::domain::aggregates::cart::CartItem;
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Submitted,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// submitted -> processing -> completed, and either open state -> cancelled.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!((self, next), (Submitted, Processing) | (Processing, Completed) | (Submitted | Processing, Cancelled))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    #[serde(default)]
    pub status: OrderStatus,
    pub total_amount: Money,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Frozen line of a submitted order. Name and SKU are copied strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewOrder<'a> {
    pub user_id: Uuid,
    pub order_number: &'a str,
    pub total_amount: Money,
    pub notes: Option<&'a str>,
}

impl<'a> NewOrder<'a> {
    /// Empty notes are stored as null; anything else is kept verbatim.
    pub fn new(user_id: Uuid, order_number: &'a str, total_amount: Money, notes: &'a str) -> Self {
        let notes = Some(notes).filter(|n| !n.is_empty());
        Self { user_id, order_number, total_amount, notes }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewOrderItem {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl NewOrderItem {
    /// Snapshot of a cart line; the subtotal is fixed here and never recomputed.
    pub fn snapshot(order_id: Uuid, item: &CartItem) -> Self {
        Self {
            order_id,
            product_id: item.product.id,
            product_name: format!("{} - {}", item.product.name, item.variant.name),
            product_sku: item.variant.sku.to_string(),
            quantity: item.quantity,
            unit_price: item.unit_price(),
            subtotal: item.line_total(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusPatch {
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product, variant};

    #[test]
    fn test_status_workflow() {
        use OrderStatus::*;
        assert!(Submitted.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Submitted.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Submitted.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Processing));
    }

    #[test]
    fn test_item_snapshot() {
        let p = product("Widget");
        let red = variant(&p, "Red", 1000, 1500);
        let item = CartItem { product: p, variant: red, quantity: 4 };
        let line = NewOrderItem::snapshot(Uuid::nil(), &item);
        assert_eq!(line.product_name, "Widget - Red");
        assert_eq!(line.product_sku, item.variant.sku.as_str());
        assert_eq!(line.unit_price, Money::from_cents(1000));
        assert_eq!(line.subtotal, Money::from_cents(4000));
    }

    #[test]
    fn test_empty_notes_are_null() {
        assert_eq!(NewOrder::new(Uuid::nil(), "WO-1", Money::ZERO, "").notes, None);
        assert_eq!(NewOrder::new(Uuid::nil(), "WO-1", Money::ZERO, "  ").notes, Some("  "));
        assert_eq!(NewOrder::new(Uuid::nil(), "WO-1", Money::ZERO, " gate code 41 ").notes, Some(" gate code 41 "));
        assert_eq!(NewOrder::new(Uuid::nil(), "WO-1", Money::ZERO, "Ship Friday").notes, Some("Ship Friday"));
    }
}
