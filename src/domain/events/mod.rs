//! Domain events
use crate::domain::aggregates::{OrderStatus, PartnerStatus};
use crate::domain::value_objects::Money;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Partner(PartnerEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Saved { product_id: Uuid, variant_count: usize },
    AvailabilityChanged { product_id: Uuid, is_available: bool },
    Deleted { product_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Submitted { order_id: Uuid, order_number: String, user_id: Uuid, total: Money, item_count: usize },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartnerEvent {
    Registered { user_id: Uuid },
    Reviewed { user_id: Uuid, status: PartnerStatus },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::Saved { .. }) => "wholesale.product.saved",
            Self::Product(ProductEvent::AvailabilityChanged { .. }) => "wholesale.product.availability_changed",
            Self::Product(ProductEvent::Deleted { .. }) => "wholesale.product.deleted",
            Self::Order(OrderEvent::Submitted { .. }) => "wholesale.order.submitted",
            Self::Order(OrderEvent::StatusChanged { .. }) => "wholesale.order.status_changed",
            Self::Partner(PartnerEvent::Registered { .. }) => "wholesale.partner.registered",
            Self::Partner(PartnerEvent::Reviewed { .. }) => "wholesale.partner.reviewed",
        }
    }
}
