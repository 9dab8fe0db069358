//! Order history for partners and the admin order desk.

use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use crate::data::{DataClient, Filter, Select, Table};
use crate::domain::aggregates::order::StatusPatch;
use crate::domain::aggregates::{Order, OrderItem, OrderStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::publisher::EventPublisher;
use crate::{Result, StorefrontError};

/// A partner's past orders. Line items are fetched on first expansion and
/// kept for the rest of the session.
pub struct OrderHistory {
    data: DataClient,
    items: HashMap<Uuid, Vec<OrderItem>>,
}

impl OrderHistory {
    pub fn new(data: DataClient) -> Self { Self { data, items: HashMap::new() } }

    pub async fn orders(&self, user_id: Uuid) -> Result<Vec<Order>> {
        Ok(self.data.select(&Select::from(Table::Orders).eq("user_id", user_id).order_by_desc("created_at")).await?)
    }

    pub async fn items(&mut self, order_id: Uuid) -> Result<&[OrderItem]> {
        if !self.items.contains_key(&order_id) {
            let items: Vec<OrderItem> = self.data.select(&Select::from(Table::OrderItems).eq("order_id", order_id)).await?;
            self.items.insert(order_id, items);
        }
        Ok(self.items.get(&order_id).map(Vec::as_slice).unwrap_or_default())
    }
}

/// Admin view over every order.
#[derive(Clone)]
pub struct OrderDesk {
    data: DataClient,
    events: EventPublisher,
}

impl OrderDesk {
    pub fn new(data: DataClient, events: EventPublisher) -> Self { Self { data, events } }

    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.data.select(&Select::from(Table::Orders).order_by_desc("created_at")).await?)
    }

    pub async fn order(&self, order_id: Uuid) -> Result<Order> {
        self.data.select_one(&Select::from(Table::Orders).eq("id", order_id)).await?.ok_or(StorefrontError::NotFound("order"))
    }

    pub async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        Ok(self.data.select(&Select::from(Table::OrderItems).eq("order_id", order_id)).await?)
    }

    /// Moves an order along its lifecycle, rejecting transitions the
    /// workflow does not allow.
    pub async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut order = self.order(order_id).await?;
        if !order.status.can_transition_to(status) {
            return Err(StorefrontError::InvalidTransition { from: order.status, to: status });
        }
        self.data.update(Table::Orders, &[Filter::eq("id", order_id)], &StatusPatch { status }).await?;
        info!(%order_id, from = %order.status, to = %status, "order status changed");
        self.events.publish(DomainEvent::Order(OrderEvent::StatusChanged { order_id, from: order.status, to: status })).await;
        order.status = status;
        Ok(order)
    }
}
