//! Order submission.
//!
//! Turns the session's cart into an order with three sequential remote calls:
//! allocate an order number, create the order, create its line items. The
//! first failure stops the sequence. Nothing already written is rolled back;
//! the cart is cleared only after all three succeed.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::cart_store::CartStore;
use crate::data::{DataClient, DataError, Table, GENERATE_ORDER_NUMBER};
use crate::domain::aggregates::{NewOrder, NewOrderItem, Order, OrderItem, Profile};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::publisher::EventPublisher;

/// How long the caller shows the confirmation before dismissing it.
pub const CONFIRMATION_DISPLAY: Duration = Duration::from_secs(3);

pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit order. Please try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitStep {
    AllocateNumber,
    CreateOrder,
    CreateItems,
}

impl fmt::Display for SubmitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AllocateNumber => "allocate order number",
            Self::CreateOrder => "create order",
            Self::CreateItems => "create order items",
        })
    }
}

/// What the partner sees. Remote failures all read the same; the step is
/// kept for diagnostics only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Your account must be approved before ordering")]
    NotApproved,
    #[error("An order is already being submitted")]
    InFlight,
    #[error("Failed to submit order. Please try again.")]
    Failed { step: SubmitStep },
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmittedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(with = "millis")]
    pub dismiss_after: Duration,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Busy flag guarding re-entry while a submission is in flight.
#[derive(Debug, Default)]
pub struct SubmitGate {
    busy: AtomicBool,
}

pub struct SubmitPermit<'a> {
    gate: &'a SubmitGate,
}

impl SubmitGate {
    pub fn new() -> Self { Self::default() }

    pub fn try_enter(&self) -> Option<SubmitPermit<'_>> {
        self.busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
        Some(SubmitPermit { gate: self })
    }

    pub fn is_busy(&self) -> bool { self.busy.load(Ordering::Acquire) }
}

impl Drop for SubmitPermit<'_> {
    fn drop(&mut self) { self.gate.busy.store(false, Ordering::Release); }
}

#[derive(Clone)]
pub struct Checkout {
    data: DataClient,
    events: EventPublisher,
}

impl Checkout {
    pub fn new(data: DataClient, events: EventPublisher) -> Self { Self { data, events } }

    /// Submits `cart` for `partner`. On success the cart and the staged
    /// `notes` are cleared.
    pub async fn submit(&self, gate: &SubmitGate, partner: &Profile, cart: &mut CartStore, notes: &mut String) -> Result<SubmittedOrder, SubmitError> {
        let _permit = gate.try_enter().ok_or(SubmitError::InFlight)?;
        if cart.is_empty() { return Err(SubmitError::EmptyCart); }
        if !partner.can_order() { return Err(SubmitError::NotApproved); }

        let fail = |step: SubmitStep| move |e: DataError| {
            error!(error = %e, %step, user_id = %partner.id, "order submission failed");
            SubmitError::Failed { step }
        };

        let order_number: String = self.data.rpc(GENERATE_ORDER_NUMBER).await.map_err(fail(SubmitStep::AllocateNumber))?;

        let new_order = NewOrder::new(partner.id, &order_number, cart.total_amount(), notes.as_str());
        let order: Order = self.data.insert_one(Table::Orders, &new_order).await.map_err(fail(SubmitStep::CreateOrder))?;

        let lines: Vec<NewOrderItem> = cart.items().iter().map(|item| NewOrderItem::snapshot(order.id, item)).collect();
        let items: Vec<OrderItem> = match self.data.insert_all(Table::OrderItems, &lines).await {
            Ok(items) => items,
            Err(e) => {
                error!(order_id = %order.id, order_number = %order.order_number, "order left without items");
                return Err(fail(SubmitStep::CreateItems)(e));
            }
        };

        cart.clear_cart();
        notes.clear();
        info!(order_id = %order.id, order_number = %order.order_number, total = %order.total_amount, items = items.len(), "order submitted");

        self.events.publish(DomainEvent::Order(OrderEvent::Submitted {
            order_id: order.id, order_number: order.order_number.clone(), user_id: partner.id,
            total: order.total_amount, item_count: items.len(),
        })).await;

        Ok(SubmittedOrder { order, items, dismiss_after: CONFIRMATION_DISPLAY })
    }
}
