//! Domain events
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::value_objects::RetailerId;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Cart(CartEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Submitted { reference_number: u64, retailer_id: RetailerId, total_quantity: u64, total_amount: Decimal },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    Cleared { retailer_id: RetailerId, lines: usize },
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Submitted { .. }) => "portal.orders.submitted",
            Self::Cart(CartEvent::Cleared { .. }) => "portal.carts.cleared",
        }
    }
}

/// Wire wrapper published to the message bus.
#[derive(Clone, Debug, Serialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent) -> Self { Self { id: Uuid::now_v7(), occurred_at: Utc::now(), event } }
}
