//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::cart::{CartLedger, CartLine};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::RetailerId;

/// Approval state written by the back-office approval workflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "Approval Pending")]
    ApprovalPending,
    Rejected,
    Approved,
}

/// A submitted order. Totals are frozen at submission time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub reference_number: u64,
    pub retailer_id: RetailerId,
    pub date_time: DateTime<Utc>,
    pub line_items: Vec<CartLine>,
    pub total_quantity: u64,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_note: Option<String>,
    #[serde(default, alias = "approvedby", skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, alias = "ardate", skip_serializing_if = "Option::is_none")]
    pub approval_date: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    /// Snapshots the cart into a new order awaiting approval.
    pub fn submit(
        reference_number: u64,
        retailer_id: RetailerId,
        cart: &CartLedger,
        order_note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let order_note = order_note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let mut order = Self {
            reference_number, retailer_id, date_time: now,
            line_items: cart.lines().to_vec(),
            total_quantity: cart.total_items(),
            total_amount: cart.total_amount(),
            status: OrderStatus::ApprovalPending,
            order_note, approved_by: None, approval_date: None, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Submitted {
            reference_number,
            retailer_id: order.retailer_id.clone(),
            total_quantity: order.total_quantity,
            total_amount: order.total_amount,
        }));
        Ok(order)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "No items") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Barcode, ColorRef};

    fn cart() -> CartLedger {
        let mut cart = CartLedger::new();
        cart.add_to_cart(CartLine {
            barcode: Barcode::new("890"), style: "A039".into(), description: "Bra".into(),
            color: ColorRef::new("SKIN", ""), size: "32B".into(), mrp: Decimal::new(129950, 2), quantity: 2,
        });
        cart
    }

    #[test]
    fn test_order_submission_snapshot() {
        let retailer = RetailerId::new("retailer").unwrap();
        let mut cart = cart();
        let mut order = Order::submit(1001, retailer.clone(), &cart, Some("  deliver monday ".into()), Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::ApprovalPending);
        assert_eq!(order.total_quantity, 2);
        assert_eq!(order.total_amount, Decimal::new(259900, 2));
        assert_eq!(order.order_note.as_deref(), Some("deliver monday"));

        cart.update_quantity(&Barcode::new("890"), 9);
        assert_eq!(order.total_quantity, 2);

        let events = order.take_events();
        assert!(matches!(events.as_slice(), [DomainEvent::Order(OrderEvent::Submitted { reference_number: 1001, .. })]));
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_empty_cart_rejected() {
        let retailer = RetailerId::new("retailer").unwrap();
        assert_eq!(Order::submit(1, retailer, &CartLedger::new(), None, Utc::now()), Err(OrderError::NoItems));
    }

    #[test]
    fn test_record_round_trips_legacy_field_names() {
        let order = Order::submit(7, RetailerId::new("r").unwrap(), &cart(), None, Utc::now()).unwrap();
        let mut value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["status"], "Approval Pending");
        value["status"] = "Approved".into();
        value["approvedby"] = "ops".into();
        let parsed: Order = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.status, OrderStatus::Approved);
        assert_eq!(parsed.approved_by.as_deref(), Some("ops"));
        assert_eq!(parsed.line_items, order.line_items);
    }
}
