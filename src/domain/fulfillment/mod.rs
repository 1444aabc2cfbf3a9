//! Fulfillment stage records and order status reconciliation.
//!
//! The back office keeps three records per order outside this system: a
//! pending record, a billing record (both nested style → colour → size →
//! quantity) and a list of sent shipments. [`StageIndex::build`] flattens
//! them once at ingestion; [`derive_status`] only ever sees flat facts.
//!
//! Flattening policy: leaves with a quantity of zero or less are treated as
//! absent and dropped. The same policy applies to billed shipment lines.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use crate::domain::aggregates::order::{Order, OrderStatus};
use crate::domain::aggregates::product::Loose;
use crate::domain::value_objects::Barcode;

/// Nested pending/billing record as the back office writes it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    #[serde(default)]
    pub items: Vec<StyleBucket>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleBucket {
    pub name: String,
    #[serde(default, deserialize_with = "loose_leaves")]
    pub colors: BTreeMap<String, BTreeMap<String, i64>>,
}

/// One shipment event against an order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentRecord {
    pub order_number: u64,
    #[serde(default)]
    pub billed_items: Vec<BilledItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BilledItem {
    #[serde(default)] pub barcode: Option<Barcode>,
    #[serde(default, alias = "name")] pub style: Option<String>,
    #[serde(default)] pub color: Option<String>,
    #[serde(default)] pub size: Option<String>,
    #[serde(default, deserialize_with = "loose_quantity")]
    pub quantity: i64,
}

// Exports write quantities as integers, floats or strings. Anything that is
// not a positive number reads as zero and is dropped by flattening.
fn quantity_of(value: Option<Loose>) -> i64 { value.map(|v| i64::from(v.count())).unwrap_or(0) }

fn loose_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(quantity_of(Option::<Loose>::deserialize(deserializer)?))
}

fn loose_leaves<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, BTreeMap<String, i64>>, D::Error> {
    let raw = Option::<BTreeMap<String, BTreeMap<String, Option<Loose>>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.into_iter()
        .map(|(color, sizes)| (color, sizes.into_iter().map(|(size, qty)| (size, quantity_of(qty))).collect()))
        .collect())
}

/// Flat `{style, color, size, quantity}` tuple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<Barcode>,
    pub style: String,
    pub color: String,
    pub size: String,
    pub quantity: u64,
}

pub fn flatten(record: &StageRecord) -> Vec<StageLine> {
    record.items.iter().flat_map(|bucket| {
        bucket.colors.iter().flat_map(move |(color, sizes)| {
            sizes.iter().filter(|(_, qty)| **qty > 0).map(move |(size, &qty)| StageLine {
                barcode: None, style: bucket.name.clone(), color: color.clone(),
                size: size.clone(), quantity: qty as u64,
            })
        })
    }).collect()
}

fn billed_lines(shipments: &[SentRecord]) -> Vec<StageLine> {
    shipments.iter().flat_map(|s| s.billed_items.iter()).filter(|i| i.quantity > 0).map(|i| StageLine {
        barcode: i.barcode.clone(),
        style: i.style.clone().unwrap_or_default(),
        color: i.color.clone().unwrap_or_default(),
        size: i.size.clone().unwrap_or_default(),
        quantity: i.quantity as u64,
    }).collect()
}

/// Stage records indexed by order reference number, already flattened.
#[derive(Clone, Debug, Default)]
pub struct StageIndex {
    pending: HashMap<u64, Vec<StageLine>>,
    billing: HashMap<u64, Vec<StageLine>>,
    sent: HashMap<u64, Vec<StageLine>>,
}

impl StageIndex {
    pub fn build(pending: &HashMap<u64, StageRecord>, billing: &HashMap<u64, StageRecord>, sent: &[SentRecord]) -> Self {
        let mut grouped: HashMap<u64, Vec<SentRecord>> = HashMap::new();
        for shipment in sent { grouped.entry(shipment.order_number).or_default().push(shipment.clone()); }
        Self {
            pending: pending.iter().map(|(r, rec)| (*r, flatten(rec))).collect(),
            billing: billing.iter().map(|(r, rec)| (*r, flatten(rec))).collect(),
            sent: grouped.into_iter().map(|(r, shipments)| (r, billed_lines(&shipments))).collect(),
        }
    }

    pub fn sent_quantity(&self, reference: u64) -> u64 { total(self.sent.get(&reference)) }

    /// Whether the pending or billing record has an entry for the order,
    /// even one that flattens to nothing.
    pub fn has_open_stage(&self, reference: u64) -> bool {
        self.pending.contains_key(&reference) || self.billing.contains_key(&reference)
    }

    fn lines(map: &HashMap<u64, Vec<StageLine>>, reference: u64) -> ItemList {
        ItemList::new(map.get(&reference).cloned().unwrap_or_default())
    }
}

fn total(lines: Option<&Vec<StageLine>>) -> u64 { lines.map(|l| l.iter().map(|i| i.quantity).sum()).unwrap_or(0) }

/// Status shown to the retailer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DisplayStatus {
    #[serde(rename = "Approval Pending")] ApprovalPending,
    Rejected,
    Processing,
    #[serde(rename = "Partially Fulfilled")] PartiallyFulfilled,
    Completed,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge { Yellow, Red, Green, Blue, Indigo, Gray }

impl DisplayStatus {
    pub fn badge(&self) -> Badge {
        match self {
            Self::ApprovalPending => Badge::Yellow,
            Self::Rejected => Badge::Red,
            Self::Processing => Badge::Indigo,
            Self::PartiallyFulfilled => Badge::Blue,
            Self::Completed => Badge::Green,
            Self::Expired => Badge::Gray,
        }
    }

    /// Whether the order has moved past approval and carries a fulfillment breakdown.
    pub fn shows_processing(&self) -> bool { !matches!(self, Self::ApprovalPending | Self::Rejected) }
}

/// Status from flat facts. Over-shipment clamps to `Completed`.
pub fn status_from(status: OrderStatus, total_quantity: u64, sent_quantity: u64, has_open_stage: bool) -> DisplayStatus {
    match status {
        OrderStatus::ApprovalPending => DisplayStatus::ApprovalPending,
        OrderStatus::Rejected => DisplayStatus::Rejected,
        OrderStatus::Approved if sent_quantity >= total_quantity => DisplayStatus::Completed,
        OrderStatus::Approved if sent_quantity > 0 => DisplayStatus::PartiallyFulfilled,
        OrderStatus::Approved if !has_open_stage => DisplayStatus::Expired,
        OrderStatus::Approved => DisplayStatus::Processing,
    }
}

pub fn derive_status(order: &Order, stages: &StageIndex) -> DisplayStatus {
    let reference = order.reference_number;
    status_from(order.status, order.total_quantity, stages.sent_quantity(reference), stages.has_open_stage(reference))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemList {
    pub items: Vec<StageLine>,
    pub total_quantity: u64,
}

impl ItemList {
    fn new(items: Vec<StageLine>) -> Self {
        let total_quantity = items.iter().map(|i| i.quantity).sum();
        Self { items, total_quantity }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FulfillmentBreakdown {
    pub billed: ItemList,
    pub processing: ItemList,
    pub pending: ItemList,
}

/// One row of the retailer's order history.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order: Order,
    pub status: DisplayStatus,
    pub badge: Badge,
    pub sent_quantity: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<FulfillmentBreakdown>,
}

pub fn reconcile(order: Order, stages: &StageIndex) -> OrderView {
    let status = derive_status(&order, stages);
    let reference = order.reference_number;
    let breakdown = status.shows_processing().then(|| FulfillmentBreakdown {
        billed: StageIndex::lines(&stages.sent, reference),
        processing: StageIndex::lines(&stages.billing, reference),
        pending: StageIndex::lines(&stages.pending, reference),
    });
    OrderView { status, badge: status.badge(), sent_quantity: stages.sent_quantity(reference), breakdown, order }
}

/// Reconciles every order and sorts newest first. Ties keep their input order.
pub fn reconcile_history(orders: Vec<Order>, stages: &StageIndex) -> Vec<OrderView> {
    let mut views: Vec<OrderView> = orders.into_iter().map(|o| reconcile(o, stages)).collect();
    views.sort_by(|a, b| b.order.date_time.cmp(&a.order.date_time));
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::{CartLedger, CartLine};
    use crate::domain::value_objects::{ColorRef, RetailerId};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn order(reference: u64, quantity: u32, status: OrderStatus) -> Order {
        let mut cart = CartLedger::new();
        cart.add_to_cart(CartLine {
            barcode: Barcode::new("B1"), style: "A039".into(), description: String::new(),
            color: ColorRef::new("SKIN", ""), size: "32B".into(), mrp: Decimal::ONE, quantity,
        });
        let mut order = Order::submit(reference, RetailerId::new("r1").unwrap(), &cart, None, Utc::now()).unwrap();
        order.status = status;
        order
    }

    fn shipment(reference: u64, qty: i64) -> SentRecord {
        SentRecord { order_number: reference, billed_items: vec![BilledItem { barcode: Some(Barcode::new("B1")), quantity: qty, ..Default::default() }] }
    }

    fn pending_entry(reference: u64) -> HashMap<u64, StageRecord> {
        let record: StageRecord = serde_json::from_value(json!({ "items": [{ "name": "A039", "colors": { "SKIN": { "32B": 10 } } }] })).unwrap();
        HashMap::from([(reference, record)])
    }

    #[test]
    fn test_status_table() {
        let approved = order(42, 10, OrderStatus::Approved);
        let none = HashMap::new();
        let cases = [
            (StageIndex::build(&none, &none, &[]), DisplayStatus::Expired),
            (StageIndex::build(&pending_entry(42), &none, &[]), DisplayStatus::Processing),
            (StageIndex::build(&none, &pending_entry(42), &[]), DisplayStatus::Processing),
            (StageIndex::build(&pending_entry(42), &none, &[shipment(42, 4)]), DisplayStatus::PartiallyFulfilled),
            (StageIndex::build(&none, &none, &[shipment(42, 6), shipment(42, 4)]), DisplayStatus::Completed),
            (StageIndex::build(&none, &none, &[shipment(42, 15)]), DisplayStatus::Completed),
            (StageIndex::build(&pending_entry(7), &none, &[shipment(7, 10)]), DisplayStatus::Expired),
        ];
        for (stages, expected) in cases { assert_eq!(derive_status(&approved, &stages), expected); }
    }

    #[test]
    fn test_approval_state_wins_over_stage_records() {
        let stages = StageIndex::build(&pending_entry(42), &pending_entry(42), &[shipment(42, 10)]);
        assert_eq!(derive_status(&order(42, 10, OrderStatus::ApprovalPending), &stages), DisplayStatus::ApprovalPending);
        assert_eq!(derive_status(&order(42, 10, OrderStatus::Rejected), &stages), DisplayStatus::Rejected);
    }

    #[test]
    fn test_flatten_drops_non_positive_leaves() {
        let record: StageRecord = serde_json::from_value(json!({ "items": [
            { "name": "A039", "colors": { "SKIN": { "32B": 3, "34B": 0 }, "BLACK": { "36C": -1 } } },
            { "name": "F074", "colors": { "RED": { "M": 2 } } }
        ] })).unwrap();
        let lines = flatten(&record);
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].style.as_str(), lines[0].size.as_str(), lines[0].quantity), ("A039", "32B", 3));
        assert_eq!(lines[1].color, "RED");
    }

    #[test]
    fn test_empty_entry_still_counts_as_open() {
        let pending = HashMap::from([(42, StageRecord::default())]);
        let stages = StageIndex::build(&pending, &HashMap::new(), &[]);
        assert_eq!(derive_status(&order(42, 10, OrderStatus::Approved), &stages), DisplayStatus::Processing);
    }

    #[test]
    fn test_breakdown_only_after_approval() {
        let stages = StageIndex::build(&pending_entry(1), &HashMap::new(), &[shipment(1, 3)]);
        let view = reconcile(order(1, 10, OrderStatus::Approved), &stages);
        let breakdown = view.breakdown.unwrap();
        assert_eq!(breakdown.billed.total_quantity, 3);
        assert_eq!(breakdown.pending.total_quantity, 10);
        assert!(breakdown.processing.items.is_empty());
        assert_eq!(view.badge, Badge::Blue);

        assert!(reconcile(order(1, 10, OrderStatus::ApprovalPending), &stages).breakdown.is_none());
    }

    #[test]
    fn test_history_sorted_newest_first_and_stable() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut orders: Vec<Order> = (1..=4).map(|r| order(r, 1, OrderStatus::ApprovalPending)).collect();
        orders[0].date_time = base;
        orders[1].date_time = base + Duration::hours(2);
        orders[2].date_time = base;
        orders[3].date_time = base + Duration::hours(1);
        let refs: Vec<u64> = reconcile_history(orders, &StageIndex::default()).iter().map(|v| v.order.reference_number).collect();
        assert_eq!(refs, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_quantities_read_leniently() {
        let record: StageRecord = serde_json::from_value(json!({ "items": [
            { "name": "A039", "colors": { "SKIN": { "32B": "4", "34B": 2.0, "36B": null, "38B": "n/a" } } }
        ] })).unwrap();
        let lines = flatten(&record);
        assert_eq!(lines.iter().map(|l| l.quantity).collect::<Vec<_>>(), vec![4, 2]);

        let shipment: SentRecord = serde_json::from_value(json!({ "orderNumber": 7, "billedItems": [
            { "barcode": "B1", "quantity": "3" }, { "barcode": "B2" }, { "barcode": "B3", "quantity": 1.0 }
        ] })).unwrap();
        let stages = StageIndex::build(&HashMap::new(), &HashMap::new(), &[shipment]);
        assert_eq!(stages.sent_quantity(7), 4);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(serde_json::to_value(DisplayStatus::PartiallyFulfilled).unwrap(), "Partially Fulfilled");
        assert_eq!(serde_json::to_value(DisplayStatus::ApprovalPending).unwrap(), "Approval Pending");
        assert_eq!(serde_json::to_value(Badge::Indigo).unwrap(), "indigo");
    }
}
