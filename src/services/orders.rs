//! Order submission and history.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use crate::domain::aggregates::Order;
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::fulfillment::{reconcile_history, OrderView, StageIndex};
use crate::store::{PortalStore, StoreError};
use crate::{PortalError, Result};
use super::{EventPublisher, Session};

/// Reconciled history. `superseded` is set when a newer fetch started while
/// this one was in flight and the views are the last applied ones instead.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFetch {
    pub orders: Arc<Vec<OrderView>>,
    pub superseded: bool,
}

pub struct OrderService {
    store: Arc<dyn PortalStore>,
    events: EventPublisher,
    reference_attempts: u32,
}

impl OrderService {
    pub fn new(store: Arc<dyn PortalStore>, events: EventPublisher, reference_attempts: u32) -> Self {
        Self { store, events, reference_attempts: reference_attempts.max(1) }
    }

    pub fn events(&self) -> &EventPublisher { &self.events }

    /// Submits the session's cart as a new order.
    ///
    /// The cart lock is held for the whole submission, so no cart mutation can
    /// slip in between the snapshot and the clear. On any failure before the
    /// order record is written the cart is left as it was.
    #[instrument(skip_all, fields(retailer = %session.retailer()))]
    pub async fn submit(&self, session: &Session, order_note: Option<String>) -> Result<Order> {
        let mut cart = session.lock_cart().await;
        if cart.is_empty() { return Err(PortalError::EmptyCart); }

        let reference = self.allocate_reference().await?;
        let mut order = Order::submit(reference, session.retailer().clone(), &cart, order_note, Utc::now())
            .map_err(|_| PortalError::EmptyCart)?;
        if let Err(e) = self.store.insert_order(&order).await {
            tracing::error!(reference, error = %e, "order write failed, cart kept");
            return Err(e.into());
        }

        let cleared = cart.line_count();
        cart.clear_cart();
        if let Err(e) = session.persist(&cart).await {
            tracing::warn!(reference, error = %e, "order placed but emptied cart was not persisted");
        }
        drop(cart);

        tracing::info!(reference, total_quantity = order.total_quantity, total_amount = %order.total_amount, "order submitted");
        let mut events = order.take_events();
        events.push(DomainEvent::Cart(CartEvent::Cleared { retailer_id: session.retailer().clone(), lines: cleared }));
        self.events.publish(events).await;
        Ok(order)
    }

    async fn allocate_reference(&self) -> Result<u64> {
        for attempt in 1..=self.reference_attempts {
            match self.store.allocate_reference().await {
                Ok(reference) => return Ok(reference),
                Err(StoreError::Conflict) => tracing::warn!(attempt, "reference allocation conflicted, retrying"),
                Err(e) => return Err(e.into()),
            }
        }
        Err(PortalError::ConcurrencyConflict { attempts: self.reference_attempts })
    }

    /// Loads the retailer's orders with the three stage sources in parallel
    /// and reconciles them, newest first.
    ///
    /// Failing to load the orders themselves is an error. A failed stage source
    /// degrades to empty; the affected orders then read as `Expired` until the
    /// next fetch.
    #[instrument(skip_all, fields(retailer = %session.retailer()))]
    pub async fn history(&self, session: &Session) -> Result<HistoryFetch> {
        let ticket = session.history_generation.begin();
        let (orders, pending, billing, sent) = tokio::join!(
            self.store.orders_for_retailer(session.retailer()),
            self.store.pending_records(),
            self.store.billing_records(),
            self.store.sent_records(),
        );
        let orders = orders?;
        let stages = StageIndex::build(&or_empty("pending", pending), &or_empty("billing", billing), &or_empty("sent", sent));
        let views = Arc::new(reconcile_history(orders, &stages));
        let (orders, superseded) = session.apply_history(ticket, views).await;
        Ok(HistoryFetch { orders, superseded })
    }
}

fn or_empty<T: Default>(source: &str, result: std::result::Result<T, StoreError>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(source, error = %e, "stage record source unavailable, treating as empty");
        T::default()
    })
}
