//! Retailer sessions.
//!
//! A session can only be obtained hydrated: `Session::open` loads the
//! persisted cart before the session exists, so no mutation can persist over
//! a cart that was never read. Every mutation persists the whole ledger while
//! still holding the cart lock, so writes reach the store in mutation order.
//!
//! A session whose hydration failed never writes its cart back, and the
//! registry does not keep it, so the saved cart is read again on the next
//! request instead of being overwritten by an empty one.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::instrument;
use crate::domain::aggregates::{CartLedger, CartLine};
use crate::domain::fulfillment::OrderView;
use crate::domain::value_objects::{Barcode, RetailerId};
use crate::store::PortalStore;
use super::{Generation, RequestGeneration};

/// How the cart was restored when the session opened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum Hydration {
    Restored,
    Empty,
    Failed(String),
}

/// Cart state after a mutation. `persist_error` is set when the in-memory
/// change succeeded but the durable write did not.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartChange {
    pub cart: CartLedger,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
}

pub struct Session {
    retailer: RetailerId,
    storage_key: String,
    store: Arc<dyn PortalStore>,
    cart: Mutex<CartLedger>,
    hydration: Hydration,
    pub(crate) history_generation: RequestGeneration,
    history: Mutex<Option<Arc<Vec<OrderView>>>>,
}

impl Session {
    #[instrument(skip_all, fields(retailer = %retailer))]
    pub async fn open(store: Arc<dyn PortalStore>, retailer: RetailerId) -> Self {
        let storage_key = retailer.storage_key();
        let (cart, hydration) = match store.load_cart(&storage_key).await {
            Ok(Some(lines)) => (CartLedger::from_lines(lines), Hydration::Restored),
            Ok(None) => (CartLedger::new(), Hydration::Empty),
            Err(e) => {
                tracing::warn!(error = %e, "cart hydration failed, starting with an empty cart");
                (CartLedger::new(), Hydration::Failed(e.to_string()))
            }
        };
        tracing::debug!(lines = cart.line_count(), "session opened");
        Self {
            retailer, storage_key, store, cart: Mutex::new(cart), hydration,
            history_generation: RequestGeneration::default(), history: Mutex::new(None),
        }
    }

    pub fn retailer(&self) -> &RetailerId { &self.retailer }
    pub fn hydration(&self) -> &Hydration { &self.hydration }
    pub async fn cart(&self) -> CartLedger { self.cart.lock().await.clone() }

    pub async fn add_to_cart(&self, line: CartLine) -> CartChange {
        self.mutate(move |cart| {
            let changed = line.quantity > 0;
            cart.add_to_cart(line);
            changed
        }).await
    }

    pub async fn add_lines(&self, lines: Vec<CartLine>) -> CartChange {
        self.mutate(move |cart| {
            let changed = lines.iter().any(|l| l.quantity > 0);
            for line in lines { cart.add_to_cart(line); }
            changed
        }).await
    }

    pub async fn update_quantity(&self, barcode: &Barcode, quantity: i64) -> CartChange {
        self.mutate(|cart| cart.update_quantity(barcode, quantity)).await
    }

    pub async fn remove_from_cart(&self, barcode: &Barcode) -> CartChange {
        self.mutate(|cart| cart.remove_from_cart(barcode)).await
    }

    pub async fn clear_cart(&self) -> CartChange {
        self.mutate(|cart| {
            let changed = !cart.is_empty();
            cart.clear_cart();
            changed
        }).await
    }

    async fn mutate(&self, f: impl FnOnce(&mut CartLedger) -> bool + Send) -> CartChange {
        let mut cart = self.cart.lock().await;
        let changed = f(&mut *cart);
        let persist_error = if changed { self.persist(&cart).await.err() } else { None };
        CartChange { cart: cart.clone(), changed, persist_error }
    }

    pub(crate) async fn lock_cart(&self) -> MutexGuard<'_, CartLedger> { self.cart.lock().await }

    pub(crate) async fn persist(&self, cart: &CartLedger) -> Result<(), String> {
        if let Hydration::Failed(reason) = &self.hydration {
            tracing::warn!(retailer = %self.retailer, %reason, "cart not saved, the stored cart was never loaded");
            return Err(format!("cart not saved: stored cart could not be loaded ({reason})"));
        }
        self.store.save_cart(&self.storage_key, cart.lines()).await.map_err(|e| {
            tracing::warn!(retailer = %self.retailer, error = %e, "cart persistence failed");
            e.to_string()
        })
    }

    /// Stores `views` as the latest history unless a newer fetch has started,
    /// in which case the last applied history is returned instead.
    pub(crate) async fn apply_history(&self, ticket: Generation, views: Arc<Vec<OrderView>>) -> (Arc<Vec<OrderView>>, bool) {
        let mut latest = self.history.lock().await;
        if self.history_generation.is_current(ticket) {
            *latest = Some(views.clone());
            return (views, false);
        }
        tracing::debug!(retailer = %self.retailer, "discarding superseded history fetch");
        (latest.clone().unwrap_or(views), true)
    }
}

/// One hydrated session per retailer. Concurrent first requests for the same
/// retailer share a single hydration.
pub struct SessionRegistry {
    store: Arc<dyn PortalStore>,
    sessions: Mutex<HashMap<RetailerId, Arc<OnceCell<Arc<Session>>>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn PortalStore>) -> Self { Self { store, sessions: Mutex::new(HashMap::new()) } }

    pub async fn session(&self, retailer: &RetailerId) -> Arc<Session> {
        let cell = self.sessions.lock().await.entry(retailer.clone()).or_default().clone();
        let session = cell
            .get_or_init(|| async { Arc::new(Session::open(self.store.clone(), retailer.clone()).await) })
            .await
            .clone();
        if matches!(session.hydration(), Hydration::Failed(_)) {
            let mut sessions = self.sessions.lock().await;
            if sessions.get(retailer).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
                sessions.remove(retailer);
            }
        }
        session
    }

    /// Drops the session. The next request re-hydrates from the store.
    pub async fn close(&self, retailer: &RetailerId) -> bool { self.sessions.lock().await.remove(retailer).is_some() }

    pub async fn len(&self) -> usize { self.sessions.lock().await.len() }
}
