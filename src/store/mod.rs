//! Backing store for catalog feeds, carts, orders and fulfillment records.
//!
//! The portal never writes stage records; they are read-only here.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use crate::domain::aggregates::{CartLine, Order, RawItemRow, RawStockRow};
use crate::domain::fulfillment::{SentRecord, StageRecord};
use crate::domain::value_objects::RetailerId;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The write did not commit because of a competing write.
    #[error("write conflict")]
    Conflict,

    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        // serialization_failure, deadlock_detected, lock_not_available, unique_violation
        let conflict = matches!(&e, sqlx::Error::Database(db)
            if matches!(db.code().as_deref(), Some("40001" | "40P01" | "55P03" | "23505")));
        if conflict { return Self::Conflict; }
        if matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) {
            return Self::Unavailable(e.to_string());
        }
        Self::Database(e)
    }
}

#[async_trait]
pub trait PortalStore: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<RawItemRow>, StoreError>;
    async fn fetch_stock(&self) -> Result<Vec<RawStockRow>, StoreError>;

    /// `None` when the retailer has never persisted a cart.
    async fn load_cart(&self, key: &str) -> Result<Option<Vec<CartLine>>, StoreError>;
    async fn save_cart(&self, key: &str, lines: &[CartLine]) -> Result<(), StoreError>;

    /// Atomically increments the shared counter and returns the new value.
    async fn allocate_reference(&self) -> Result<u64, StoreError>;
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;
    async fn orders_for_retailer(&self, retailer: &RetailerId) -> Result<Vec<Order>, StoreError>;

    async fn pending_records(&self) -> Result<HashMap<u64, StageRecord>, StoreError>;
    async fn billing_records(&self) -> Result<HashMap<u64, StageRecord>, StoreError>;
    async fn sent_records(&self) -> Result<Vec<SentRecord>, StoreError>;
}
