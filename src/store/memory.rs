//! In-process store used for development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use crate::domain::aggregates::{CartLine, Order, OrderStatus, RawItemRow, RawStockRow};
use crate::domain::fulfillment::{SentRecord, StageRecord};
use crate::domain::value_objects::RetailerId;
use super::{PortalStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<Vec<RawItemRow>>,
    stock: RwLock<Vec<RawStockRow>>,
    carts: RwLock<HashMap<String, Vec<CartLine>>>,
    counter: AtomicU64,
    orders: RwLock<Vec<Order>>,
    pending: RwLock<HashMap<u64, StageRecord>>,
    billing: RwLock<HashMap<u64, StageRecord>>,
    sent: RwLock<Vec<SentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// The first allocated reference number will be `last + 1`.
    pub fn with_last_reference(last: u64) -> Self {
        let store = Self::default();
        store.counter.store(last, Ordering::SeqCst);
        store
    }

    pub async fn set_catalog(&self, items: Vec<RawItemRow>, stock: Vec<RawStockRow>) {
        *self.items.write().await = items;
        *self.stock.write().await = stock;
    }

    // Back-office hooks: the portal itself never calls these.

    pub async fn set_order_status(&self, reference: u64, status: OrderStatus, approved_by: Option<&str>) -> bool {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.iter_mut().find(|o| o.reference_number == reference) else { return false };
        order.status = status;
        order.approved_by = approved_by.map(str::to_string);
        order.approval_date = approved_by.map(|_| chrono::Utc::now());
        true
    }

    pub async fn put_pending(&self, reference: u64, record: StageRecord) { self.pending.write().await.insert(reference, record); }
    pub async fn put_billing(&self, reference: u64, record: StageRecord) { self.billing.write().await.insert(reference, record); }
    pub async fn push_sent(&self, record: SentRecord) { self.sent.write().await.push(record); }
}

#[async_trait]
impl PortalStore for MemoryStore {
    async fn fetch_items(&self) -> Result<Vec<RawItemRow>, StoreError> { Ok(self.items.read().await.clone()) }
    async fn fetch_stock(&self) -> Result<Vec<RawStockRow>, StoreError> { Ok(self.stock.read().await.clone()) }

    async fn load_cart(&self, key: &str) -> Result<Option<Vec<CartLine>>, StoreError> {
        Ok(self.carts.read().await.get(key).cloned())
    }

    async fn save_cart(&self, key: &str, lines: &[CartLine]) -> Result<(), StoreError> {
        self.carts.write().await.insert(key.to_string(), lines.to_vec());
        Ok(())
    }

    async fn allocate_reference(&self) -> Result<u64, StoreError> {
        Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.reference_number == order.reference_number) { return Err(StoreError::Conflict); }
        orders.push(order.clone());
        Ok(())
    }

    async fn orders_for_retailer(&self, retailer: &RetailerId) -> Result<Vec<Order>, StoreError> {
        Ok(self.orders.read().await.iter().filter(|o| &o.retailer_id == retailer).cloned().collect())
    }

    async fn pending_records(&self) -> Result<HashMap<u64, StageRecord>, StoreError> { Ok(self.pending.read().await.clone()) }
    async fn billing_records(&self) -> Result<HashMap<u64, StageRecord>, StoreError> { Ok(self.billing.read().await.clone()) }
    async fn sent_records(&self) -> Result<Vec<SentRecord>, StoreError> { Ok(self.sent.read().await.clone()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_allocation_is_unique_and_gapless() {
        let store = Arc::new(MemoryStore::with_last_reference(1000));
        let handles: Vec<_> = (0..64).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.allocate_reference().await.unwrap() })
        }).collect();
        let mut refs = Vec::new();
        for h in handles { refs.push(h.await.unwrap()); }
        let unique: HashSet<u64> = refs.iter().copied().collect();
        assert_eq!(unique.len(), 64);
        refs.sort_unstable();
        assert_eq!(refs, (1001..=1064).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_cart_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load_cart("k").await.unwrap().is_none());
        store.save_cart("k", &[]).await.unwrap();
        assert_eq!(store.load_cart("k").await.unwrap(), Some(vec![]));
    }
}
