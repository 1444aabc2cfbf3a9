//! PostgreSQL store.
//!
//! Feed rows, carts and stage records are JSONB so the external field names
//! survive untouched until the catalog normalization step.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use crate::domain::aggregates::{CartLine, Order, RawItemRow, RawStockRow};
use crate::domain::fulfillment::{SentRecord, StageRecord};
use crate::domain::value_objects::RetailerId;
use super::{PortalStore, StoreError};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool { &self.pool }

    async fn records<T: DeserializeOwned>(&self, sql: &str, source: &str) -> Result<Vec<T>, StoreError> {
        let rows: Vec<(Json<Value>,)> = sqlx::query_as(sql).fetch_all(&self.pool).await?;
        Ok(decode_rows(rows.into_iter().map(|(Json(value),)| value), source))
    }

    async fn stage(&self, sql: &str, source: &str) -> Result<HashMap<u64, StageRecord>, StoreError> {
        let rows: Vec<(i64, Json<Value>)> = sqlx::query_as(sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().filter_map(|(reference, Json(value))| {
            let reference = u64::try_from(reference).ok()?;
            decode_rows::<StageRecord>([value], source).pop().map(|record| (reference, record))
        }).collect())
    }
}

/// Decodes JSONB rows one at a time. A row that does not decode is logged and
/// skipped so one bad document cannot hide the rest of a table.
fn decode_rows<T: DeserializeOwned>(values: impl IntoIterator<Item = Value>, source: &str) -> Vec<T> {
    values.into_iter().filter_map(|value| match serde_json::from_value(value) {
        Ok(row) => Some(row),
        Err(e) => { tracing::warn!(%source, error = %e, "skipping undecodable row"); None }
    }).collect()
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Unavailable(format!("reference {value} out of range")))
}

#[async_trait]
impl PortalStore for PgStore {
    async fn fetch_items(&self) -> Result<Vec<RawItemRow>, StoreError> {
        self.records("SELECT row FROM catalog_items ORDER BY position", "catalog_items").await
    }

    async fn fetch_stock(&self) -> Result<Vec<RawStockRow>, StoreError> {
        self.records("SELECT row FROM stock_rows ORDER BY position", "stock_rows").await
    }

    async fn load_cart(&self, key: &str) -> Result<Option<Vec<CartLine>>, StoreError> {
        let row: Option<(Json<Vec<CartLine>>,)> = sqlx::query_as("SELECT lines FROM carts WHERE cart_key = $1")
            .bind(key).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(lines),)| lines))
    }

    async fn save_cart(&self, key: &str, lines: &[CartLine]) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO carts (cart_key, lines, updated_at) VALUES ($1, $2, NOW()) ON CONFLICT (cart_key) DO UPDATE SET lines = EXCLUDED.lines, updated_at = NOW()")
            .bind(key).bind(Json(lines)).execute(&self.pool).await?;
        Ok(())
    }

    async fn allocate_reference(&self) -> Result<u64, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("UPDATE reference_counter SET value = value + 1 WHERE id = 1 RETURNING value")
            .fetch_optional(&self.pool).await?;
        let (value,) = row.ok_or_else(|| StoreError::Unavailable("reference counter missing".into()))?;
        u64::try_from(value).map_err(|_| StoreError::Unavailable(format!("reference counter corrupt: {value}")))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO orders (reference_number, retailer_id, created_at, record) VALUES ($1, $2, $3, $4)")
            .bind(to_i64(order.reference_number)?)
            .bind(order.retailer_id.as_str())
            .bind(order.date_time)
            .bind(Json(order))
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn orders_for_retailer(&self, retailer: &RetailerId) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<(Json<Value>,)> = sqlx::query_as("SELECT record FROM orders WHERE retailer_id = $1 ORDER BY reference_number")
            .bind(retailer.as_str()).fetch_all(&self.pool).await?;
        Ok(decode_rows(rows.into_iter().map(|(Json(value),)| value), "orders"))
    }

    async fn pending_records(&self) -> Result<HashMap<u64, StageRecord>, StoreError> {
        self.stage("SELECT reference_number, record FROM pending_records", "pending_records").await
    }

    async fn billing_records(&self) -> Result<HashMap<u64, StageRecord>, StoreError> {
        self.stage("SELECT reference_number, record FROM billing_records", "billing_records").await
    }

    async fn sent_records(&self) -> Result<Vec<SentRecord>, StoreError> {
        self.records("SELECT record FROM sent_records ORDER BY id", "sent_records").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bad_row_does_not_hide_the_rest() {
        let rows = vec![
            json!({ "orderNumber": 1001, "billedItems": [{ "barcode": "B1", "quantity": "2" }] }),
            json!({ "orderNumber": "not a number" }),
            json!("garbage"),
            json!({ "orderNumber": 1002, "billedItems": [{ "barcode": "B2", "quantity": 3 }] }),
        ];
        let records: Vec<SentRecord> = decode_rows(rows, "sent_records");
        let orders: Vec<u64> = records.iter().map(|r| r.order_number).collect();
        assert_eq!(orders, vec![1001, 1002]);
        assert_eq!(records[0].billed_items[0].quantity, 2);
    }
}
