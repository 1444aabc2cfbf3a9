//! Catalog snapshot service.
//!
//! Holds the last successfully aggregated catalog. A refresh that fails keeps
//! the previous snapshot; a refresh overtaken by a newer one is discarded.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;
use crate::domain::aggregates::{BestSellers, Catalog};
use crate::store::PortalStore;
use super::RequestGeneration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Applied,
    Superseded,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct CatalogRefresh {
    pub catalog: Arc<Catalog>,
    pub outcome: RefreshOutcome,
}

pub struct CatalogService {
    store: Arc<dyn PortalStore>,
    best_sellers: BestSellers,
    snapshot: RwLock<Arc<Catalog>>,
    generation: RequestGeneration,
}

impl CatalogService {
    pub fn new(store: Arc<dyn PortalStore>, best_sellers: BestSellers) -> Self {
        Self { store, best_sellers, snapshot: RwLock::new(Arc::new(Catalog::default())), generation: RequestGeneration::default() }
    }

    pub async fn current(&self) -> Arc<Catalog> { self.snapshot.read().await.clone() }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> CatalogRefresh {
        let ticket = self.generation.begin();
        let (items, stock) = tokio::join!(self.store.fetch_items(), self.store.fetch_stock());
        let (items, stock) = match (items, stock) {
            (Ok(items), Ok(stock)) => (items, stock),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "catalog fetch failed, keeping previous snapshot");
                return CatalogRefresh { catalog: self.current().await, outcome: RefreshOutcome::Failed(e.to_string()) };
            }
        };
        let catalog = Arc::new(Catalog::aggregate(&items, &stock, &self.best_sellers));

        let mut snapshot = self.snapshot.write().await;
        if !self.generation.is_current(ticket) {
            tracing::debug!("discarding superseded catalog fetch");
            return CatalogRefresh { catalog: snapshot.clone(), outcome: RefreshOutcome::Superseded };
        }
        *snapshot = catalog.clone();
        tracing::info!(products = catalog.len(), item_rows = items.len(), stock_rows = stock.len(), "catalog refreshed");
        CatalogRefresh { catalog, outcome: RefreshOutcome::Applied }
    }
}
