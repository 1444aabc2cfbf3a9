use std::sync::Arc;
use crate::config::PortalConfig;
use crate::services::{CatalogService, EventPublisher, OrderService, SessionRegistry};
use crate::store::PortalStore;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub sessions: Arc<SessionRegistry>,
    pub orders: Arc<OrderService>,
}

impl AppState {
    pub fn new(store: Arc<dyn PortalStore>, events: EventPublisher, config: &PortalConfig) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(store.clone(), config.best_sellers.clone())),
            sessions: Arc::new(SessionRegistry::new(store.clone())),
            orders: Arc::new(OrderService::new(store, events, config.reference_attempts)),
        }
    }
}
