//! Application services wrapping the domain around the backing store.

pub mod catalog;
pub mod events;
pub mod orders;
pub mod session;

use std::sync::atomic::{AtomicU64, Ordering};

pub use catalog::{CatalogRefresh, CatalogService, RefreshOutcome};
pub use events::EventPublisher;
pub use orders::{HistoryFetch, OrderService};
pub use session::{CartChange, Hydration, Session, SessionRegistry};

/// Monotonic request counter. A fetch applies its result only if no newer
/// fetch has started since.
#[derive(Debug, Default)]
pub struct RequestGeneration(AtomicU64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

impl RequestGeneration {
    pub fn begin(&self) -> Generation { Generation(self.0.fetch_add(1, Ordering::SeqCst) + 1) }
    pub fn is_current(&self, generation: Generation) -> bool { self.0.load(Ordering::SeqCst) == generation.0 }
}
