//! Retail Portal
//!
//! Retailer-facing ordering service for a shared product and stock dataset.
//!
//! ## Features
//! - Catalog aggregation from flat item and stock feeds
//! - Per-retailer cart ledger with durable persistence
//! - Order submission with atomically allocated reference numbers
//! - Order status reconciliation against back-office fulfillment records
//! - Quick-order bulk entry

pub mod config;
pub mod domain;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use thiserror::Error;
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("You must be logged in to place an order")]
    Unauthenticated,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Reference number allocation did not commit after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },
}

impl PortalError {
    /// Whether the caller can retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::ConcurrencyConflict { .. })
    }
}

impl From<StoreError> for PortalError {
    fn from(e: StoreError) -> Self { Self::BackendUnavailable(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, PortalError>;
