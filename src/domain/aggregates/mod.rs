//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{BestSellers, Catalog, CatalogPage, Product, ProductVariant, RawItemRow, RawStockRow};
pub use order::{Order, OrderError, OrderStatus};
pub use cart::{CartLedger, CartLine, StockIssue};
