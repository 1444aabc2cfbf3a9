//! Portal domain: catalog, cart, orders, fulfillment and quick order entry.
pub mod aggregates;
pub mod events;
pub mod fulfillment;
pub mod quick_order;
pub mod value_objects;
