//! Shared value objects for the inventory and order engine.
//!
//! Everything here is a plain value type: typed identifiers, money in
//! integer cents, the order status machine, entity structs, and the
//! pagination primitives used by all list queries.

pub mod entity;
pub mod ids;
pub mod money;
pub mod pagination;
pub mod status;

pub use entity::{Item, Order, OrderAggregate, OrderLine};
pub use ids::{ItemId, OrderId, OrderLineId};
pub use money::Money;
pub use pagination::{Page, Pagination};
pub use status::OrderStatus;
