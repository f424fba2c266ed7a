//! Inventory reservation and order-lifecycle transaction engine.
//!
//! The engine guarantees three things:
//! - stock never goes negative under concurrent order creation, because
//!   every check-then-decrement runs under an exclusive row lock;
//! - a committed order's total is exactly the sum of its frozen line
//!   prices, computed once inside the creating transaction;
//! - cancellation restores reserved stock exactly once, because the
//!   status-machine guard and the restock share one transaction under the
//!   order's row lock.
//!
//! Multi-item transactions always acquire item locks in UUID order, which
//! rules out lock-ordering deadlocks between overlapping orders.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod lifecycle;

pub use catalog::{Catalog, ItemUpdate, NewItem};
pub use coordinator::{NewOrder, NewOrderLine, OrderCoordinator};
pub use error::EngineError;
pub use ledger::InventoryLedger;
pub use lifecycle::OrderLifecycle;
