//! Transactional persistence for items, orders, and order lines.
//!
//! The engine talks to storage through the [`Store`] / [`StoreTx`] trait
//! pair: an explicit transaction handle with row-level exclusive locking
//! (`SELECT ... FOR UPDATE` semantics) and commit/rollback owned by the
//! caller. Two implementations are provided: [`PgStore`] on PostgreSQL and
//! [`MemoryStore`], which reproduces the same locking behavior in memory
//! for tests.

pub mod error;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use filter::{ItemFilter, OrderFilter};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Store, StoreTx};
