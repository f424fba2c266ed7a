//! The persistence contract the engine is written against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Item, ItemId, Order, OrderId, OrderLine, OrderStatus, Page};

use crate::{ItemFilter, OrderFilter, Result};

/// A persistence backend with explicit transactions.
///
/// Non-transactional methods are plain committed-state reads. All list
/// queries return rows under the fixed sort key `(created_at, id)`
/// ascending, together with the count of the unpaginated filtered set.
#[async_trait]
pub trait Store: Clone + Send + Sync {
    type Tx: StoreTx;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Reads an item without locking it.
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    /// Finds an active item carrying exactly this name, optionally ignoring
    /// one id (the row being renamed).
    async fn find_active_item_by_name(
        &self,
        name: &str,
        exclude: Option<ItemId>,
    ) -> Result<Option<Item>>;

    /// Reads an order header without locking it.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Reads the lines owned by an order.
    async fn lines_for_order(&self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Lists active items matching the filter.
    async fn list_items(&self, filter: &ItemFilter, page: Page) -> Result<(Vec<Item>, usize)>;

    /// Lists orders matching the filter.
    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<Order>, usize)>;
}

/// An open transaction.
///
/// Row locks acquired through `lock_*` are held until the transaction ends.
/// Writes become visible to other transactions only on [`commit`]; dropping
/// the handle without committing rolls everything back and releases all
/// locks. Lock waits are bounded; a timeout surfaces as
/// [`StoreError::LockTimeout`](crate::StoreError::LockTimeout) with nothing
/// mutated.
#[async_trait]
pub trait StoreTx: Send {
    /// Reads an item under an exclusive row lock, blocking while another
    /// transaction holds it.
    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>>;

    /// Reads an order header under an exclusive row lock.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts a new item row.
    async fn insert_item(&mut self, item: &Item) -> Result<()>;

    /// Rewrites an item row. The row must be lock-held by this transaction.
    async fn update_item(&mut self, item: &Item) -> Result<()>;

    /// Sets the stock on hand of a lock-held item row.
    async fn set_item_quantity(
        &mut self,
        id: ItemId,
        quantity: u32,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Inserts a new order header.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Inserts a line referencing an order inserted in this transaction.
    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()>;

    /// Sets the status of a lock-held order row.
    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Reads the lines owned by an order from within the transaction.
    async fn lines_for_order(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Commits the transaction, publishing all writes and releasing locks.
    async fn commit(self) -> Result<()>
    where
        Self: Sized;

    /// Rolls the transaction back, discarding all writes.
    async fn rollback(self) -> Result<()>
    where
        Self: Sized;
}
