//! In-memory store implementation for tests.
//!
//! Reproduces the locking discipline of the PostgreSQL backend: `lock_*`
//! acquires a per-row async mutex held until the transaction ends, writes
//! are buffered and published atomically on commit, and lock waits are
//! bounded by the configured timeout. A transaction must not lock the same
//! row twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::pagination;
use common::{Item, ItemId, Order, OrderId, OrderLine, OrderStatus, Page};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{Store, StoreTx};
use crate::{ItemFilter, OrderFilter, Result, StoreError};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    items: HashMap<ItemId, Item>,
    orders: HashMap<OrderId, Order>,
    lines: Vec<OrderLine>,
}

struct Inner {
    tables: Mutex<Tables>,
    item_locks: Mutex<HashMap<ItemId, Arc<Mutex<()>>>>,
    order_locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
}

/// In-memory implementation of [`Store`].
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Creates an empty store with the default lock-wait bound.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates an empty store with an explicit lock-wait bound.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                item_locks: Mutex::new(HashMap::new()),
                order_locks: Mutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_creation<T>(mut rows: Vec<T>, key: impl Fn(&T) -> (DateTime<Utc>, uuid::Uuid)) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    rows
}

fn windowed<T>(rows: Vec<T>, page: Page) -> (Vec<T>, usize) {
    let (rows, info) = pagination::window(rows, page);
    (rows, info.total_count)
}

fn matches_search(item: &Item, search: &str) -> bool {
    let needle = search.to_lowercase();
    item.name.to_lowercase().contains(&needle)
        || item
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        Ok(MemoryTx {
            inner: self.inner.clone(),
            guards: Vec::new(),
            writes: Vec::new(),
        })
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.inner.tables.lock().await.items.get(&id).cloned())
    }

    async fn find_active_item_by_name(
        &self,
        name: &str,
        exclude: Option<ItemId>,
    ) -> Result<Option<Item>> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .items
            .values()
            .find(|item| {
                item.is_active
                    && item.name.eq_ignore_ascii_case(name)
                    && Some(item.id) != exclude
            })
            .cloned())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.tables.lock().await.orders.get(&id).cloned())
    }

    async fn lines_for_order(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let tables = self.inner.tables.lock().await;
        let lines: Vec<OrderLine> = tables
            .lines
            .iter()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect();
        Ok(sorted_by_creation(lines, |l| (l.created_at, l.id.as_uuid())))
    }

    async fn list_items(&self, filter: &ItemFilter, page: Page) -> Result<(Vec<Item>, usize)> {
        let tables = self.inner.tables.lock().await;
        let rows: Vec<Item> = tables
            .items
            .values()
            .filter(|item| item.is_active)
            .filter(|item| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|s| matches_search(item, s))
            })
            .filter(|item| filter.min_price.is_none_or(|min| item.unit_price >= min))
            .filter(|item| filter.max_price.is_none_or(|max| item.unit_price <= max))
            .cloned()
            .collect();
        let rows = sorted_by_creation(rows, |i| (i.created_at, i.id.as_uuid()));
        Ok(windowed(rows, page))
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<Order>, usize)> {
        let tables = self.inner.tables.lock().await;
        let rows: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| {
                filter.customer_name.as_deref().is_none_or(|name| {
                    order
                        .customer_name
                        .to_lowercase()
                        .contains(&name.to_lowercase())
                })
            })
            .filter(|order| filter.status.is_none_or(|status| order.status == status))
            .filter(|order| filter.from_date.is_none_or(|from| order.created_at >= from))
            .filter(|order| filter.to_date.is_none_or(|to| order.created_at <= to))
            .cloned()
            .collect();
        let rows = sorted_by_creation(rows, |o| (o.created_at, o.id.as_uuid()));
        Ok(windowed(rows, page))
    }
}

enum Write {
    PutItem(Item),
    ItemQuantity(ItemId, u32, DateTime<Utc>),
    PutOrder(Order),
    PutLine(OrderLine),
    OrderStatus(OrderId, OrderStatus, DateTime<Utc>),
}

/// An open transaction against a [`MemoryStore`].
pub struct MemoryTx {
    inner: Arc<Inner>,
    guards: Vec<OwnedMutexGuard<()>>,
    writes: Vec<Write>,
}

impl MemoryTx {
    async fn acquire(&self, lock: Arc<Mutex<()>>, target: String) -> Result<OwnedMutexGuard<()>> {
        tokio::time::timeout(self.inner.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout { target })
    }

    /// Overlays this transaction's own pending writes onto a committed row.
    fn overlay_item(&self, mut row: Option<Item>, id: ItemId) -> Option<Item> {
        for write in &self.writes {
            match write {
                Write::PutItem(item) if item.id == id => row = Some(item.clone()),
                Write::ItemQuantity(wid, quantity, at) if *wid == id => {
                    if let Some(item) = row.as_mut() {
                        item.quantity = *quantity;
                        item.updated_at = *at;
                    }
                }
                _ => {}
            }
        }
        row
    }

    fn overlay_order(&self, mut row: Option<Order>, id: OrderId) -> Option<Order> {
        for write in &self.writes {
            match write {
                Write::PutOrder(order) if order.id == id => row = Some(order.clone()),
                Write::OrderStatus(wid, status, at) if *wid == id => {
                    if let Some(order) = row.as_mut() {
                        order.status = *status;
                        order.updated_at = *at;
                    }
                }
                _ => {}
            }
        }
        row
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>> {
        let lock = {
            let mut locks = self.inner.item_locks.lock().await;
            locks.entry(id).or_default().clone()
        };
        let guard = self.acquire(lock, format!("item {id}")).await?;
        self.guards.push(guard);

        let committed = self.inner.tables.lock().await.items.get(&id).cloned();
        Ok(self.overlay_item(committed, id))
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let lock = {
            let mut locks = self.inner.order_locks.lock().await;
            locks.entry(id).or_default().clone()
        };
        let guard = self.acquire(lock, format!("order {id}")).await?;
        self.guards.push(guard);

        let committed = self.inner.tables.lock().await.orders.get(&id).cloned();
        Ok(self.overlay_order(committed, id))
    }

    async fn insert_item(&mut self, item: &Item) -> Result<()> {
        self.writes.push(Write::PutItem(item.clone()));
        Ok(())
    }

    async fn update_item(&mut self, item: &Item) -> Result<()> {
        self.writes.push(Write::PutItem(item.clone()));
        Ok(())
    }

    async fn set_item_quantity(
        &mut self,
        id: ItemId,
        quantity: u32,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.writes.push(Write::ItemQuantity(id, quantity, updated_at));
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.writes.push(Write::PutOrder(order.clone()));
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()> {
        self.writes.push(Write::PutLine(line.clone()));
        Ok(())
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.writes.push(Write::OrderStatus(id, status, updated_at));
        Ok(())
    }

    async fn lines_for_order(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let mut lines: Vec<OrderLine> = {
            let tables = self.inner.tables.lock().await;
            tables
                .lines
                .iter()
                .filter(|line| line.order_id == order_id)
                .cloned()
                .collect()
        };
        for write in &self.writes {
            if let Write::PutLine(line) = write
                && line.order_id == order_id
            {
                lines.push(line.clone());
            }
        }
        Ok(sorted_by_creation(lines, |l| (l.created_at, l.id.as_uuid())))
    }

    async fn commit(self) -> Result<()> {
        let mut tables = self.inner.tables.lock().await;
        for write in self.writes {
            match write {
                Write::PutItem(item) => {
                    tables.items.insert(item.id, item);
                }
                Write::ItemQuantity(id, quantity, at) => {
                    if let Some(item) = tables.items.get_mut(&id) {
                        item.quantity = quantity;
                        item.updated_at = at;
                    }
                }
                Write::PutOrder(order) => {
                    tables.orders.insert(order.id, order);
                }
                Write::PutLine(line) => {
                    tables.lines.push(line);
                }
                Write::OrderStatus(id, status, at) => {
                    if let Some(order) = tables.orders.get_mut(&id) {
                        order.status = status;
                        order.updated_at = at;
                    }
                }
            }
        }
        // Row locks release when the guards drop with `self`.
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        // Buffered writes are simply discarded.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn test_item(name: &str, quantity: u32, price_cents: i64) -> Item {
        let now = Utc::now();
        Item {
            id: ItemId::new(),
            name: name.to_string(),
            description: None,
            unit_price: Money::from_cents(price_cents),
            quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed_item(store: &MemoryStore, item: &Item) {
        let mut tx = store.begin().await.unwrap();
        tx.insert_item(item).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn writes_visible_only_after_commit() {
        let store = MemoryStore::new();
        let item = test_item("Widget", 10, 500);

        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&item).await.unwrap();
        assert!(store.get_item(item.id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        let stored = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Widget");
        assert_eq!(stored.quantity, 10);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = MemoryStore::new();
        let item = test_item("Widget", 10, 500);

        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&item).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.get_item(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lock_blocks_second_transaction_until_commit() {
        let store = MemoryStore::new();
        let item = test_item("Widget", 10, 500);
        seed_item(&store, &item).await;

        let mut tx1 = store.begin().await.unwrap();
        tx1.lock_item(item.id).await.unwrap().unwrap();

        let store2 = store.clone();
        let id = item.id;
        let waiter = tokio::spawn(async move {
            let mut tx2 = store2.begin().await.unwrap();
            let row = tx2.lock_item(id).await.unwrap().unwrap();
            tx2.rollback().await.unwrap();
            row.quantity
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        tx1.set_item_quantity(id, 7, Utc::now()).await.unwrap();
        tx1.commit().await.unwrap();

        // The blocked locker proceeds and observes the committed write.
        assert_eq!(waiter.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn lock_wait_is_bounded() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(50));
        let item = test_item("Widget", 10, 500);
        seed_item(&store, &item).await;

        let mut tx1 = store.begin().await.unwrap();
        tx1.lock_item(item.id).await.unwrap().unwrap();

        let mut tx2 = store.begin().await.unwrap();
        let err = tx2.lock_item(item.id).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));

        tx1.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_a_transaction_releases_its_locks() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(200));
        let item = test_item("Widget", 10, 500);
        seed_item(&store, &item).await;

        {
            let mut tx1 = store.begin().await.unwrap();
            tx1.lock_item(item.id).await.unwrap().unwrap();
            // Dropped without commit, simulating an aborted caller.
        }

        let mut tx2 = store.begin().await.unwrap();
        assert!(tx2.lock_item(item.id).await.unwrap().is_some());
        tx2.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn transaction_reads_its_own_pending_writes() {
        let store = MemoryStore::new();
        let item = test_item("Widget", 10, 500);
        seed_item(&store, &item).await;

        let mut tx = store.begin().await.unwrap();
        tx.set_item_quantity(item.id, 3, Utc::now()).await.unwrap();
        let row = tx.lock_item(item.id).await.unwrap().unwrap();
        assert_eq!(row.quantity, 3);
        tx.rollback().await.unwrap();

        // And the rollback kept the committed value intact.
        assert_eq!(store.get_item(item.id).await.unwrap().unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn find_active_item_by_name_ignores_inactive_and_excluded() {
        let store = MemoryStore::new();
        let mut retired = test_item("Widget", 1, 500);
        retired.is_active = false;
        let active = test_item("widget", 1, 500);
        seed_item(&store, &retired).await;
        seed_item(&store, &active).await;

        let found = store
            .find_active_item_by_name("WIDGET", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, active.id);

        assert!(
            store
                .find_active_item_by_name("WIDGET", Some(active.id))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_items_filters_and_windows() {
        let store = MemoryStore::new();
        for i in 0..6 {
            let mut item = test_item(&format!("Widget {i}"), 10, 100 * (i64::from(i) + 1));
            item.created_at = Utc::now() + chrono::Duration::milliseconds(i64::from(i));
            seed_item(&store, &item).await;
        }

        let filter = ItemFilter::new().min_price(Money::from_cents(300));
        let (rows, total) = store.list_items(&filter, Page::new(2, 0)).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Widget 2");
        assert_eq!(rows[1].name, "Widget 3");
    }
}
