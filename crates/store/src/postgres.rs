//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Item, ItemId, Money, Order, OrderId, OrderLine, OrderLineId, OrderStatus, Page};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::store::{Store, StoreTx};
use crate::{ItemFilter, OrderFilter, Result, StoreError};

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// PostgreSQL error code for `lock_not_available`, raised when
/// `lock_timeout` expires while waiting on a row lock.
const LOCK_NOT_AVAILABLE: &str = "55P03";

const ITEM_COLUMNS: &str =
    "id, name, description, unit_price_cents, quantity, is_active, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, customer_name, customer_email, total_amount_cents, status, created_at, updated_at";
const LINE_COLUMNS: &str =
    "id, order_id, item_id, quantity, unit_price_cents, created_at, updated_at";

/// PostgreSQL implementation of [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgStore {
    /// Wraps an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Overrides the per-transaction row-lock wait bound.
    pub fn with_lock_timeout_ms(mut self, lock_timeout_ms: u64) -> Self {
        self.lock_timeout_ms = lock_timeout_ms;
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn quantity_from_row(row: &PgRow, column: &str) -> Result<u32> {
    let raw: i64 = row.try_get(column).map_err(StoreError::Database)?;
    u32::try_from(raw).map_err(|_| StoreError::Decode(format!("negative {column}: {raw}")))
}

fn row_to_item(row: PgRow) -> Result<Item> {
    let quantity = quantity_from_row(&row, "quantity")?;
    Ok(Item {
        id: ItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        quantity,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<OrderStatus>().map_err(StoreError::Decode)?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line(row: PgRow) -> Result<OrderLine> {
    let quantity = quantity_from_row(&row, "quantity")?;
    Ok(OrderLine {
        id: OrderLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
        quantity,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Maps a lock-wait timeout to its dedicated error; everything else stays a
/// database error.
fn map_lock_error(err: sqlx::Error, target: String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE)
    {
        return StoreError::LockTimeout { target };
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        let mut tx = self.pool.begin().await?;
        // lock_timeout does not accept bind parameters.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(PgTx { tx })
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_item).transpose()
    }

    async fn find_active_item_by_name(
        &self,
        name: &str,
        exclude: Option<ItemId>,
    ) -> Result<Option<Item>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE is_active AND LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)"
        ))
        .bind(name)
        .bind(exclude.map(|id| id.as_uuid()))
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_item).transpose()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_order).transpose()
    }

    async fn lines_for_order(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines
             WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_line).collect()
    }

    async fn list_items(&self, filter: &ItemFilter, page: Page) -> Result<(Vec<Item>, usize)> {
        // Build the WHERE clause once and share it between the count and
        // the windowed select, binding in the same order.
        let mut where_sql = String::from(" WHERE is_active");
        let mut param = 0;

        if filter.search.is_some() {
            param += 1;
            where_sql.push_str(&format!(
                " AND (name ILIKE ${param} OR description ILIKE ${param})"
            ));
        }
        if filter.min_price.is_some() {
            param += 1;
            where_sql.push_str(&format!(" AND unit_price_cents >= ${param}"));
        }
        if filter.max_price.is_some() {
            param += 1;
            where_sql.push_str(&format!(" AND unit_price_cents <= ${param}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM items{where_sql}");
        let mut count_query = sqlx::query(&count_sql);
        if let Some(ref search) = filter.search {
            count_query = count_query.bind(format!("%{search}%"));
        }
        if let Some(min) = filter.min_price {
            count_query = count_query.bind(min.cents());
        }
        if let Some(max) = filter.max_price {
            count_query = count_query.bind(max.cents());
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?.try_get(0)?;

        let rows_sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items{where_sql}
             ORDER BY created_at, id LIMIT ${} OFFSET ${}",
            param + 1,
            param + 2
        );
        let mut rows_query = sqlx::query(&rows_sql);
        if let Some(ref search) = filter.search {
            rows_query = rows_query.bind(format!("%{search}%"));
        }
        if let Some(min) = filter.min_price {
            rows_query = rows_query.bind(min.cents());
        }
        if let Some(max) = filter.max_price {
            rows_query = rows_query.bind(max.cents());
        }
        let rows = rows_query
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let items = rows.into_iter().map(row_to_item).collect::<Result<_>>()?;
        Ok((items, total.max(0) as usize))
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<Order>, usize)> {
        let mut where_sql = String::from(" WHERE TRUE");
        let mut param = 0;

        if filter.customer_name.is_some() {
            param += 1;
            where_sql.push_str(&format!(" AND customer_name ILIKE ${param}"));
        }
        if filter.status.is_some() {
            param += 1;
            where_sql.push_str(&format!(" AND status = ${param}"));
        }
        if filter.from_date.is_some() {
            param += 1;
            where_sql.push_str(&format!(" AND created_at >= ${param}"));
        }
        if filter.to_date.is_some() {
            param += 1;
            where_sql.push_str(&format!(" AND created_at <= ${param}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{where_sql}");
        let mut count_query = sqlx::query(&count_sql);
        if let Some(ref name) = filter.customer_name {
            count_query = count_query.bind(format!("%{name}%"));
        }
        if let Some(status) = filter.status {
            count_query = count_query.bind(status.as_str());
        }
        if let Some(from) = filter.from_date {
            count_query = count_query.bind(from);
        }
        if let Some(to) = filter.to_date {
            count_query = count_query.bind(to);
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?.try_get(0)?;

        let rows_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{where_sql}
             ORDER BY created_at, id LIMIT ${} OFFSET ${}",
            param + 1,
            param + 2
        );
        let mut rows_query = sqlx::query(&rows_sql);
        if let Some(ref name) = filter.customer_name {
            rows_query = rows_query.bind(format!("%{name}%"));
        }
        if let Some(status) = filter.status {
            rows_query = rows_query.bind(status.as_str());
        }
        if let Some(from) = filter.from_date {
            rows_query = rows_query.bind(from);
        }
        if let Some(to) = filter.to_date {
            rows_query = rows_query.bind(to);
        }
        let rows = rows_query
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let orders = rows.into_iter().map(row_to_order).collect::<Result<_>>()?;
        Ok((orders, total.max(0) as usize))
    }
}

/// An open transaction against a [`PgStore`].
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_lock_error(e, format!("item {id}")))?;
        row.map(row_to_item).transpose()
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_lock_error(e, format!("order {id}")))?;
        row.map(row_to_order).transpose()
    }

    async fn insert_item(&mut self, item: &Item) -> Result<()> {
        sqlx::query(
            "INSERT INTO items (id, name, description, unit_price_cents, quantity, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.unit_price.cents())
        .bind(i64::from(item.quantity))
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_item(&mut self, item: &Item) -> Result<()> {
        sqlx::query(
            "UPDATE items
             SET name = $2, description = $3, unit_price_cents = $4, quantity = $5,
                 is_active = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.unit_price.cents())
        .bind(i64::from(item.quantity))
        .bind(item.is_active)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_item_quantity(
        &mut self,
        id: ItemId,
        quantity: u32,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE items SET quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(i64::from(quantity))
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, customer_name, customer_email, total_amount_cents, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.id.as_uuid())
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()> {
        sqlx::query(
            "INSERT INTO order_lines (id, order_id, item_id, quantity, unit_price_cents, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(line.id.as_uuid())
        .bind(line.order_id.as_uuid())
        .bind(line.item_id.as_uuid())
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.cents())
        .bind(line.created_at)
        .bind(line.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lines_for_order(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines
             WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_line).collect()
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
