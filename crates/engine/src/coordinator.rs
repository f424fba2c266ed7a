//! Multi-item order creation under one transaction.

use std::collections::BTreeMap;

use chrono::Utc;
use common::{
    Item, ItemId, Money, Order, OrderAggregate, OrderId, OrderLine, OrderLineId, OrderStatus,
};
use store::{Store, StoreTx};

use crate::error::{EngineError, Result};
use crate::ledger::InventoryLedger;

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// A create-order request.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
    pub lines: Vec<NewOrderLine>,
}

/// Orchestrates order creation: validate, lock, check, reserve, persist,
/// commit, with full rollback on any failure.
///
/// Locking all items up front turns the check-then-decrement on each item
/// into a serialized critical section; acquiring the locks in UUID order
/// keeps two overlapping orders from ever waiting on each other in a cycle.
#[derive(Clone)]
pub struct OrderCoordinator<S: Store> {
    store: S,
}

impl<S: Store> OrderCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates an order, reserving stock for every line atomically.
    ///
    /// Duplicate item ids in the request are checked and decremented as one
    /// aggregated quantity but persisted as separate lines, each frozen at
    /// the same locked unit price.
    #[tracing::instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn create_order(&self, request: NewOrder) -> Result<OrderAggregate> {
        validate(&request)?;
        let required = aggregate_required(&request.lines)?;

        let mut tx = self.store.begin().await?;
        match create_in_tx(&mut tx, &request, &required).await {
            Ok(aggregate) => {
                tx.commit().await?;
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %aggregate.order.id,
                    total_cents = aggregate.order.total_amount.cents(),
                    "order created"
                );
                Ok(aggregate)
            }
            Err(err) => {
                if matches!(err, EngineError::InsufficientStock { .. }) {
                    metrics::counter!("orders_rejected_insufficient_stock_total").increment(1);
                }
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after create error");
                }
                Err(err)
            }
        }
    }
}

/// Rejects malformed requests before any transaction is opened.
fn validate(request: &NewOrder) -> Result<()> {
    if request.customer_name.trim().is_empty() {
        return Err(EngineError::Validation("customer name is required".into()));
    }
    if request.customer_email.trim().is_empty() {
        return Err(EngineError::Validation("customer email is required".into()));
    }
    if request.lines.is_empty() {
        return Err(EngineError::Validation(
            "order must contain at least one line".into(),
        ));
    }
    if request.lines.iter().any(|line| line.quantity == 0) {
        return Err(EngineError::Validation(
            "line quantity must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Aggregates duplicate item ids into one required quantity per item.
///
/// BTreeMap iteration doubles as the deterministic lock order. A per-item
/// sum that does not fit in `u32` is rejected here, before any lock is
/// taken; a wrapped sum would slip past the stock check.
fn aggregate_required(lines: &[NewOrderLine]) -> Result<BTreeMap<ItemId, u32>> {
    let mut required: BTreeMap<ItemId, u32> = BTreeMap::new();
    for line in lines {
        let total = required.entry(line.item_id).or_default();
        *total = total.checked_add(line.quantity).ok_or_else(|| {
            EngineError::Validation(format!(
                "total quantity for item {} is out of range",
                line.item_id
            ))
        })?;
    }
    Ok(required)
}

async fn create_in_tx<T: StoreTx>(
    tx: &mut T,
    request: &NewOrder,
    required: &BTreeMap<ItemId, u32>,
) -> Result<OrderAggregate> {
    // Phase one: lock every referenced item and verify it can satisfy the
    // aggregated quantity. Nothing is mutated until all locks are held.
    let mut locked: BTreeMap<ItemId, Item> = BTreeMap::new();
    for (&item_id, &quantity) in required {
        let item = InventoryLedger::lock_for_update(tx, item_id).await?;
        if !item.is_active {
            return Err(EngineError::ItemNotFound(item_id));
        }
        if item.quantity < quantity {
            return Err(EngineError::InsufficientStock {
                item_id,
                available: item.quantity,
                requested: quantity,
            });
        }
        locked.insert(item_id, item);
    }

    // Phase two: reserve.
    for (&item_id, &quantity) in required {
        let item = locked
            .get_mut(&item_id)
            .ok_or(EngineError::ItemNotFound(item_id))?;
        InventoryLedger::decrease(tx, item, quantity).await?;
    }

    // One persisted line per original request line, priced at the unit
    // price read under the lock.
    let now = Utc::now();
    let order_id = OrderId::new();
    let mut total = Money::zero();
    let mut lines = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        let item = locked
            .get(&line.item_id)
            .ok_or(EngineError::ItemNotFound(line.item_id))?;
        total = item
            .unit_price
            .checked_multiply(line.quantity)
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| {
                EngineError::Validation("order total is out of range".to_string())
            })?;
        lines.push(OrderLine {
            id: OrderLineId::new(),
            order_id,
            item_id: line.item_id,
            quantity: line.quantity,
            unit_price: item.unit_price,
            created_at: now,
            updated_at: now,
        });
    }

    let order = Order {
        id: order_id,
        customer_name: request.customer_name.trim().to_string(),
        customer_email: request.customer_email.trim().to_string(),
        total_amount: total,
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    tx.insert_order(&order).await?;
    for line in &lines {
        tx.insert_order_line(line).await?;
    }

    Ok(OrderAggregate { order, lines })
}
