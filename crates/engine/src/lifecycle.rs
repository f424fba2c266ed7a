//! Order lifecycle transitions: confirm, cancel, and aggregate loading.

use std::collections::BTreeMap;

use chrono::Utc;
use common::{ItemId, Order, OrderAggregate, OrderId, OrderLine, OrderStatus};
use store::{Store, StoreTx};

use crate::error::{EngineError, Result};
use crate::ledger::InventoryLedger;

/// Drives the `pending → confirmed` and `pending → canceled` transitions.
///
/// Every transition locks the order row first, so a concurrent second call
/// either blocks and then observes the terminal status (failing with
/// `InvalidState`) or is serialized entirely before the first. That guard
/// is what makes the cancellation restock exactly-once.
#[derive(Clone)]
pub struct OrderLifecycle<S: Store> {
    store: S,
}

impl<S: Store> OrderLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads an order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, order_id: OrderId) -> Result<OrderAggregate> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(EngineError::OrderNotFound(order_id))?;
        let lines = self.store.lines_for_order(order_id).await?;
        Ok(OrderAggregate { order, lines })
    }

    /// Marks a pending order as confirmed (the opaque payment trigger).
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, order_id: OrderId) -> Result<OrderAggregate> {
        let mut tx = self.store.begin().await?;
        match confirm_in_tx(&mut tx, order_id).await {
            Ok(aggregate) => {
                tx.commit().await?;
                metrics::counter!("orders_confirmed_total").increment(1);
                Ok(aggregate)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after confirm error");
                }
                Err(err)
            }
        }
    }

    /// Cancels a pending order and restores its reserved stock.
    ///
    /// Status transition and restock share one transaction; a confirmed or
    /// already-canceled order fails with `InvalidState` and leaves stock
    /// untouched.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<OrderAggregate> {
        let mut tx = self.store.begin().await?;
        match cancel_in_tx(&mut tx, order_id).await {
            Ok(aggregate) => {
                tx.commit().await?;
                metrics::counter!("orders_canceled_total").increment(1);
                tracing::info!(order_id = %order_id, "order canceled, stock restored");
                Ok(aggregate)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after cancel error");
                }
                Err(err)
            }
        }
    }
}

async fn lock_pending_order<T: StoreTx>(
    tx: &mut T,
    order_id: OrderId,
    action: &'static str,
) -> Result<Order> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or(EngineError::OrderNotFound(order_id))?;
    if order.status != OrderStatus::Pending {
        return Err(EngineError::InvalidState {
            status: order.status,
            action,
        });
    }
    Ok(order)
}

async fn confirm_in_tx<T: StoreTx>(tx: &mut T, order_id: OrderId) -> Result<OrderAggregate> {
    let mut order = lock_pending_order(tx, order_id, "confirm").await?;
    order.status = OrderStatus::Confirmed;
    order.updated_at = Utc::now();
    tx.set_order_status(order_id, order.status, order.updated_at)
        .await?;
    let lines = tx.lines_for_order(order_id).await?;
    Ok(OrderAggregate { order, lines })
}

async fn cancel_in_tx<T: StoreTx>(tx: &mut T, order_id: OrderId) -> Result<OrderAggregate> {
    let mut order = lock_pending_order(tx, order_id, "cancel").await?;
    let lines = tx.lines_for_order(order_id).await?;

    // Restock per distinct item, locks taken in the same UUID order the
    // coordinator uses.
    let restock = aggregate_quantities(&lines);
    for (&item_id, &quantity) in &restock {
        let mut item = InventoryLedger::lock_for_update(tx, item_id).await?;
        InventoryLedger::increase(tx, &mut item, quantity).await?;
    }

    order.status = OrderStatus::Canceled;
    order.updated_at = Utc::now();
    tx.set_order_status(order_id, order.status, order.updated_at)
        .await?;

    Ok(OrderAggregate { order, lines })
}

fn aggregate_quantities(lines: &[OrderLine]) -> BTreeMap<ItemId, u32> {
    let mut totals: BTreeMap<ItemId, u32> = BTreeMap::new();
    for line in lines {
        // Order creation bounds the exact per-item sum; saturation keeps a
        // corrupt row from panicking the restock.
        let total = totals.entry(line.item_id).or_default();
        *total = total.saturating_add(line.quantity);
    }
    totals
}
