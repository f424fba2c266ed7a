//! The inventory ledger: the only code path that mutates stock on hand.

use chrono::Utc;
use common::{Item, ItemId};
use store::StoreTx;

use crate::error::{EngineError, Result};

/// Stock operations executed inside a caller-supplied transaction.
///
/// `decrease` and `increase` take the locked row by `&mut`, so a caller
/// must have gone through [`lock_for_update`](Self::lock_for_update) on the
/// same transaction first. The ledger never commits or rolls back; the
/// transaction boundary belongs to the coordinator or lifecycle.
pub struct InventoryLedger;

impl InventoryLedger {
    /// Reads an item under an exclusive row lock held until the
    /// transaction ends. Blocks while another transaction holds the lock.
    pub async fn lock_for_update<T: StoreTx>(tx: &mut T, id: ItemId) -> Result<Item> {
        tx.lock_item(id)
            .await?
            .ok_or(EngineError::ItemNotFound(id))
    }

    /// Reserves `quantity` units from a locked item.
    pub async fn decrease<T: StoreTx>(tx: &mut T, item: &mut Item, quantity: u32) -> Result<()> {
        if quantity > item.quantity {
            return Err(EngineError::InsufficientStock {
                item_id: item.id,
                available: item.quantity,
                requested: quantity,
            });
        }
        item.quantity -= quantity;
        item.updated_at = Utc::now();
        tx.set_item_quantity(item.id, item.quantity, item.updated_at)
            .await?;
        Ok(())
    }

    /// Restores `quantity` units to a locked item.
    ///
    /// Used by cancellation; the lifecycle's state-machine guard is what
    /// makes the restock exactly-once, the ledger does not deduplicate.
    pub async fn increase<T: StoreTx>(tx: &mut T, item: &mut Item, quantity: u32) -> Result<()> {
        item.quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
            EngineError::Validation(format!("stock on hand for item {} is out of range", item.id))
        })?;
        item.updated_at = Utc::now();
        tx.set_item_quantity(item.id, item.quantity, item.updated_at)
            .await?;
        Ok(())
    }
}
