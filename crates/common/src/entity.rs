//! Persisted entity value structs.
//!
//! These are plain data carried across the store boundary. All mutation of
//! persisted state goes through the engine; nothing here loads lazily.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ItemId, Money, OrderId, OrderLineId, OrderStatus};

/// Stock level below which an item is flagged as running low in listings.
pub const LOW_STOCK_THRESHOLD: u32 = 5;

/// A catalog item with its stock on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Unique among active items.
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    /// Quantity on hand. Never negative; mutated only by the ledger.
    pub quantity: u32,
    /// Soft-delete flag. Inactive items are excluded from new reservations
    /// but their historical order lines remain valid.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Whether the stock on hand is below the low-stock threshold.
    pub fn low_stock(&self) -> bool {
        self.quantity < LOW_STOCK_THRESHOLD
    }
}

/// An order header. Lines live in [`OrderLine`] rows owned by this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    /// Computed once at creation from the frozen line prices, never
    /// recomputed afterwards.
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single line of an order, priced at order-creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub quantity: u32,
    /// Unit price frozen when the order was created, decoupled from later
    /// catalog price changes.
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderLine {
    /// The line total at the frozen unit price.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order together with its owned lines, loaded as one consistency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAggregate {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

impl OrderAggregate {
    /// Recomputes the total from the persisted lines.
    ///
    /// Always equals `order.total_amount` for a committed order.
    pub fn computed_total(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(), |sum, line| sum + line.line_total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        let now = Utc::now();
        Item {
            id: ItemId::new(),
            name: "Widget".to_string(),
            description: None,
            unit_price: Money::from_cents(500),
            quantity: 10,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn low_stock_is_strictly_below_threshold() {
        let mut item = sample_item();
        item.quantity = LOW_STOCK_THRESHOLD;
        assert!(!item.low_stock());
        item.quantity = LOW_STOCK_THRESHOLD - 1;
        assert!(item.low_stock());
    }

    #[test]
    fn line_total_uses_frozen_price() {
        let now = Utc::now();
        let line = OrderLine {
            id: OrderLineId::new(),
            order_id: OrderId::new(),
            item_id: ItemId::new(),
            quantity: 3,
            unit_price: Money::from_cents(500),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(line.line_total().cents(), 1500);
    }

    #[test]
    fn aggregate_total_sums_lines() {
        let now = Utc::now();
        let order_id = OrderId::new();
        let line = |qty, cents| OrderLine {
            id: OrderLineId::new(),
            order_id,
            item_id: ItemId::new(),
            quantity: qty,
            unit_price: Money::from_cents(cents),
            created_at: now,
            updated_at: now,
        };
        let aggregate = OrderAggregate {
            order: Order {
                id: order_id,
                customer_name: "Ada".to_string(),
                customer_email: "ada@example.com".to_string(),
                total_amount: Money::from_cents(2500),
                status: OrderStatus::Pending,
                created_at: now,
                updated_at: now,
            },
            lines: vec![line(2, 1000), line(1, 500)],
        };
        assert_eq!(aggregate.computed_total(), aggregate.order.total_amount);
    }
}
