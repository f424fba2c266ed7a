//! Read models over the inventory and order stores.
//!
//! Listing never opens a transaction and never locks a row; it reads a
//! filtered, sorted window and reports where that window sits in the full
//! result set. Soft-deleted items are excluded at the store level.

use chrono::{DateTime, Utc};
use common::{Item, ItemId, Money, Order, Page, Pagination};
use serde::Serialize;
use store::{ItemFilter, OrderFilter, Store};

/// An item as presented by list and detail reads, with the derived
/// low-stock flag alongside the raw quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Item> for ItemSummary {
    fn from(item: Item) -> Self {
        let low_stock = item.low_stock();
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            unit_price: item.unit_price,
            quantity: item.quantity,
            low_stock,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Paginated list queries over items and orders.
#[derive(Clone)]
pub struct ListingService<S: Store> {
    store: S,
}

impl<S: Store> ListingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists active items matching `filter`, ordered by `(created_at, id)`.
    #[tracing::instrument(skip(self, filter))]
    pub async fn list_items(
        &self,
        filter: &ItemFilter,
        page: Page,
    ) -> store::Result<(Vec<ItemSummary>, Pagination)> {
        let (items, total_count) = self.store.list_items(filter, page).await?;
        let summaries = items.into_iter().map(ItemSummary::from).collect();
        Ok((summaries, Pagination::for_window(page, total_count)))
    }

    /// Lists orders matching `filter`, ordered by `(created_at, id)`.
    #[tracing::instrument(skip(self, filter))]
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> store::Result<(Vec<Order>, Pagination)> {
        let (orders, total_count) = self.store.list_orders(filter, page).await?;
        Ok((orders, Pagination::for_window(page, total_count)))
    }
}
