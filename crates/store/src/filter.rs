//! Filters for the read-only list queries.

use chrono::{DateTime, Utc};
use common::{Money, OrderStatus};

/// Filter over active catalog items.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Case-insensitive substring match on name or description.
    pub search: Option<String>,
    /// Inclusive lower bound on unit price.
    pub min_price: Option<Money>,
    /// Inclusive upper bound on unit price.
    pub max_price: Option<Money>,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn min_price(mut self, min: Money) -> Self {
        self.min_price = Some(min);
        self
    }

    pub fn max_price(mut self, max: Money) -> Self {
        self.max_price = Some(max);
        self
    }
}

/// Filter over orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Case-insensitive substring match on the customer name.
    pub customer_name: Option<String>,
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on creation time.
    pub from_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time.
    pub to_date: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn from_date(mut self, from: DateTime<Utc>) -> Self {
        self.from_date = Some(from);
        self
    }

    pub fn to_date(mut self, to: DateTime<Utc>) -> Self {
        self.to_date = Some(to);
        self
    }
}
