//! Order status machine.

use serde::{Deserialize, Serialize};

/// The lifecycle status of an order.
///
/// Transitions:
/// ```text
/// Pending ──► Confirmed
///    │
///    └──────► Canceled
/// ```
///
/// Both `Confirmed` and `Canceled` are terminal. A confirmed order cannot
/// be canceled through the lifecycle; reversing a confirmed order would be
/// a compensating flow outside this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Stock is reserved, awaiting confirmation or cancellation.
    #[default]
    Pending,

    /// The order has been paid for (terminal).
    Confirmed,

    /// The order was canceled and its stock restored (terminal).
    Canceled,
}

impl OrderStatus {
    /// Returns true if the order can transition to `Confirmed`.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can transition to `Canceled`.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Canceled)
    }

    /// The status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
