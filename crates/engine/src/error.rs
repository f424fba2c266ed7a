//! Engine error taxonomy.

use common::{ItemId, OrderId, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Errors returned by engine operations.
///
/// Business errors (`ItemNotFound`, `OrderNotFound`, `InsufficientStock`,
/// `InvalidState`) abort the current transaction in full and are typed,
/// recoverable results. `Internal` is the only potentially transient kind;
/// it covers persistence failures and lock-wait timeouts, both of which
/// also roll back in full.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input, rejected before any transaction is opened.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced item does not exist or is no longer active.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// The referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Not enough stock on hand to reserve the requested quantity.
    #[error("insufficient stock for item {item_id}: {available} available, {requested} requested")]
    InsufficientStock {
        item_id: ItemId,
        available: u32,
        requested: u32,
    },

    /// Illegal lifecycle transition.
    #[error("invalid state transition: cannot {action} a {status} order")]
    InvalidState {
        status: OrderStatus,
        action: &'static str,
    },

    /// Persistence or lock-timeout failure; safe to retry, nothing was
    /// committed.
    #[error("internal error: {0}")]
    Internal(#[from] StoreError),
}

impl EngineError {
    /// Whether the caller may retry the whole operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Internal(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
