//! Shared application state accessible from all handlers.

use engine::{Catalog, OrderCoordinator, OrderLifecycle};
use listing::ListingService;
use store::Store;

/// The engine services, all cheap clones over one shared store.
pub struct AppState<S: Store> {
    pub catalog: Catalog<S>,
    pub coordinator: OrderCoordinator<S>,
    pub lifecycle: OrderLifecycle<S>,
    pub listing: ListingService<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            coordinator: OrderCoordinator::new(store.clone()),
            lifecycle: OrderLifecycle::new(store.clone()),
            listing: ListingService::new(store),
        }
    }
}
