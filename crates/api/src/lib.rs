//! HTTP API server for the inventory and order engine.
//!
//! Thin axum adapter over the engine services, with structured logging
//! (tracing) and Prometheus metrics. All stock and lifecycle semantics
//! live in the engine; handlers translate JSON and status codes only.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/items", post(routes::items::create::<S>))
        .route("/items", get(routes::items::list::<S>))
        .route("/items/{id}", get(routes::items::get::<S>))
        .route("/items/{id}", put(routes::items::update::<S>))
        .route("/items/{id}", delete(routes::items::remove::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/confirm", post(routes::orders::confirm::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a store.
pub fn create_state<S: Store>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store))
}
