//! Order creation and lifecycle endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Order, OrderAggregate, OrderId, OrderStatus, Pagination};
use engine::{NewOrder, NewOrderLine};
use serde::{Deserialize, Serialize};
use store::{OrderFilter, Store};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Deserialize, Default)]
pub struct OrderListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub customer_name: Option<String>,
    pub status: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub id: String,
    pub item_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub status: String,
    pub total_amount_cents: i64,
    pub lines: Vec<OrderLineResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderAggregate> for OrderResponse {
    fn from(aggregate: OrderAggregate) -> Self {
        let lines = aggregate
            .lines
            .iter()
            .map(|line| OrderLineResponse {
                id: line.id.to_string(),
                item_id: line.item_id.to_string(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                line_total_cents: line.line_total().cents(),
            })
            .collect();
        let order = aggregate.order;
        Self {
            id: order.id.to_string(),
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            status: order.status.to_string(),
            total_amount_cents: order.total_amount.cents(),
            lines,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// An order without its lines, as returned by the list endpoint.
#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub status: String,
    pub total_amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderSummaryResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            status: order.status.to_string(),
            total_amount_cents: order.total_amount.cents(),
            created_at: order.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummaryResponse>,
    pub pagination: Pagination,
}

// -- Handlers --

/// POST /orders — create an order, reserving stock for every line.
#[tracing::instrument(skip(state, req), fields(lines = req.lines.len()))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let mut lines = Vec::with_capacity(req.lines.len());
    for line in &req.lines {
        let uuid = uuid::Uuid::parse_str(&line.item_id)
            .map_err(|e| ApiError::BadRequest(format!("invalid item id: {e}")))?;
        lines.push(NewOrderLine {
            item_id: common::ItemId::from_uuid(uuid),
            quantity: line.quantity,
        });
    }

    let aggregate = state
        .coordinator
        .create_order(NewOrder {
            customer_name: req.customer_name,
            customer_email: req.customer_email,
            lines,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(aggregate.into())))
}

/// GET /orders/:id — load an order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let aggregate = state.lifecycle.get(order_id).await?;
    Ok(Json(aggregate.into()))
}

/// GET /orders — list orders with filters and pagination.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let page = super::page_from(query.limit, query.offset);
    let mut filter = OrderFilter::new();
    filter.customer_name = query.customer_name;
    filter.status = query
        .status
        .as_deref()
        .map(|s| {
            OrderStatus::from_str(s)
                .map_err(|_| ApiError::BadRequest(format!("unknown order status: {s}")))
        })
        .transpose()?;
    filter.from_date = query.from_date;
    filter.to_date = query.to_date;

    let (orders, pagination) = state.listing.list_orders(&filter, page).await?;
    Ok(Json(OrderListResponse {
        orders: orders.into_iter().map(OrderSummaryResponse::from).collect(),
        pagination,
    }))
}

/// POST /orders/:id/confirm — mark a pending order as confirmed.
#[tracing::instrument(skip(state))]
pub async fn confirm<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let aggregate = state.lifecycle.confirm(order_id).await?;
    Ok(Json(aggregate.into()))
}

/// POST /orders/:id/cancel — cancel a pending order, restoring stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let aggregate = state.lifecycle.cancel(order_id).await?;
    Ok(Json(aggregate.into()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
