//! Item catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Item, ItemId, Money, Pagination};
use engine::{ItemUpdate, NewItem};
use listing::ItemSummary;
use serde::{Deserialize, Serialize};
use store::{ItemFilter, Store};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

#[derive(Deserialize, Default)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price_cents: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct ItemListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub search: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        let low_stock = item.low_stock();
        Self {
            id: item.id.to_string(),
            name: item.name,
            description: item.description,
            unit_price_cents: item.unit_price.cents(),
            quantity: item.quantity,
            low_stock,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl From<ItemSummary> for ItemResponse {
    fn from(item: ItemSummary) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name,
            description: item.description,
            unit_price_cents: item.unit_price.cents(),
            quantity: item.quantity,
            low_stock: item.low_stock,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ItemListResponse {
    pub items: Vec<ItemResponse>,
    pub pagination: Pagination,
}

// -- Handlers --

/// POST /items — create a catalog item.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let item = state
        .catalog
        .create_item(NewItem {
            name: req.name,
            description: req.description,
            unit_price: Money::from_cents(req.unit_price_cents),
            quantity: req.quantity,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// GET /items/:id — load one item.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = parse_item_id(&id)?;
    let item = state.catalog.get_item(item_id).await?;
    Ok(Json(item.into()))
}

/// GET /items — list active items with filters and pagination.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<ItemListResponse>, ApiError> {
    let page = super::page_from(query.limit, query.offset);
    let mut filter = ItemFilter::new();
    filter.search = query.search;
    filter.min_price = query.min_price_cents.map(Money::from_cents);
    filter.max_price = query.max_price_cents.map(Money::from_cents);

    let (items, pagination) = state.listing.list_items(&filter, page).await?;
    Ok(Json(ItemListResponse {
        items: items.into_iter().map(ItemResponse::from).collect(),
        pagination,
    }))
}

/// PUT /items/:id — update catalog fields of an active item.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = parse_item_id(&id)?;
    let item = state
        .catalog
        .update_item(
            item_id,
            ItemUpdate {
                name: req.name,
                description: req.description,
                unit_price: req.unit_price_cents.map(Money::from_cents),
            },
        )
        .await?;
    Ok(Json(item.into()))
}

/// DELETE /items/:id — soft-delete an active item.
#[tracing::instrument(skip(state))]
pub async fn remove<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let item_id = parse_item_id(&id)?;
    state.catalog.delete_item(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_item_id(id: &str) -> Result<ItemId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid item id: {e}")))?;
    Ok(ItemId::from_uuid(uuid))
}
