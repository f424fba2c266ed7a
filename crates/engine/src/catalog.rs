//! Catalog operations on items.
//!
//! Everything here may touch an item except its stock on hand, which is
//! the ledger's exclusive territory.

use chrono::Utc;
use common::{Item, ItemId, Money};
use store::{Store, StoreTx};

use crate::error::{EngineError, Result};

/// A create-item request.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
}

/// Fields of an item a catalog update may change.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<Money>,
}

/// Item catalog service: create, update, soft-delete, read.
#[derive(Clone)]
pub struct Catalog<S: Store> {
    store: S,
}

impl<S: Store> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads an item by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_item(&self, item_id: ItemId) -> Result<Item> {
        self.store
            .get_item(item_id)
            .await?
            .ok_or(EngineError::ItemNotFound(item_id))
    }

    /// Creates an item. The name must be unique among active items.
    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_item(&self, request: NewItem) -> Result<Item> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::Validation("item name is required".into()));
        }
        if request.unit_price.is_negative() {
            return Err(EngineError::Validation(
                "unit price must not be negative".into(),
            ));
        }
        if self
            .store
            .find_active_item_by_name(&name, None)
            .await?
            .is_some()
        {
            return Err(EngineError::Validation(
                "an active item with this name already exists".into(),
            ));
        }

        let now = Utc::now();
        let item = Item {
            id: ItemId::new(),
            name,
            description: request.description,
            unit_price: request.unit_price,
            quantity: request.quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_item(&item).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Updates an active item's catalog fields, never its stock.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_item(&self, item_id: ItemId, update: ItemUpdate) -> Result<Item> {
        if let Some(ref name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(EngineError::Validation("item name is required".into()));
            }
            if self
                .store
                .find_active_item_by_name(name, Some(item_id))
                .await?
                .is_some()
            {
                return Err(EngineError::Validation(
                    "another active item with this name already exists".into(),
                ));
            }
        }
        if update.unit_price.is_some_and(|price| price.is_negative()) {
            return Err(EngineError::Validation(
                "unit price must not be negative".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        match update_in_tx(&mut tx, item_id, update).await {
            Ok(item) => {
                tx.commit().await?;
                Ok(item)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after update error");
                }
                Err(err)
            }
        }
    }

    /// Soft-deletes an item, excluding it from new reservations while its
    /// historical order lines remain valid.
    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, item_id: ItemId) -> Result<Item> {
        let mut tx = self.store.begin().await?;
        match delete_in_tx(&mut tx, item_id).await {
            Ok(item) => {
                tx.commit().await?;
                Ok(item)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after delete error");
                }
                Err(err)
            }
        }
    }
}

async fn lock_active_item<T: StoreTx>(tx: &mut T, item_id: ItemId) -> Result<Item> {
    let item = tx
        .lock_item(item_id)
        .await?
        .ok_or(EngineError::ItemNotFound(item_id))?;
    if !item.is_active {
        return Err(EngineError::ItemNotFound(item_id));
    }
    Ok(item)
}

async fn update_in_tx<T: StoreTx>(tx: &mut T, item_id: ItemId, update: ItemUpdate) -> Result<Item> {
    let mut item = lock_active_item(tx, item_id).await?;
    if let Some(name) = update.name {
        item.name = name.trim().to_string();
    }
    if let Some(description) = update.description {
        item.description = Some(description);
    }
    if let Some(unit_price) = update.unit_price {
        item.unit_price = unit_price;
    }
    item.updated_at = Utc::now();
    tx.update_item(&item).await?;
    Ok(item)
}

async fn delete_in_tx<T: StoreTx>(tx: &mut T, item_id: ItemId) -> Result<Item> {
    let mut item = lock_active_item(tx, item_id).await?;
    item.is_active = false;
    item.updated_at = Utc::now();
    tx.update_item(&item).await?;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    fn catalog() -> Catalog<MemoryStore> {
        Catalog::new(MemoryStore::new())
    }

    fn new_item(name: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            description: Some("A widget".to_string()),
            unit_price: Money::from_cents(500),
            quantity: 10,
        }
    }

    #[tokio::test]
    async fn create_and_get_item() {
        let catalog = catalog();
        let created = catalog.create_item(new_item("Widget")).await.unwrap();
        let fetched = catalog.get_item(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_active_name() {
        let catalog = catalog();
        catalog.create_item(new_item("Widget")).await.unwrap();
        let err = catalog.create_item(new_item("widget")).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn deleted_name_can_be_reused() {
        let catalog = catalog();
        let first = catalog.create_item(new_item("Widget")).await.unwrap();
        catalog.delete_item(first.id).await.unwrap();
        assert!(catalog.create_item(new_item("Widget")).await.is_ok());
    }

    #[tokio::test]
    async fn create_rejects_negative_price() {
        let catalog = catalog();
        let mut request = new_item("Widget");
        request.unit_price = Money::from_cents(-1);
        assert!(matches!(
            catalog.create_item(request).await.unwrap_err(),
            EngineError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn update_changes_catalog_fields_only() {
        let catalog = catalog();
        let created = catalog.create_item(new_item("Widget")).await.unwrap();
        let updated = catalog
            .update_item(
                created.id,
                ItemUpdate {
                    name: Some("Gadget".to_string()),
                    unit_price: Some(Money::from_cents(700)),
                    ..ItemUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Gadget");
        assert_eq!(updated.unit_price.cents(), 700);
        assert_eq!(updated.quantity, 10);
    }

    #[tokio::test]
    async fn update_rejects_name_held_by_another_active_item() {
        let catalog = catalog();
        catalog.create_item(new_item("Widget")).await.unwrap();
        let other = catalog.create_item(new_item("Gadget")).await.unwrap();
        let err = catalog
            .update_item(
                other.id,
                ItemUpdate {
                    name: Some("Widget".to_string()),
                    ..ItemUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_is_soft_and_not_repeatable() {
        let catalog = catalog();
        let created = catalog.create_item(new_item("Widget")).await.unwrap();
        let deleted = catalog.delete_item(created.id).await.unwrap();
        assert!(!deleted.is_active);

        // The row still exists for historical reads.
        assert!(!catalog.get_item(created.id).await.unwrap().is_active);

        // But a second delete no longer finds an active item.
        assert!(matches!(
            catalog.delete_item(created.id).await.unwrap_err(),
            EngineError::ItemNotFound(_)
        ));
    }
}
