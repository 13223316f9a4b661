//! Item Storage
//! Mission: Own item records behind validated CRUD operations

use crate::error::ServiceError;
use crate::items::models::{Item, ItemPatch, NewItem};
use crate::storage::{SnapshotBackend, SnapshotStore};
use tracing::info;
use uuid::Uuid;

pub struct ItemStore {
    items: SnapshotStore<Item>,
}

impl ItemStore {
    pub fn open(backend: Box<dyn SnapshotBackend<Item>>) -> Result<Self, ServiceError> {
        Ok(Self {
            items: SnapshotStore::open("items", backend)?,
        })
    }

    /// Every item, in creation order.
    pub fn list(&self) -> Vec<Item> {
        self.items.read(|items| items.to_vec())
    }

    pub fn get(&self, id: &Uuid) -> Result<Item, ServiceError> {
        self.items
            .read(|items| items.iter().find(|i| &i.id == id).cloned())
            .ok_or_else(|| not_found(id))
    }

    pub fn create(&self, new_item: NewItem) -> Result<Item, ServiceError> {
        let item = self.items.transact(|txn| {
            // ids stay unique within the collection
            let mut id = Uuid::new_v4();
            while txn.records().iter().any(|i| i.id == id) {
                id = Uuid::new_v4();
            }
            let item = new_item.into_item(id);
            txn.records_mut().push(item.clone());
            Ok::<_, ServiceError>(item)
        })?;

        info!("📦 Created item {} ({})", item.id, item.name);
        Ok(item)
    }

    pub fn update(&self, id: &Uuid, patch: &ItemPatch) -> Result<Item, ServiceError> {
        if patch.is_empty() {
            return Err(ServiceError::invalid(
                "at least one of name, price, or size must be provided",
            ));
        }

        let item = self.items.transact(|txn| {
            let index = txn
                .records()
                .iter()
                .position(|i| &i.id == id)
                .ok_or_else(|| not_found(id))?;
            let item = &mut txn.records_mut()[index];
            patch.apply(item);
            Ok::<_, ServiceError>(item.clone())
        })?;

        info!("✏️  Updated item {}", item.id);
        Ok(item)
    }

    pub fn delete(&self, id: &Uuid) -> Result<(), ServiceError> {
        self.items.transact(|txn| {
            let index = txn
                .records()
                .iter()
                .position(|i| &i.id == id)
                .ok_or_else(|| not_found(id))?;
            txn.records_mut().remove(index);
            Ok::<_, ServiceError>(())
        })?;

        info!("🗑️  Deleted item {}", id);
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }
}

fn not_found(id: &Uuid) -> ServiceError {
    ServiceError::NotFound(format!("item {}", id))
}
