use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use givebridge_core::document::{FIELD_CREATED_AT, timestamp_value};
use givebridge_core::{Document, DocumentStore, FieldFilter, FieldMap, StoreError};

/// In-memory document store used by tests and local runs. Documents keep
/// insertion order per store; ids and `createdAt` are assigned here, never
/// taken from the caller.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    stores: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document under a caller-chosen id with the fields exactly
    /// as given, replacing any existing one. Mirrors writers outside this
    /// codebase that key documents themselves (the auth system owns the
    /// `users` store); also used to seed fixtures, including legacy shapes
    /// `add` would normalize.
    pub async fn seed(&self, store: &str, id: &str, fields: FieldMap) {
        let mut stores = self.stores.write().await;
        let docs = stores.entry(store.to_string()).or_default();
        docs.retain(|doc| doc.id != id);
        docs.push(Document::new(id, fields));
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn query(&self, store: &str, filter: FieldFilter) -> Result<Vec<Document>, StoreError> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(store)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(&doc.fields))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, store: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(store)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn add(&self, store: &str, mut fields: FieldMap) -> Result<Document, StoreError> {
        fields.insert(FIELD_CREATED_AT.to_string(), timestamp_value(Utc::now()));
        let doc = Document::new(Uuid::new_v4().to_string(), fields);

        let mut stores = self.stores.write().await;
        stores
            .entry(store.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, store: &str, id: &str, patch: FieldMap) -> Result<(), StoreError> {
        let mut stores = self.stores.write().await;
        let doc = stores
            .get_mut(store)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::not_found(store, id))?;
        doc.fields.extend(patch);
        Ok(())
    }

    async fn update_if(
        &self,
        store: &str,
        id: &str,
        guard: FieldFilter,
        patch: FieldMap,
    ) -> Result<bool, StoreError> {
        let mut stores = self.stores.write().await;
        let doc = stores
            .get_mut(store)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::not_found(store, id))?;
        if !guard.matches(&doc.fields) {
            return Ok(false);
        }
        doc.fields.extend(patch);
        Ok(true)
    }

    async fn delete(&self, store: &str, id: &str) -> Result<(), StoreError> {
        let mut stores = self.stores.write().await;
        if let Some(docs) = stores.get_mut(store) {
            docs.retain(|doc| doc.id != id);
        }
        Ok(())
    }
}
