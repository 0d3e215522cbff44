use async_trait::async_trait;
use thiserror::Error;

use crate::document::{Document, FieldFilter, FieldMap};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store {store} unavailable: {reason}")]
    Unavailable { store: String, reason: String },
    #[error("document {id} not found in {store}")]
    NotFound { store: String, id: String },
    #[error("malformed document in {store}: {reason}")]
    Malformed { store: String, reason: String },
}

impl StoreError {
    pub fn unavailable(store: &str, reason: impl ToString) -> Self {
        StoreError::Unavailable {
            store: store.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(store: &str, id: &str) -> Self {
        StoreError::NotFound {
            store: store.to_string(),
            id: id.to_string(),
        }
    }

    pub fn malformed(store: &str, reason: impl ToString) -> Self {
        StoreError::Malformed {
            store: store.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The document-store protocol every backend implements. Writes are
/// eventually consistent: nothing here assumes read-your-writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Equality-filtered scan of one store.
    async fn query(&self, store: &str, filter: FieldFilter) -> Result<Vec<Document>, StoreError>;

    /// Point lookup by id; `None` when absent.
    async fn get(&self, store: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Inserts a document. The store assigns the id and the `createdAt`
    /// timestamp; any client-supplied `createdAt` is overwritten.
    async fn add(&self, store: &str, fields: FieldMap) -> Result<Document, StoreError>;

    /// Unconditional partial update (last write wins).
    async fn update(&self, store: &str, id: &str, patch: FieldMap) -> Result<(), StoreError>;

    /// Applies the patch only while the guard field still holds the given
    /// value; returns whether the write landed.
    async fn update_if(
        &self,
        store: &str,
        id: &str,
        guard: FieldFilter,
        patch: FieldMap,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, store: &str, id: &str) -> Result<(), StoreError>;
}
