pub mod saga;

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use givebridge_core::document::{
    FIELD_CATEGORY, FIELD_DESCRIPTION, FIELD_DONOR_ID, FIELD_FULFILLED_AT, FIELD_NAME,
    FIELD_RECIPIENT_ID, FIELD_REQUESTER, FIELD_STATUS, timestamp_value,
};
use givebridge_core::{
    Category, DocumentStore, FieldFilter, FieldMap, RequestStatus, StoreError, WISHLIST_STORE,
    WishlistRequest,
};

pub use saga::{FulfillmentSaga, SagaOutcome};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("wishlist request {0} not found")]
    NotFound(String),
    #[error("wishlist request {0} is already fulfilled")]
    AlreadyFulfilled(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RequestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => RequestError::NotFound(id),
            other => RequestError::Store(other),
        }
    }
}

/// How `fulfill` treats a request that another donor is fulfilling at the
/// same time.
///
/// The original client had no guard at all: two donors fulfilling the same
/// pending request both succeeded and the last write won. `LastWriteWins`
/// reproduces that behavior and is the default; `CompareAndSwap` flips the
/// document only while it is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FulfillmentGuard {
    #[default]
    LastWriteWins,
    CompareAndSwap,
}

#[derive(Debug, Clone)]
pub struct RequestDraft {
    pub name: String,
    pub category: Category,
    pub description: String,
    pub requester: String,
}

/// State machine for a recipient's wishlist entry: `pending` on creation,
/// `fulfilled` exactly once, no other transitions.
pub struct RequestLifecycle {
    store: Arc<dyn DocumentStore>,
    guard: FulfillmentGuard,
}

impl RequestLifecycle {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_guard(store, FulfillmentGuard::default())
    }

    pub fn with_guard(store: Arc<dyn DocumentStore>, guard: FulfillmentGuard) -> Self {
        Self { store, guard }
    }

    pub async fn create(
        &self,
        recipient_id: &str,
        draft: RequestDraft,
    ) -> Result<WishlistRequest, RequestError> {
        let mut fields = FieldMap::new();
        fields.insert(
            FIELD_RECIPIENT_ID.to_string(),
            Value::String(recipient_id.to_string()),
        );
        fields.insert(FIELD_NAME.to_string(), Value::String(draft.name));
        fields.insert(
            FIELD_CATEGORY.to_string(),
            Value::String(draft.category.label().to_string()),
        );
        fields.insert(
            FIELD_DESCRIPTION.to_string(),
            Value::String(draft.description),
        );
        fields.insert(FIELD_REQUESTER.to_string(), Value::String(draft.requester));
        fields.insert(
            FIELD_STATUS.to_string(),
            Value::String(RequestStatus::Pending.as_str().to_string()),
        );

        let doc = self.store.add(WISHLIST_STORE, fields).await?;
        Ok(WishlistRequest::from_document(&doc)?)
    }

    pub async fn get(&self, request_id: &str) -> Result<Option<WishlistRequest>, RequestError> {
        match self.store.get(WISHLIST_STORE, request_id).await? {
            Some(doc) => Ok(Some(WishlistRequest::from_document(&doc)?)),
            None => Ok(None),
        }
    }

    /// Rewrites the describable fields of a request. Permitted only while
    /// the stored status is still pending; this is a client-level check, the
    /// store itself would accept the write regardless.
    pub async fn edit(&self, request_id: &str, draft: RequestDraft) -> Result<(), RequestError> {
        let current = self
            .get(request_id)
            .await?
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))?;
        if current.status == RequestStatus::Fulfilled {
            return Err(RequestError::AlreadyFulfilled(request_id.to_string()));
        }

        let mut patch = FieldMap::new();
        patch.insert(FIELD_NAME.to_string(), Value::String(draft.name));
        patch.insert(
            FIELD_CATEGORY.to_string(),
            Value::String(draft.category.label().to_string()),
        );
        patch.insert(
            FIELD_DESCRIPTION.to_string(),
            Value::String(draft.description),
        );
        patch.insert(FIELD_REQUESTER.to_string(), Value::String(draft.requester));
        self.store.update(WISHLIST_STORE, request_id, patch).await?;
        Ok(())
    }

    /// Transitions a request to fulfilled for the given donor, stamping the
    /// fulfillment time. Under `LastWriteWins` a concurrent fulfillment by
    /// another donor also succeeds and whichever write lands last sticks;
    /// under `CompareAndSwap` the loser gets `AlreadyFulfilled`.
    ///
    /// This does NOT record the fulfilling donation; see
    /// [`saga::FulfillmentSaga`] for the two-step flow and its failure mode.
    pub async fn fulfill(
        &self,
        request_id: &str,
        donor_id: &str,
    ) -> Result<WishlistRequest, RequestError> {
        let mut patch = FieldMap::new();
        patch.insert(
            FIELD_STATUS.to_string(),
            Value::String(RequestStatus::Fulfilled.as_str().to_string()),
        );
        patch.insert(
            FIELD_DONOR_ID.to_string(),
            Value::String(donor_id.to_string()),
        );
        patch.insert(FIELD_FULFILLED_AT.to_string(), timestamp_value(Utc::now()));

        match self.guard {
            FulfillmentGuard::LastWriteWins => {
                self.store.update(WISHLIST_STORE, request_id, patch).await?;
            }
            FulfillmentGuard::CompareAndSwap => {
                let pending = FieldFilter::equals(FIELD_STATUS, RequestStatus::Pending.as_str());
                let landed = self
                    .store
                    .update_if(WISHLIST_STORE, request_id, pending, patch)
                    .await?;
                if !landed {
                    return Err(RequestError::AlreadyFulfilled(request_id.to_string()));
                }
            }
        }

        self.get(request_id)
            .await?
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))
    }

    /// Removes a request. Ownership is the caller's concern; no check exists
    /// at this layer, as in the original data-access code.
    pub async fn delete(&self, request_id: &str) -> Result<(), RequestError> {
        self.store.delete(WISHLIST_STORE, request_id).await?;
        Ok(())
    }

    pub async fn open_requests(&self) -> Result<Vec<WishlistRequest>, RequestError> {
        self.requests_matching(FieldFilter::equals(
            FIELD_STATUS,
            RequestStatus::Pending.as_str(),
        ))
        .await
    }

    pub async fn requests_for(
        &self,
        recipient_id: &str,
    ) -> Result<Vec<WishlistRequest>, RequestError> {
        self.requests_matching(FieldFilter::equals(FIELD_RECIPIENT_ID, recipient_id))
            .await
    }

    async fn requests_matching(
        &self,
        filter: FieldFilter,
    ) -> Result<Vec<WishlistRequest>, RequestError> {
        let docs = self.store.query(WISHLIST_STORE, filter).await?;
        let mut requests = Vec::with_capacity(docs.len());
        for doc in docs {
            match WishlistRequest::from_document(&doc) {
                Ok(request) => requests.push(request),
                Err(err) => tracing::warn!(%err, "skipping wishlist document"),
            }
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use givebridge_memstore::InMemoryDocumentStore;

    use super::*;

    fn draft(name: &str) -> RequestDraft {
        RequestDraft {
            name: name.to_string(),
            category: Category::Food,
            description: "staples for the week".to_string(),
            requester: "Casey".to_string(),
        }
    }

    fn lifecycle(guard: FulfillmentGuard) -> RequestLifecycle {
        RequestLifecycle::with_guard(Arc::new(InMemoryDocumentStore::new()), guard)
    }

    #[tokio::test]
    async fn fulfillment_sets_status_donor_and_timestamp_together() {
        let lifecycle = lifecycle(FulfillmentGuard::LastWriteWins);
        let request = lifecycle.create("org1", draft("Rice")).await.expect("create");

        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.donor_id.is_none());
        assert!(request.fulfilled_at.is_none());

        lifecycle.fulfill(&request.id, "d9").await.expect("fulfill");

        let after = lifecycle
            .get(&request.id)
            .await
            .expect("get")
            .expect("request");
        assert_eq!(after.status, RequestStatus::Fulfilled);
        assert_eq!(after.donor_id.as_deref(), Some("d9"));
        assert!(after.fulfilled_at.is_some());
    }

    #[tokio::test]
    async fn edit_is_rejected_once_fulfilled() {
        let lifecycle = lifecycle(FulfillmentGuard::LastWriteWins);
        let request = lifecycle.create("org1", draft("Rice")).await.expect("create");

        lifecycle
            .edit(&request.id, draft("Rice and beans"))
            .await
            .expect("edit while pending");

        lifecycle.fulfill(&request.id, "d9").await.expect("fulfill");

        assert!(matches!(
            lifecycle.edit(&request.id, draft("Too late")).await,
            Err(RequestError::AlreadyFulfilled(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_fulfillments_both_succeed_last_write_wins() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let lifecycle = Arc::new(RequestLifecycle::new(store));
        let request = lifecycle.create("org1", draft("Rice")).await.expect("create");

        let a = {
            let lifecycle = lifecycle.clone();
            let id = request.id.clone();
            tokio::spawn(async move { lifecycle.fulfill(&id, "donor-a").await })
        };
        let b = {
            let lifecycle = lifecycle.clone();
            let id = request.id.clone();
            tokio::spawn(async move { lifecycle.fulfill(&id, "donor-b").await })
        };

        // Neither call errors; the race is preserved, not prevented.
        a.await.expect("join").expect("fulfill a");
        b.await.expect("join").expect("fulfill b");

        let after = lifecycle
            .get(&request.id)
            .await
            .expect("get")
            .expect("request");
        assert_eq!(after.status, RequestStatus::Fulfilled);
        let winner = after.donor_id.expect("donor recorded");
        assert!(winner == "donor-a" || winner == "donor-b");
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_the_second_donor() {
        let lifecycle = lifecycle(FulfillmentGuard::CompareAndSwap);
        let request = lifecycle.create("org1", draft("Rice")).await.expect("create");

        lifecycle
            .fulfill(&request.id, "donor-a")
            .await
            .expect("first fulfill");

        assert!(matches!(
            lifecycle.fulfill(&request.id, "donor-b").await,
            Err(RequestError::AlreadyFulfilled(_))
        ));

        let after = lifecycle
            .get(&request.id)
            .await
            .expect("get")
            .expect("request");
        assert_eq!(after.donor_id.as_deref(), Some("donor-a"));
    }

    #[tokio::test]
    async fn open_requests_lists_only_pending_entries() {
        let lifecycle = lifecycle(FulfillmentGuard::LastWriteWins);
        let kept = lifecycle.create("org1", draft("Rice")).await.expect("create");
        let done = lifecycle.create("org2", draft("Coats")).await.expect("create");
        lifecycle.fulfill(&done.id, "d1").await.expect("fulfill");

        let open = lifecycle.open_requests().await.expect("open_requests");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, kept.id);
    }

    #[tokio::test]
    async fn delete_removes_the_request() {
        let lifecycle = lifecycle(FulfillmentGuard::LastWriteWins);
        let request = lifecycle.create("org1", draft("Rice")).await.expect("create");

        lifecycle.delete(&request.id).await.expect("delete");
        assert!(lifecycle.get(&request.id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn fulfilling_a_missing_request_reports_not_found() {
        let lifecycle = lifecycle(FulfillmentGuard::LastWriteWins);
        assert!(matches!(
            lifecycle.fulfill("ghost", "d1").await,
            Err(RequestError::NotFound(_))
        ));
    }
}
