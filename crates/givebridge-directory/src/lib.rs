use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use givebridge_core::{ActorProfile, DocumentStore, StoreError, USERS_STORE};

/// Resolves opaque actor ids to display profiles, memoizing hits for the
/// lifetime of the directory. The cache lives on this value rather than in
/// module state so every call site (and every test) decides which cache it
/// shares. No eviction, no TTL: per-session actor counts stay small.
pub struct ProfileDirectory {
    store: Arc<dyn DocumentStore>,
    cache: RwLock<HashMap<String, ActorProfile>>,
}

impl ProfileDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up one actor. Found profiles are cached; a store-miss is NOT
    /// cached, so a profile created after a lost race is picked up on the
    /// next call. Store errors propagate and leave the cache untouched.
    pub async fn resolve(&self, actor_id: &str) -> Result<Option<ActorProfile>, StoreError> {
        let actor_id = actor_id.trim();
        if actor_id.is_empty() {
            return Ok(None);
        }

        if let Some(profile) = self.cache.read().await.get(actor_id) {
            return Ok(Some(profile.clone()));
        }

        let Some(doc) = self.store.get(USERS_STORE, actor_id).await? else {
            return Ok(None);
        };
        let profile = ActorProfile::from_document(&doc)?;

        self.cache
            .write()
            .await
            .insert(actor_id.to_string(), profile.clone());
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use givebridge_core::{Document, FieldFilter, FieldMap};
    use givebridge_memstore::InMemoryDocumentStore;

    use super::*;

    /// Store wrapper that counts point lookups, so cache behavior is
    /// observable.
    struct CountingStore {
        inner: InMemoryDocumentStore,
        gets: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryDocumentStore::new(),
                gets: AtomicUsize::new(0),
            }
        }

        fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn query(
            &self,
            store: &str,
            filter: FieldFilter,
        ) -> Result<Vec<Document>, StoreError> {
            self.inner.query(store, filter).await
        }

        async fn get(&self, store: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(store, id).await
        }

        async fn add(&self, store: &str, fields: FieldMap) -> Result<Document, StoreError> {
            self.inner.add(store, fields).await
        }

        async fn update(&self, store: &str, id: &str, patch: FieldMap) -> Result<(), StoreError> {
            self.inner.update(store, id, patch).await
        }

        async fn update_if(
            &self,
            store: &str,
            id: &str,
            guard: FieldFilter,
            patch: FieldMap,
        ) -> Result<bool, StoreError> {
            self.inner.update_if(store, id, guard, patch).await
        }

        async fn delete(&self, store: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(store, id).await
        }
    }

    fn fields(value: Value) -> FieldMap {
        let Value::Object(map) = value else {
            panic!("fields must be an object")
        };
        map
    }

    async fn seed_profile(store: &CountingStore, id: &str, name: &str) {
        store
            .inner
            .seed(USERS_STORE, id, fields(json!({ "displayName": name })))
            .await;
    }

    #[tokio::test]
    async fn second_resolve_hits_cache_without_store_read() {
        let store = Arc::new(CountingStore::new());
        seed_profile(&store, "u1", "Food Bank").await;
        let directory = ProfileDirectory::new(store.clone());

        let first = directory.resolve("u1").await.expect("resolve").expect("profile");
        let second = directory.resolve("u1").await.expect("resolve").expect("profile");

        assert_eq!(first, second);
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn store_miss_is_not_cached() {
        let store = Arc::new(CountingStore::new());
        let directory = ProfileDirectory::new(store.clone());

        assert!(directory.resolve("u-later").await.expect("resolve").is_none());
        assert_eq!(store.get_count(), 1);

        // Profile shows up afterwards; a cached negative would hide it.
        seed_profile(&store, "u-later", "Late Donor").await;
        let resolved = directory.resolve("u-later").await.expect("resolve");
        assert_eq!(
            resolved.map(|p| p.display_name),
            Some("Late Donor".to_string())
        );
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test]
    async fn empty_actor_id_resolves_without_store_call() {
        let store = Arc::new(CountingStore::new());
        let directory = ProfileDirectory::new(store.clone());

        assert!(directory.resolve("  ").await.expect("resolve").is_none());
        assert_eq!(store.get_count(), 0);
    }

    #[tokio::test]
    async fn separate_directories_do_not_share_cache() {
        let store = Arc::new(CountingStore::new());
        seed_profile(&store, "u2", "Shelter").await;

        let a = ProfileDirectory::new(store.clone());
        let b = ProfileDirectory::new(store.clone());
        a.resolve("u2").await.expect("resolve");
        b.resolve("u2").await.expect("resolve");

        assert_eq!(store.get_count(), 2);
    }
}
