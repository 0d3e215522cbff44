use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use givebridge_core::document::{FIELD_DONOR_ID, FIELD_RECIPIENT_ID};
use givebridge_core::{Category, DocumentStore, DonationRecord, FieldFilter};
use givebridge_directory::ProfileDirectory;

/// Which side of a donation an actor id is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Donor,
    Recipient,
}

impl ActorRole {
    pub fn filter_field(self) -> &'static str {
        match self {
            ActorRole::Donor => FIELD_DONOR_ID,
            ActorRole::Recipient => FIELD_RECIPIENT_ID,
        }
    }
}

/// Raw scan result: records across all category stores, plus the stores
/// that could not be queried. History views tolerate partial data, so a
/// failing store is reported, not fatal.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub records: Vec<DonationRecord>,
    pub unavailable: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub record: DonationRecord,
    /// Display name of the other party, when that actor resolved.
    pub counterpart_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTotals {
    pub count: u64,
    pub monetary_sum: Decimal,
    pub per_category: BTreeMap<Category, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationHistory {
    pub entries: Vec<HistoryEntry>,
    pub totals: HistoryTotals,
    pub unavailable: Vec<Category>,
}

/// Scans the per-category donation stores for one actor and merges the
/// results into a single time-ordered, summarized view.
pub struct HistoryService {
    store: Arc<dyn DocumentStore>,
    directory: Arc<ProfileDirectory>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn DocumentStore>, directory: Arc<ProfileDirectory>) -> Self {
        Self { store, directory }
    }

    /// One equality query per category store, in the fixed category order.
    /// Every record is labeled by the store it came from; documents that do
    /// not decode are skipped with a warning.
    pub async fn scan(&self, actor_id: &str, role: ActorRole) -> ScanOutcome {
        let mut records = Vec::new();
        let mut unavailable = Vec::new();

        for category in Category::ALL {
            let filter = FieldFilter::equals(role.filter_field(), actor_id);
            match self.store.query(category.store_name(), filter).await {
                Ok(docs) => {
                    for doc in docs {
                        match DonationRecord::from_document(category, &doc) {
                            Ok(record) => records.push(record),
                            Err(err) => {
                                warn!(store = category.store_name(), %err, "skipping document")
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(store = category.store_name(), %err, "store unavailable during scan");
                    unavailable.push(category);
                }
            }
        }

        ScanOutcome {
            records,
            unavailable,
        }
    }

    /// Full history view for one actor: scan, attach counterpart display
    /// names, sort newest-first, summarize.
    pub async fn aggregate(&self, actor_id: &str, role: ActorRole) -> DonationHistory {
        let ScanOutcome {
            mut records,
            unavailable,
        } = self.scan(actor_id, role).await;

        // Newest first; records without a timestamp sort after everything
        // that has one, so they never dominate recent-activity views.
        records.sort_by(|a, b| match (a.created_at, b.created_at) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        let totals = summarize(&records);

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let counterpart = match role {
                ActorRole::Donor => record.recipient_id.as_deref(),
                ActorRole::Recipient => Some(record.donor_id.as_str()),
            };
            let counterpart_name = match counterpart {
                Some(id) => match self.directory.resolve(id).await {
                    Ok(profile) => profile.map(|p| p.display_name),
                    Err(err) => {
                        warn!(actor = id, %err, "counterpart lookup failed");
                        None
                    }
                },
                None => None,
            };
            entries.push(HistoryEntry {
                record,
                counterpart_name,
            });
        }

        DonationHistory {
            entries,
            totals,
            unavailable,
        }
    }
}

fn summarize(records: &[DonationRecord]) -> HistoryTotals {
    let mut per_category: BTreeMap<Category, u64> =
        Category::ALL.into_iter().map(|c| (c, 0)).collect();
    let mut monetary_sum = Decimal::ZERO;

    for record in records {
        *per_category.entry(record.category).or_default() += 1;
        if record.category == Category::Monetary {
            monetary_sum += record.amount().unwrap_or(Decimal::ZERO);
        }
    }

    HistoryTotals {
        count: records.len() as u64,
        monetary_sum,
        per_category,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use givebridge_core::{Document, FieldMap, StoreError};
    use givebridge_memstore::InMemoryDocumentStore;

    use super::*;

    fn fields(value: Value) -> FieldMap {
        let Value::Object(map) = value else {
            panic!("fields must be an object")
        };
        map
    }

    fn service(store: Arc<dyn DocumentStore>) -> HistoryService {
        let directory = Arc::new(ProfileDirectory::new(store.clone()));
        HistoryService::new(store, directory)
    }

    async fn seed_donation(store: &InMemoryDocumentStore, category: Category, id: &str, body: Value) {
        store.seed(category.store_name(), id, fields(body)).await;
    }

    #[tokio::test]
    async fn records_sort_newest_first_with_missing_timestamps_last() {
        let store = Arc::new(InMemoryDocumentStore::new());
        seed_donation(
            &store,
            Category::Food,
            "old",
            json!({ "donorId": "d1", "createdAt": "2026-01-01T00:00:00+00:00" }),
        )
        .await;
        seed_donation(
            &store,
            Category::Clothing,
            "new",
            json!({ "donorId": "d1", "createdAt": "2026-02-01T00:00:00+00:00" }),
        )
        .await;
        // Legacy document with no timestamp at all.
        seed_donation(&store, Category::Other, "untimed", json!({ "donorId": "d1" })).await;

        let history = service(store).aggregate("d1", ActorRole::Donor).await;
        let ids: Vec<&str> = history.entries.iter().map(|e| e.record.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "untimed"]);
    }

    #[tokio::test]
    async fn category_labels_come_from_store_identity() {
        let store = Arc::new(InMemoryDocumentStore::new());
        // The stored label disagrees with the store; the store wins.
        seed_donation(
            &store,
            Category::Food,
            "f1",
            json!({ "donorId": "d1", "category": "money" }),
        )
        .await;

        let history = service(store).aggregate("d1", ActorRole::Donor).await;
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.entries[0].record.category, Category::Food);
        assert_eq!(history.totals.per_category[&Category::Food], 1);
        assert_eq!(history.totals.per_category[&Category::Monetary], 0);
    }

    #[tokio::test]
    async fn monetary_sum_counts_only_monetary_records() {
        let store = Arc::new(InMemoryDocumentStore::new());
        seed_donation(
            &store,
            Category::Monetary,
            "m1",
            json!({ "donorId": "d1", "amount": "25.50" }),
        )
        .await;
        seed_donation(
            &store,
            Category::Monetary,
            "m2",
            json!({ "donorId": "d1", "amount": 10 }),
        )
        .await;
        // Missing amount contributes zero rather than poisoning the sum.
        seed_donation(&store, Category::Monetary, "m3", json!({ "donorId": "d1" })).await;
        // An item donation never contributes, whatever its unit prices say.
        seed_donation(
            &store,
            Category::Food,
            "f1",
            json!({
                "donorId": "d1",
                "items": [{ "id": "rice", "quantity": 4, "unitPrice": "99.99" }],
            }),
        )
        .await;

        let history = service(store).aggregate("d1", ActorRole::Donor).await;
        assert_eq!(history.totals.monetary_sum, Decimal::new(3550, 2));
        assert_eq!(history.totals.count, 4);
    }

    #[tokio::test]
    async fn actor_present_in_single_store_aggregates_alone() {
        let store = Arc::new(InMemoryDocumentStore::new());
        seed_donation(&store, Category::Other, "o1", json!({ "donorId": "d7" })).await;

        let history = service(store).aggregate("d7", ActorRole::Donor).await;
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.totals.count, 1);
        assert_eq!(history.totals.per_category[&Category::Other], 1);
        for category in [Category::Food, Category::Clothing, Category::Monetary] {
            assert_eq!(history.totals.per_category[&category], 0);
        }
        assert_eq!(history.totals.monetary_sum, Decimal::ZERO);
    }

    #[tokio::test]
    async fn recipient_role_filters_on_recipient_id_and_names_the_donor() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .seed(
                givebridge_core::USERS_STORE,
                "d1",
                fields(json!({ "displayName": "Jordan" })),
            )
            .await;
        seed_donation(
            &store,
            Category::Food,
            "f1",
            json!({ "donorId": "d1", "recipientId": "org1" }),
        )
        .await;

        let history = service(store).aggregate("org1", ActorRole::Recipient).await;
        assert_eq!(history.entries.len(), 1);
        assert_eq!(
            history.entries[0].counterpart_name.as_deref(),
            Some("Jordan")
        );
    }

    /// Store wrapper that fails queries against one named store.
    struct PartiallyDownStore {
        inner: InMemoryDocumentStore,
        down: &'static str,
    }

    #[async_trait]
    impl DocumentStore for PartiallyDownStore {
        async fn query(
            &self,
            store: &str,
            filter: FieldFilter,
        ) -> Result<Vec<Document>, StoreError> {
            if store == self.down {
                return Err(StoreError::unavailable(store, "connection reset"));
            }
            self.inner.query(store, filter).await
        }

        async fn get(&self, store: &str, id: &str) -> Result<Option<Document>, StoreError> {
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

    #[tokio::test]
    async fn one_failing_store_does_not_abort_the_scan() {
        let inner = InMemoryDocumentStore::new();
        inner
            .seed(
                Category::Food.store_name(),
                "f1",
                fields(json!({ "donorId": "d1" })),
            )
            .await;
        let store = Arc::new(PartiallyDownStore {
            inner,
            down: Category::Clothing.store_name(),
        });

        let history = service(store).aggregate("d1", ActorRole::Donor).await;
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.unavailable, vec![Category::Clothing]);
    }
}
