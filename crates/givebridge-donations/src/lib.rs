use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Value, json};
use thiserror::Error;

use givebridge_core::document::{
    FIELD_AMOUNT, FIELD_CATEGORY, FIELD_DONOR_ID, FIELD_ITEMS, FIELD_PICKUP_ADDRESS,
    FIELD_RECIPIENT_ID, FIELD_TIME_SLOT, decimal_value,
};
use givebridge_core::{
    Category, DocumentStore, DonationItem, DonationRecord, FieldMap, GiftPayload, StoreError,
};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{0:?} donations carry items, not an amount")]
    ExpectedItems(Category),
    #[error("monetary donations carry an amount, not items")]
    ExpectedAmount,
    #[error("a donation needs at least one item")]
    NoItems,
    #[error("item {id} has zero quantity")]
    ZeroQuantity { id: String },
    #[error("monetary donation amount must be positive")]
    NonPositiveAmount,
    #[error("a pickup time slot needs a pickup address")]
    MissingPickupAddress,
    #[error("{0:?} donations carry no scheduling metadata")]
    NotReschedulable(Category),
    #[error("only the original donor may reschedule a donation")]
    NotAuthor,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A donation as submitted, before the store has assigned id and timestamp.
#[derive(Debug, Clone)]
pub struct DonationDraft {
    pub category: Category,
    pub donor_id: String,
    pub recipient_id: Option<String>,
    pub payload: GiftPayload,
    pub pickup_address: Option<String>,
    pub time_slot: Option<String>,
}

/// Validates and persists new donation records into the correct category
/// store. Recording never touches wishlist state; fulfilling a request is a
/// separate step owned by the caller.
pub struct DonationRecorder {
    store: Arc<dyn DocumentStore>,
}

impl DonationRecorder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persists one donation. All validation happens before any store call;
    /// the store assigns the id and `createdAt` (client clocks are never
    /// trusted for either).
    pub async fn record(&self, draft: DonationDraft) -> Result<DonationRecord, RecordError> {
        validate(&draft)?;

        let mut fields = FieldMap::new();
        fields.insert(
            FIELD_DONOR_ID.to_string(),
            Value::String(draft.donor_id.clone()),
        );
        if let Some(recipient_id) = &draft.recipient_id {
            fields.insert(
                FIELD_RECIPIENT_ID.to_string(),
                Value::String(recipient_id.clone()),
            );
        }
        fields.insert(
            FIELD_CATEGORY.to_string(),
            Value::String(draft.category.label().to_string()),
        );
        match &draft.payload {
            GiftPayload::Items(items) => {
                fields.insert(FIELD_ITEMS.to_string(), encode_items(items));
            }
            GiftPayload::Amount(amount) => {
                fields.insert(FIELD_AMOUNT.to_string(), decimal_value(*amount));
            }
        }
        if let Some(address) = &draft.pickup_address {
            fields.insert(
                FIELD_PICKUP_ADDRESS.to_string(),
                Value::String(address.clone()),
            );
        }
        if let Some(slot) = &draft.time_slot {
            fields.insert(FIELD_TIME_SLOT.to_string(), Value::String(slot.clone()));
        }

        let doc = self.store.add(draft.category.store_name(), fields).await?;
        Ok(DonationRecord::from_document(draft.category, &doc)?)
    }

    /// Updates the scheduling metadata of an already-recorded Clothing or
    /// Other donation. Only the original donor may do this; the check reads
    /// the stored `donorId`, since the store itself enforces nothing.
    pub async fn reschedule(
        &self,
        category: Category,
        record_id: &str,
        donor_id: &str,
        pickup_address: String,
        time_slot: Option<String>,
    ) -> Result<(), RecordError> {
        if !matches!(category, Category::Clothing | Category::Other) {
            return Err(RecordError::NotReschedulable(category));
        }
        if pickup_address.trim().is_empty() {
            return Err(RecordError::MissingPickupAddress);
        }

        let store_name = category.store_name();
        let doc = self
            .store
            .get(store_name, record_id)
            .await?
            .ok_or_else(|| StoreError::not_found(store_name, record_id))?;
        if doc.text_field(FIELD_DONOR_ID) != Some(donor_id) {
            return Err(RecordError::NotAuthor);
        }

        let mut patch = FieldMap::new();
        patch.insert(
            FIELD_PICKUP_ADDRESS.to_string(),
            Value::String(pickup_address),
        );
        if let Some(slot) = time_slot {
            patch.insert(FIELD_TIME_SLOT.to_string(), Value::String(slot));
        }
        self.store.update(store_name, record_id, patch).await?;
        Ok(())
    }
}

fn validate(draft: &DonationDraft) -> Result<(), RecordError> {
    match (&draft.category, &draft.payload) {
        (Category::Monetary, GiftPayload::Items(_)) => return Err(RecordError::ExpectedAmount),
        (Category::Monetary, GiftPayload::Amount(amount)) => {
            if *amount <= Decimal::ZERO {
                return Err(RecordError::NonPositiveAmount);
            }
        }
        (category, GiftPayload::Amount(_)) => {
            return Err(RecordError::ExpectedItems(*category));
        }
        (_, GiftPayload::Items(items)) => {
            if items.is_empty() {
                return Err(RecordError::NoItems);
            }
            if let Some(item) = items.iter().find(|item| item.quantity == 0) {
                return Err(RecordError::ZeroQuantity {
                    id: item.id.clone(),
                });
            }
        }
    }

    let has_address = draft
        .pickup_address
        .as_deref()
        .is_some_and(|a| !a.trim().is_empty());
    if draft.time_slot.is_some() && !has_address {
        return Err(RecordError::MissingPickupAddress);
    }

    Ok(())
}

fn encode_items(items: &[DonationItem]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|item| {
                let mut entry = json!({
                    "id": item.id,
                    "name": item.name,
                    "quantity": item.quantity,
                });
                if let Some(price) = item.unit_price {
                    entry["unitPrice"] = decimal_value(price);
                }
                entry
            })
            .collect(),
    )
}
