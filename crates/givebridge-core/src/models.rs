use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::Category;
use crate::document::{
    Document, FIELD_AMOUNT, FIELD_CATEGORY, FIELD_CATEGORY_LEGACY, FIELD_CREATED_AT,
    FIELD_DESCRIPTION, FIELD_DISPLAY_NAME, FIELD_DONOR_ID, FIELD_EMAIL, FIELD_FULFILLED_AT,
    FIELD_ITEMS, FIELD_NAME, FIELD_ORGANIZATION_DETAILS, FIELD_PICKUP_ADDRESS,
    FIELD_RECIPIENT_ID, FIELD_REQUESTER, FIELD_STATUS, FIELD_TIME_SLOT,
};
use crate::storage::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
}

/// What a donation carries: goods for the item categories, an amount for
/// Monetary. Exactly one applies, keyed by the record's category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GiftPayload {
    Items(Vec<DonationItem>),
    Amount(Decimal),
}

/// One gift instance, immutable once written (scheduling metadata on
/// Clothing/Other records is the one exception).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub id: String,
    pub category: Category,
    pub donor_id: String,
    pub recipient_id: Option<String>,
    pub payload: GiftPayload,
    pub pickup_address: Option<String>,
    pub time_slot: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl DonationRecord {
    /// Decodes a raw document scanned from a category store. The category is
    /// taken from the store identity, never from document content; a stored
    /// `category`/`Category` field, if any, is ignored here.
    ///
    /// Decoding is tolerant where aggregation is tolerant: a Monetary record
    /// with a missing or unreadable amount decodes to zero, and item lists
    /// decode to whatever entries are well-formed.
    pub fn from_document(category: Category, doc: &Document) -> Result<Self, StoreError> {
        let store = category.store_name();
        let donor_id = doc
            .text_field(FIELD_DONOR_ID)
            .ok_or_else(|| StoreError::malformed(store, format!("{}: missing donorId", doc.id)))?
            .to_string();

        let payload = match category {
            Category::Monetary => {
                GiftPayload::Amount(doc.decimal_field(FIELD_AMOUNT).unwrap_or(Decimal::ZERO))
            }
            _ => GiftPayload::Items(decode_items(doc.fields.get(FIELD_ITEMS))),
        };

        Ok(DonationRecord {
            id: doc.id.clone(),
            category,
            donor_id,
            recipient_id: doc.text_field(FIELD_RECIPIENT_ID).map(str::to_string),
            payload,
            pickup_address: doc.text_field(FIELD_PICKUP_ADDRESS).map(str::to_string),
            time_slot: doc.text_field(FIELD_TIME_SLOT).map(str::to_string),
            created_at: doc.timestamp_field(FIELD_CREATED_AT),
        })
    }

    /// The monetary amount, present only on Monetary records.
    pub fn amount(&self) -> Option<Decimal> {
        match &self.payload {
            GiftPayload::Amount(amount) => Some(*amount),
            GiftPayload::Items(_) => None,
        }
    }

    pub fn items(&self) -> &[DonationItem] {
        match &self.payload {
            GiftPayload::Items(items) => items,
            GiftPayload::Amount(_) => &[],
        }
    }
}

fn decode_items(value: Option<&Value>) -> Vec<DonationItem> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let id = obj.get("id").and_then(Value::as_str)?.to_string();
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(&id)
                .to_string();
            let quantity = obj.get("quantity").and_then(Value::as_u64)? as u32;
            let unit_price = obj.get("unitPrice").and_then(|v| match v {
                Value::String(s) => s.trim().parse().ok(),
                Value::Number(n) => n.as_i64().map(Decimal::from).or_else(|| {
                    use rust_decimal::prelude::FromPrimitive;
                    n.as_f64().and_then(Decimal::from_f64)
                }),
                _ => None,
            });
            Some(DonationItem {
                id,
                name,
                quantity,
                unit_price,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Fulfilled,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Fulfilled => "fulfilled",
        }
    }

    /// The store accepts arbitrary status strings; anything unrecognized is
    /// logged and treated as pending.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "fulfilled" => RequestStatus::Fulfilled,
            "pending" => RequestStatus::Pending,
            other => {
                tracing::warn!(status = other, "unexpected request status, treating as pending");
                RequestStatus::Pending
            }
        }
    }
}

/// A recipient's open need. `donor_id` and `fulfilled_at` are set together
/// on fulfillment and never otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistRequest {
    pub id: String,
    pub recipient_id: String,
    pub name: String,
    pub category: Category,
    pub description: String,
    pub requester: String,
    pub status: RequestStatus,
    pub donor_id: Option<String>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl WishlistRequest {
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let store = crate::category::WISHLIST_STORE;
        let recipient_id = doc
            .text_field(FIELD_RECIPIENT_ID)
            .ok_or_else(|| {
                StoreError::malformed(store, format!("{}: missing recipientId", doc.id))
            })?
            .to_string();
        let category = category_field(doc).ok_or_else(|| {
            StoreError::malformed(store, format!("{}: missing or unknown category", doc.id))
        })?;
        let status = doc
            .str_field(FIELD_STATUS)
            .map(RequestStatus::parse_lossy)
            .unwrap_or(RequestStatus::Pending);

        Ok(WishlistRequest {
            id: doc.id.clone(),
            recipient_id,
            name: doc.text_field(FIELD_NAME).unwrap_or_default().to_string(),
            category,
            description: doc
                .text_field(FIELD_DESCRIPTION)
                .unwrap_or_default()
                .to_string(),
            requester: doc
                .text_field(FIELD_REQUESTER)
                .unwrap_or_default()
                .to_string(),
            status,
            donor_id: doc.text_field(FIELD_DONOR_ID).map(str::to_string),
            fulfilled_at: doc.timestamp_field(FIELD_FULFILLED_AT),
            created_at: doc.timestamp_field(FIELD_CREATED_AT),
        })
    }
}

/// Reads the category label, accepting the legacy `Category` capitalization
/// some historical write paths used. New writes always use the lowercase
/// field name.
pub fn category_field(doc: &Document) -> Option<Category> {
    doc.text_field(FIELD_CATEGORY)
        .or_else(|| doc.text_field(FIELD_CATEGORY_LEGACY))
        .and_then(Category::parse)
}

/// Cached projection of a `users` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub organization_details: Option<String>,
}

impl ActorProfile {
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let display_name = doc
            .text_field(FIELD_DISPLAY_NAME)
            .or_else(|| doc.text_field(FIELD_NAME))
            .ok_or_else(|| {
                StoreError::malformed(
                    crate::category::USERS_STORE,
                    format!("{}: missing displayName", doc.id),
                )
            })?
            .to_string();

        Ok(ActorProfile {
            id: doc.id.clone(),
            display_name,
            email: doc.text_field(FIELD_EMAIL).map(str::to_string),
            organization_details: doc
                .text_field(FIELD_ORGANIZATION_DETAILS)
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        let Value::Object(map) = fields else {
            panic!("fields must be an object")
        };
        Document::new(id, map)
    }

    #[test]
    fn donation_decodes_with_category_from_store_identity() {
        let d = doc(
            "f1",
            json!({
                "donorId": "d1",
                "recipientId": "r1",
                "Category": "money",
                "items": [{ "id": "rice", "name": "Rice", "quantity": 2 }],
            }),
        );
        // Scanned from the food store, so the stored label is ignored.
        let record = DonationRecord::from_document(Category::Food, &d).unwrap();
        assert_eq!(record.category, Category::Food);
        assert_eq!(record.items().len(), 1);
        assert_eq!(record.amount(), None);
    }

    #[test]
    fn monetary_record_with_missing_amount_decodes_to_zero() {
        let d = doc("m1", json!({ "donorId": "d1" }));
        let record = DonationRecord::from_document(Category::Monetary, &d).unwrap();
        assert_eq!(record.amount(), Some(Decimal::ZERO));
    }

    #[test]
    fn donation_without_donor_is_malformed() {
        let d = doc("f1", json!({ "items": [] }));
        assert!(DonationRecord::from_document(Category::Food, &d).is_err());
    }

    #[test]
    fn request_decodes_legacy_category_capitalization() {
        let d = doc(
            "r1",
            json!({
                "recipientId": "org1",
                "Category": "clothes",
                "name": "Winter coats",
                "status": "pending",
            }),
        );
        let request = WishlistRequest::from_document(&d).unwrap();
        assert_eq!(request.category, Category::Clothing);
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[test]
    fn unknown_status_decodes_as_pending() {
        let d = doc(
            "r1",
            json!({
                "recipientId": "org1",
                "category": "food",
                "status": "rejected",
            }),
        );
        let request = WishlistRequest::from_document(&d).unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[test]
    fn fulfilled_request_decodes_donor_and_timestamp() {
        let d = doc(
            "r1",
            json!({
                "recipientId": "org1",
                "category": "food",
                "status": "fulfilled",
                "donorId": "d9",
                "fulfilledAt": "2026-03-01T10:00:00+00:00",
            }),
        );
        let request = WishlistRequest::from_document(&d).unwrap();
        assert_eq!(request.status, RequestStatus::Fulfilled);
        assert_eq!(request.donor_id.as_deref(), Some("d9"));
        assert!(request.fulfilled_at.is_some());
    }

    #[test]
    fn profile_falls_back_to_name_field() {
        let d = doc("u1", json!({ "name": "Food Bank", "email": "fb@example.org" }));
        let profile = ActorProfile::from_document(&d).unwrap();
        assert_eq!(profile.display_name, "Food Bank");
        assert_eq!(profile.email.as_deref(), Some("fb@example.org"));
    }
}
