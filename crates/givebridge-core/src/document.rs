use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;

pub type FieldMap = serde_json::Map<String, Value>;

pub const FIELD_DONOR_ID: &str = "donorId";
pub const FIELD_RECIPIENT_ID: &str = "recipientId";
pub const FIELD_CATEGORY: &str = "category";
/// Legacy capitalization written by some historical clients; read-side only.
pub const FIELD_CATEGORY_LEGACY: &str = "Category";
pub const FIELD_CREATED_AT: &str = "createdAt";
pub const FIELD_FULFILLED_AT: &str = "fulfilledAt";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_ITEMS: &str = "items";
pub const FIELD_AMOUNT: &str = "amount";
pub const FIELD_PICKUP_ADDRESS: &str = "pickupAddress";
pub const FIELD_TIME_SLOT: &str = "timeSlot";
pub const FIELD_NAME: &str = "name";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_REQUESTER: &str = "requester";
pub const FIELD_DISPLAY_NAME: &str = "displayName";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_ORGANIZATION_DETAILS: &str = "organizationDetails";

/// One stored document: the store-assigned id plus its field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: FieldMap,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Reads a non-empty string field; blank values count as unset.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.str_field(name).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Decimals are stored as JSON strings by this codebase, but historical
    /// writers stored plain numbers; both decode.
    pub fn decimal_field(&self, name: &str) -> Option<Decimal> {
        match self.fields.get(name)? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n
                .as_i64()
                .map(Decimal::from)
                .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
            _ => None,
        }
    }

    pub fn timestamp_field(&self, name: &str) -> Option<DateTime<Utc>> {
        self.str_field(name)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

pub fn decimal_value(amount: Decimal) -> Value {
    Value::String(amount.to_string())
}

/// Single-field equality predicate, the only filter shape the document
/// stores support.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub equals: Value,
}

impl FieldFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            equals: value.into(),
        }
    }

    pub fn matches(&self, fields: &FieldMap) -> bool {
        fields.get(&self.field) == Some(&self.equals)
    }
}
