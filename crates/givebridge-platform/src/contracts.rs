use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use givebridge_core::{
    ActorProfile, Category, DonationItem, DonationRecord, GiftPayload, RequestStatus,
    WishlistRequest,
};
use givebridge_history::{ActorRole, DonationHistory};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationItemInput {
    pub id: String,
    pub name: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
}

impl From<DonationItemInput> for DonationItem {
    fn from(input: DonationItemInput) -> Self {
        let name = input.name.unwrap_or_else(|| input.id.clone());
        DonationItem {
            id: input.id,
            name,
            quantity: input.quantity,
            unit_price: input.unit_price,
        }
    }
}

/// Builds the gift payload the given category expects; the recorder
/// validates it. Item categories ignore `amount`, Monetary ignores `items`.
pub fn payload_for(
    category: Category,
    items: Vec<DonationItemInput>,
    amount: Option<Decimal>,
) -> GiftPayload {
    match category {
        Category::Monetary => GiftPayload::Amount(amount.unwrap_or(Decimal::ZERO)),
        _ => GiftPayload::Items(items.into_iter().map(DonationItem::from).collect()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDonationRequest {
    pub category: Category,
    pub donor_id: String,
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub items: Vec<DonationItemInput>,
    pub amount: Option<Decimal>,
    pub pickup_address: Option<String>,
    pub time_slot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationView {
    pub id: String,
    pub category: Category,
    pub donor_id: String,
    pub recipient_id: Option<String>,
    pub items: Vec<DonationItem>,
    pub amount: Option<Decimal>,
    pub pickup_address: Option<String>,
    pub time_slot: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<DonationRecord> for DonationView {
    fn from(record: DonationRecord) -> Self {
        let amount = record.amount();
        let items = record.items().to_vec();
        DonationView {
            id: record.id,
            category: record.category,
            donor_id: record.donor_id,
            recipient_id: record.recipient_id,
            items,
            amount,
            pickup_address: record.pickup_address,
            time_slot: record.time_slot,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub donor_id: String,
    pub pickup_address: String,
    pub time_slot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequestRequest {
    pub recipient_id: String,
    pub name: String,
    pub category: Category,
    pub description: String,
    pub requester: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequestRequest {
    pub name: String,
    pub category: Category,
    pub description: String,
    pub requester: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestView {
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

impl From<WishlistRequest> for RequestView {
    fn from(request: WishlistRequest) -> Self {
        RequestView {
            id: request.id,
            recipient_id: request.recipient_id,
            name: request.name,
            category: request.category,
            description: request.description,
            requester: request.requester,
            status: request.status,
            donor_id: request.donor_id,
            fulfilled_at: request.fulfilled_at,
            created_at: request.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillRequestRequest {
    pub donor_id: String,
    #[serde(default)]
    pub items: Vec<DonationItemInput>,
    pub amount: Option<Decimal>,
    pub pickup_address: Option<String>,
    pub time_slot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillRequestResponse {
    pub request: RequestView,
    pub donation: Option<DonationView>,
    /// Set when the request was fulfilled but the donation write failed,
    /// the documented intermediate state of the two-step flow.
    pub divergence: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub role: ActorRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntryView {
    pub donation: DonationView,
    pub counterpart_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTotalsView {
    pub count: u64,
    pub monetary_sum: Decimal,
    pub per_category: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntryView>,
    pub totals: HistoryTotalsView,
    /// Category stores that could not be scanned; the view is best-effort.
    pub unavailable: Vec<String>,
}

impl From<DonationHistory> for HistoryResponse {
    fn from(history: DonationHistory) -> Self {
        HistoryResponse {
            entries: history
                .entries
                .into_iter()
                .map(|entry| HistoryEntryView {
                    donation: entry.record.into(),
                    counterpart_name: entry.counterpart_name,
                })
                .collect(),
            totals: HistoryTotalsView {
                count: history.totals.count,
                monetary_sum: history.totals.monetary_sum,
                per_category: history
                    .totals
                    .per_category
                    .into_iter()
                    .map(|(category, count)| (category.label().to_string(), count))
                    .collect(),
            },
            unavailable: history
                .unavailable
                .into_iter()
                .map(|category| category.store_name().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub organization_details: Option<String>,
}

impl From<ActorProfile> for ProfileView {
    fn from(profile: ActorProfile) -> Self {
        ProfileView {
            id: profile.id,
            display_name: profile.display_name,
            email: profile.email,
            organization_details: profile.organization_details,
        }
    }
}
