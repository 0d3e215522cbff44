pub mod config;
pub mod contracts;
pub mod db;
pub mod redis_bus;

pub use config::{GuardSetting, ServiceConfig};
pub use contracts::{
    CreateRequestRequest, DonationItemInput, DonationView, EditRequestRequest,
    FulfillRequestRequest, FulfillRequestResponse, HistoryEntryView, HistoryQuery,
    HistoryResponse, HistoryTotalsView, ProfileView, RecordDonationRequest, RequestView,
    RescheduleRequest, payload_for,
};
pub use db::{PgDocumentStore, connect_database};
pub use redis_bus::RedisBus;
