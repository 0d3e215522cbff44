pub mod category;
pub mod document;
pub mod events;
pub mod models;
pub mod storage;

pub use category::{Category, USERS_STORE, WISHLIST_STORE};
pub use document::{Document, FieldFilter, FieldMap};
pub use events::{DomainEvent, DomainEventKind};
pub use models::{ActorProfile, DonationItem, DonationRecord, GiftPayload, RequestStatus, WishlistRequest};
pub use storage::{DocumentStore, StoreError};
