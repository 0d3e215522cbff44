use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use givebridge_core::{Category, DocumentStore, DomainEvent, DomainEventKind, StoreError};
use givebridge_directory::ProfileDirectory;
use givebridge_donations::{DonationDraft, DonationRecorder, RecordError};
use givebridge_history::HistoryService;
use givebridge_platform::{
    CreateRequestRequest, DonationView, EditRequestRequest, FulfillRequestRequest,
    FulfillRequestResponse, GuardSetting, HistoryQuery, HistoryResponse, PgDocumentStore,
    ProfileView, RecordDonationRequest, RedisBus, RequestView, RescheduleRequest, ServiceConfig,
    connect_database, payload_for,
};
use givebridge_wishlist::{
    FulfillmentGuard, FulfillmentSaga, RequestDraft, RequestError, RequestLifecycle,
};

#[derive(Clone)]
struct AppState {
    directory: Arc<ProfileDirectory>,
    history: Arc<HistoryService>,
    lifecycle: Arc<RequestLifecycle>,
    recorder: Arc<DonationRecorder>,
    saga: Arc<FulfillmentSaga>,
    redis: RedisBus,
}

#[derive(Debug, Clone, Deserialize)]
struct ListRequestsQuery {
    recipient_id: String,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "givebridge_gateway=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url).await?;
    let documents = PgDocumentStore::new(pool);
    documents.ensure_schema().await?;
    let store: Arc<dyn DocumentStore> = Arc::new(documents);
    let redis = RedisBus::connect(&config.redis_url)?;

    let guard = match config.fulfillment_guard {
        GuardSetting::LastWriteWins => FulfillmentGuard::LastWriteWins,
        GuardSetting::CompareAndSwap => FulfillmentGuard::CompareAndSwap,
    };

    let directory = Arc::new(ProfileDirectory::new(store.clone()));
    let history = Arc::new(HistoryService::new(store.clone(), directory.clone()));
    let lifecycle = Arc::new(RequestLifecycle::with_guard(store.clone(), guard));
    let recorder = Arc::new(DonationRecorder::new(store.clone()));
    let saga = Arc::new(FulfillmentSaga::new(lifecycle.clone(), recorder.clone()));

    let state = AppState {
        directory,
        history,
        lifecycle,
        recorder,
        saga,
        redis,
    };

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/donations", post(record_donation))
        .route(
            "/donations/{category}/{donation_id}/reschedule",
            post(reschedule_donation),
        )
        .route("/actors/{actor_id}/history", get(actor_history))
        .route("/actors/{actor_id}/profile", get(actor_profile))
        .route("/wishlist", get(list_requests).post(create_request))
        .route("/wishlist/open", get(open_requests))
        .route(
            "/wishlist/{request_id}",
            get(get_request).put(edit_request).delete(delete_request),
        )
        .route("/wishlist/{request_id}/fulfill", post(fulfill_request))
        .with_state(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn record_donation(
    State(state): State<AppState>,
    Json(payload): Json<RecordDonationRequest>,
) -> Result<Json<DonationView>, (StatusCode, String)> {
    let donor_id = payload.donor_id.trim().to_string();
    if donor_id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "donor_id is required".to_string()));
    }

    let draft = DonationDraft {
        category: payload.category,
        donor_id,
        recipient_id: payload
            .recipient_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        payload: payload_for(payload.category, payload.items, payload.amount),
        pickup_address: payload.pickup_address,
        time_slot: payload.time_slot,
    };

    let record = state
        .recorder
        .record(draft)
        .await
        .map_err(record_error_response)?;

    publish_event(
        &state.redis,
        DomainEvent::new(
            DomainEventKind::DonationRecorded,
            json!({
                "donationId": &record.id,
                "category": record.category.label(),
                "donorId": &record.donor_id,
                "recipientId": &record.recipient_id,
            }),
        ),
    )
    .await;

    Ok(Json(record.into()))
}

async fn reschedule_donation(
    State(state): State<AppState>,
    Path((category, donation_id)): Path<(String, String)>,
    Json(payload): Json<RescheduleRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let category = parse_category(&category)?;
    state
        .recorder
        .reschedule(
            category,
            &donation_id,
            payload.donor_id.trim(),
            payload.pickup_address,
            payload.time_slot,
        )
        .await
        .map_err(record_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn actor_history(
    State(state): State<AppState>,
    Path(actor_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let history = state.history.aggregate(&actor_id, query.role).await;
    Json(history.into())
}

async fn actor_profile(
    State(state): State<AppState>,
    Path(actor_id): Path<String>,
) -> Result<Json<ProfileView>, (StatusCode, String)> {
    let profile = state
        .directory
        .resolve(&actor_id)
        .await
        .map_err(internal_error)?
        .ok_or((StatusCode::NOT_FOUND, "actor not found".to_string()))?;
    Ok(Json(profile.into()))
}

async fn create_request(
    State(state): State<AppState>,
    Json(payload): Json<CreateRequestRequest>,
) -> Result<Json<RequestView>, (StatusCode, String)> {
    let recipient_id = payload.recipient_id.trim();
    if recipient_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "recipient_id is required".to_string(),
        ));
    }
    if payload.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".to_string()));
    }

    let request = state
        .lifecycle
        .create(
            recipient_id,
            RequestDraft {
                name: payload.name,
                category: payload.category,
                description: payload.description,
                requester: payload.requester,
            },
        )
        .await
        .map_err(request_error_response)?;

    Ok(Json(request.into()))
}

async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<RequestView>>, (StatusCode, String)> {
    let requests = state
        .lifecycle
        .requests_for(query.recipient_id.trim())
        .await
        .map_err(request_error_response)?;
    Ok(Json(requests.into_iter().map(RequestView::from).collect()))
}

async fn open_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<RequestView>>, (StatusCode, String)> {
    let requests = state
        .lifecycle
        .open_requests()
        .await
        .map_err(request_error_response)?;
    Ok(Json(requests.into_iter().map(RequestView::from).collect()))
}

async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<RequestView>, (StatusCode, String)> {
    let request = state
        .lifecycle
        .get(&request_id)
        .await
        .map_err(request_error_response)?
        .ok_or((StatusCode::NOT_FOUND, "request not found".to_string()))?;
    Ok(Json(request.into()))
}

async fn edit_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(payload): Json<EditRequestRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .lifecycle
        .edit(
            &request_id,
            RequestDraft {
                name: payload.name,
                category: payload.category,
                description: payload.description,
                requester: payload.requester,
            },
        )
        .await
        .map_err(request_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .lifecycle
        .delete(&request_id)
        .await
        .map_err(request_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fulfill_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(payload): Json<FulfillRequestRequest>,
) -> Result<Json<FulfillRequestResponse>, (StatusCode, String)> {
    let donor_id = payload.donor_id.trim().to_string();
    if donor_id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "donor_id is required".to_string()));
    }

    // The gift payload depends on the request's category.
    let request = state
        .lifecycle
        .get(&request_id)
        .await
        .map_err(request_error_response)?
        .ok_or((StatusCode::NOT_FOUND, "request not found".to_string()))?;

    let gift = payload_for(request.category, payload.items, payload.amount);
    let outcome = state
        .saga
        .run(
            &request_id,
            &donor_id,
            gift,
            payload.pickup_address,
            payload.time_slot,
        )
        .await
        .map_err(request_error_response)?;

    publish_event(
        &state.redis,
        DomainEvent::new(
            DomainEventKind::RequestFulfilled,
            json!({
                "requestId": &outcome.request.id,
                "donorId": &donor_id,
                "recipientId": &outcome.request.recipient_id,
                "category": outcome.request.category.label(),
            }),
        ),
    )
    .await;

    if let Some(reason) = &outcome.divergence {
        publish_event(
            &state.redis,
            DomainEvent::new(
                DomainEventKind::FulfillmentDiverged,
                json!({
                    "requestId": &outcome.request.id,
                    "donorId": &donor_id,
                    "reason": reason,
                }),
            ),
        )
        .await;
    }

    Ok(Json(FulfillRequestResponse {
        request: outcome.request.into(),
        donation: outcome.donation.map(DonationView::from),
        divergence: outcome.divergence,
    }))
}

fn parse_category(value: &str) -> Result<Category, (StatusCode, String)> {
    Category::parse(value).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("unknown category: {value}"),
        )
    })
}

/// Events are a courtesy for listeners; the store write has already landed,
/// so a failed publish only gets a warning.
async fn publish_event(redis: &RedisBus, event: DomainEvent) {
    if let Err(err) = redis.publish(&event).await {
        warn!(%err, "failed to publish event");
    }
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    tracing::error!("{err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}

fn record_error_response(err: RecordError) -> (StatusCode, String) {
    let status = match &err {
        RecordError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        RecordError::Store(_) => return internal_error(err),
        RecordError::NotAuthor => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

fn request_error_response(err: RequestError) -> (StatusCode, String) {
    let status = match &err {
        RequestError::NotFound(_) => StatusCode::NOT_FOUND,
        RequestError::AlreadyFulfilled(_) => StatusCode::CONFLICT,
        RequestError::Store(_) => return internal_error(err),
    };
    (status, err.to_string())
}
