use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use redis::Msg;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use givebridge_core::document::FIELD_DONOR_ID;
use givebridge_core::{
    DocumentStore, DomainEvent, DomainEventKind, DonationRecord, FieldFilter, FieldMap,
    RequestStatus, WISHLIST_STORE, WishlistRequest,
};
use givebridge_platform::{PgDocumentStore, RedisBus, ServiceConfig, connect_database};

/// Store receiving one audit document per detected divergence.
const AUDIT_STORE: &str = "Fulfillment Audits";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "givebridge_reconciler=info".to_string()),
        )
        .init();

    let config = ServiceConfig::worker_from_env()?;
    let pool = connect_database(&config.database_url).await?;
    let documents = PgDocumentStore::new(pool);
    documents.ensure_schema().await?;
    let store: Arc<dyn DocumentStore> = Arc::new(documents);
    let redis = RedisBus::connect(&config.redis_url)?;

    let channel = DomainEventKind::RequestFulfilled.channel();
    let mut pubsub = redis.client().get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    let mut messages = pubsub.on_message();

    info!("reconciler subscribed to {channel}");

    loop {
        let msg = messages
            .next()
            .await
            .with_context(|| format!("{channel} stream ended unexpectedly"))?;
        if let Err(err) = handle_message(&store, &redis, msg).await {
            error!("failed to process message: {err:#}");
        }
    }
}

async fn handle_message(
    store: &Arc<dyn DocumentStore>,
    redis: &RedisBus,
    msg: Msg,
) -> Result<()> {
    let payload: String = msg.get_payload()?;
    let event: DomainEvent = serde_json::from_str(&payload)?;
    let request_id = event
        .payload
        .get("requestId")
        .and_then(Value::as_str)
        .context("event payload missing requestId")?;

    match find_divergence(store.as_ref(), request_id).await? {
        Some(divergence) => flag_divergence(store, redis, divergence).await,
        None => Ok(()),
    }
}

#[derive(Debug)]
struct Divergence {
    request: WishlistRequest,
    finding: &'static str,
}

/// Re-reads the fulfilled request and scans its category store for a
/// donation by that donor to that recipient. Reconciliation only observes:
/// the fulfillment itself is never repaired or rolled back.
async fn find_divergence(
    store: &dyn DocumentStore,
    request_id: &str,
) -> Result<Option<Divergence>> {
    let Some(doc) = store.get(WISHLIST_STORE, request_id).await? else {
        warn!(request = request_id, "request gone before reconciliation");
        return Ok(None);
    };
    let request = WishlistRequest::from_document(&doc)?;

    if request.status != RequestStatus::Fulfilled {
        warn!(request = request_id, "not fulfilled at reconciliation time");
        return Ok(None);
    }
    let Some(donor_id) = request.donor_id.clone() else {
        // Fulfilled with no donor on record: the both-or-neither invariant
        // is already broken in the store.
        return Ok(Some(Divergence {
            request,
            finding: "fulfilled-without-donor",
        }));
    };

    let docs = store
        .query(
            request.category.store_name(),
            FieldFilter::equals(FIELD_DONOR_ID, donor_id),
        )
        .await?;
    let donations: Vec<DonationRecord> = docs
        .iter()
        .filter_map(|doc| DonationRecord::from_document(request.category, doc).ok())
        .collect();

    if fulfillment_matched(&request, &donations) {
        return Ok(None);
    }
    Ok(Some(Divergence {
        request,
        finding: "missing-donation",
    }))
}

fn fulfillment_matched(request: &WishlistRequest, donations: &[DonationRecord]) -> bool {
    donations
        .iter()
        .any(|donation| donation.recipient_id.as_deref() == Some(request.recipient_id.as_str()))
}

async fn flag_divergence(
    store: &Arc<dyn DocumentStore>,
    redis: &RedisBus,
    divergence: Divergence,
) -> Result<()> {
    let request = &divergence.request;
    error!(
        request = %request.id,
        finding = divergence.finding,
        "fulfilled request has no matching donation record",
    );

    let mut fields = FieldMap::new();
    fields.insert("requestId".to_string(), Value::String(request.id.clone()));
    fields.insert(
        "recipientId".to_string(),
        Value::String(request.recipient_id.clone()),
    );
    if let Some(donor_id) = &request.donor_id {
        fields.insert("donorId".to_string(), Value::String(donor_id.clone()));
    }
    fields.insert(
        "category".to_string(),
        Value::String(request.category.label().to_string()),
    );
    fields.insert(
        "finding".to_string(),
        Value::String(divergence.finding.to_string()),
    );
    store.add(AUDIT_STORE, fields).await?;

    let event = DomainEvent::new(
        DomainEventKind::FulfillmentDiverged,
        json!({
            "requestId": request.id,
            "donorId": request.donor_id,
            "finding": divergence.finding,
        }),
    );
    if let Err(err) = redis.publish(&event).await {
        warn!(%err, "failed to publish divergence event");
    }

    Ok(())
}
