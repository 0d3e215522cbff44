use anyhow::Result;
use redis::{AsyncCommands, Client};

use givebridge_core::DomainEvent;

/// Best-effort pub/sub fan-out of domain events. Publication failures are
/// the caller's to log; the underlying store write has already landed by the
/// time anything is published.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
}

impl RedisBus {
    pub fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Publishes the event on the channel its kind maps to.
    pub async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(event)?;
        let _: i64 = connection.publish(event.kind.channel(), serialized).await?;
        Ok(())
    }
}
