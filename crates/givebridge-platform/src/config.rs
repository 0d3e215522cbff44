use anyhow::{Context, Result, bail};

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub redis_url: String,
    pub http_addr: String,
    /// How concurrent fulfillments of one request are handled. The historical
    /// behavior (and default) is last-write-wins; deployments that prefer to
    /// reject the losing donor opt into compare-and-swap.
    pub fulfillment_guard: GuardSetting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GuardSetting {
    #[default]
    LastWriteWins,
    CompareAndSwap,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url = std::env::var("REDIS_URL").context("REDIS_URL is required")?;
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr.to_string());
        let fulfillment_guard = guard_from_env()?;

        Ok(Self {
            database_url,
            redis_url,
            http_addr,
            fulfillment_guard,
        })
    }

    pub fn worker_from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url = std::env::var("REDIS_URL").context("REDIS_URL is required")?;

        Ok(Self {
            database_url,
            redis_url,
            http_addr: String::new(),
            fulfillment_guard: GuardSetting::default(),
        })
    }
}

fn guard_from_env() -> Result<GuardSetting> {
    match std::env::var("FULFILLMENT_GUARD") {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" => Ok(GuardSetting::LastWriteWins),
            "compare-and-swap" => Ok(GuardSetting::CompareAndSwap),
            other => bail!("unsupported FULFILLMENT_GUARD: {other}"),
        },
        Err(_) => Ok(GuardSetting::default()),
    }
}
