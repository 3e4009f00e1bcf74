//! Environment-variable configuration (spec.md §6 "Environment knobs"),
//! loaded with plain Rust rather than a config crate — the same choice the
//! teacher's `server/src/bin/default.rs` makes for its own bind address and
//! storage path.

use std::time::Duration;

use notify_core::error::FatalConfigError;

fn env_or(name: &str, default: &str) -> String { std::env::var(name).unwrap_or_else(|_| default.to_string()) }

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, FatalConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| FatalConfigError(format!("{name} must be a number, got {raw:?}"))),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub polling_interval: Duration,
    pub catch_up_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub notifications_channel_capacity: usize,
    pub subscriptions_channel_capacity: usize,
    pub completions_channel_capacity: usize,
    pub collector_channel_capacity: usize,
    pub http_bind_address: String,
}

impl Config {
    /// Reads every knob from the process environment, applying spec.md §6's
    /// defaults. Returns `Err` before any task is spawned if a present
    /// variable fails to parse (spec.md §7 "FatalConfigError").
    pub fn from_env() -> Result<Self, FatalConfigError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| FatalConfigError("DATABASE_URL must be set".to_string()))?;

        Ok(Self {
            database_url,
            polling_interval: Duration::from_secs(parse_env("POLLING_INTERVAL_SECS", 600u64)?),
            catch_up_interval: Duration::from_secs(parse_env("CATCH_UP_INTERVAL_SECS", 30u64)?),
            max_retries: parse_env("MAX_RETRIES", 5u32)?,
            retry_delay: Duration::from_secs(parse_env("RETRY_DELAY_SECS", 10u64)?),
            notifications_channel_capacity: parse_env("NOTIFICATIONS_CHANNEL_CAPACITY", 100usize)?,
            subscriptions_channel_capacity: parse_env("SUBSCRIPTIONS_CHANNEL_CAPACITY", 100usize)?,
            completions_channel_capacity: parse_env("COMPLETIONS_CHANNEL_CAPACITY", 1usize)?,
            collector_channel_capacity: parse_env("COLLECTOR_CHANNEL_CAPACITY", 10usize)?,
            http_bind_address: env_or("HTTP_BIND_ADDRESS", "0.0.0.0:8080"),
        })
    }
}
