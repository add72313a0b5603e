use anyhow::Context;
use std::time::Duration;

// ============================================================================
// Configuration - environment driven, .env friendly
// ============================================================================

#[derive(Clone, Debug)]
pub struct Config {
    pub http_addr: String,
    pub database_url: String,
    pub kafka_brokers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub warm_n: i64,
    pub cache_enabled: bool,
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Optional .env for local development; real deployments set the
        // environment directly.
        if dotenv::dotenv().is_err() {
            tracing::debug!("No .env file found, using process environment");
        }

        Ok(Self {
            http_addr: required("HTTP_ADDR")?,
            database_url: required("DATABASE_URL")?,
            kafka_brokers: required("KAFKA_BROKERS")?,
            kafka_topic: required("KAFKA_TOPIC")?,
            kafka_group_id: required("KAFKA_GROUP_ID")?,
            warm_n: parsed_or("CACHE_WARM_N", 1000)?,
            cache_enabled: parsed_or("CACHE_ENABLED", true)?,
            shutdown_grace: Duration::from_secs(parsed_or("SHUTDOWN_GRACE_SECS", 5)?),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("environment variable {key} is not set"))
}

fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("environment variable {key} is not valid: {raw}")),
        Err(_) => Ok(default),
    }
}
