use std::str::FromStr;
use std::time::Duration;

use crate::db::pool::DEFAULT_POOL_SIZE;
use crate::hub::{Category, CategoryPolicy, HubConfig};

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Upper bound of pooled database connections.
    pub db_pool_size: usize,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Snowflake worker id; must differ between processes sharing a database.
    pub worker_id: u16,
    /// When set, tokens are read from Redis and the Redis relay is enabled.
    pub redis_url: Option<String>,
    /// Relay queues are named `<prefix>.chat`, `<prefix>.score`, `<prefix>.tournament`.
    pub relay_queue_prefix: String,
    pub hub: HubConfig,
    /// How long a socket has to send its `AUTHENTICATE` frame.
    pub auth_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing
    /// or a value does not parse.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            db_pool_size: parsed_var("DB_POOL_SIZE").unwrap_or(DEFAULT_POOL_SIZE),
            port: parsed_var("PORT").unwrap_or(4100),
            worker_id: parsed_var("WORKER_ID").unwrap_or(0),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            relay_queue_prefix: std::env::var("RELAY_QUEUE_PREFIX")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "scoreline".to_string()),
            hub: hub_from_env(),
            auth_timeout: Duration::from_secs(parsed_var("AUTH_TIMEOUT_SECS").unwrap_or(10)),
        }
    }
}

/// Per-category overrides on top of the documented defaults.
fn hub_from_env() -> HubConfig {
    let mut hub = HubConfig::default();
    for category in Category::ALL {
        let name = category.as_str().to_ascii_uppercase();
        let default = CategoryPolicy::default_for(category);
        let policy = CategoryPolicy {
            capacity: parsed_var(&format!("HUB_{name}_CAPACITY")).unwrap_or(default.capacity),
            backpressure: parsed_var(&format!("HUB_{name}_BACKPRESSURE"))
                .unwrap_or(default.backpressure),
            fanout: parsed_var(&format!("HUB_{name}_FANOUT")).unwrap_or(default.fanout),
        };
        hub = hub.with_policy(category, policy);
    }
    if let Some(buffer) = parsed_var("CLIENT_SEND_BUFFER") {
        hub.client_send_buffer = buffer;
    }
    hub
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

/// `None` when unset or empty; panics on a value that does not parse.
fn parsed_var<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok().filter(|s| !s.trim().is_empty())?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => panic!("{name} has an invalid value `{raw}`: {e}"),
    }
}
