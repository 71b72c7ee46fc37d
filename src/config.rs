//! Monitor configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Retry counts, backoff curves and
//! delivery spacing are configuration, grouped into [`RetryPolicy`] and
//! [`DeliveryPolicy`].

use std::net::SocketAddr;
use std::time::Duration;

use crate::engine::{DeliveryPolicy, RetryPolicy};

/// Top-level monitor configuration.
///
/// Loaded once at startup via [`MonitorConfig::from_env`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Socket address to bind the control API to (e.g. `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,

    /// PostgreSQL connection string. `None` keeps all state in memory.
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Master switch for scheduled scans.
    pub scheduler_enabled: bool,

    /// Interval applied to stores created without one.
    pub default_scan_interval_secs: u64,

    /// Smallest interval a store may be configured with.
    pub min_scan_interval_secs: u64,

    /// Threshold applied to stores created without one.
    pub default_low_stock_threshold: u64,

    /// Bound on each individual fetch attempt.
    pub fetch_timeout: Duration,

    /// `User-Agent` header sent to storefronts.
    pub fetch_user_agent: String,

    /// Products requested per storefront page.
    pub fetch_page_limit: usize,

    /// Fetch retry and backoff settings.
    pub retry: RetryPolicy,

    /// Webhook retry settings.
    pub delivery: DeliveryPolicy,

    /// Bound on each webhook request.
    pub webhook_timeout: Duration,

    /// Delete scan and stock history older than this many days (0 = never).
    pub history_retention_days: u64,

    /// Delete alerts resolved more than this many days ago (0 = never).
    pub resolved_alert_retention_days: u64,

    /// Seconds between retention sweeps.
    pub cleanup_interval_secs: u64,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
}

impl MonitorConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_env("SCAN_MAX_ATTEMPTS", retry_defaults.max_attempts),
            base_delay: Duration::from_millis(parse_env("SCAN_BACKOFF_BASE_MS", 2_000)),
            max_delay: Duration::from_millis(parse_env("SCAN_BACKOFF_MAX_MS", 30_000)),
            jitter: parse_jitter(
                std::env::var("SCAN_BACKOFF_JITTER").ok().as_deref(),
                retry_defaults.jitter,
            ),
        };

        let delivery = DeliveryPolicy {
            max_retries: parse_env("WEBHOOK_MAX_RETRIES", 2),
            spacing: Duration::from_millis(parse_env("WEBHOOK_RETRY_SPACING_MS", 5_000)),
        };

        Ok(Self {
            listen_addr,
            database_url,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
            database_connect_timeout_secs: parse_env("DATABASE_CONNECT_TIMEOUT_SECS", 5),
            scheduler_enabled: parse_env_bool("ENABLE_SCHEDULER", true),
            default_scan_interval_secs: parse_env("DEFAULT_SCAN_INTERVAL_SECS", 3_600),
            min_scan_interval_secs: parse_env("MIN_SCAN_INTERVAL_SECS", 300),
            default_low_stock_threshold: parse_env("DEFAULT_LOW_STOCK_THRESHOLD", 10),
            fetch_timeout: Duration::from_secs(parse_env("FETCH_TIMEOUT_SECS", 30)),
            fetch_user_agent: std::env::var("FETCH_USER_AGENT")
                .unwrap_or_else(|_| default_user_agent()),
            fetch_page_limit: parse_env("FETCH_PAGE_LIMIT", 250),
            retry,
            delivery,
            webhook_timeout: Duration::from_secs(parse_env("WEBHOOK_TIMEOUT_SECS", 10)),
            history_retention_days: parse_env("HISTORY_RETENTION_DAYS", 30),
            resolved_alert_retention_days: parse_env("RESOLVED_ALERT_RETENTION_DAYS", 7),
            cleanup_interval_secs: parse_env("CLEANUP_INTERVAL_SECS", 86_400),
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", 10_000),
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }
}

/// `User-Agent` sent when `FETCH_USER_AGENT` is unset.
fn default_user_agent() -> String {
    format!("stockwatch/{}", env!("CARGO_PKG_VERSION"))
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    parse_bool(std::env::var(key).ok().as_deref(), default)
}

/// Parses a jitter fraction, keeping finite values and clamping them to
/// `0.0..=1.0`. Anything else yields `default`.
fn parse_jitter(value: Option<&str>, default: f64) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|j| j.is_finite())
        .map_or(default, |j| j.clamp(0.0, 1.0))
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
