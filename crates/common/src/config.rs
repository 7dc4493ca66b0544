//! Configuration management for the customer analytics services.
//!
//! Settings are layered from configuration files and environment variables.
//! Every section has development defaults, so an empty environment yields a
//! runnable in-memory deployment.
//!
//! ## Example Configuration
//!
//! ```toml
//! [event_store]
//! backend = "postgres"
//! database_url = "postgres://localhost:5432/customer_analytics"
//!
//! [snapshot_store]
//! backend = "s3"
//! bucket = "customer-analytics-processed"
//! region = "us-east-1"
//!
//! [scoring]
//! churn_window_days = 90
//! value_percentile = 0.8
//!
//! [scheduler]
//! enabled = true
//! cron = "0 2 * * *"
//! ```

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub event_store: EventStoreConfig,
    #[serde(default)]
    pub snapshot_store: SnapshotStoreConfig,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub aggregation: AggregationSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            enable_cors: true,
        }
    }
}

/// Event store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventStoreBackend {
    /// Process-local store (development and tests)
    #[default]
    Memory,
    /// PostgreSQL table of events
    Postgres,
}

/// Event store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStoreConfig {
    #[serde(default)]
    pub backend: EventStoreBackend,

    /// Connection URL, required for the postgres backend
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_db_timeout")]
    pub timeout_seconds: u64,

    /// CSV export loaded into the store at startup
    #[serde(default)]
    pub seed_csv: Option<PathBuf>,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            backend: EventStoreBackend::Memory,
            database_url: None,
            pool_size: default_pool_size(),
            timeout_seconds: default_db_timeout(),
            seed_csv: None,
        }
    }
}

/// Snapshot store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStoreBackend {
    #[default]
    Memory,
    /// Local filesystem directory
    Local,
    /// AWS S3 or S3-compatible (MinIO, etc.)
    S3,
}

/// Snapshot (blob) store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStoreConfig {
    #[serde(default)]
    pub backend: SnapshotStoreBackend,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom S3 endpoint (for S3-compatible services)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Key prefix prepended to every object
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,
}

impl Default for SnapshotStoreConfig {
    fn default() -> Self {
        Self {
            backend: SnapshotStoreBackend::Memory,
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            prefix: None,
            local_path: default_local_path(),
        }
    }
}

/// Scoring thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    /// Days without a purchase after which a customer is churned
    #[serde(default = "default_churn_window")]
    pub churn_window_days: i64,

    /// Days without a purchase after which risk is high
    #[serde(default = "default_high_risk_days")]
    pub high_risk_days: i64,

    /// Percentile of lifetime values used as the high-value cutoff
    #[serde(default = "default_value_percentile")]
    pub value_percentile: f64,

    /// Fixed high-value cutoff; disables the percentile when set
    #[serde(default)]
    pub fixed_value_threshold: Option<Decimal>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            churn_window_days: default_churn_window(),
            high_risk_days: default_high_risk_days(),
            value_percentile: default_value_percentile(),
            fixed_value_threshold: None,
        }
    }
}

/// Aggregation pass settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSettings {
    /// Deadline for fetching and computing a pass
    #[serde(default = "default_deadline")]
    pub deadline_seconds: u64,

    /// Threads used to aggregate and score customers
    #[serde(default = "default_aggregation_workers")]
    pub workers: usize,

    /// Optional `customer_id,campaign_revenue` CSV
    #[serde(default)]
    pub campaign_revenue_csv: Option<PathBuf>,

    /// Retries for retryable event store errors
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Whether API servers run passes. Set to false on every API server when
    /// a standalone worker owns aggregation, so only one process writes
    /// snapshots.
    #[serde(default = "default_true")]
    pub api_triggers: bool,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            deadline_seconds: default_deadline(),
            workers: default_aggregation_workers(),
            campaign_revenue_csv: None,
            fetch_retries: default_fetch_retries(),
            api_triggers: true,
        }
    }
}

/// Scheduled aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Five-field cron expression (minute hour day month weekday)
    #[serde(default = "default_cron")]
    pub cron: String,

    /// How often the schedule is checked, in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,

    /// How often run metrics are logged, in seconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_seconds: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: default_cron(),
            tick_interval_seconds: default_tick_interval(),
            metrics_interval_seconds: default_metrics_interval(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable JSON logging format
    #[serde(default)]
    pub json_logging: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            json_logging: false,
            log_level: default_log_level(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    10
}

fn default_db_timeout() -> u64 {
    30
}

fn default_bucket() -> String {
    "customer-analytics-processed".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_local_path() -> PathBuf {
    PathBuf::from("data/snapshots")
}

fn default_churn_window() -> i64 {
    90
}

fn default_high_risk_days() -> i64 {
    180
}

fn default_value_percentile() -> f64 {
    0.8
}

fn default_deadline() -> u64 {
    300
}

fn default_aggregation_workers() -> usize {
    1
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_cron() -> String {
    "0 * * * *".to_string()
}

fn default_tick_interval() -> u64 {
    30
}

fn default_metrics_interval() -> u64 {
    300
}

fn default_service_name() -> String {
    "customer-analytics".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from configuration files and environment variables.
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/{environment}.toml (if exists, where environment is from APP_ENV)
    /// 4. Environment variables (prefixed with APP_, `__` between sections)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use customer_analytics_common::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load configuration");
    /// println!("Server will run on {}:{}", config.server.host, config.server.port);
    /// ```
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Example: APP_SCORING__CHURN_WINDOW_DAYS=60
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.event_store.backend == EventStoreBackend::Postgres {
            match &self.event_store.database_url {
                Some(url) if !url.is_empty() => {}
                _ => anyhow::bail!("event_store.database_url is required for the postgres backend"),
            }
            if self.event_store.pool_size == 0 {
                anyhow::bail!("Database pool size must be greater than 0");
            }
        }

        if self.snapshot_store.backend == SnapshotStoreBackend::S3 {
            if self.snapshot_store.bucket.is_empty() {
                anyhow::bail!("S3 bucket name is required");
            }
            if self.snapshot_store.region.is_empty() {
                anyhow::bail!("S3 region is required");
            }
        }

        let scoring = &self.scoring;
        if scoring.churn_window_days < 0 {
            anyhow::bail!("scoring.churn_window_days must be non-negative");
        }
        if scoring.high_risk_days < scoring.churn_window_days {
            anyhow::bail!("scoring.high_risk_days must not be below churn_window_days");
        }
        if !(scoring.value_percentile > 0.0 && scoring.value_percentile <= 1.0) {
            anyhow::bail!("scoring.value_percentile must be in (0, 1]");
        }
        if let Some(threshold) = scoring.fixed_value_threshold {
            if threshold < Decimal::ZERO {
                anyhow::bail!("scoring.fixed_value_threshold must be non-negative");
            }
        }

        if self.aggregation.deadline_seconds == 0 {
            anyhow::bail!("aggregation.deadline_seconds must be greater than 0");
        }
        if self.aggregation.workers == 0 {
            anyhow::bail!("Number of aggregation workers must be greater than 0");
        }

        if self.scheduler.tick_interval_seconds == 0 {
            anyhow::bail!("scheduler.tick_interval_seconds must be greater than 0");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {}",
                self.telemetry.log_level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }

    /// Deadline of one aggregation pass
    pub fn aggregation_deadline(&self) -> Duration {
        Duration::from_secs(self.aggregation.deadline_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    /// Socket address string for the HTTP server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scoring.churn_window_days, 90);
        assert_eq!(config.scoring.high_risk_days, 180);
        assert_eq!(config.event_store.backend, EventStoreBackend::Memory);
        assert!(config.aggregation.api_triggers);
    }

    #[test]
    fn test_api_triggers_can_be_disabled() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "aggregation": { "api_triggers": false }
        }))
        .unwrap();

        assert!(!config.aggregation.api_triggers);
        assert_eq!(config.aggregation.fetch_retries, default_fetch_retries());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.server.port = 0;
        assert!(config.validate().is_err());
        config.server.port = 8080;

        config.event_store.backend = EventStoreBackend::Postgres;
        assert!(config.validate().is_err());
        config.event_store.database_url = Some("postgres://localhost/test".to_string());
        assert!(config.validate().is_ok());

        config.scoring.value_percentile = 0.0;
        assert!(config.validate().is_err());
        config.scoring.value_percentile = 0.8;

        config.scoring.fixed_value_threshold = Some(Decimal::new(-1, 0));
        assert!(config.validate().is_err());
        config.scoring.fixed_value_threshold = None;

        config.aggregation.workers = 0;
        assert!(config.validate().is_err());
        config.aggregation.workers = 2;

        config.telemetry.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "snapshot_store": { "backend": "s3", "bucket": "snapshots" },
            "scoring": { "fixed_value_threshold": "500.00" }
        }))
        .unwrap();

        assert_eq!(config.snapshot_store.backend, SnapshotStoreBackend::S3);
        assert_eq!(config.snapshot_store.region, "us-east-1");
        assert_eq!(
            config.scoring.fixed_value_threshold,
            Some(Decimal::new(50000, 2))
        );
        assert_eq!(config.server.port, 8080);
    }
}
