//! Hierarchical runtime configuration for the coordination core.

use serde::{Deserialize, Serialize};

fn default_max_agents() -> usize {
    10
}

fn default_database_path() -> String {
    ".swarm/swarmcore.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_requests_per_hour() -> u32 {
    1_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    1_000
}

fn default_review_attempts() -> u32 {
    3
}

fn default_reservation_ttl_secs() -> i64 {
    3_600
}

/// Top-level configuration for the coordination core.
///
/// Assembled by [`super::loader::ConfigLoader`] from defaults, a project
/// yaml file, a local override yaml file, and environment variables, in
/// that order of increasing precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub reservations: ReservationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            reservations: ReservationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path(), max_connections: default_max_connections() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            retention_days: default_retention_days(),
        }
    }
}

/// Default per-agent, per-endpoint dual sliding-window limits.
///
/// Overridden per endpoint at runtime via `SWARM_RATE_LIMIT_{ENDPOINT}_PER_MIN`
/// and `SWARM_RATE_LIMIT_{ENDPOINT}_PER_HOUR`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    #[serde(default = "default_review_attempts")]
    pub max_review_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_review_attempts: default_review_attempts() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationConfig {
    #[serde(default = "default_reservation_ttl_secs")]
    pub default_ttl_secs: i64,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self { default_ttl_secs: default_reservation_ttl_secs() }
    }
}
