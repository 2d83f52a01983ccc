use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::model::Config;

/// Configuration validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid max_agents: {0}, must be between 1 and 100")]
    InvalidMaxAgents(usize),

    #[error("invalid rate limit: {0}, must be positive")]
    InvalidRateLimit(u32),

    #[error("invalid log level: {0}, must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}, must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_connections: {0}, must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid max_retries: {0}, cannot be 0")]
    InvalidMaxRetries(u32),

    #[error("invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("invalid max_review_attempts: {0}, must be at least 1")]
    InvalidReviewAttempts(u32),

    #[error("invalid reservation ttl: {0}, must be positive")]
    InvalidReservationTtl(i64),
}

/// Loads [`Config`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.swarm/config.yaml` (project config)
    /// 3. `.swarm/local.yaml` (local overrides, optional)
    /// 4. Environment variables (`SWARM_` prefix, `__` nesting separator)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".swarm/config.yaml"))
            .merge(Yaml::file(".swarm/local.yaml"))
            .merge(Env::prefixed("SWARM_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a single file, skipping the project/local/env layers.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a config after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.max_agents == 0 || config.max_agents > 100 {
            return Err(ConfigError::InvalidMaxAgents(config.max_agents));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.rate_limit.requests_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit(config.rate_limit.requests_per_minute));
        }
        if config.rate_limit.requests_per_hour == 0 {
            return Err(ConfigError::InvalidRateLimit(config.rate_limit.requests_per_hour));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.orchestrator.max_review_attempts == 0 {
            return Err(ConfigError::InvalidReviewAttempts(config.orchestrator.max_review_attempts));
        }

        if config.reservations.default_ttl_secs <= 0 {
            return Err(ConfigError::InvalidReservationTtl(config.reservations.default_ttl_secs));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{DatabaseConfig, LoggingConfig, OrchestratorConfig, RateLimitConfig, ReservationConfig, RetryConfig};

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.max_agents, 10);
        assert_eq!(config.rate_limit.requests_per_minute, 60);
        assert_eq!(config.database.path, ".swarm/swarmcore.db");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_parsing_overrides_defaults() {
        let yaml = r"
max_agents: 20
rate_limit:
  requests_per_minute: 30
  requests_per_hour: 500
database:
  path: /custom/path.db
  max_connections: 5
logging:
  level: debug
  format: pretty
  retention_days: 7
";
        let config: Config = serde_yaml::from_str(yaml).expect("yaml should parse");

        assert_eq!(config.max_agents, 20);
        assert_eq!(config.rate_limit.requests_per_minute, 30);
        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.logging.level, "debug");
        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn validate_valid_config() {
        let config = Config {
            max_agents: 10,
            database: DatabaseConfig { path: ".swarm/swarmcore.db".to_string(), max_connections: 10 },
            logging: LoggingConfig { level: "info".to_string(), format: "json".to_string(), retention_days: 30 },
            rate_limit: RateLimitConfig { requests_per_minute: 60, requests_per_hour: 1000 },
            retry: RetryConfig { max_retries: 3, initial_backoff_ms: 100, max_backoff_ms: 1000 },
            orchestrator: OrchestratorConfig { max_review_attempts: 3 },
            reservations: ReservationConfig { default_ttl_secs: 3600 },
        };
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn validate_rejects_zero_agents() {
        let config = Config { max_agents: 0, ..Default::default() };
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxAgents(0))));
    }

    #[test]
    fn validate_rejects_too_many_agents() {
        let config = Config { max_agents: 101, ..Default::default() };
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxAgents(101))));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            other => panic!("expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLogFormat(_))));
    }

    #[test]
    fn validate_rejects_zero_rate_limit() {
        let mut config = Config::default();
        config.rate_limit.requests_per_minute = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidRateLimit(_))));
    }

    #[test]
    fn validate_rejects_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));
    }

    #[test]
    fn validate_rejects_zero_max_connections() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxConnections(0))));
    }

    #[test]
    fn validate_rejects_zero_max_retries() {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxRetries(0))));
    }

    #[test]
    fn validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 3000;
        config.retry.max_backoff_ms = 1000;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidBackoff(3000, 1000))));
    }

    #[test]
    fn hierarchical_merging_lets_override_win() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "max_agents: 5\nlogging:\n  level: info\n  format: json").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "max_agents: 15\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.max_agents, 15, "override should win");
        assert_eq!(config.logging.level, "debug", "override should win for nested fields");
        assert_eq!(config.logging.format, "json", "base value should persist when not overridden");
    }
}
