//! Layered runtime configuration.

pub mod loader;
pub mod model;

pub use loader::{ConfigError, ConfigLoader};
pub use model::{Config, DatabaseConfig, LoggingConfig, OrchestratorConfig, RateLimitConfig, ReservationConfig, RetryConfig};
