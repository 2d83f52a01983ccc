//! Dual sliding-window rate limiter: every request is checked against both a
//! per-minute and a per-hour window, and whichever is tighter wins. Limits
//! are per `(agent, endpoint)` pair and can be overridden per endpoint via
//! `SWARM_RATE_LIMIT_{ENDPOINT}_PER_MIN` / `_PER_HOUR` environment variables.

use std::sync::Arc;

use tracing::instrument;

use crate::config::RateLimitConfig;
use crate::error::CoreError;
use crate::ports::RateLimitBackend;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;

pub struct RateLimiter {
    backend: Arc<dyn RateLimitBackend>,
    config: RateLimitConfig,
}

struct Limits {
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new(backend: Arc<dyn RateLimitBackend>, config: RateLimitConfig) -> Self {
        Self { backend, config }
    }

    fn limits_for(&self, endpoint: &str) -> Limits {
        let env_prefix = endpoint.to_uppercase().replace(['-', '.'], "_");
        let per_minute = std::env::var(format!("SWARM_RATE_LIMIT_{env_prefix}_PER_MIN"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.config.requests_per_minute);
        let per_hour = std::env::var(format!("SWARM_RATE_LIMIT_{env_prefix}_PER_HOUR"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.config.requests_per_hour);
        Limits { per_minute, per_hour }
    }

    /// Records a request at `now_ms` and returns `Ok(())` if it is within
    /// both windows, or `Err(CoreError::RateLimited)` with the earliest time
    /// a retry could succeed.
    #[instrument(skip(self))]
    pub async fn check_and_record(&self, agent: &str, endpoint: &str, now_ms: i64) -> Result<(), CoreError> {
        let limits = self.limits_for(endpoint);

        let minute_count = self.backend.record_and_count(agent, endpoint, MINUTE_MS, now_ms).await?;
        if minute_count > limits.per_minute {
            let retry_after_ms = self.retry_after(agent, endpoint, MINUTE_MS, now_ms).await?;
            return Err(CoreError::RateLimited { retry_after_ms });
        }

        let hour_count = self.backend.record_and_count(agent, endpoint, HOUR_MS, now_ms).await?;
        if hour_count > limits.per_hour {
            let retry_after_ms = self.retry_after(agent, endpoint, HOUR_MS, now_ms).await?;
            return Err(CoreError::RateLimited { retry_after_ms });
        }

        Ok(())
    }

    async fn retry_after(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<u64, CoreError> {
        let oldest = self.backend.oldest_in_window(agent, endpoint, window_ms, now_ms).await?;
        Ok(oldest.map(|t| (t + window_ms - now_ms).max(0) as u64).unwrap_or(window_ms as u64))
    }
}
