//! Storage backend behind the dual sliding-window rate limiter.
//!
//! Three implementations ship: in-memory (authoritative, default), SQLite
//! (local-persistent, survives process restarts), and an HTTP client over a
//! distributed KV store (for fleets of coordination-core instances sharing
//! one limit).

use async_trait::async_trait;

use crate::error::CoreError;

#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    /// Records a request at `now_ms` and returns the count of requests for
    /// `(agent, endpoint)` within `window_ms` ending at `now_ms`, inclusive
    /// of the one just recorded.
    async fn record_and_count(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<u32, CoreError>;

    /// The timestamp, in epoch milliseconds, at which the oldest in-window
    /// record will fall out of the window, given the current count is at
    /// its limit. Used to compute `retry_after_ms`.
    async fn oldest_in_window(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<Option<i64>, CoreError>;
}
