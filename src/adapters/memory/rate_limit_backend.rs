use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::ports::RateLimitBackend;

/// Sliding-log rate limit backend: keeps every request timestamp in the
/// window and counts them on read, rather than approximating with buckets.
#[derive(Default)]
pub struct InMemoryRateLimitBackend {
    log: Mutex<HashMap<(String, String), VecDeque<i64>>>,
}

impl InMemoryRateLimitBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitBackend for InMemoryRateLimitBackend {
    async fn record_and_count(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<u32, CoreError> {
        let key = (agent.to_string(), endpoint.to_string());
        let mut log = self.log.lock().unwrap();
        let entries = log.entry(key).or_default();
        entries.push_back(now_ms);
        let cutoff = now_ms - window_ms;
        while let Some(&oldest) = entries.front() {
            if oldest <= cutoff {
                entries.pop_front();
            } else {
                break;
            }
        }
        Ok(entries.len() as u32)
    }

    async fn oldest_in_window(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<Option<i64>, CoreError> {
        let key = (agent.to_string(), endpoint.to_string());
        let log = self.log.lock().unwrap();
        let cutoff = now_ms - window_ms;
        Ok(log.get(&key).and_then(|entries| entries.iter().find(|&&t| t > cutoff).copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_requests_within_window() {
        let backend = InMemoryRateLimitBackend::new();
        assert_eq!(backend.record_and_count("a", "chat", 1000, 0).await.unwrap(), 1);
        assert_eq!(backend.record_and_count("a", "chat", 1000, 100).await.unwrap(), 2);
        assert_eq!(backend.record_and_count("a", "chat", 1000, 200).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn requests_outside_window_are_dropped() {
        let backend = InMemoryRateLimitBackend::new();
        backend.record_and_count("a", "chat", 1000, 0).await.unwrap();
        backend.record_and_count("a", "chat", 1000, 500).await.unwrap();
        let count = backend.record_and_count("a", "chat", 1000, 1600).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn different_endpoints_are_independent() {
        let backend = InMemoryRateLimitBackend::new();
        backend.record_and_count("a", "chat", 1000, 0).await.unwrap();
        let count = backend.record_and_count("a", "completions", 1000, 0).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn oldest_in_window_reports_earliest_surviving_timestamp() {
        let backend = InMemoryRateLimitBackend::new();
        backend.record_and_count("a", "chat", 1000, 0).await.unwrap();
        backend.record_and_count("a", "chat", 1000, 300).await.unwrap();
        let oldest = backend.oldest_in_window("a", "chat", 1000, 300).await.unwrap();
        assert_eq!(oldest, Some(0));
    }

    #[tokio::test]
    async fn oldest_in_window_is_none_when_empty() {
        let backend = InMemoryRateLimitBackend::new();
        assert_eq!(backend.oldest_in_window("a", "chat", 1000, 0).await.unwrap(), None);
    }
}
