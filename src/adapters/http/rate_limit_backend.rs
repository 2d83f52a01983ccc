//! Distributed rate limit backend: delegates sliding-window bookkeeping to a
//! remote sorted-set KV store so a fleet of coordination-core instances can
//! share one limit per agent+endpoint. Every call retries up to three times
//! with exponential backoff before surfacing [`CoreError::SubsystemUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ports::RateLimitBackend;

pub struct HttpRateLimitBackend {
    client: Client,
    base_url: String,
}

impl HttpRateLimitBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into() }
    }

    fn key(agent: &str, endpoint: &str) -> String {
        format!("ratelimit:{agent}:{endpoint}")
    }

    async fn with_retry<T, F, Fut>(op: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(50))
            .with_max_elapsed_time(Some(Duration::from_secs(2)))
            .build();

        retry(backoff, || async { op().await.map_err(backoff::Error::transient) })
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))
    }
}

#[derive(Serialize)]
struct ZAddRequest {
    key: String,
    score: i64,
    member: String,
    cutoff: i64,
}

#[derive(Deserialize)]
struct ZAddResponse {
    count: u32,
}

#[derive(Deserialize)]
struct ZMinResponse {
    min: Option<i64>,
}

#[async_trait]
impl RateLimitBackend for HttpRateLimitBackend {
    async fn record_and_count(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<u32, CoreError> {
        let url = format!("{}/zadd", self.base_url);
        let body = ZAddRequest { key: Self::key(agent, endpoint), score: now_ms, member: now_ms.to_string(), cutoff: now_ms - window_ms };

        let response = Self::with_retry(|| {
            let client = &self.client;
            let url = &url;
            let body = &body;
            async move { client.post(url).json(body).send().await?.error_for_status() }
        })
        .await?;

        let parsed: ZAddResponse = response.json().await.map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(parsed.count)
    }

    async fn oldest_in_window(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<Option<i64>, CoreError> {
        let url = format!("{}/zmin", self.base_url);
        let key = Self::key(agent, endpoint);
        let cutoff = now_ms - window_ms;

        let response = Self::with_retry(|| {
            let client = &self.client;
            let url = &url;
            let key = &key;
            async move { client.get(url.as_str()).query(&[("key", key.as_str()), ("cutoff", &cutoff.to_string())]).send().await?.error_for_status() }
        })
        .await?;

        let parsed: ZMinResponse = response.json().await.map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(parsed.min)
    }
}
