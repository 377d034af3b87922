//! Per-identity fixed-window rate limiting
//!
//! Windows are aligned to wall-clock multiples of `window_secs`, so a burst
//! straddling a boundary lands in two counters and can reach `2 × limit`
//! requests. That is the accepted cost of fixed windows.

pub mod store;

use crate::{
    config::{RateLimitConfig, StoreFailurePolicy},
    error::AppError,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::sync::Arc;
use store::{CounterStore, StoreError};

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Longest accepted window (one day)
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// Outcome of one counted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// End of the current window, seconds since epoch
    pub reset_at: i64,
}

impl RateLimitStatus {
    /// Write the `X-RateLimit-*` headers
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(HeaderName::from_static(HEADER_LIMIT), HeaderValue::from(self.limit));
        headers.insert(
            HeaderName::from_static(HEADER_REMAINING),
            HeaderValue::from(self.remaining),
        );
        headers.insert(HeaderName::from_static(HEADER_RESET), HeaderValue::from(self.reset_at));
    }
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    window_secs: u64,
    /// `window_secs` as a signed clock offset
    window: i64,
    max_requests: u64,
    failure_policy: StoreFailurePolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Result<Self, AppError> {
        if config.window_secs == 0 || config.window_secs > MAX_WINDOW_SECS {
            return Err(AppError::Config(format!(
                "rate limit window must be between 1 and {} seconds",
                MAX_WINDOW_SECS
            )));
        }
        let window = i64::try_from(config.window_secs)
            .map_err(|_| AppError::Config("rate limit window out of range".to_string()))?;
        if config.max_requests == 0 {
            return Err(AppError::Config("rate limit max_requests must be > 0".to_string()));
        }

        Ok(Self {
            store,
            window_secs: config.window_secs,
            window,
            max_requests: config.max_requests,
            failure_policy: config.store_failure_policy,
        })
    }

    pub fn limit(&self) -> u64 {
        self.max_requests
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// What the caller should do when the store is down
    pub fn failure_policy(&self) -> StoreFailurePolicy {
        self.failure_policy
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Fixed-window index for `now`
    pub fn window_bucket(&self, now: i64) -> i64 {
        now.div_euclid(self.window)
    }

    pub fn counter_key(identity: &str, bucket: i64) -> String {
        format!("ratelimit:{}:{}", identity, bucket)
    }

    /// Count a request for `identity` in the current window.
    ///
    /// Store failures are returned as-is; applying [`StoreFailurePolicy`] is
    /// the caller's job.
    pub async fn check_and_increment(&self, identity: &str) -> Result<RateLimitStatus, StoreError> {
        self.check_and_increment_at(identity, chrono::Utc::now().timestamp())
            .await
    }

    /// Same as [`check_and_increment`](Self::check_and_increment) with an explicit clock
    pub async fn check_and_increment_at(
        &self,
        identity: &str,
        now: i64,
    ) -> Result<RateLimitStatus, StoreError> {
        let bucket = self.window_bucket(now);
        let key = Self::counter_key(identity, bucket);

        let count = self.store.incr_with_ttl(&key, self.window_secs).await?;

        let status = RateLimitStatus {
            allowed: count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(count),
            reset_at: (bucket + 1) * self.window,
        };

        let outcome = if status.allowed { "allowed" } else { "denied" };
        metrics::counter!(crate::telemetry::RATE_LIMIT_DECISIONS_TOTAL, "outcome" => outcome).increment(1);

        tracing::debug!(
            identity = %identity,
            count = count,
            limit = status.limit,
            remaining = status.remaining,
            reset_at = status.reset_at,
            "Rate limit counted"
        );

        Ok(status)
    }
}
