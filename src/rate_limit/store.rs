//! Counter stores backing the rate limiter
//!
//! A store is a key/value map of integer counters with per-key TTL
//! (Redis semantics). Key pattern:
//!
//! ```text
//! ratelimit:{identity}:{window_bucket}   → request count (expires with the window)
//! ```

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Infrastructure failure talking to the counter store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add one to `key`, returning the new value.
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;

    /// Set `key` to expire `ttl_secs` from now.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Increment and make sure the key carries a TTL.
    ///
    /// The default composes `incr` and `expire` as two round trips. Two
    /// requests racing on a fresh key may both apply the TTL, which can push
    /// the counter's life slightly past its window. The TTL is never skipped:
    /// if `expire` fails the error is returned and the caller's policy applies.
    async fn incr_with_ttl(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        let count = self.incr(key).await?;
        if count == 1 {
            self.expire(key, ttl_secs).await?;
        }
        Ok(count)
    }

    /// Connectivity check.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ==================== Redis ====================

/// INCR, then EXPIRE when the key is new or has lost its TTL (-1).
const INCR_WITH_TTL_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis-backed counters
#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
    script: Script,
    command_timeout: Duration,
}

impl RedisCounterStore {
    /// Connect to `url`; each later round trip is bounded by `command_timeout`.
    pub async fn connect(url: &str, command_timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = tokio::time::timeout(command_timeout * 20, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Timeout(command_timeout * 20))??;

        tracing::info!("Connected to Redis counter store");

        Ok(Self::with_manager(manager, command_timeout))
    }

    pub fn with_manager(manager: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            manager,
            script: Script::new(INCR_WITH_TTL_SCRIPT),
            command_timeout,
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.command_timeout)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.manager.clone();
        self.bounded(async move {
            let count: u64 = conn.incr(key, 1).await?;
            Ok(count)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        self.bounded(async move {
            let _: () = conn.expire(key, ttl_secs as i64).await?;
            Ok(())
        })
        .await
    }

    async fn incr_with_ttl(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        let mut conn = self.manager.clone();
        let script = &self.script;
        self.bounded(async move {
            let count: u64 = script.key(key).arg(ttl_secs).invoke_async(&mut conn).await?;
            Ok(count)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        self.bounded(async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

// ==================== In-memory ====================

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn fresh() -> Self {
        Self {
            count: 0,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// 每处理多少次写操作清理一次过期计数
pub const DEFAULT_SWEEP_EVERY: u64 = 1024;

/// Process-local counters with TTL, for tests and single-instance deployments.
///
/// Every window creates a fresh key per identity, so expired counters are
/// swept inline once every `sweep_every` writes.
pub struct MemoryCounterStore {
    counters: DashMap<String, Counter>,
    writes: AtomicU64,
    sweep_every: u64,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::with_sweep_every(DEFAULT_SWEEP_EVERY)
    }
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_every(sweep_every: u64) -> Self {
        Self {
            counters: DashMap::new(),
            writes: AtomicU64::new(0),
            sweep_every: sweep_every.max(1),
        }
    }

    /// Current value of a live counter
    pub fn get(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        self.counters
            .get(key)
            .filter(|c| !c.is_expired(now))
            .map(|c| c.count)
    }

    /// Remaining time to live of a live counter; `None` when absent or without TTL
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.counters
            .get(key)
            .filter(|c| !c.is_expired(now))
            .and_then(|c| c.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Drop expired counters
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, c| !c.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// 必须在释放条目锁之后调用
    fn after_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % self.sweep_every == 0 {
            let before = self.counters.len();
            self.purge_expired();
            tracing::trace!(removed = before.saturating_sub(self.counters.len()), "Swept expired counters");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let count = {
            let mut counter = self
                .counters
                .entry(key.to_string())
                .or_insert_with(Counter::fresh);

            if counter.is_expired(now) {
                *counter = Counter::fresh();
            }
            counter.count += 1;
            counter.count
        };

        self.after_write();
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        if let Some(mut counter) = self.counters.get_mut(key) {
            counter.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
        }
        Ok(())
    }

    async fn incr_with_ttl(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        let now = Instant::now();
        // 整个读改写过程持有条目锁
        let count = {
            let mut counter = self
                .counters
                .entry(key.to_string())
                .or_insert_with(Counter::fresh);

            if counter.is_expired(now) {
                *counter = Counter::fresh();
            }
            counter.count += 1;
            if counter.count == 1 || counter.expires_at.is_none() {
                counter.expires_at = Some(now + Duration::from_secs(ttl_secs));
            }
            counter.count
        };

        self.after_write();
        Ok(count)
    }
}
