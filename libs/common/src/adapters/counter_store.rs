//! Counter store adapter contract and an in-process fallback.
//!
//! The real backing (Redis, driving the token-bucket and sliding-window Lua
//! scripts) is out of scope here. `InMemoryCounterStore` implements both
//! algorithms directly so `ConstraintEnforcer` has something to exercise
//! outside of `dev_mode` tests and so the crate never needs a Redis client
//! to compile.

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs_f64()
}

/// Outcome of a single rate-limit check, mirrored into `ConstraintViolation`
/// details when `allowed` is false.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub current_usage: f64,
    pub limit: f64,
    pub retry_after_seconds: Option<f64>,
}

#[cfg_attr(feature = "test-util", mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Token-bucket check/consume. `key` scopes the bucket (typically
    /// `{agent_id}:{constraint_id}`). Follows the literal refill-then-check
    /// sequence: `last_update` is persisted whether or not the request is
    /// allowed, so a sustained stream of denied requests does not silently
    /// accrue phantom refill time.
    async fn check_token_bucket(
        &self,
        key: &str,
        capacity: f64,
        refill_rate_per_second: f64,
        cost: f64,
    ) -> Result<RateLimitResult>;

    /// Sliding-window check/consume over `window_seconds`.
    async fn check_sliding_window(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<RateLimitResult>;

    /// Current usage for `key` without consuming.
    async fn get_usage(&self, key: &str) -> Result<f64>;

    /// Clear all counters for `key`.
    async fn reset(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct TokenBucketState {
    tokens: f64,
    last_update: f64,
}

#[derive(Default)]
pub struct InMemoryCounterStore {
    buckets: Mutex<HashMap<String, TokenBucketState>>,
    windows: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn check_token_bucket(
        &self,
        key: &str,
        capacity: f64,
        refill_rate_per_second: f64,
        cost: f64,
    ) -> Result<RateLimitResult> {
        let now = now_seconds();
        let mut buckets = self.buckets.lock();
        let state = buckets.entry(key.to_string()).or_insert(TokenBucketState {
            tokens: capacity,
            last_update: now,
        });

        let elapsed = (now - state.last_update).max(0.0);
        let mut tokens = (state.tokens + elapsed * refill_rate_per_second).min(capacity);

        let allowed = tokens >= cost;
        if allowed {
            tokens -= cost;
        }

        state.tokens = tokens;
        state.last_update = now;

        let retry_after_seconds = if allowed {
            None
        } else {
            let deficit = cost - tokens;
            Some(if refill_rate_per_second > 0.0 {
                deficit / refill_rate_per_second
            } else {
                f64::INFINITY
            })
        };

        Ok(RateLimitResult {
            allowed,
            current_usage: capacity - tokens,
            limit: capacity,
            retry_after_seconds,
        })
    }

    async fn check_sliding_window(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<RateLimitResult> {
        let now = now_seconds();
        let cutoff = now - window_seconds as f64;

        let mut windows = self.windows.lock();
        let entries = windows.entry(key.to_string()).or_default();
        entries.retain(|&ts| ts > cutoff);

        let allowed = (entries.len() as u64) < limit;
        if allowed {
            entries.push_back(now);
        }

        let retry_after_seconds = if allowed {
            None
        } else {
            entries.front().map(|&oldest| (oldest + window_seconds as f64 - now).max(0.0))
        };

        Ok(RateLimitResult {
            allowed,
            current_usage: entries.len() as f64,
            limit: limit as f64,
            retry_after_seconds,
        })
    }

    async fn get_usage(&self, key: &str) -> Result<f64> {
        if let Some(state) = self.buckets.lock().get(key) {
            return Ok(state.tokens);
        }
        if let Some(entries) = self.windows.lock().get(key) {
            return Ok(entries.len() as f64);
        }
        Ok(0.0)
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.buckets.lock().remove(key);
        self.windows.lock().remove(key);
        Ok(())
    }
}

#[async_trait]
impl super::Adapter for InMemoryCounterStore {
    fn adapter_name(&self) -> &'static str {
        "in_memory_counter_store"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_bucket_denies_once_exhausted() {
        let store = InMemoryCounterStore::new();
        let first = store.check_token_bucket("k", 2.0, 0.0, 1.0).await.unwrap();
        assert!(first.allowed);
        let second = store.check_token_bucket("k", 2.0, 0.0, 1.0).await.unwrap();
        assert!(second.allowed);
        let third = store.check_token_bucket("k", 2.0, 0.0, 1.0).await.unwrap();
        assert!(!third.allowed);
    }

    #[tokio::test]
    async fn sliding_window_denies_beyond_limit() {
        let store = InMemoryCounterStore::new();
        for _ in 0..3 {
            store.check_sliding_window("k", 3, 60).await.unwrap();
        }
        let result = store.check_sliding_window("k", 3, 60).await.unwrap();
        assert!(!result.allowed);
    }

    #[tokio::test]
    async fn reset_clears_both_algorithms() {
        let store = InMemoryCounterStore::new();
        store.check_token_bucket("k", 1.0, 0.0, 1.0).await.unwrap();
        store.reset("k").await.unwrap();
        assert_eq!(store.get_usage("k").await.unwrap(), 0.0);
    }
}
