//! Fixed-window rate limiting per client key.
//!
//! # Algorithm
//! - Each key has a counter and the start of its current window
//! - The first request of a key opens a window anchored at that instant
//! - Once `now - window_start >= window`, the next request opens a fresh
//!   window anchored at `now` with the counter reset to 1
//! - Within a window, at most `capacity` requests are admitted
//!
//! The reset is a hard boundary: a full burst of `capacity` is admitted
//! immediately after a window elapses.
//!
//! # Concurrency
//! State lives in a `DashMap`. `consume` updates its entry under the shard
//! lock taken by the entry API, so concurrent requests for the same key are
//! serialized and cannot both take the last unit, while unrelated keys on
//! other shards proceed independently.
//!
//! # Memory
//! `sweep` removes entries idle for longer than `idle_timeout`.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::observability::metrics;

/// Result of a `consume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// Units left in the current window after this call.
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count: u32,
    last_seen: Instant,
}

/// Per-key fixed window counter.
#[derive(Debug)]
pub struct RateLimiter<K = std::net::IpAddr>
where
    K: Eq + Hash,
{
    entries: DashMap<K, WindowState>,
    capacity: u32,
    window: Duration,
    idle_timeout: Duration,
}

impl<K> RateLimiter<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: u32, window: Duration, idle_timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            window,
            idle_timeout,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Take one unit of budget for `key`.
    pub fn consume(&self, key: &K) -> Admission {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| WindowState {
            window_start: now,
            count: 0,
            last_seen: now,
        });
        let state = entry.value_mut();

        if now.duration_since(state.window_start) >= self.window {
            state.window_start = now;
            state.count = 0;
        }
        state.last_seen = now;

        let reset_after = self.window.saturating_sub(now.duration_since(state.window_start));
        if state.count < self.capacity {
            state.count += 1;
            Admission {
                allowed: true,
                remaining: self.capacity - state.count,
                reset_after,
            }
        } else {
            Admission {
                allowed: false,
                remaining: 0,
                reset_after,
            }
        }
    }

    /// Evict entries idle for longer than the idle timeout.
    /// Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        // An idle entry whose window is still open keeps its count.
        let keep_for = self.idle_timeout.max(self.window);
        self.entries.retain(|_, state| now.duration_since(state.last_seen) < keep_for);
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Periodically sweep a set of limiters until shutdown.
pub async fn run_sweeper<K>(
    limiters: Vec<Arc<RateLimiter<K>>>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut evicted = 0;
                let mut tracked = 0;
                for limiter in &limiters {
                    evicted += limiter.sweep();
                    tracked += limiter.len();
                }
                metrics::record_rate_limiter_keys(tracked);
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = tracked, "Rate limiter sweep completed");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Rate limiter sweeper received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
