// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter keyed by client identity.
//!
//! Each identity (normally the peer IP) gets one counter per window. The
//! request that pushes the counter past the limit is rejected but stays
//! counted, so further requests in the same window keep being rejected.

use crate::config::RateLimitConfig;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Per-identity window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Window start, milliseconds since the Unix epoch
    pub window_start: i64,
    /// Requests seen in the current window, including rejected ones
    pub count: u32,
}

/// Thread-safe rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a request from `identity` and decide whether to admit it.
    pub async fn admit(&self, identity: &str) -> bool {
        self.admit_at(identity, now_ms()).await
    }

    /// Same as [`admit`](Self::admit) with an explicit clock reading.
    pub async fn admit_at(&self, identity: &str, now: i64) -> bool {
        let window = self.window_ms();
        let mut entries = self.entries.lock().await;

        let fresh = RateLimitEntry {
            window_start: now,
            count: 1,
        };

        let entry = match entries.entry(identity.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                return true;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        // Window expired? Start a new one with this request.
        if now - entry.window_start >= window {
            *entry = fresh;
            return true;
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count > self.config.max_requests {
            debug!(identity, count = entry.count, "Rate limit exceeded");
            return false;
        }

        true
    }

    /// Drop entries whose window has expired (should be called periodically).
    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(now_ms()).await
    }

    /// Same as [`cleanup`](Self::cleanup) with an explicit clock reading.
    pub async fn cleanup_at(&self, now: i64) -> usize {
        let window = self.window_ms();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now - entry.window_start < window);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "Evicted expired rate limit entries");
        }
        evicted
    }

    /// Current state for an identity.
    pub async fn entry(&self, identity: &str) -> Option<RateLimitEntry> {
        self.entries.lock().await.get(identity).copied()
    }

    /// Number of identities currently tracked.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.config.window_ms).unwrap_or(i64::MAX)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
