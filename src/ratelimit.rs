//! Fixed-window request rate limiting.
//!
//! Keyed by the subject cookie when present, else the client IP. The map is
//! concurrent (requests are handled on a multi-threaded runtime); stale
//! windows are dropped lazily on access and swept periodically so the map
//! stays bounded.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

struct WindowEntry {
    count: u32,
    started: Instant,
}

/// Per-key fixed-window counter
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    entries: DashMap<String, WindowEntry>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: DashMap::new(),
        }
    }

    /// Record one request for `key`. Returns false when the key has exceeded
    /// its window budget.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry { count: 0, started: now });

        if now.duration_since(entry.started) >= self.window {
            // Window elapsed, start a fresh one
            entry.count = 0;
            entry.started = now;
        }

        entry.count += 1;
        if entry.count > self.max_requests {
            warn!(key = %key, count = entry.count, "Rate limit exceeded");
            return false;
        }

        true
    }

    /// Drop windows that ended more than one window length ago.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.started) < self.window);
        before - self.entries.len()
    }

    /// Number of live windows (for probes/tests)
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

/// Background eviction of stale windows
pub fn spawn_sweep_task(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60);
        loop {
            tokio::time::sleep(interval).await;
            let removed = limiter.sweep();
            if removed > 0 {
                debug!("Rate limiter sweep: removed {} stale windows", removed);
            }
        }
    });
    info!("Rate limiter sweep task started");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_limit_passes() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_over_limit_blocks() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn test_window_reset() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));

        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_sweep_evicts_stale_windows() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10));
        limiter.check("a");
        limiter.check("b");
        assert_eq!(limiter.tracked_keys(), 2);

        std::thread::sleep(Duration::from_millis(20));
        let removed = limiter.sweep();
        assert_eq!(removed, 2);
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
