//! In-memory response cache with per-entry TTL and a background sweep.
//!
//! Entries are keyed by URL. An expired entry is treated as absent on
//! lookup even before the sweep removes it; the sweep only reclaims
//! memory. A lookup miss is a normal outcome, not an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Extra slack added to the default TTL to derive the sweep interval.
pub const SWEEP_SLACK: Duration = Duration::from_millis(500);

/// A cached response with its expiry deadline.
struct CacheEntry {
    content: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory URL-keyed response cache.
///
/// Cheaply cloneable; clones share the same entry map.
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry. Expired entries are reported as a miss.
    pub async fn lookup(&self, url: &str) -> Option<String> {
        let entries = self.entries.read().await;
        match entries.get(url) {
            Some(entry) if !entry.is_expired() => Some(entry.content.clone()),
            _ => None,
        }
    }

    /// Store a response under `url`, expiring `ttl` from now.
    ///
    /// An existing entry for the same URL is replaced, last writer wins.
    pub async fn store(&self, url: &str, content: String, ttl: Duration) {
        let entry = CacheEntry { content, expires_at: Instant::now() + ttl };
        self.entries.write().await.insert(url.to_string(), entry);
    }

    /// Drop every entry, live or expired.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        tracing::warn!("cleared response cache");
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Remove expired entries, returning how many were evicted.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Start the background sweep task.
    ///
    /// The task runs until the returned handle is stopped (or dropped);
    /// each pass logs whether it found anything to evict.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let cache = self.clone();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if cache.entries.read().await.is_empty() {
                            tracing::debug!("response cache is empty, nothing to sweep");
                            continue;
                        }
                        let evicted = cache.sweep_expired().await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "swept expired cache entries");
                        } else {
                            tracing::debug!("cache sweep found no expired entries");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        SweeperHandle { stop: stop_tx, task }
    }
}

/// Stop handle for the background sweep task.
pub struct SweeperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweep task to exit after its current pass.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Whether the sweep task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_lookup() {
        let cache = ResponseCache::new();
        cache.store("https://example.com/a", "<html>a</html>".into(), Duration::from_secs(5)).await;

        let hit = cache.lookup("https://example.com/a").await;
        assert_eq!(hit.as_deref(), Some("<html>a</html>"));

        let miss = cache.lookup("https://example.com/b").await;
        assert!(miss.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss_before_sweep() {
        let cache = ResponseCache::new();
        cache.store("https://example.com/a", "stale".into(), Duration::from_secs(5)).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        // still stored, but lookup must treat it as absent
        assert_eq!(cache.len().await, 1);
        assert!(cache.lookup("https://example.com/a").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_replaces_and_extends() {
        let cache = ResponseCache::new();
        cache.store("https://example.com/a", "first".into(), Duration::from_secs(5)).await;
        tokio::time::advance(Duration::from_secs(3)).await;
        cache.store("https://example.com/a", "second".into(), Duration::from_secs(5)).await;
        tokio::time::advance(Duration::from_secs(4)).await;

        // 7s after the first write, but the second write reset the window
        assert_eq!(cache.lookup("https://example.com/a").await.as_deref(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = ResponseCache::new();
        cache.store("short", "a".into(), Duration::from_secs(1)).await;
        cache.store("long", "b".into(), Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(2)).await;

        let evicted = cache.sweep_expired().await;
        assert_eq!(evicted, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.lookup("long").await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ResponseCache::new();
        cache.store("a", "a".into(), Duration::from_secs(60)).await;
        cache.store("b", "b".into(), Duration::from_secs(60)).await;

        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_and_stops() {
        let cache = ResponseCache::new();
        cache.store("a", "a".into(), Duration::from_secs(1)).await;

        let sweeper = cache.spawn_sweeper(Duration::from_secs(2));

        // paused time auto-advances, letting the sweep task run its pass
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(cache.len().await, 0);

        sweeper.stop();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(sweeper.is_finished());
    }
}
