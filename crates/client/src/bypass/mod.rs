//! Protection-bypassing fetch orchestration.
//!
//! `ProtectedFetcher` is the entry point: cache-first fetches through a
//! shared browser, with cookie seeding/persistence around each navigation
//! and bounded recovery from browser connection faults. Expected failures
//! are returned as sentinel strings (see `is_fetch_sentinel`) so callers
//! branch on content instead of catching errors.

pub(crate) mod cookies;
mod resolver;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use wicket_core::cache::SWEEP_SLACK;
use wicket_core::{AlertSink, CookieStore, Error, FetcherConfig, ResponseCache, SweeperHandle};

use crate::browser::{BrowserHandle, FaultKind, RequestFilterPolicy, TabSession, classify};
use cookies::CookieBridge;
use resolver::ChallengeResolver;

/// Literal prefix of the navigation-failure sentinel; the underlying
/// error description follows it.
pub const NAVIGATION_FAILURE_PREFIX: &str = "Ray ID\n";

/// Sentinel returned when navigation times out.
pub const GATEWAY_TIMEOUT_SENTINEL: &str = "Ray ID: 504 Gateway Timeout";

/// Whether a `fetch_protected` result is a failure sentinel rather than
/// page content.
pub fn is_fetch_sentinel(content: &str) -> bool {
    content == GATEWAY_TIMEOUT_SENTINEL || content.starts_with(NAVIGATION_FAILURE_PREFIX)
}

/// Challenge-bypassing fetcher.
///
/// One instance owns one shared browser, one response cache with its sweep
/// task, and one cookie-store connection. Instances are independent: each
/// carries the cache-time default it was constructed with, and
/// `set_cache_time` overrides it for that instance only.
pub struct ProtectedFetcher {
    config: FetcherConfig,
    browser: BrowserHandle,
    cache: ResponseCache,
    sweeper: SweeperHandle,
    ignored_urls: RwLock<HashSet<String>>,
    cache_time_override: RwLock<Option<Duration>>,
    bridge: CookieBridge,
    alerts: Arc<dyn AlertSink>,
}

impl ProtectedFetcher {
    /// Create a fetcher. The browser is not launched until first use;
    /// the cache sweep task starts immediately.
    pub fn new(config: FetcherConfig, store: Arc<dyn CookieStore>, alerts: Arc<dyn AlertSink>) -> Self {
        let cache = ResponseCache::new();
        let sweeper = cache.spawn_sweeper(config.cache_time() + SWEEP_SLACK);
        let bridge = CookieBridge::new(store, &config.cookie_exempt_sites);
        let browser = BrowserHandle::new(config.clone());

        tracing::info!(
            default_cache_time_secs = config.cache_time_secs,
            "protected fetcher initialized"
        );

        Self {
            config,
            browser,
            cache,
            sweeper,
            ignored_urls: RwLock::new(HashSet::new()),
            cache_time_override: RwLock::new(None),
            bridge,
            alerts,
        }
    }

    /// Fetch the rendered HTML behind challenge protection.
    ///
    /// Consults the cache first; on a miss, drives a fresh tab through
    /// navigation and challenge handling, then caches the result for the
    /// effective TTL (per-call `cache_time`, else the instance override,
    /// else the configured default — resolved on every call).
    ///
    /// Returns either page content or one of the two sentinel strings;
    /// check with [`is_fetch_sentinel`].
    ///
    /// # Errors
    ///
    /// `Error::BrowserLaunch` if the browser cannot start, and
    /// `Error::ConnectionLost` once the connection-fault retry budget is
    /// exhausted.
    pub async fn fetch_protected(
        &self, url: &str, cache_time: Option<Duration>,
    ) -> Result<String, Error> {
        if let Some(content) = self.cache.lookup(url).await {
            tracing::debug!(url, "using cached response");
            return Ok(content);
        }

        let ttl = self.effective_cache_time(cache_time).await;

        let mut backoff = self.config.connection_backoff();
        let mut faults = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(content) => {
                    self.cache_result(url, &content, ttl).await;
                    return Ok(content);
                }
                Err(Error::ConnectionLost(reason)) => {
                    // the shared browser is unusable; discard it wholesale
                    self.browser.close().await;
                    faults += 1;
                    if faults > self.config.connection_retries {
                        return Err(Error::ConnectionLost(reason));
                    }
                    tracing::warn!(
                        url,
                        fault = faults,
                        "browser connection lost ({reason}), retrying in {}s",
                        backoff.as_secs()
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One full bypass attempt: tab open, cookie seed, resolve, cookie
    /// persist, tab close (unconditional).
    async fn fetch_once(&self, url: &str) -> Result<String, Error> {
        let tab = self.new_tab(None).await?;
        let result = self.drive(&tab, url).await;
        tab.close().await;
        result
    }

    async fn drive(&self, tab: &TabSession, url: &str) -> Result<String, Error> {
        self.bridge.seed(tab, url).await;

        let resolver = ChallengeResolver::new(&self.config, self.alerts.as_ref());
        let content = resolver.resolve(tab, url).await?;

        if !is_fetch_sentinel(&content) {
            self.bridge.persist(tab, url).await;
        }

        Ok(content)
    }

    /// Write-path cache admission: sentinels and ignored URLs are never
    /// cached. The read path has no such guard, so an entry written
    /// earlier under a now-ignored URL is still served until it expires.
    async fn cache_result(&self, url: &str, content: &str, ttl: Duration) {
        if is_fetch_sentinel(content) {
            return;
        }
        if self.ignored_urls.read().await.contains(url) {
            tracing::debug!(url, "url is cache-exempt, not caching");
            return;
        }
        self.cache.store(url, content.to_string(), ttl).await;
        tracing::debug!(url, "cached response");
    }

    async fn effective_cache_time(&self, call: Option<Duration>) -> Duration {
        if let Some(ttl) = call {
            return ttl;
        }
        if let Some(ttl) = *self.cache_time_override.read().await {
            return ttl;
        }
        self.config.cache_time()
    }

    /// Open a configured tab without navigating.
    pub async fn new_tab(&self, viewport: Option<(u32, u32)>) -> Result<TabSession, Error> {
        let policy = RequestFilterPolicy::new(self.config.blocked_url_fragments.iter().cloned());
        TabSession::open(&self.browser, &self.config, policy, viewport).await
    }

    /// Open a configured tab and navigate it, for direct page work such
    /// as element screenshots.
    pub async fn open_page(
        &self, url: &str, viewport: Option<(u32, u32)>,
    ) -> Result<TabSession, Error> {
        let tab = self.new_tab(viewport).await?;
        if let Err(err) = tab.page().goto(url).await {
            let mapped = match classify(&err) {
                FaultKind::Connection => Error::ConnectionLost(err.to_string()),
                _ => Error::Navigation(err.to_string()),
            };
            tab.close().await;
            return Err(mapped);
        }
        Ok(tab)
    }

    /// Launch the browser eagerly instead of on first fetch.
    pub async fn ensure_started(&self) -> Result<(), Error> {
        self.browser.ensure_started().await
    }

    /// Replace the set of cache-exempt URLs.
    pub async fn set_ignored_urls(&self, urls: HashSet<String>) {
        tracing::info!(count = urls.len(), "setting ignored urls");
        *self.ignored_urls.write().await = urls;
    }

    /// Current cache-exempt URL set.
    pub async fn ignored_urls(&self) -> HashSet<String> {
        self.ignored_urls.read().await.clone()
    }

    /// Drop every cached response.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Install or clear this instance's cache-time override. When set it
    /// wins over the configured default for this instance only.
    pub async fn set_cache_time(&self, ttl: Option<Duration>) {
        tracing::info!(?ttl, "set instance cache time");
        *self.cache_time_override.write().await = ttl;
    }

    /// Shut down: stop the cache sweep task and close the browser.
    pub async fn close(&self) {
        self.sweeper.stop();
        self.browser.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_core::{LogAlertSink, StoreDb};

    async fn make_fetcher() -> ProtectedFetcher {
        make_fetcher_with(FetcherConfig::default()).await
    }

    async fn make_fetcher_with(config: FetcherConfig) -> ProtectedFetcher {
        let store = Arc::new(StoreDb::open_in_memory().await.unwrap());
        ProtectedFetcher::new(config, store, Arc::new(LogAlertSink))
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(is_fetch_sentinel(GATEWAY_TIMEOUT_SENTINEL));
        assert!(is_fetch_sentinel("Ray ID\nnet::ERR_CONNECTION_RESET"));
        assert!(!is_fetch_sentinel("<html><body>Ray ID mentioned in prose</body></html>"));
        assert!(!is_fetch_sentinel("<html></html>"));
    }

    #[tokio::test]
    async fn test_cached_response_needs_no_browser() {
        let fetcher = make_fetcher().await;
        fetcher
            .cache
            .store("https://example.com/a", "<html>cached</html>".into(), Duration::from_secs(60))
            .await;

        let content = fetcher.fetch_protected("https://example.com/a", None).await.unwrap();
        assert_eq!(content, "<html>cached</html>");

        // the cache hit must short-circuit before any browser work
        assert!(!fetcher.browser.is_running().await);
        fetcher.close().await;
    }

    #[tokio::test]
    async fn test_cache_write_skips_ignored_urls_but_read_does_not() {
        let fetcher = make_fetcher().await;
        let url = "https://example.com/fresh";

        fetcher.set_ignored_urls(HashSet::from([url.to_string()])).await;

        // write path: refused
        fetcher.cache_result(url, "<html>new</html>", Duration::from_secs(60)).await;
        assert!(fetcher.cache.lookup(url).await.is_none());

        // read path: an entry written before the URL became exempt is still served
        fetcher.cache.store(url, "<html>old</html>".into(), Duration::from_secs(60)).await;
        let content = fetcher.fetch_protected(url, None).await.unwrap();
        assert_eq!(content, "<html>old</html>");
        fetcher.close().await;
    }

    #[tokio::test]
    async fn test_sentinels_are_never_cached() {
        let fetcher = make_fetcher().await;
        let url = "https://example.com/down";

        fetcher.cache_result(url, GATEWAY_TIMEOUT_SENTINEL, Duration::from_secs(60)).await;
        fetcher
            .cache_result(url, "Ray ID\nnet::ERR_FAILED", Duration::from_secs(60))
            .await;

        assert!(fetcher.cache.lookup(url).await.is_none());
        fetcher.close().await;
    }

    #[tokio::test]
    async fn test_instance_cache_time_override_is_per_instance() {
        let config = FetcherConfig { cache_time_secs: 5, ..Default::default() };
        let first = make_fetcher_with(config.clone()).await;
        let second = make_fetcher_with(config).await;

        first.set_cache_time(Some(Duration::from_secs(120))).await;

        assert_eq!(first.effective_cache_time(None).await, Duration::from_secs(120));
        // the other instance stays on the shared default
        assert_eq!(second.effective_cache_time(None).await, Duration::from_secs(5));

        first.close().await;
        second.close().await;
    }

    #[tokio::test]
    async fn test_per_call_cache_time_wins() {
        let fetcher = make_fetcher().await;
        fetcher.set_cache_time(Some(Duration::from_secs(120))).await;

        let effective = fetcher.effective_cache_time(Some(Duration::from_secs(7))).await;
        assert_eq!(effective, Duration::from_secs(7));
        fetcher.close().await;
    }

    #[tokio::test]
    async fn test_clearing_override_restores_default() {
        let fetcher = make_fetcher().await;
        fetcher.set_cache_time(Some(Duration::from_secs(120))).await;
        fetcher.set_cache_time(None).await;

        assert_eq!(fetcher.effective_cache_time(None).await, FetcherConfig::default().cache_time());
        fetcher.close().await;
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let fetcher = make_fetcher().await;
        fetcher.cache.store("a", "a".into(), Duration::from_secs(60)).await;

        fetcher.clear_cache().await;
        assert!(fetcher.cache.lookup("a").await.is_none());
        fetcher.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_sweeper() {
        let fetcher = make_fetcher().await;
        fetcher.close().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(fetcher.sweeper.is_finished());
    }

    #[tokio::test]
    #[ignore = "requires network and Chrome/Chromium"]
    async fn test_fetch_protected_end_to_end() {
        let fetcher = make_fetcher().await;
        let content = fetcher
            .fetch_protected("https://example.com", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(content.contains("<html"));

        // second call within the TTL must come from cache
        let again = fetcher.fetch_protected("https://example.com", None).await.unwrap();
        assert_eq!(content, again);

        fetcher.close().await;
    }
}
