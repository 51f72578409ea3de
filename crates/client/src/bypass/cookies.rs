//! Cookie seeding and persistence around a fetch.
//!
//! Session cookies are what let a site skip the verification stage on
//! repeat visits, so they are loaded into the tab before navigation and
//! written back after a successful one. Both directions are best-effort:
//! a store failure costs a repeated challenge, not the fetch.

use std::collections::HashSet;
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use url::Url;
use wicket_core::{CookieRecord, CookieStore};

use crate::browser::TabSession;

/// Adapter between a tab and the persistent cookie store.
pub(crate) struct CookieBridge {
    store: Arc<dyn CookieStore>,
    exempt_sites: HashSet<String>,
}

impl CookieBridge {
    pub(crate) fn new(store: Arc<dyn CookieStore>, exempt_sites: &[String]) -> Self {
        Self { store, exempt_sites: exempt_sites.iter().cloned().collect() }
    }

    /// Site identity used to key the store: the URL host.
    pub(crate) fn site_identity(url: &str) -> Option<String> {
        Url::parse(url).ok()?.host_str().map(str::to_string)
    }

    fn is_exempt(&self, site: &str) -> bool {
        self.exempt_sites.contains(site)
    }

    /// Apply the site's persisted cookies to the tab, pre-navigation.
    pub(crate) async fn seed(&self, tab: &TabSession, url: &str) {
        let Some(site) = Self::site_identity(url) else { return };
        if self.is_exempt(&site) {
            tracing::debug!(%site, "cookie seeding skipped for exempt site");
            return;
        }

        let records = match self.store.get_cookies(&site).await {
            Ok(Some(records)) if !records.is_empty() => records,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(%site, "cookie load failed: {e}");
                return;
            }
        };

        let count = records.len();
        for record in records {
            let name = record.name.clone();
            let param = CookieParam::builder()
                .name(record.name)
                .value(record.value)
                .domain(record.domain)
                .path(record.path)
                .secure(record.secure)
                .http_only(record.http_only)
                .build();

            match param {
                Ok(param) => {
                    if let Err(e) = tab.page().set_cookie(param).await {
                        tracing::warn!(%site, "failed to set cookie {name}: {e}");
                    }
                }
                Err(e) => tracing::warn!(%site, "failed to build cookie {name}: {e}"),
            }
        }
        tracing::debug!(%site, count, "seeded session cookies");
    }

    /// Write the tab's current cookies back to the store.
    ///
    /// Called only after a successful resolve, before the tab closes.
    pub(crate) async fn persist(&self, tab: &TabSession, url: &str) {
        let Some(site) = Self::site_identity(url) else { return };
        if self.is_exempt(&site) {
            tracing::debug!(%site, "cookie persistence skipped for exempt site");
            return;
        }

        let cookies = match tab.page().get_cookies().await {
            Ok(cookies) if !cookies.is_empty() => cookies,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(%site, "cookie read failed: {e}");
                return;
            }
        };

        let records: Vec<CookieRecord> = cookies
            .iter()
            .map(|c| CookieRecord {
                name: c.name.clone(),
                value: c.value.clone(),
                domain: c.domain.clone(),
                path: c.path.clone(),
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();

        match self.store.set_cookies(&site, &records).await {
            Ok(()) => tracing::debug!(%site, count = records.len(), "persisted session cookies"),
            Err(e) => tracing::warn!(%site, "cookie save failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_core::StoreDb;

    #[test]
    fn test_site_identity_is_the_host() {
        let site = CookieBridge::site_identity("https://manga.example.com/chapter/1?page=2");
        assert_eq!(site.as_deref(), Some("manga.example.com"));
    }

    #[test]
    fn test_site_identity_rejects_garbage() {
        assert!(CookieBridge::site_identity("not a url").is_none());
    }

    #[tokio::test]
    async fn test_exemption_list() {
        let store = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let bridge = CookieBridge::new(store, &["asura.example.com".to_string()]);

        assert!(bridge.is_exempt("asura.example.com"));
        assert!(!bridge.is_exempt("other.example.com"));
    }
}
