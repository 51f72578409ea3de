//! Two-stage challenge resolution.
//!
//! The protection we work around serves up to two interstitials before the
//! real page: a "wait while we verify" page that resolves on its own, and
//! a human-verification page with a checkbox. The resolver navigates,
//! waits out stage one exactly once, attempts the checkbox for stage two,
//! and returns whatever document is present afterward.

use std::time::Duration;

use chromiumoxide::Page;
use wicket_core::{AlertSink, Error, FetcherConfig};

use crate::browser::{FaultKind, TabSession, classify};
use crate::bypass::{GATEWAY_TIMEOUT_SENTINEL, NAVIGATION_FAILURE_PREFIX};

/// Stage-one interstitial marker text.
pub(crate) const STAGE_ONE_MARKER: &str = "Just a moment...";

/// Stage-two human-verification marker text.
pub(crate) const STAGE_TWO_MARKER: &str = "Verify you are human";

const CHECKBOX_SELECTOR: &str = r#"input[type="checkbox"]"#;

/// Pause after a checkbox click before re-reading content.
const POST_CLICK_WAIT: Duration = Duration::from_millis(500);

/// Drives one tab through navigation and challenge handling.
pub(crate) struct ChallengeResolver<'a> {
    config: &'a FetcherConfig,
    alerts: &'a dyn AlertSink,
}

impl<'a> ChallengeResolver<'a> {
    pub(crate) fn new(config: &'a FetcherConfig, alerts: &'a dyn AlertSink) -> Self {
        Self { config, alerts }
    }

    /// Navigate to `url` and return the final document.
    ///
    /// Expected failures come back as `Ok` sentinel strings (navigation
    /// retry exhaustion, gateway timeout); `Err` is reserved for
    /// connection faults the orchestrator must recover from and for
    /// content-read failures.
    pub(crate) async fn resolve(&self, tab: &TabSession, url: &str) -> Result<String, Error> {
        let page = tab.page();

        let mut last_error = String::new();
        let mut navigated = false;

        for attempt in 1..=self.config.navigation_retries {
            match page.goto(url).await {
                Ok(_) => {
                    navigated = true;
                    break;
                }
                Err(err) => match classify(&err) {
                    FaultKind::Timeout => {
                        tracing::error!(url, "navigation timed out");
                        self.alerts
                            .notify(&format!("gateway timeout while bypassing protection for {url}"))
                            .await;
                        return Ok(GATEWAY_TIMEOUT_SENTINEL.to_string());
                    }
                    FaultKind::Connection => return Err(Error::ConnectionLost(err.to_string())),
                    FaultKind::Page => {
                        tracing::warn!(url, attempt, "navigation failed: {err}");
                        last_error = err.to_string();
                    }
                },
            }
        }

        if !navigated {
            return Ok(format!("{NAVIGATION_FAILURE_PREFIX}{last_error}"));
        }

        let mut content = tab.content().await?;

        if content.contains(STAGE_ONE_MARKER) {
            // single fixed wait, no polling loop
            tracing::debug!(url, "stage-one interstitial detected, waiting it out");
            tokio::time::sleep(self.config.challenge_wait()).await;
            content = tab.content().await?;

            if content.contains(STAGE_TWO_MARKER) {
                tracing::debug!(url, "stage-two verification detected, attempting checkbox");
                self.click_challenge_checkbox(page).await;
                content = tab.content().await?;
            }
        } else {
            tracing::debug!(url, "no challenge detected");
        }

        Ok(content)
    }

    /// Best-effort click of the verification checkbox.
    ///
    /// Absence of the control is logged, never fatal; the caller returns
    /// whatever content the page holds afterward.
    async fn click_challenge_checkbox(&self, page: &Page) {
        match page.find_element(CHECKBOX_SELECTOR).await {
            Ok(checkbox) => match checkbox.click().await {
                Ok(_) => {
                    tracing::debug!("clicked verification checkbox");
                    tokio::time::sleep(POST_CLICK_WAIT).await;
                }
                Err(e) => tracing::debug!("verification checkbox click failed: {e}"),
            },
            Err(_) => tracing::debug!("no verification checkbox found on page"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_distinct() {
        // a stage-two page must not be mistaken for plain content
        let stage_two = "<title>Just a moment...</title><p>Verify you are human</p>";
        assert!(stage_two.contains(STAGE_ONE_MARKER));
        assert!(stage_two.contains(STAGE_TWO_MARKER));

        let real = "<html><body>Chapter 1</body></html>";
        assert!(!real.contains(STAGE_ONE_MARKER));
        assert!(!real.contains(STAGE_TWO_MARKER));
    }
}
