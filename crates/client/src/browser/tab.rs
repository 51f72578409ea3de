//! Per-fetch tab configuration.
//!
//! Every fetch gets its own single-use tab, configured with a realistic
//! identity before any navigation: proxy credentials, user agent,
//! viewport, headers, stealth evasion, and request interception wired to
//! the filter policy. The tab is closed unconditionally when the fetch
//! ends, success or failure.

use bytes::Bytes;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EventAuthRequired, EventRequestPaused, FailRequestParams,
    RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use wicket_core::{Error, FetcherConfig};

use super::{BrowserHandle, FaultKind, RequestFilterPolicy, classify, stealth};

/// A configured, single-use browser tab.
///
/// Owned exclusively by the fetch that created it; never shared across
/// concurrent fetches.
pub struct TabSession {
    page: Page,
    intercept_task: Option<JoinHandle<()>>,
}

impl TabSession {
    /// Open and configure a fresh tab.
    ///
    /// Configuration order: proxy auth handling (rides the same fetch
    /// domain as request interception, so both are wired in one pass),
    /// user agent, viewport, headers, stealth scripts.
    pub(crate) async fn open(
        handle: &BrowserHandle, config: &FetcherConfig, policy: RequestFilterPolicy,
        viewport: Option<(u32, u32)>,
    ) -> Result<Self, Error> {
        let page = handle.page().await?;

        let intercept_task = match wire_interception(&page, config, policy).await {
            Ok(task) => task,
            Err(e) => {
                let _ = page.close().await;
                return Err(setup_error(e));
            }
        };

        let session = Self { page, intercept_task: Some(intercept_task) };
        if let Err(e) = session.configure(config, viewport).await {
            session.close().await;
            return Err(e);
        }

        Ok(session)
    }

    async fn configure(&self, config: &FetcherConfig, viewport: Option<(u32, u32)>) -> Result<(), Error> {
        self.page
            .execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
            .await
            .map_err(setup_error)?;

        let (width, height) = viewport.unwrap_or((config.viewport_width, config.viewport_height));
        self.page
            .execute(SetDeviceMetricsOverrideParams::new(width as i64, height as i64, 1.0, false))
            .await
            .map_err(setup_error)?;

        let headers = serde_json::json!({
            "Accept-Language": config.accept_language,
            "Accept-Encoding": "gzip, deflate, br",
            "Connection": "keep-alive",
        });
        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
            .await
            .map_err(setup_error)?;

        stealth::install(&self.page).await.map_err(setup_error)?;

        Ok(())
    }

    /// The underlying CDP page.
    pub(crate) fn page(&self) -> &Page {
        &self.page
    }

    /// Rendered HTML of the current document.
    pub async fn content(&self) -> Result<String, Error> {
        self.page.content().await.map_err(|e| match classify(&e) {
            FaultKind::Connection => Error::ConnectionLost(e.to_string()),
            _ => Error::ContentRetrieval(e.to_string()),
        })
    }

    /// Screenshot a single element as PNG.
    ///
    /// # Errors
    ///
    /// `Error::ElementNotFound` if the selector matches nothing on the
    /// current page; this is a hard failure, not retried.
    pub async fn screenshot_element(&self, selector: &str) -> Result<Bytes, Error> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| Error::ElementNotFound(selector.to_string()))?;

        let data = element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| Error::ScreenshotFailed(e.to_string()))?;

        Ok(Bytes::from(data))
    }

    /// Close the tab and stop its interception task.
    pub async fn close(mut self) {
        if let Some(task) = self.intercept_task.take() {
            task.abort();
        }
        if let Err(e) = self.page.close().await {
            tracing::debug!("tab close failed: {e}");
        }
    }
}

fn setup_error(err: CdpError) -> Error {
    match classify(&err) {
        FaultKind::Connection => Error::ConnectionLost(err.to_string()),
        _ => Error::TabSetup(err.to_string()),
    }
}

/// Enable fetch-domain interception and spawn the task answering it.
///
/// Every paused request is either failed (URL contains a blocklisted
/// fragment) or continued unmodified. Auth challenges are answered with
/// the configured proxy credentials when present.
async fn wire_interception(
    page: &Page, config: &FetcherConfig, policy: RequestFilterPolicy,
) -> Result<JoinHandle<()>, CdpError> {
    let mut request_paused = page.event_listener::<EventRequestPaused>().await?;
    let mut auth_required = page.event_listener::<EventAuthRequired>().await?;

    page.execute(
        fetch::EnableParams::builder()
            .handle_auth_requests(true)
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Request)
                    .build(),
            )
            .build(),
    )
    .await?;

    let credentials = config
        .proxy
        .as_ref()
        .and_then(|proxy| proxy.username.clone().zip(proxy.password.clone()));

    let page = page.clone();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = request_paused.next() => {
                    let Some(event) = event else { break };
                    let request_id = event.request_id.clone();
                    if policy.is_blocked(&event.request.url) {
                        tracing::debug!(url = %event.request.url, "aborting blocklisted sub-request");
                        if page
                            .execute(FailRequestParams::new(request_id, ErrorReason::BlockedByClient))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    } else if page.execute(ContinueRequestParams::new(request_id)).await.is_err() {
                        break;
                    }
                }
                event = auth_required.next() => {
                    let Some(event) = event else { break };
                    let mut auth = AuthChallengeResponse::new(match &credentials {
                        Some(_) => AuthChallengeResponseResponse::ProvideCredentials,
                        None => AuthChallengeResponseResponse::Default,
                    });
                    if let Some((username, password)) = &credentials {
                        auth.username = Some(username.clone());
                        auth.password = Some(password.clone());
                    }
                    if page
                        .execute(ContinueWithAuthParams::new(event.request_id.clone(), auth))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    });

    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_open_and_close_tab() {
        let config = FetcherConfig::default();
        let handle = BrowserHandle::new(config.clone());
        let policy = RequestFilterPolicy::new(config.blocked_url_fragments.iter().cloned());

        let tab = TabSession::open(&handle, &config, policy, None).await.unwrap();
        tab.close().await;
        handle.close().await;
    }

    #[tokio::test]
    #[ignore = "requires network and Chrome/Chromium"]
    async fn test_screenshot_element_not_found() {
        let config = FetcherConfig::default();
        let handle = BrowserHandle::new(config.clone());
        let policy = RequestFilterPolicy::default();

        let tab = TabSession::open(&handle, &config, policy, None).await.unwrap();
        let result = tab.screenshot_element("#does-not-exist").await;
        assert!(matches!(result, Err(Error::ElementNotFound(_))));

        tab.close().await;
        handle.close().await;
    }
}
