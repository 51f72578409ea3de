//! Shared browser process lifecycle.
//!
//! A single Chromium instance serves every fetch. It is launched lazily on
//! first use behind a mutex so concurrent first-callers cannot race two
//! launches, torn down on shutdown or after a connection fault, and
//! relaunched by the next caller.

pub mod filter;
pub(crate) mod stealth;
pub mod tab;

pub use filter::RequestFilterPolicy;
pub use tab::TabSession;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use wicket_core::{Error, FetcherConfig};

/// How a CDP failure should be treated by the fetch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultKind {
    /// Page-level fault; the navigation may be retried in place.
    Page,
    /// The browser did not answer in time; not retried.
    Timeout,
    /// The browser process itself is unreachable; fatal to the shared
    /// handle.
    Connection,
}

/// Classify a CDP error into the retry taxonomy.
pub(crate) fn classify(err: &CdpError) -> FaultKind {
    match err {
        CdpError::Timeout => FaultKind::Timeout,
        CdpError::Ws(_) | CdpError::Io(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            FaultKind::Connection
        }
        _ => FaultKind::Page,
    }
}

struct Inner {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// Lazily launched browser shared by all fetches.
///
/// State machine: NotStarted -> Running -> Closed, with Closed -> Running
/// on the next use. The slot mutex is the single-flight launch guard.
pub struct BrowserHandle {
    config: FetcherConfig,
    slot: Mutex<Option<Inner>>,
}

impl BrowserHandle {
    /// Create a handle; no browser is launched until first use.
    pub fn new(config: FetcherConfig) -> Self {
        Self { config, slot: Mutex::new(None) }
    }

    /// Launch the browser if it is not already running.
    ///
    /// # Errors
    ///
    /// Returns `Error::BrowserLaunch` if the process cannot be started;
    /// launch failures are fatal to the calling fetch.
    pub async fn ensure_started(&self) -> Result<(), Error> {
        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            *slot = Some(launch(&self.config).await?);
        }
        Ok(())
    }

    /// Whether a browser process is currently held.
    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Open a blank page, launching the browser first if needed.
    pub(crate) async fn page(&self) -> Result<Page, Error> {
        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            *slot = Some(launch(&self.config).await?);
        }
        let Some(inner) = slot.as_ref() else {
            return Err(Error::BrowserLaunch("browser slot empty after launch".into()));
        };

        inner.browser.new_page("about:blank").await.map_err(|e| match classify(&e) {
            FaultKind::Connection => Error::ConnectionLost(e.to_string()),
            _ => Error::TabSetup(e.to_string()),
        })
    }

    /// Terminate the browser process.
    ///
    /// Idempotent; a subsequent `ensure_started` relaunches.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(mut inner) = slot.take() {
            if let Err(e) = inner.browser.close().await {
                tracing::warn!("browser close failed: {e}");
            }
            let _ = inner.browser.wait().await;
            inner.handler_task.abort();
            tracing::info!("browser closed");
        }
    }
}

/// Launch a browser with the fixed bypass configuration.
async fn launch(config: &FetcherConfig) -> Result<Inner, Error> {
    tracing::info!(headless = config.headless, "launching browser");

    let mut builder = BrowserConfig::builder()
        .user_data_dir(&config.user_data_dir)
        .request_timeout(config.navigation_timeout())
        .viewport(Some(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: Some(1.0),
            ..Default::default()
        }));

    if !config.headless {
        builder = builder.with_head();
    }

    if !config.sandbox {
        builder = builder.arg("--no-sandbox").arg("--disable-setuid-sandbox");
    }

    if let Some(proxy) = &config.proxy {
        builder = builder.arg(format!("--proxy-server={}", proxy.address));
    }

    builder = builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--ignore-certificate-errors")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-sync");

    let browser_config = builder.build().map_err(Error::BrowserLaunch)?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| Error::BrowserLaunch(e.to_string()))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("browser handler event error: {e}");
                break;
            }
        }
    });

    Ok(Inner { browser, handler_task })
}
