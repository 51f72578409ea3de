//! Unified error types for wicket.
//!
//! Expected fetch-path outcomes (navigation retry exhaustion, gateway
//! timeout) are NOT represented here; they surface as sentinel strings so
//! callers can branch on content. Only genuinely unexpected failures use
//! this enum.

use tokio_rusqlite::rusqlite;

/// Unified error types for the wicket crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an unparseable URL).
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Browser process failed to launch or to build its configuration.
    #[error("BROWSER_LAUNCH: {0}")]
    BrowserLaunch(String),

    /// The browser connection dropped and could not be re-established
    /// within the configured retry budget.
    #[error("CONNECTION_LOST: {0}")]
    ConnectionLost(String),

    /// A CDP command issued while configuring a tab was rejected.
    #[error("TAB_SETUP: {0}")]
    TabSetup(String),

    /// Navigation failed outside the retried bypass path (e.g. open_page).
    #[error("NAVIGATION: {0}")]
    Navigation(String),

    /// Reading page content failed after a successful navigation.
    #[error("CONTENT_RETRIEVAL: {0}")]
    ContentRetrieval(String),

    /// Screenshot selector matched no element on the page.
    #[error("ELEMENT_NOT_FOUND: {0}")]
    ElementNotFound(String),

    /// Screenshot capture failed after the element was located.
    #[error("SCREENSHOT_FAILED: {0}")]
    ScreenshotFailed(String),

    /// Cookie store operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row failed to (de)serialize.
    #[error("STORE_ERROR: corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ElementNotFound("div.missing".to_string());
        assert!(err.to_string().contains("ELEMENT_NOT_FOUND"));
        assert!(err.to_string().contains("div.missing"));
    }

    #[test]
    fn test_connection_lost_display() {
        let err = Error::ConnectionLost("websocket closed".to_string());
        assert!(err.to_string().starts_with("CONNECTION_LOST"));
    }
}
