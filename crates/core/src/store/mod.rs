//! SQLite-backed persistent store for per-site session cookies.
//!
//! This module provides the upstream persistence boundary the fetch path
//! talks to. It supports:
//!
//! - One cookie set per site identity, stored as JSON
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod cookies;
pub mod migrations;

pub use crate::Error;

pub use connection::StoreDb;
pub use cookies::CookieRecord;

/// Persistent cookie store consumed by the fetch path.
///
/// Implementations must tolerate concurrent calls; failures are treated
/// as non-fatal by callers (cookie persistence is an optimization, not a
/// correctness requirement).
#[async_trait::async_trait]
pub trait CookieStore: Send + Sync {
    /// Load the cookie set persisted for a site, if any.
    async fn get_cookies(&self, site: &str) -> Result<Option<Vec<CookieRecord>>, Error>;

    /// Replace the persisted cookie set for a site.
    async fn set_cookies(&self, site: &str, cookies: &[CookieRecord]) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl CookieStore for StoreDb {
    async fn get_cookies(&self, site: &str) -> Result<Option<Vec<CookieRecord>>, Error> {
        StoreDb::get_cookies(self, site).await
    }

    async fn set_cookies(&self, site: &str, cookies: &[CookieRecord]) -> Result<(), Error> {
        StoreDb::set_cookies(self, site, cookies).await
    }
}
