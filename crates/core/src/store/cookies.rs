//! Per-site cookie persistence.
//!
//! One row per site identity holding the full cookie set as JSON. The
//! fetch path rewrites the whole set after every successful navigation,
//! so row-level granularity is all that is needed.

use super::connection::StoreDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A single persisted cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".into()
}

impl StoreDb {
    /// Load the cookie set persisted for a site.
    ///
    /// Returns None if the site has never been saved.
    pub async fn get_cookies(&self, site: &str) -> Result<Option<Vec<CookieRecord>>, Error> {
        let site = site.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Vec<CookieRecord>>, Error> {
                let result = conn.query_row(
                    "SELECT cookies_json FROM cookies WHERE site = ?1",
                    params![site],
                    |row| row.get::<_, String>(0),
                );

                match result {
                    Ok(json) => {
                        let records = serde_json::from_str(&json)
                            .map_err(|e| Error::CorruptRecord(e.to_string()))?;
                        Ok(Some(records))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Persist the cookie set for a site.
    ///
    /// Uses UPSERT semantics: the previous set for the site is replaced
    /// wholesale.
    pub async fn set_cookies(&self, site: &str, cookies: &[CookieRecord]) -> Result<(), Error> {
        let site = site.to_string();
        let json = serde_json::to_string(cookies).map_err(|e| Error::CorruptRecord(e.to_string()))?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cookies (site, cookies_json, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(site) DO UPDATE SET
                        cookies_json = excluded.cookies_json,
                        updated_at = excluded.updated_at",
                    params![site, json, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cookie(name: &str, value: &str) -> CookieRecord {
        CookieRecord {
            name: name.to_string(),
            value: value.to_string(),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let cookies = vec![make_cookie("cf_clearance", "abc123"), make_cookie("session", "xyz")];

        db.set_cookies("example.com", &cookies).await.unwrap();

        let loaded = db.get_cookies("example.com").await.unwrap().unwrap();
        assert_eq!(loaded, cookies);
    }

    #[tokio::test]
    async fn test_get_missing_site() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let result = db.get_cookies("never-seen.com").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_previous_set() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.set_cookies("example.com", &[make_cookie("old", "1")]).await.unwrap();
        db.set_cookies("example.com", &[make_cookie("new", "2")]).await.unwrap();

        let loaded = db.get_cookies("example.com").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "new");
    }

    #[tokio::test]
    async fn test_sites_are_independent() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.set_cookies("a.com", &[make_cookie("a", "1")]).await.unwrap();
        db.set_cookies("b.com", &[make_cookie("b", "2")]).await.unwrap();

        let a = db.get_cookies("a.com").await.unwrap().unwrap();
        let b = db.get_cookies("b.com").await.unwrap().unwrap();
        assert_eq!(a[0].name, "a");
        assert_eq!(b[0].name, "b");
    }

    #[tokio::test]
    async fn test_empty_set_round_trips() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.set_cookies("example.com", &[]).await.unwrap();

        let loaded = db.get_cookies("example.com").await.unwrap().unwrap();
        assert!(loaded.is_empty());
    }
}
