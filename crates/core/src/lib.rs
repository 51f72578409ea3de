//! Core types and shared functionality for wicket.
//!
//! This crate provides:
//! - In-memory response cache with background sweep
//! - SQLite-backed per-site cookie store
//! - Unified error types
//! - Configuration structures
//! - The alerting boundary

pub mod alert;
pub mod cache;
pub mod config;
pub mod error;
pub mod store;

pub use alert::{AlertSink, LogAlertSink};
pub use cache::{ResponseCache, SweeperHandle};
pub use config::{FetcherConfig, ProxyConfig};
pub use error::Error;
pub use store::{CookieRecord, CookieStore, StoreDb};
