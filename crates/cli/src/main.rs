//! wicket debug CLI.
//!
//! Fetches one protected URL through the full bypass pipeline and prints
//! the result to stdout. Not the production front-end; exists to exercise
//! the library end-to-end and to inspect what a site actually serves.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wicket_client::{ProtectedFetcher, is_fetch_sentinel};
use wicket_core::{FetcherConfig, LogAlertSink, StoreDb};

#[derive(Debug, Parser)]
#[command(name = "wicket", about = "Fetch a challenge-protected page")]
struct Args {
    /// URL to fetch.
    url: String,

    /// Cache TTL for this fetch, in seconds.
    #[arg(long)]
    cache_time: Option<u64>,

    /// Run the browser with a visible window.
    #[arg(long)]
    headed: bool,

    /// Take an element screenshot instead of printing HTML.
    #[arg(long, value_name = "SELECTOR")]
    screenshot: Option<String>,

    /// Output path for the screenshot (PNG).
    #[arg(long, default_value = "element.png")]
    screenshot_out: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = FetcherConfig::load()?;
    if args.headed {
        config.headless = false;
    }

    let store = Arc::new(StoreDb::open(&config.store_path).await?);
    let fetcher = ProtectedFetcher::new(config, store, Arc::new(LogAlertSink));

    if let Some(selector) = &args.screenshot {
        let tab = fetcher.open_page(&args.url, None).await?;
        let image = tab.screenshot_element(selector).await?;
        tab.close().await;
        std::fs::write(&args.screenshot_out, &image)?;
        eprintln!("wrote {} bytes to {}", image.len(), args.screenshot_out.display());
    } else {
        let cache_time = args.cache_time.map(Duration::from_secs);
        let content = fetcher.fetch_protected(&args.url, cache_time).await?;

        if is_fetch_sentinel(&content) {
            tracing::warn!("fetch returned a failure sentinel");
        }
        println!("{content}");
    }

    fetcher.close().await;

    Ok(())
}
