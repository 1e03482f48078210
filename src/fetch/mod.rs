// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub mod download;
pub mod index;
pub mod population;

pub use download::{download_with_retry, RetryPolicy};
pub use index::{extract_file_refs, list_remote_files, matching_refs};
pub use population::{fetch_population_all_years, parse_population_payload, save_population};

pub const DEFAULT_USER_AGENT: &str = "rearc-data-quest/1.0";

/// Timeout for the index page.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for data downloads and the population API.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// The process-wide HTTP session: one client with the identifying headers set.
///
/// Build it once at startup and hand it by reference to the lister, the sync
/// engine and the population fetcher.
#[derive(Clone, Debug)]
pub struct Session {
    client: Client,
}

impl Session {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }

    /// Issue a GET with a per-request timeout. The status is not checked.
    pub fn get(&self, url: &Url, timeout: Duration) -> Result<Response> {
        debug!(%url, ?timeout, "GET");
        self.client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .with_context(|| format!("GET {} failed", url))
    }

    /// GET that fails on any non-success status.
    pub fn get_ok(&self, url: &Url, timeout: Duration) -> Result<Response> {
        self.get(url, timeout)?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", url))
    }
}
