// src/fetch/index.rs

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};
use url::Url;

use super::{Session, LISTING_TIMEOUT};

/// Every BLS productivity file we mirror carries this in its name.
pub const FILE_MARKER: &str = "pr.data.0.Current";

/// Used when the index yields nothing recognisable.
pub const FALLBACK_FILE: &str = "pr.data.0.Current";

static FILE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(&format!(r#"[href*="{}"]"#, FILE_MARKER))
        .expect("CSS selector for data file links should be valid")
});

/// Every `href` on an index page that mentions the data-file marker,
/// de-duplicated and sorted. Empty when no link matches.
pub fn matching_refs(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let refs: BTreeSet<String> = doc
        .select(&FILE_SELECTOR)
        .filter_map(|e| e.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect();
    refs.into_iter().collect()
}

/// Like [`matching_refs`], but falls back to `[FALLBACK_FILE]` when nothing
/// matches.
pub fn extract_file_refs(html: &str) -> Vec<String> {
    with_fallback(matching_refs(html))
}

fn with_fallback(refs: Vec<String>) -> Vec<String> {
    if refs.is_empty() {
        vec![FALLBACK_FILE.to_string()]
    } else {
        refs
    }
}

/// Fetch the index page and list the candidate data files on it.
///
/// A non-success status is an error; an index without matches is not.
#[instrument(level = "info", skip(session), fields(%index_url))]
pub fn list_remote_files(session: &Session, index_url: &Url) -> Result<Vec<String>> {
    let html = session
        .get_ok(index_url, LISTING_TIMEOUT)?
        .text()
        .with_context(|| format!("Reading text from {}", index_url))?;

    let refs = matching_refs(&html);
    if refs.is_empty() {
        warn!(%index_url, "no data file links on index; using fallback");
    }
    let files = with_fallback(refs);
    info!(count = files.len(), "listed remote files");
    Ok(files)
}
