// src/sync.rs

use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, instrument, warn};
use url::Url;

use crate::fetch::{download_with_retry, list_remote_files, RetryPolicy, Session};
use crate::store::{BlobStore, Metadata};

/// Object metadata key holding the hex MD5 of the uploaded body.
pub const FINGERPRINT_KEY: &str = "local_md5";

pub const DEFAULT_PREFIX: &str = "rearc-data-quest/bls/";

const CSV_CONTENT_TYPE: &str = "text/csv";

/// Where the files come from and where they land.
#[derive(Clone, Debug)]
pub struct SyncTarget<'a> {
    pub index_url: &'a Url,
    pub base_url: &'a Url,
    pub bucket: &'a str,
    pub prefix: &'a str,
}

/// Outcome of one sync run, by object key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Hex MD5 of a body.
pub fn fingerprint(body: &[u8]) -> String {
    format!("{:x}", md5::compute(body))
}

/// The name a discovered reference is stored under: the last path segment
/// of its resolved URL.
fn object_name(src: &Url) -> Result<String> {
    src.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("cannot derive a file name from {}", src))
}

/// Resolve listed references into `(url, key)` pairs, one per object key.
///
/// References resolving to the same URL collapse into one. A different URL
/// landing on a key already taken is skipped with a warning.
fn plan_objects(base_url: &Url, prefix: &str, files: &[String]) -> Result<Vec<(Url, String)>> {
    let mut seen_urls = BTreeSet::new();
    let mut owners: BTreeMap<String, Url> = BTreeMap::new();
    let mut planned = Vec::new();

    for name in files {
        let src = base_url
            .join(name)
            .with_context(|| format!("resolving {} against {}", name, base_url))?;
        if !seen_urls.insert(src.clone()) {
            continue;
        }
        let key = format!("{}{}", prefix, object_name(&src)?);
        if let Some(owner) = owners.get(&key) {
            warn!(%key, kept = %owner, skipped = %src, "object key collision; skipping");
            continue;
        }
        owners.insert(key.clone(), src.clone());
        planned.push((src, key));
    }
    Ok(planned)
}

/// Upload `body` unless the stored copy already carries the same fingerprint.
///
/// Returns whether a write happened.
pub fn upload_if_changed(
    store: &dyn BlobStore,
    bucket: &str,
    key: &str,
    body: &[u8],
) -> Result<bool> {
    let md5 = fingerprint(body);
    let head = store
        .head_object(bucket, key)
        .with_context(|| format!("probing {}/{}", bucket, key))?;

    let up_to_date = head
        .as_ref()
        .and_then(|h| h.metadata_value(FINGERPRINT_KEY))
        .is_some_and(|stored| stored == md5);
    if up_to_date {
        return Ok(false);
    }

    let mut metadata = Metadata::new();
    metadata.insert(FINGERPRINT_KEY.to_string(), md5);
    store
        .put_object(bucket, key, body, CSV_CONTENT_TYPE, &metadata)
        .with_context(|| format!("uploading {}/{}", bucket, key))?;
    Ok(true)
}

/// Mirror every data file listed on the index into the store.
///
/// Any file whose download fails aborts the whole run.
#[instrument(
    level = "info",
    skip(session, store, policy),
    fields(index = %target.index_url, bucket = target.bucket)
)]
pub fn sync(
    session: &Session,
    store: &dyn BlobStore,
    target: &SyncTarget<'_>,
    policy: &RetryPolicy,
) -> Result<SyncReport> {
    let files = list_remote_files(session, target.index_url)?;
    let mut report = SyncReport::default();

    for (src, key) in plan_objects(target.base_url, target.prefix, &files)? {
        info!(url = %src, "Fetching");
        let body = download_with_retry(session, &src, policy)
            .with_context(|| format!("downloading {}", src))?;

        if upload_if_changed(store, target.bucket, &key, &body)? {
            info!(bucket = target.bucket, %key, bytes = body.len(), "Uploaded");
            report.uploaded.push(key);
        } else {
            info!(%key, "Already up-to-date");
            report.unchanged.push(key);
        }
    }

    info!(
        uploaded = report.uploaded.len(),
        unchanged = report.unchanged.len(),
        "sync complete"
    );
    Ok(report)
}
