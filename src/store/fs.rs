// src/store/fs.rs

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use tracing::debug;

use super::{BlobStore, Metadata, ObjectHead};

const META_SUFFIX: &str = ".meta.json";

/// Sidecar written next to every object body.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    content_length: u64,
    last_modified: DateTime<Utc>,
    #[serde(default)]
    metadata: Metadata,
}

/// A blob store laid out on the local filesystem as `<root>/<bucket>/<key>`.
///
/// Bodies and their `.meta.json` sidecars are written to a `.tmp` file first
/// and renamed into place, so a reader never sees a half-written object.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating blob store root {:?}", &root))?;
        Ok(Self { root })
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let mut path = self.root.join(checked_segment(bucket)?);
        for part in key.split('/').filter(|p| !p.is_empty()) {
            path.push(checked_segment(part)?);
        }
        if key.ends_with(META_SUFFIX) {
            bail!("object key may not end with {}: {}", META_SUFFIX, key);
        }
        Ok(path)
    }
}

/// Reject anything that would escape the bucket directory.
fn checked_segment(part: &str) -> Result<&str> {
    let mut components = Path::new(part).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(part),
        _ => bail!("invalid path segment in object key: {:?}", part),
    }
}

fn sidecar_path(body: &Path) -> PathBuf {
    let mut name = body.as_os_str().to_os_string();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).with_context(|| format!("writing {:?}", &tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming {:?} -> {:?}", &tmp, path))?;
    Ok(())
}

impl BlobStore for FsStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).with_context(|| format!("reading object {}/{}", bucket, key))
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>> {
        let path = sidecar_path(&self.object_path(bucket, key)?);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {:?}", &path)),
        };
        let sidecar: Sidecar = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing object metadata {:?}", &path))?;
        Ok(Some(ObjectHead {
            content_type: sidecar.content_type,
            content_length: sidecar.content_length,
            metadata: sidecar.metadata,
        }))
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }

        write_atomic(&path, body)?;

        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            content_length: body.len() as u64,
            last_modified: Utc::now(),
            metadata: metadata.clone(),
        };
        write_atomic(&sidecar_path(&path), &serde_json::to_vec_pretty(&sidecar)?)?;

        debug!(bucket, key, bytes = body.len(), "stored object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_body_and_metadata() -> Result<()> {
        let tmp = tempdir()?;
        let store = FsStore::new(tmp.path())?;

        assert!(store.head_object("bucket", "a/b/c.csv")?.is_none());

        let mut meta = Metadata::new();
        meta.insert("local_md5".into(), "0123".into());
        store.put_object("bucket", "a/b/c.csv", b"x,y\n1,2\n", "text/csv", &meta)?;

        let head = store
            .head_object("bucket", "a/b/c.csv")?
            .expect("object was written");
        assert_eq!(head.content_type, "text/csv");
        assert_eq!(head.content_length, 8);
        assert_eq!(head.metadata_value("local_md5"), Some("0123"));
        assert_eq!(store.get_object("bucket", "a/b/c.csv")?, b"x,y\n1,2\n");
        assert!(tmp.path().join("bucket/a/b/c.csv").is_file());
        assert!(!tmp.path().join("bucket/a/b/c.csv.tmp").exists());
        Ok(())
    }

    #[test]
    fn overwrite_replaces_metadata() -> Result<()> {
        let tmp = tempdir()?;
        let store = FsStore::new(tmp.path())?;

        let mut meta = Metadata::new();
        meta.insert("local_md5".into(), "first".into());
        store.put_object("b", "k", b"one", "text/csv", &meta)?;
        meta.insert("local_md5".into(), "second".into());
        store.put_object("b", "k", b"two!", "text/csv", &meta)?;

        let head = store.head_object("b", "k")?.expect("object exists");
        assert_eq!(head.metadata_value("local_md5"), Some("second"));
        assert_eq!(store.get_object("b", "k")?, b"two!");
        Ok(())
    }

    #[test]
    fn rejects_keys_that_escape_the_bucket() -> Result<()> {
        let tmp = tempdir()?;
        let store = FsStore::new(tmp.path())?;
        let meta = Metadata::new();
        assert!(store
            .put_object("b", "../outside", b"x", "text/plain", &meta)
            .is_err());
        assert!(store
            .put_object("..", "k", b"x", "text/plain", &meta)
            .is_err());
        assert!(store
            .put_object("b", "k.meta.json", b"x", "text/plain", &meta)
            .is_err());
        Ok(())
    }

    #[test]
    fn missing_object_is_an_error_on_get() -> Result<()> {
        let tmp = tempdir()?;
        let store = FsStore::new(tmp.path())?;
        assert!(store.get_object("b", "nope").is_err());
        Ok(())
    }
}
