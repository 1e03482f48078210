// src/store/mod.rs

use anyhow::Result;
use std::collections::BTreeMap;

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// User metadata attached to a stored object.
pub type Metadata = BTreeMap<String, String>;

/// What `head_object` reports about an existing object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_type: String,
    pub content_length: u64,
    pub metadata: Metadata,
}

impl ObjectHead {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Key-value blob storage, addressed by `(bucket, key)`.
///
/// Writes to a single key are atomic; nothing else is guaranteed.
pub trait BlobStore {
    /// Read the full body of an object. Missing objects are an error.
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Probe an object. A missing object is `Ok(None)`.
    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>>;

    /// Create or replace an object.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &Metadata,
    ) -> Result<()>;
}
