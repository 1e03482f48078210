use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{BlobStore, Metadata, ObjectHead};

#[derive(Clone, Debug)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
    metadata: Metadata,
}

/// An in-process store, mostly for tests and dry runs. Counts every put.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    puts: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put_object` calls served so far.
    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl BlobStore for MemoryStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.body.clone())
            .ok_or_else(|| anyhow!("no such object: {}/{}", bucket, key))
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| ObjectHead {
                content_type: o.content_type.clone(),
                content_length: o.body.len() as u64,
                metadata: o.metadata.clone(),
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
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.to_vec(),
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
            },
        );
        *self.puts.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_of_missing_object_is_none() -> Result<()> {
        let store = MemoryStore::new();
        assert!(store.head_object("b", "k")?.is_none());
        assert!(store.get_object("b", "k").is_err());
        Ok(())
    }

    #[test]
    fn put_then_head_and_get() -> Result<()> {
        let store = MemoryStore::new();
        let mut meta = Metadata::new();
        meta.insert("local_md5".into(), "abc".into());
        store.put_object("b", "dir/k", b"hello", "text/csv", &meta)?;

        let head = store.head_object("b", "dir/k")?.expect("object exists");
        assert_eq!(head.content_type, "text/csv");
        assert_eq!(head.content_length, 5);
        assert_eq!(head.metadata_value("local_md5"), Some("abc"));
        assert_eq!(store.get_object("b", "dir/k")?, b"hello");
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.keys("b"), vec!["dir/k".to_string()]);
        assert!(store.keys("other").is_empty());
        Ok(())
    }
}
