use super::{BlobEntry, BlobObject, BlobSource, BlobStore, MetadataStore, Result, StoreError, check_key};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

const SCHEME: &str = "memory://";

/// Blob store kept in a map. URLs look like `memory://<key>`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store synchronously; handy for seeding fixtures.
    pub fn insert(&self, key: &str, bytes: impl Into<Bytes>) -> String {
        self.objects.write().insert(key.to_string(), bytes.into());
        format!("{SCHEME}{key}")
    }

    pub fn contains(&self, location: &str) -> bool {
        self.objects.read().contains_key(key_of(location))
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

fn key_of(location: &str) -> &str {
    location.strip_prefix(SCHEME).unwrap_or(location)
}

#[async_trait]
impl BlobSource for MemoryBlobStore {
    async fn get(&self, location: &str) -> Result<BlobObject> {
        let bytes = self
            .objects
            .read()
            .get(key_of(location))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(location.to_string()))?;
        Ok(BlobObject {
            content_length: Some(bytes.len() as u64),
            bytes,
        })
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<String> {
        check_key(key)?;
        Ok(self.insert(key, bytes))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        self.objects.write().remove(key_of(url));
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .map(|key| BlobEntry {
                name: key.clone(),
                url: format!("{SCHEME}{key}"),
            })
            .collect())
    }
}

/// Metadata store kept in a map.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.records.write().insert(key.to_string(), value);
        Ok(())
    }
}
