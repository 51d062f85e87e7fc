use super::{BlobEntry, BlobObject, BlobSource, BlobStore, Result, StoreError, check_key};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

const SCHEME: &str = "file://";

/// Blob store backed by a directory. Keys map to relative paths below it.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url(&self, path: &Path) -> String {
        format!("{SCHEME}{}", path.display())
    }

    /// Path of a key or of a URL this store handed out.
    fn resolve(&self, location: &str) -> Result<PathBuf> {
        let key = match location.strip_prefix(SCHEME) {
            Some(path) => Path::new(path)
                .strip_prefix(&self.root)
                .map_err(|_| StoreError::InvalidKey(location.to_string()))?
                .to_string_lossy()
                .replace('\\', "/"),
            None => location.to_string(),
        };
        check_key(&key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobSource for FsBlobStore {
    async fn get(&self, location: &str) -> Result<BlobObject> {
        let path = self.resolve(location)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(location.to_string()));
            },
            Err(e) => return Err(e.into()),
        };
        let content_length = tokio::fs::metadata(&path).await.ok().map(|m| m.len());
        Ok(BlobObject {
            bytes: Bytes::from(data),
            content_length,
        })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<String> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "stored blob");
        Ok(self.url(&path))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let path = self.resolve(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut read = match tokio::fs::read_dir(&dir).await {
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = read.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let name = relative.to_string_lossy().replace('\\', "/");
                if name.starts_with(prefix) {
                    entries.push(BlobEntry {
                        url: self.url(&path),
                        name,
                    });
                }
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
