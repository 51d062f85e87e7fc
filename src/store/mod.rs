//! Storage and delivery collaborators.
//!
//! The engine talks to three external services through traits:
//!
//! - [`BlobStore`] holds template files and generated documents
//! - [`MetadataStore`] holds JSON records under well-known keys
//! - [`Mailer`] sends a message with attachments
//!
//! In-memory implementations back the tests and the CLI; [`FsBlobStore`]
//! keeps blobs in a directory and, with the `http` feature, [`HttpBlobSource`]
//! reads templates over HTTP.

mod fs;
#[cfg(feature = "http")]
mod http;
mod mail;
mod memory;

pub use fs::FsBlobStore;
#[cfg(feature = "http")]
pub use http::HttpBlobSource;
pub use mail::{Attachment, MailError, MailMessage, Mailer, OutboxMailer};
pub use memory::{MemoryBlobStore, MemoryMetadataStore};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bytes of a stored object and the length the store announced for them.
#[derive(Debug, Clone)]
pub struct BlobObject {
    pub bytes: Bytes,
    /// Declared length (e.g. `Content-Length`), when the store reports one
    pub content_length: Option<u64>,
}

/// A listed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub name: String,
    pub url: String,
}

/// Read access to stored objects.
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Fetch an object by key or by the URL `put` returned for it.
    async fn get(&self, location: &str) -> Result<BlobObject>;
}

/// Read-write object storage.
#[async_trait]
pub trait BlobStore: BlobSource {
    /// Store `bytes` under `key`, returning the object's URL.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<String>;

    /// Remove the object at `url`. Removing a missing object is not an error.
    async fn delete(&self, url: &str) -> Result<()>;

    /// Objects whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>>;
}

/// JSON records under well-known keys.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

/// Reject keys that could escape a store's namespace.
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment == ".." || segment.is_empty())
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
