//! Template retrieval with bounded retries.
//!
//! Each attempt runs under its own timeout. A failed attempt is followed by a
//! backoff of `base_delay * 2^(attempt - 1)` unless it was the last one. An
//! empty body, or one shorter or longer than the length the store announced,
//! counts as a failed attempt.

use crate::common::FailureKind;
use crate::store::{BlobSource, StoreError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Retry budget and timing for template fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub attempt_timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            attempt_timeout_ms: 10_000,
        }
    }
}

impl FetchConfig {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Why one attempt failed.
#[derive(Error, Debug)]
pub enum AttemptFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty body")]
    Empty,

    #[error("received {actual} of {expected} bytes")]
    ShortTransfer { expected: u64, actual: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum FetchError {
    /// The store has no object at the location; not retried
    #[error("Template file missing at {location}")]
    Missing { location: String },

    #[error("Fetching {location} failed after {attempts} attempts: {last}")]
    Exhausted {
        location: String,
        attempts: u32,
        last: AttemptFailure,
    },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::FetchError
    }
}

/// Fetches template buffers from a blob source.
#[derive(Clone)]
pub struct TemplateFetcher {
    source: Arc<dyn BlobSource>,
    config: FetchConfig,
}

impl std::fmt::Debug for TemplateFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateFetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TemplateFetcher {
    pub fn new(source: Arc<dyn BlobSource>, config: FetchConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch the complete buffer at `location`.
    pub async fn fetch(&self, location: &str) -> Result<Bytes, FetchError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(location).await {
                Ok(bytes) => {
                    debug!(location, attempt, bytes = bytes.len(), "fetched template");
                    return Ok(bytes);
                },
                Err(AttemptFailure::Store(StoreError::NotFound(_))) => {
                    return Err(FetchError::Missing {
                        location: location.to_string(),
                    });
                },
                Err(failure) if attempt >= attempts => {
                    warn!(location, attempt, error = %failure, "giving up on template fetch");
                    return Err(FetchError::Exhausted {
                        location: location.to_string(),
                        attempts: attempt,
                        last: failure,
                    });
                },
                Err(failure) => {
                    let delay = self.config.backoff(attempt);
                    warn!(location, attempt, error = %failure, ?delay, "template fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }

    async fn attempt(&self, location: &str) -> Result<Bytes, AttemptFailure> {
        let timeout = self.config.attempt_timeout();
        let object = tokio::time::timeout(timeout, self.source.get(location))
            .await
            .map_err(|_| AttemptFailure::Timeout(timeout))??;

        let actual = object.bytes.len() as u64;
        if actual == 0 {
            return Err(AttemptFailure::Empty);
        }
        if let Some(expected) = object.content_length
            && expected != actual
        {
            return Err(AttemptFailure::ShortTransfer { expected, actual });
        }
        Ok(object.bytes)
    }
}
