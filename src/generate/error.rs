use super::envelope::FailedItem;
use crate::common::{ErrorClass, FailureKind};
use crate::fetch::FetchError;
use crate::ooxml::TemplateError;
use crate::store::StoreError;
use crate::validate::ValidationError;
use thiserror::Error;

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("No template with id {0}")]
    TemplateNotFound(String),

    #[error(transparent)]
    InvalidTemplate(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] TemplateError),

    #[error("Storage failed: {0}")]
    Store(#[from] StoreError),

    /// A metadata record could not be decoded or encoded
    #[error("Metadata record {key} is unreadable: {reason}")]
    Metadata { key: String, reason: String },

    /// The blocking render task died
    #[error("Render task failed: {0}")]
    Worker(String),

    #[error("No files generated ({} failed)", .failed.len())]
    NoFilesGenerated { failed: Vec<FailedItem> },
}

impl GenerationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GenerationError::MalformedRequest(_) => FailureKind::MalformedRequest,
            GenerationError::TemplateNotFound(_) => FailureKind::TemplateNotFound,
            GenerationError::InvalidTemplate(e) => e.kind,
            GenerationError::Fetch(e) => e.kind(),
            GenerationError::Render(e) => e.kind(),
            GenerationError::Store(_) | GenerationError::Metadata { .. } => FailureKind::PersistFailed,
            GenerationError::Worker(_) => FailureKind::FatalTemplateError,
            GenerationError::NoFilesGenerated { .. } => FailureKind::NoFilesGenerated,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }

    /// HTTP-equivalent status.
    ///
    /// A batch where nothing was generated answers with the status its
    /// failures agree on (all 404, ...), and 500 when they differ.
    pub fn status_code(&self) -> u16 {
        match self {
            GenerationError::NoFilesGenerated { failed } => {
                let mut codes = failed.iter().map(|f| f.reason.status_code());
                match codes.next() {
                    Some(first) if codes.all(|c| c == first) => first,
                    _ => 500,
                }
            },
            other => other.kind().status_code(),
        }
    }

    pub(crate) fn metadata(key: &str, reason: impl ToString) -> Self {
        GenerationError::Metadata {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
