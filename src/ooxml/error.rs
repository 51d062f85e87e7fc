/// Error types for template rendering.
use crate::archive::ArchiveError;
use crate::common::FailureKind;
use thiserror::Error;

/// Result type for template rendering.
pub type Result<T> = std::result::Result<T, TemplateError>;

#[derive(Error, Debug)]
pub enum TemplateError {
    /// Placeholders without a value, under the strict missing-value policy
    #[error("Unresolved placeholders: {}", .unresolved.join(", "))]
    Render { unresolved: Vec<String> },

    /// A part that must be rewritten cannot be parsed as XML
    #[error("Fatal template error in {part}: {reason}")]
    Fatal { part: String, reason: String },

    /// Archive access failed while reading or rewriting the package
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl TemplateError {
    pub(crate) fn fatal(part: &str, reason: impl Into<String>) -> Self {
        TemplateError::Fatal {
            part: part.to_string(),
            reason: reason.into(),
        }
    }

    /// Reason code for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            TemplateError::Render { .. } => FailureKind::RenderError,
            TemplateError::Fatal { .. } => FailureKind::FatalTemplateError,
            TemplateError::Archive(ArchiveError::EntryNotFound(_)) => FailureKind::FatalTemplateError,
            TemplateError::Archive(ArchiveError::CorruptArchive { .. }) => FailureKind::CorruptArchive,
            TemplateError::Archive(ArchiveError::Io(_)) => FailureKind::FatalTemplateError,
        }
    }
}
