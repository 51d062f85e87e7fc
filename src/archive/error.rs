/// Error types for archive operations.
use thiserror::Error;

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Malformed central directory, entry header or entry data
    #[error(
        "Corrupt archive{}: {reason}",
        .offset.map(|o| format!(" at byte {o}")).unwrap_or_default()
    )]
    CorruptArchive { offset: Option<u64>, reason: String },

    /// Entry not present in the archive
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// IO error while writing the output archive
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub(crate) fn corrupt(offset: Option<u64>, reason: impl Into<String>) -> Self {
        ArchiveError::CorruptArchive {
            offset,
            reason: reason.into(),
        }
    }

    /// Byte offset of the damage, when it could be determined.
    pub fn offset(&self) -> Option<u64> {
        match self {
            ArchiveError::CorruptArchive { offset, .. } => *offset,
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::FileNotFound => ArchiveError::EntryNotFound(String::new()),
            other => ArchiveError::corrupt(None, other.to_string()),
        }
    }
}
