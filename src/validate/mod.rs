//! Structural validation of template packages.
//!
//! A fetched buffer goes through ordered checks, cheapest and most fatal
//! first, stopping at the first failure:
//!
//! 1. size floor
//! 2. ZIP signature
//! 3. archive open
//! 4. required entries
//! 5. main content XML sanity
//!
//! The verdict always carries the diagnostics gathered so far, valid or not.

use crate::archive::Archive;
use crate::common::{DocumentKind, FailureKind};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First two bytes of every ZIP local file header.
pub const ZIP_MAGIC: [u8; 2] = [0x50, 0x4B];

/// Thresholds used by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Smallest acceptable .docx buffer, in bytes
    pub min_word_processing_size: usize,
    /// Smallest acceptable .xlsx buffer, in bytes
    pub min_spreadsheet_size: usize,
    /// Smallest acceptable main content part, in bytes
    pub min_main_entry_size: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_word_processing_size: 1024,
            min_spreadsheet_size: 1024,
            min_main_entry_size: 64,
        }
    }
}

impl ValidatorConfig {
    pub fn size_floor(&self, kind: DocumentKind) -> usize {
        match kind {
            DocumentKind::WordProcessing => self.min_word_processing_size,
            DocumentKind::Spreadsheet => self.min_spreadsheet_size,
        }
    }
}

/// One validation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    SizeFloor,
    Signature,
    ArchiveOpen,
    RequiredEntries,
    MainContent,
}

/// Everything the validator observed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub byte_size: usize,
    pub size_floor: usize,
    /// First bytes of the buffer, as uppercase hex pairs
    pub signature: Option<String>,
    pub entry_count: Option<usize>,
    pub missing_entries: Vec<String>,
    pub main_entry: String,
    pub main_entry_size: Option<usize>,
    pub root_open: Option<bool>,
    pub root_close: Option<bool>,
    pub corrupt_offset: Option<u64>,
    pub message: Option<String>,
    /// Checks that ran, in order
    pub checks: Vec<Check>,
}

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub failure: Option<FailureKind>,
    pub details: Diagnostics,
}

impl ValidationVerdict {
    /// Convert into a `Result`, keeping the diagnostics on failure.
    pub fn into_result(self) -> Result<Diagnostics, ValidationError> {
        match self.failure {
            None => Ok(self.details),
            Some(kind) => Err(ValidationError {
                kind,
                message: self
                    .details
                    .message
                    .clone()
                    .unwrap_or_else(|| kind.code().to_string()),
                details: self.details,
            }),
        }
    }
}

/// A failed verdict as an error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct ValidationError {
    pub kind: FailureKind,
    pub message: String,
    pub details: Diagnostics,
}

/// Runs the layered package checks.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a buffer, discarding the opened archive.
    pub fn validate(&self, data: &[u8], kind: DocumentKind) -> ValidationVerdict {
        self.run(Bytes::copy_from_slice(data), kind).0
    }

    /// Validate a buffer and hand back the opened archive on success.
    pub fn open_validated(
        &self,
        data: Bytes,
        kind: DocumentKind,
    ) -> Result<(Archive, Diagnostics), ValidationError> {
        let (verdict, archive) = self.run(data, kind);
        let details = verdict.into_result()?;
        match archive {
            Some(archive) => Ok((archive, details)),
            // A passing verdict always opened the archive.
            None => Err(ValidationError {
                kind: FailureKind::CorruptArchive,
                message: "archive was not opened".to_string(),
                details,
            }),
        }
    }

    fn run(&self, data: Bytes, kind: DocumentKind) -> (ValidationVerdict, Option<Archive>) {
        let mut details = Diagnostics {
            byte_size: data.len(),
            size_floor: self.config.size_floor(kind),
            main_entry: kind.main_entry().to_string(),
            ..Default::default()
        };

        details.checks.push(Check::SizeFloor);
        if data.len() < details.size_floor {
            details.message = Some(format!(
                "{} bytes is below the {} byte minimum for a {} package",
                data.len(),
                details.size_floor,
                kind
            ));
            return (fail(FailureKind::TooSmall, details), None);
        }

        details.checks.push(Check::Signature);
        details.signature = Some(hex_prefix(&data, 4));
        if !data.starts_with(&ZIP_MAGIC) {
            details.message = Some("buffer does not start with the ZIP signature PK".to_string());
            return (fail(FailureKind::NotAnArchive, details), None);
        }

        details.checks.push(Check::ArchiveOpen);
        let archive = match Archive::open(data) {
            Ok(archive) => archive,
            Err(e) => {
                details.corrupt_offset = e.offset();
                details.message = Some(e.to_string());
                return (fail(FailureKind::CorruptArchive, details), None);
            },
        };
        details.entry_count = Some(archive.len());

        details.checks.push(Check::RequiredEntries);
        details.missing_entries = kind
            .required_entries()
            .iter()
            .filter(|entry| !archive.contains(entry))
            .map(|entry| entry.to_string())
            .collect();
        if !details.missing_entries.is_empty() {
            details.message = Some(format!(
                "missing required entries: {}",
                details.missing_entries.join(", ")
            ));
            return (fail(FailureKind::MissingRequiredEntry, details), None);
        }

        details.checks.push(Check::MainContent);
        let xml = match archive.read_string(kind.main_entry()) {
            Ok(xml) => xml,
            Err(e) => {
                details.corrupt_offset = e.offset();
                details.message = Some(e.to_string());
                return (fail(FailureKind::InvalidXmlStructure, details), None);
            },
        };
        details.main_entry_size = Some(xml.len());
        let (open, close) = root_tags_present(&xml, kind.root_element());
        details.root_open = Some(open);
        details.root_close = Some(close);

        if xml.len() < self.config.min_main_entry_size {
            details.message = Some(format!(
                "{} is only {} bytes",
                kind.main_entry(),
                xml.len()
            ));
            return (fail(FailureKind::InvalidXmlStructure, details), None);
        }
        if !(open && close) {
            details.message = Some(format!(
                "{} lacks a matching <{}> ... </{}> pair",
                kind.main_entry(),
                kind.root_element(),
                kind.root_element()
            ));
            return (fail(FailureKind::InvalidXmlStructure, details), None);
        }

        let verdict = ValidationVerdict {
            is_valid: true,
            failure: None,
            details,
        };
        (verdict, Some(archive))
    }
}

fn fail(kind: FailureKind, details: Diagnostics) -> ValidationVerdict {
    ValidationVerdict {
        is_valid: false,
        failure: Some(kind),
        details,
    }
}

fn hex_prefix(data: &[u8], n: usize) -> String {
    data.iter()
        .take(n)
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Report whether a start tag and a later end tag whose local name is `root`
/// both occur. Any namespace prefix is accepted.
fn root_tags_present(xml: &str, root: &str) -> (bool, bool) {
    let bytes = xml.as_bytes();
    let mut open_at = None;
    let mut close = false;
    for lt in memchr::memchr_iter(b'<', bytes) {
        let (closing, name_start) = match bytes.get(lt + 1) {
            Some(b'/') => (true, lt + 2),
            Some(b'?' | b'!') | None => continue,
            Some(_) => (false, lt + 1),
        };
        let name_len = bytes[name_start..]
            .iter()
            .position(|b| matches!(b, b'>' | b'/' | b' ' | b'\t' | b'\r' | b'\n'))
            .unwrap_or(bytes.len() - name_start);
        let name = &bytes[name_start..name_start + name_len];
        let local = match memchr::memrchr(b':', name) {
            Some(colon) => &name[colon + 1..],
            None => name,
        };
        if local != root.as_bytes() {
            continue;
        }
        match (closing, open_at) {
            (false, None) => open_at = Some(lt),
            (true, Some(_)) => close = true,
            _ => {},
        }
    }
    (open_at.is_some(), close)
}
