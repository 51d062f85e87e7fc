//! Reason codes surfaced to callers.
//!
//! Each layer has its own `thiserror` enum; at the orchestrator boundary every
//! one of them collapses into a [`FailureKind`] code plus a message, so
//! callers can tell a template problem from an infrastructure problem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    TooSmall,
    NotAnArchive,
    CorruptArchive,
    MissingRequiredEntry,
    InvalidXmlStructure,
    FetchError,
    RenderError,
    FatalTemplateError,
    TemplateNotFound,
    PersistFailed,
    MalformedRequest,
    NoFilesGenerated,
    DeliveryFailed,
}

/// Who can act on a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The template itself is broken; a template author must fix it.
    Template,
    /// Storage, network or mail trouble; an operator must look at it.
    Infrastructure,
    /// The request envelope is wrong; the caller must fix it.
    Request,
}

impl FailureKind {
    /// Stable reason code as it appears in response bodies.
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::TooSmall => "TooSmall",
            FailureKind::NotAnArchive => "NotAnArchive",
            FailureKind::CorruptArchive => "CorruptArchive",
            FailureKind::MissingRequiredEntry => "MissingRequiredEntry",
            FailureKind::InvalidXmlStructure => "InvalidXmlStructure",
            FailureKind::FetchError => "FetchError",
            FailureKind::RenderError => "RenderError",
            FailureKind::FatalTemplateError => "FatalTemplateError",
            FailureKind::TemplateNotFound => "TemplateNotFound",
            FailureKind::PersistFailed => "PersistFailed",
            FailureKind::MalformedRequest => "MalformedRequest",
            FailureKind::NoFilesGenerated => "NoFilesGenerated",
            FailureKind::DeliveryFailed => "DeliveryFailed",
        }
    }

    pub fn class(self) -> ErrorClass {
        match self {
            FailureKind::TooSmall
            | FailureKind::NotAnArchive
            | FailureKind::CorruptArchive
            | FailureKind::MissingRequiredEntry
            | FailureKind::InvalidXmlStructure
            | FailureKind::RenderError
            | FailureKind::FatalTemplateError => ErrorClass::Template,
            FailureKind::FetchError
            | FailureKind::PersistFailed
            | FailureKind::NoFilesGenerated
            | FailureKind::DeliveryFailed => ErrorClass::Infrastructure,
            FailureKind::TemplateNotFound | FailureKind::MalformedRequest => ErrorClass::Request,
        }
    }

    /// HTTP-equivalent status code: 400 for the request, 404 for an unknown
    /// template, 500 for everything else. [`class`](Self::class) tells
    /// template problems apart from infrastructure ones.
    pub fn status_code(self) -> u16 {
        match self {
            FailureKind::MalformedRequest => 400,
            FailureKind::TemplateNotFound => 404,
            FailureKind::TooSmall
            | FailureKind::NotAnArchive
            | FailureKind::CorruptArchive
            | FailureKind::MissingRequiredEntry
            | FailureKind::InvalidXmlStructure
            | FailureKind::RenderError
            | FailureKind::FatalTemplateError
            | FailureKind::FetchError
            | FailureKind::PersistFailed
            | FailureKind::NoFilesGenerated
            | FailureKind::DeliveryFailed => 500,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
