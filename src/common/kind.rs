//! Document kinds understood by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two ZIP-packaged office formats a template can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Flowing text document (.docx)
    #[serde(alias = "docx", alias = "wordProcessing", alias = "word")]
    WordProcessing,
    /// Tabular workbook (.xlsx)
    #[serde(alias = "xlsx", alias = "excel")]
    Spreadsheet,
}

impl DocumentKind {
    /// File extension of generated documents, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::WordProcessing => "docx",
            DocumentKind::Spreadsheet => "xlsx",
        }
    }

    /// Path of the main content part inside the package.
    pub fn main_entry(self) -> &'static str {
        match self {
            DocumentKind::WordProcessing => "word/document.xml",
            DocumentKind::Spreadsheet => "xl/workbook.xml",
        }
    }

    /// Local name of the main content part's root element. The namespace
    /// prefix varies by producer (`w:document`, `workbook`, `x:workbook`).
    pub fn root_element(self) -> &'static str {
        match self {
            DocumentKind::WordProcessing => "document",
            DocumentKind::Spreadsheet => "workbook",
        }
    }

    /// Entries every package of this kind must carry.
    pub fn required_entries(self) -> &'static [&'static str] {
        match self {
            DocumentKind::WordProcessing => &[
                "[Content_Types].xml",
                "word/document.xml",
                "_rels/.rels",
            ],
            DocumentKind::Spreadsheet => &["[Content_Types].xml", "xl/workbook.xml", "_rels/.rels"],
        }
    }

    /// MIME type used when storing generated documents.
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentKind::WordProcessing => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            },
            DocumentKind::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            },
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::WordProcessing => f.write_str("word_processing"),
            DocumentKind::Spreadsheet => f.write_str("spreadsheet"),
        }
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "word_processing" | "wordprocessing" | "word" | "docx" => Ok(DocumentKind::WordProcessing),
            "spreadsheet" | "excel" | "xlsx" => Ok(DocumentKind::Spreadsheet),
            other => Err(format!("unknown document kind: {other}")),
        }
    }
}
