//! Office Open XML template rendering.
//!
//! Both engines take an opened [`Archive`] and a data context, rewrite only the
//! parts they need to, and serialize the package again:
//!
//! - `docx`: placeholder substitution in word-processing documents
//! - `xlsx`: row appending in spreadsheet workbooks
//!
//! Use [`render_template`] when the document kind is only known at runtime.
pub mod docx;
pub mod error;
pub mod xlsx;

pub use docx::{DocumentEngine, MissingValuePolicy, TemplateOptions};
pub use error::{Result, TemplateError};
pub use xlsx::WorkbookEngine;

use crate::archive::Archive;
use crate::common::{DocumentKind, Value};
use serde::Serialize;

/// Serialized output of one render plus what happened along the way.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub content: Vec<u8>,
    pub report: RenderReport,
}

/// Non-fatal findings of a render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    /// Unresolved placeholder paths, first-seen order, no duplicates
    pub missing_variables: Vec<String>,
    /// Sheets named in the data but absent from the workbook
    pub skipped_sheets: Vec<String>,
    /// `Sheet!key` pairs whose key has no header column
    pub unmapped_columns: Vec<String>,
    pub warnings: Vec<String>,
    pub substitutions: usize,
    pub rows_written: usize,
}

impl RenderReport {
    pub(crate) fn note_missing(&mut self, path: String) {
        if !self.missing_variables.contains(&path) {
            self.missing_variables.push(path);
        }
    }

    pub(crate) fn note_unmapped(&mut self, sheet: &str, key: &str) {
        let entry = format!("{sheet}!{key}");
        if !self.unmapped_columns.contains(&entry) {
            self.unmapped_columns.push(entry);
        }
    }
}

/// Render `archive` with the engine matching `kind`.
pub fn render_template(
    kind: DocumentKind,
    options: &TemplateOptions,
    archive: &mut Archive,
    context: &Value,
) -> Result<Rendered> {
    match kind {
        DocumentKind::WordProcessing => DocumentEngine::new(options.clone()).render(archive, context),
        DocumentKind::Spreadsheet => WorkbookEngine::new().render(archive, context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_deduplicates() {
        let mut report = RenderReport::default();
        report.note_missing("a".into());
        report.note_missing("b".into());
        report.note_missing("a".into());
        report.note_unmapped("Sheet1", "Note");
        report.note_unmapped("Sheet1", "Note");
        assert_eq!(report.missing_variables, vec!["a", "b"]);
        assert_eq!(report.unmapped_columns, vec!["Sheet1!Note"]);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let json = serde_json::to_value(RenderReport::default()).unwrap();
        assert!(json.get("missingVariables").is_some());
        assert!(json.get("rowsWritten").is_some());
    }
}
