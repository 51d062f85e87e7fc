//! Docstamp - template-driven document generation for Office packages
//!
//! Fills Word (.docx) and Excel (.xlsx) templates with JSON-like data and
//! produces new, valid packages. The crate is layered:
//!
//! - **Archive Reader** ([`archive`]): opens a ZIP package in memory and
//!   reads, replaces or adds entries.
//! - **Package Validator** ([`validate`]): staged checks that a buffer is a
//!   well-formed package of the expected kind.
//! - **Template engines** ([`ooxml`]): `{placeholder}` substitution in .docx
//!   parts and record appending in .xlsx sheets.
//! - **Fetch & Retry** ([`fetch`]): downloads templates with bounded
//!   exponential backoff.
//! - **Orchestrator** ([`generate`]): runs batches, persists results and
//!   reports partial failures.
//!
//! # Example - Rendering a DOCX template
//!
//! ```no_run
//! use docstamp::common::{DocumentKind, Value};
//! use docstamp::ooxml::{render_template, TemplateOptions};
//! use docstamp::validate::Validator;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("to_trinh.docx")?;
//! let (mut archive, _) = Validator::default().open_validated(bytes.into(), DocumentKind::WordProcessing)?;
//!
//! let data = Value::map().with("customer", Value::map().with("full_name", "Nguyen Van A"));
//! let rendered = render_template(DocumentKind::WordProcessing, &TemplateOptions::default(), &mut archive, &data)?;
//!
//! println!("missing: {:?}", rendered.report.missing_variables);
//! std::fs::write("out.docx", rendered.content)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Validating an upload
//!
//! ```no_run
//! use docstamp::common::DocumentKind;
//! use docstamp::validate::Validator;
//!
//! let bytes = std::fs::read("report.xlsx").unwrap();
//! let verdict = Validator::default().validate(&bytes, DocumentKind::Spreadsheet);
//! if !verdict.is_valid {
//!     eprintln!("{:?}: {:?}", verdict.failure, verdict.details.message);
//! }
//! ```

/// In-memory ZIP package access
pub mod archive;

/// Types shared by every layer: document kinds, data values, failure codes
/// and XML escaping.
pub mod common;

/// YAML and environment configuration
pub mod config;

/// Template download with retry
pub mod fetch;

/// Batch generation, template registry and output naming
pub mod generate;

/// DOCX and XLSX template engines
pub mod ooxml;

/// Blob, metadata and mail backends
pub mod store;

/// Staged package validation
pub mod validate;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use archive::Archive;
pub use common::{DocumentKind, ErrorClass, FailureKind, Value};
pub use config::EngineConfig;
pub use generate::{GenerationEnvelope, GenerationError, GenerationResponse, Orchestrator};
pub use ooxml::{DocumentEngine, Rendered, RenderReport, TemplateOptions, WorkbookEngine};
pub use validate::{ValidationVerdict, Validator};
