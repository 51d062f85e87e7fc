//! Word-processing (.docx) template engine.
//!
//! Placeholders such as `{customer.full_name}` are resolved against a data
//! context and substituted into the main document part, plus headers,
//! footers, footnotes and endnotes. Everything else in the package is carried
//! over unchanged.
//!
//! # Example
//!
//! ```rust,no_run
//! use docstamp::archive::Archive;
//! use docstamp::common::Value;
//! use docstamp::ooxml::docx::{DocumentEngine, TemplateOptions};
//!
//! let data = std::fs::read("to_trinh_tham_dinh.docx")?;
//! let mut archive = Archive::open(data)?;
//! let context = Value::map().with("customer", Value::map().with("full_name", "Nguyen Van A"));
//!
//! let rendered = DocumentEngine::new(TemplateOptions::default()).render(&mut archive, &context)?;
//! for missing in &rendered.report.missing_variables {
//!     eprintln!("no value for {missing}");
//! }
//! std::fs::write("out.docx", rendered.content)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod render;
mod runs;
pub mod tokens;

pub use render::{DocumentEngine, MissingValuePolicy, TemplateOptions};
