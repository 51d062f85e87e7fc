//! Spreadsheet (.xlsx) template engine.
//!
//! The data context maps sheet names to lists of records. Each record becomes
//! one row appended below the sheet's existing content, with fields placed
//! under the header cell of the same name:
//!
//! ```rust,no_run
//! use docstamp::common::Value;
//! use docstamp::ooxml::xlsx::WorkbookEngine;
//!
//! let data = std::fs::read("bao_cao.xlsx")?;
//! let context = Value::from(serde_json::json!({
//!     "Sheet1": [{"Amount": 1000}, {"Amount": 2000}]
//! }));
//! let rendered = WorkbookEngine::new().render_bytes(data, &context)?;
//! println!("{} rows written", rendered.report.rows_written);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Strings are written as inline strings so the shared string table is never
//! rewritten. Dates are stored as serial numbers with a date cell format.

pub mod cell;
mod render;
mod sheet;
mod styles;
mod workbook;

pub use render::WorkbookEngine;
