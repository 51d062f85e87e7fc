//! Cell references and typed cell output.

use crate::common::Value;
use crate::common::value::format_number;
use crate::common::xml::escape_xml;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Write;

/// Convert column number to Excel column letters (e.g., 1 -> "A", 26 -> "Z", 27 -> "AA").
pub fn column_to_letters(col: u32) -> String {
    let mut letters = String::new();
    let mut col = col;

    while col > 0 {
        col -= 1;
        let letter = ((col % 26) as u8 + b'A') as char;
        letters.insert(0, letter);
        col /= 26;
    }

    letters
}

/// Split a reference such as `"AB12"` into (column, row), both 1-based.
///
/// Either part is `None` when absent or out of range; `"$B$3"` style anchors
/// are accepted.
pub fn parse_reference(reference: &str) -> (Option<u32>, Option<u32>) {
    let reference = reference.trim().replace('$', "");
    let split = reference
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(reference.len());
    let (letters, digits) = reference.split_at(split);

    let column = if letters.is_empty() {
        None
    } else {
        letters.chars().try_fold(0u32, |acc, ch| {
            acc.checked_mul(26)?
                .checked_add(ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
        })
    };
    (column, digits.parse().ok())
}

/// Day count for serial date 0 in the 1900 date system.
fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Excel serial number for a timestamp (1900 date system).
///
/// Dates before 1900-03-01 come out one day early, since Excel counts the
/// nonexistent 1900-02-29.
pub fn excel_serial(date: NaiveDateTime) -> f64 {
    let delta = date - excel_epoch();
    delta.num_milliseconds() as f64 / 86_400_000.0
}

/// A record field converted to something a cell can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum CellData {
    Number(f64),
    Bool(bool),
    Text(String),
    /// Excel serial
    Date(f64),
}

impl CellData {
    /// `None` for null, which leaves the cell out entirely.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(CellData::Bool(*b)),
            Value::Number(n) if n.is_finite() => Some(CellData::Number(*n)),
            Value::Number(n) => Some(CellData::Text(n.to_string())),
            Value::Date(d) => Some(CellData::Date(excel_serial(*d))),
            // Date-looking strings stay text: codes such as "2024-01-15" are data.
            Value::String(s) => Some(CellData::Text(s.clone())),
            Value::List(_) | Value::Map(_) => {
                Some(CellData::Text(serde_json::Value::from(value.clone()).to_string()))
            },
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, CellData::Date(_))
    }
}

/// Append one `<c>` element. `style` is the `cellXfs` index, if any.
pub fn write_cell(xml: &mut String, cell_ref: &str, data: &CellData, style: Option<u32>) {
    let style_attr = match style {
        Some(idx) => format!(r#" s="{idx}""#),
        None => String::new(),
    };

    // Writing to a String cannot fail.
    let _ = match data {
        CellData::Number(n) | CellData::Date(n) => write!(
            xml,
            r#"<c r="{}"{}><v>{}</v></c>"#,
            cell_ref,
            style_attr,
            format_number(*n)
        ),
        CellData::Bool(b) => write!(
            xml,
            r#"<c r="{}"{} t="b"><v>{}</v></c>"#,
            cell_ref,
            style_attr,
            if *b { "1" } else { "0" }
        ),
        CellData::Text(s) => write!(
            xml,
            r#"<c r="{}"{} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            cell_ref,
            style_attr,
            escape_xml(s)
        ),
    };
}
