//! Worksheet layout scanning and row splicing.

use super::cell::{column_to_letters, parse_reference};
use super::workbook::attribute;
use crate::common::xml::unescape_xml;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Where new rows go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataSpan {
    /// `<sheetData/>`: byte range of the whole element
    Empty { start: usize, end: usize },
    /// Offset of `</sheetData>`
    Open { close: usize },
}

/// A cell of the header row, before shared strings are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderCell {
    pub column: u32,
    pub text: String,
    /// `text` is an index into the shared string table
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SheetLayout {
    pub data: DataSpan,
    /// Highest row number present, 0 when the sheet has no rows
    pub last_row: u32,
    /// Cells of the first row
    pub header: Vec<HeaderCell>,
    /// Byte range of `<dimension .../>` and its `ref`
    pub dimension: Option<(usize, usize, String)>,
    /// Namespace prefix of `sheetData`, e.g. `x` in `<x:sheetData>`
    pub prefix: Option<String>,
}

#[derive(Default)]
struct OpenCell {
    column: u32,
    kind: Option<String>,
    text: String,
}

/// Scan a worksheet part. Fails when it is not well-formed or has no `sheetData`.
pub(crate) fn scan(xml: &str) -> Result<SheetLayout, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut data = None;
    let mut dimension = None;
    let mut last_row = 0u32;
    let mut header: Vec<HeaderCell> = Vec::new();
    let mut rows_seen = 0usize;
    let mut in_header = false;
    let mut cell: Option<OpenCell> = None;
    let mut text_start: Option<usize> = None;
    let mut prefix = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {e}", reader.error_position()))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Empty(e) => match e.local_name().as_ref() {
                b"sheetData" => {
                    prefix = name_prefix(&e);
                    data = Some(DataSpan::Empty { start: before, end: after });
                },
                b"dimension" => {
                    dimension = Some((before, after, attribute(&e, b"ref").unwrap_or_default()));
                },
                b"row" => {
                    rows_seen += 1;
                    last_row = next_row(&e, last_row);
                },
                _ => {},
            },
            Event::Start(e) => match e.local_name().as_ref() {
                b"sheetData" => prefix = name_prefix(&e),
                b"row" => {
                    rows_seen += 1;
                    last_row = next_row(&e, last_row);
                    in_header = rows_seen == 1;
                },
                b"c" if in_header => {
                    cell = Some(OpenCell {
                        column: cell_column(&e, &header),
                        kind: attribute(&e, b"t"),
                        text: String::new(),
                    });
                },
                b"v" | b"t" if cell.is_some() => text_start = Some(after),
                _ => {},
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"sheetData" => data = Some(DataSpan::Open { close: before }),
                b"row" => in_header = false,
                b"v" | b"t" => {
                    if let (Some(start), Some(open)) = (text_start.take(), cell.as_mut()) {
                        open.text.push_str(&unescape_xml(&xml[start..before]));
                    }
                },
                b"c" => {
                    if let Some(open) = cell.take()
                        && !open.text.trim().is_empty()
                    {
                        header.push(HeaderCell {
                            column: open.column,
                            text: open.text.trim().to_string(),
                            shared: open.kind.as_deref() == Some("s"),
                        });
                    }
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    let data = data.ok_or_else(|| "worksheet has no sheetData element".to_string())?;
    Ok(SheetLayout {
        data,
        last_row,
        header,
        dimension,
        prefix,
    })
}

fn name_prefix(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
}

/// Put every element of generated markup into namespace prefix `prefix`.
///
/// `markup` must be engine output: text content is escaped, so each `<`
/// opens a tag.
fn qualify(markup: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(markup.len() + markup.len() / 8);
    let mut rest = markup;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..=lt]);
        rest = &rest[lt + 1..];
        if let Some(after) = rest.strip_prefix('/') {
            out.push('/');
            rest = after;
        }
        out.push_str(prefix);
        out.push(':');
    }
    out.push_str(rest);
    out
}

fn next_row(e: &quick_xml::events::BytesStart<'_>, last_row: u32) -> u32 {
    attribute(e, b"r")
        .and_then(|r| r.parse::<u32>().ok())
        .unwrap_or(last_row + 1)
        .max(last_row)
}

fn cell_column(e: &quick_xml::events::BytesStart<'_>, header: &[HeaderCell]) -> u32 {
    attribute(e, b"r")
        .and_then(|r| parse_reference(&r).0)
        .unwrap_or_else(|| header.last().map_or(1, |h| h.column + 1))
}

impl SheetLayout {
    /// Insert `rows` and widen the dimension to `last_column` x `last_row`.
    ///
    /// Unprefixed `rows` markup takes the prefix `sheetData` carries.
    pub fn splice(&self, xml: &str, rows: &str, last_column: u32, last_row: u32) -> String {
        let local = |markup: String| match &self.prefix {
            Some(prefix) => qualify(&markup, prefix),
            None => markup,
        };
        let mut edits: Vec<(usize, usize, String)> = Vec::with_capacity(2);
        match self.data {
            DataSpan::Empty { start, end } => {
                edits.push((start, end, local(format!("<sheetData>{rows}</sheetData>"))));
            },
            DataSpan::Open { close } => edits.push((close, close, local(rows.to_string()))),
        }
        if let Some((start, end, reference)) = &self.dimension {
            let widened = widen_dimension(reference, last_column, last_row);
            edits.push((*start, *end, local(format!(r#"<dimension ref="{widened}"/>"#))));
        }
        edits.sort_by_key(|e| e.0);

        let mut out = String::with_capacity(xml.len() + rows.len() + 32);
        let mut pos = 0;
        for (start, end, replacement) in edits {
            out.push_str(&xml[pos..start]);
            out.push_str(&replacement);
            pos = end;
        }
        out.push_str(&xml[pos..]);
        out
    }
}

/// Grow a `ref` such as `A1:C4` so it covers `last_column` x `last_row`.
pub(crate) fn widen_dimension(reference: &str, last_column: u32, last_row: u32) -> String {
    let (first, last) = match reference.split_once(':') {
        Some((first, last)) => (first, last),
        None => (reference, reference),
    };
    let first = if parse_reference(first).0.is_some() && parse_reference(first).1.is_some() {
        first.to_string()
    } else {
        "A1".to_string()
    };
    let (col, row) = parse_reference(last);
    let col = col.unwrap_or(1).max(last_column);
    let row = row.unwrap_or(1).max(last_row);
    let last = format!("{}{}", column_to_letters(col), row);
    if last == first {
        first
    } else {
        format!("{first}:{last}")
    }
}
