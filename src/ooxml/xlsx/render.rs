use super::cell::{CellData, column_to_letters, write_cell};
use super::sheet::{self, HeaderCell};
use super::styles;
use super::workbook::{self, WorkbookParts};
use crate::archive::Archive;
use crate::common::Value;
use crate::ooxml::error::{Result, TemplateError};
use crate::ooxml::{RenderReport, Rendered};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use tracing::{debug, info, warn};

/// Appends records to the named sheets of a workbook template.
#[derive(Debug, Clone, Default)]
pub struct WorkbookEngine;

/// Lazily registered date cell format.
struct DateStyle {
    part: Option<String>,
    index: Option<Option<u32>>,
}

impl DateStyle {
    fn index(&mut self, archive: &mut Archive, report: &mut RenderReport) -> Result<Option<u32>> {
        if let Some(index) = self.index {
            return Ok(index);
        }
        let index = match &self.part {
            Some(part) => {
                let xml = archive
                    .read_string(part)
                    .map_err(|e| TemplateError::fatal(part, e.to_string()))?;
                match styles::add_date_format(&xml) {
                    Some((xml, index)) => {
                        archive.write_entry(part, xml.into_bytes());
                        Some(index)
                    },
                    None => None,
                }
            },
            None => None,
        };
        if index.is_none() {
            warn!("workbook has no cell formats, dates written as plain serials");
            report
                .warnings
                .push("no cellXfs in styles, dates written as plain serial numbers".to_string());
        }
        self.index = Some(index);
        Ok(index)
    }
}

impl WorkbookEngine {
    pub fn new() -> Self {
        Self
    }

    /// Append `context` (`{sheet name: [record, ...]}`) to the workbook and serialize it.
    ///
    /// Records are written in list order below the last existing row, one
    /// column per header cell of the first row. Sheets the workbook does not
    /// have are skipped and reported.
    pub fn render(&self, archive: &mut Archive, context: &Value) -> Result<Rendered> {
        let parts = workbook::read(archive)?;
        let mut report = RenderReport::default();
        let mut dates = DateStyle {
            part: parts.styles.clone(),
            index: None,
        };
        let mut shared_strings: Option<Vec<String>> = None;

        let empty = BTreeMap::new();
        let sheets = match context {
            Value::Map(map) => map,
            Value::Null => &empty,
            _ => {
                report
                    .warnings
                    .push("data is not a map of sheet names to records".to_string());
                &empty
            },
        };

        for (name, records) in sheets {
            let Some(sheet) = parts.sheet(name) else {
                info!(sheet = %name, "sheet not in workbook, skipped");
                report.skipped_sheets.push(name.clone());
                continue;
            };
            let Some(records) = records.as_list() else {
                report.warnings.push(format!("{name}: expected a list of records"));
                continue;
            };

            let xml = archive
                .read_string(&sheet.part)
                .map_err(|e| TemplateError::fatal(&sheet.part, e.to_string()))?;
            let layout = sheet::scan(&xml).map_err(|r| TemplateError::fatal(&sheet.part, r))?;

            let mut columns = header_columns(archive, &parts, &layout.header, &mut shared_strings)?;
            let mut rows = String::new();
            let mut row = layout.last_row;

            if columns.is_empty() && layout.last_row == 0 {
                columns = record_keys(records);
                if !columns.is_empty() {
                    row += 1;
                    write_header(&mut rows, row, &columns);
                }
            }

            let mut written = 0;
            for record in records {
                let Some(fields) = record.as_map() else {
                    report.warnings.push(format!("{name}: skipped a record that is not a map"));
                    continue;
                };
                row += 1;
                let _ = write!(rows, r#"<row r="{row}">"#);
                for (column, header) in &columns {
                    let Some(data) = fields.get(header).and_then(CellData::from_value) else {
                        continue;
                    };
                    let style = if data.is_date() {
                        dates.index(archive, &mut report)?
                    } else {
                        None
                    };
                    let cell_ref = format!("{}{}", column_to_letters(*column), row);
                    write_cell(&mut rows, &cell_ref, &data, style);
                }
                rows.push_str("</row>");
                written += 1;

                for key in fields.keys() {
                    if !columns.iter().any(|(_, h)| h == key) {
                        report.note_unmapped(name, key);
                    }
                }
            }

            if rows.is_empty() {
                continue;
            }
            let last_column = columns.iter().map(|(c, _)| *c).max().unwrap_or(1);
            archive.write_entry(&sheet.part, layout.splice(&xml, &rows, last_column, row).into_bytes());
            report.rows_written += written;
            debug!(sheet = %name, part = %sheet.part, rows = written, last_row = row, "appended rows");
        }

        let content = archive.serialize()?;
        Ok(Rendered { content, report })
    }

    /// Convenience wrapper: open `data` and render it.
    pub fn render_bytes(&self, data: Vec<u8>, context: &Value) -> Result<Rendered> {
        let mut archive = Archive::open(data)?;
        self.render(&mut archive, context)
    }
}

/// `(column, header text)` pairs, shared strings resolved.
fn header_columns(
    archive: &Archive,
    parts: &WorkbookParts,
    header: &[HeaderCell],
    shared_strings: &mut Option<Vec<String>>,
) -> Result<Vec<(u32, String)>> {
    let mut columns = Vec::with_capacity(header.len());
    for cell in header {
        if !cell.shared {
            columns.push((cell.column, cell.text.clone()));
            continue;
        }
        if shared_strings.is_none() {
            *shared_strings = Some(match &parts.shared_strings {
                Some(part) => workbook::read_shared_strings(archive, part)?,
                None => Vec::new(),
            });
        }
        let resolved = cell
            .text
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.as_ref().and_then(|s| s.get(i)));
        match resolved {
            Some(text) => columns.push((cell.column, text.trim().to_string())),
            None => warn!(index = %cell.text, "header refers to a missing shared string"),
        }
    }
    Ok(columns)
}

/// Union of record keys, sorted, numbered from column A.
fn record_keys(records: &[Value]) -> Vec<(u32, String)> {
    let keys: BTreeSet<&String> = records
        .iter()
        .filter_map(Value::as_map)
        .flat_map(|m| m.keys())
        .collect();
    keys.into_iter()
        .enumerate()
        .map(|(i, key)| (i as u32 + 1, key.clone()))
        .collect()
}

fn write_header(rows: &mut String, row: u32, columns: &[(u32, String)]) {
    let _ = write!(rows, r#"<row r="{row}">"#);
    for (column, name) in columns {
        let cell_ref = format!("{}{}", column_to_letters(*column), row);
        write_cell(rows, &cell_ref, &CellData::Text(name.clone()), None);
    }
    rows.push_str("</row>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DocumentKind;
    use crate::testing::{xlsx_builder, xlsx_with_sheets};
    use crate::validate::Validator;
    use chrono::NaiveDate;
    use serde_json::json;

    const AMOUNT_HEADER: &str =
        r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Amount</t></is></c></row>"#;

    fn sheet_xml(content: &[u8], part: &str) -> String {
        Archive::open(content.to_vec()).unwrap().read_string(part).unwrap()
    }

    #[test]
    fn test_amount_rows_are_numeric() {
        let template = xlsx_with_sheets(&[("Sheet1", AMOUNT_HEADER)]);
        let context = Value::from(json!({"Sheet1": [{"Amount": 1000}, {"Amount": 2000}]}));
        let rendered = WorkbookEngine::new().render_bytes(template, &context).unwrap();

        let xml = sheet_xml(&rendered.content, "xl/worksheets/sheet1.xml");
        assert!(xml.contains(r#"<row r="2"><c r="A2"><v>1000</v></c></row>"#), "{xml}");
        assert!(xml.contains(r#"<row r="3"><c r="A3"><v>2000</v></c></row>"#));
        assert!(xml.contains(r#"<dimension ref="A1:A3"/>"#));
        assert_eq!(rendered.report.rows_written, 2);

        let verdict = Validator::default().validate(&rendered.content, DocumentKind::Spreadsheet);
        assert!(verdict.is_valid, "{verdict:?}");
    }

    #[test]
    fn test_columns_follow_header_order() {
        let header = concat!(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c>"#,
            r#"<c r="B1" t="inlineStr"><is><t>Active</t></is></c>"#,
            r#"<c r="C1" t="inlineStr"><is><t>Amount</t></is></c></row>"#,
            r#"<row r="2"><c r="A2" t="inlineStr"><is><t>existing</t></is></c></row>"#,
        );
        let template = xlsx_with_sheets(&[("Sheet1", header)]);
        let context = Value::from(json!({
            "Sheet1": [{"Amount": 12.5, "Name": "Lan & Co", "Active": true, "Extra": 1}]
        }));
        let rendered = WorkbookEngine::new().render_bytes(template, &context).unwrap();

        let xml = sheet_xml(&rendered.content, "xl/worksheets/sheet1.xml");
        assert!(xml.contains(concat!(
            r#"<row r="3">"#,
            r#"<c r="A3" t="inlineStr"><is><t xml:space="preserve">Lan &amp; Co</t></is></c>"#,
            r#"<c r="B3" t="b"><v>1</v></c>"#,
            r#"<c r="C3"><v>12.5</v></c>"#,
            "</row>"
        )));
        assert_eq!(rendered.report.unmapped_columns, vec!["Sheet1!Extra"]);
    }

    #[test]
    fn test_shared_string_header() {
        let header = r#"<row r="1"><c r="A1" t="s"><v>1</v></c><c r="B1" t="s"><v>0</v></c></row>"#;
        let sst = r#"<sst xmlns="urn:x"><si><t>Total</t></si><si><t>Item</t></si></sst>"#;
        let rels = concat!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
            r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
            r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
            "</Relationships>"
        );
        let template = xlsx_builder(&[("Data", header)])
            .entry("xl/_rels/workbook.xml.rels", rels)
            .entry("xl/sharedStrings.xml", sst)
            .build();

        let context = Value::from(json!({"Data": [{"Item": "pen", "Total": 3}]}));
        let rendered = WorkbookEngine::new().render_bytes(template.clone(), &context).unwrap();
        let xml = sheet_xml(&rendered.content, "xl/worksheets/sheet1.xml");
        assert!(xml.contains(concat!(
            r#"<row r="2"><c r="A2" t="inlineStr"><is><t xml:space="preserve">pen</t></is></c>"#,
            r#"<c r="B2"><v>3</v></c></row>"#
        )));
        assert!(rendered.report.unmapped_columns.is_empty());
        assert_eq!(
            sheet_xml(&rendered.content, "xl/sharedStrings.xml"),
            sheet_xml(&template, "xl/sharedStrings.xml")
        );
    }

    #[test]
    fn test_absent_sheet_is_skipped() {
        let template = xlsx_with_sheets(&[("Sheet1", AMOUNT_HEADER), ("Other", AMOUNT_HEADER)]);
        let context = Value::from(json!({"Missing": [{"Amount": 1}], "Sheet1": [{"Amount": 5}]}));
        let rendered = WorkbookEngine::new().render_bytes(template.clone(), &context).unwrap();

        assert_eq!(rendered.report.skipped_sheets, vec!["Missing"]);
        assert_eq!(rendered.report.rows_written, 1);
        assert_eq!(
            sheet_xml(&rendered.content, "xl/worksheets/sheet2.xml"),
            sheet_xml(&template, "xl/worksheets/sheet2.xml")
        );
    }

    #[test]
    fn test_headerless_sheet_gets_sorted_header() {
        let template = xlsx_with_sheets(&[("Sheet1", "")]);
        let context = Value::from(json!({"Sheet1": [{"b": 2, "a": 1}, {"c": 3}]}));
        let rendered = WorkbookEngine::new().render_bytes(template, &context).unwrap();

        let xml = sheet_xml(&rendered.content, "xl/worksheets/sheet1.xml");
        assert!(xml.contains(r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve">a</t></is></c>"#));
        assert!(xml.contains(r#"<c r="C1" t="inlineStr"><is><t xml:space="preserve">c</t></is></c>"#));
        assert!(xml.contains(r#"<row r="2"><c r="A2"><v>1</v></c><c r="B2"><v>2</v></c></row>"#));
        assert!(xml.contains(r#"<row r="3"><c r="C3"><v>3</v></c></row>"#));
        assert!(xml.contains(r#"<dimension ref="A1:C3"/>"#));
        assert_eq!(rendered.report.rows_written, 2);
    }

    #[test]
    fn test_dates_get_a_date_style() {
        let header = r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Due</t></is></c></row>"#;
        let template = xlsx_with_sheets(&[("Sheet1", header)]);
        let due = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut context = Value::map();
        context.insert(
            "Sheet1",
            Value::List(vec![
                Value::map().with("Due", due),
                Value::map().with("Due", due.and_hms_opt(12, 0, 0).unwrap()),
            ]),
        );
        let rendered = WorkbookEngine::new().render_bytes(template, &context).unwrap();

        let xml = sheet_xml(&rendered.content, "xl/worksheets/sheet1.xml");
        assert!(xml.contains(r#"<c r="A2" s="1"><v>45306</v></c>"#), "{xml}");
        assert!(xml.contains(r#"<c r="A3" s="1"><v>45306.5</v></c>"#));
        let styles = sheet_xml(&rendered.content, "xl/styles.xml");
        assert!(styles.contains(r#"<cellXfs count="2">"#));
    }

    #[test]
    fn test_date_like_strings_stay_text() {
        let header = r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Code</t></is></c></row>"#;
        let template = xlsx_with_sheets(&[("Sheet1", header)]);
        let context = Value::from(json!({"Sheet1": [{"Code": "2024-01-15"}]}));
        let rendered = WorkbookEngine::new().render_bytes(template.clone(), &context).unwrap();

        let xml = sheet_xml(&rendered.content, "xl/worksheets/sheet1.xml");
        assert!(
            xml.contains(r#"<row r="2"><c r="A2" t="inlineStr"><is><t xml:space="preserve">2024-01-15</t></is></c></row>"#),
            "{xml}"
        );
        assert_eq!(
            sheet_xml(&rendered.content, "xl/styles.xml"),
            sheet_xml(&template, "xl/styles.xml")
        );
    }

    #[test]
    fn test_prefixed_workbook_validates_and_renders() {
        const MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
        const RELS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
        let workbook = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><x:workbook xmlns:x="{MAIN}" xmlns:r="{RELS}"><x:sheets><x:sheet name="Sheet1" sheetId="1" r:id="rId1"/></x:sheets></x:workbook>"#
        );
        let worksheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><x:worksheet xmlns:x="{MAIN}"><x:dimension ref="A1"/><x:sheetData><x:row r="1"><x:c r="A1" t="inlineStr"><x:is><x:t>Amount</x:t></x:is></x:c></x:row></x:sheetData></x:worksheet>"#
        );
        let template = xlsx_builder(&[("Sheet1", AMOUNT_HEADER)])
            .entry("xl/workbook.xml", workbook)
            .entry("xl/worksheets/sheet1.xml", worksheet)
            .build();
        let verdict = Validator::default().validate(&template, DocumentKind::Spreadsheet);
        assert!(verdict.is_valid, "{verdict:?}");

        let context = Value::from(json!({"Sheet1": [{"Amount": 1000}]}));
        let rendered = WorkbookEngine::new().render_bytes(template, &context).unwrap();
        let xml = sheet_xml(&rendered.content, "xl/worksheets/sheet1.xml");
        assert!(xml.contains(r#"<x:row r="2"><x:c r="A2"><x:v>1000</x:v></x:c></x:row></x:sheetData>"#), "{xml}");
        assert!(xml.contains(r#"<x:dimension ref="A1:A2"/>"#));
        assert!(Validator::default().validate(&rendered.content, DocumentKind::Spreadsheet).is_valid);
    }

    #[test]
    fn test_styles_untouched_without_dates() {
        let template = xlsx_with_sheets(&[("Sheet1", AMOUNT_HEADER)]);
        let context = Value::from(json!({"Sheet1": [{"Amount": 1}]}));
        let rendered = WorkbookEngine::new().render_bytes(template.clone(), &context).unwrap();
        assert_eq!(
            sheet_xml(&rendered.content, "xl/styles.xml"),
            sheet_xml(&template, "xl/styles.xml")
        );
    }

    #[test]
    fn test_non_map_context_is_a_warning() {
        let template = xlsx_with_sheets(&[("Sheet1", AMOUNT_HEADER)]);
        let rendered = WorkbookEngine::new()
            .render_bytes(template, &Value::from("nope"))
            .unwrap();
        assert_eq!(rendered.report.rows_written, 0);
        assert_eq!(rendered.report.warnings.len(), 1);
    }

    #[test]
    fn test_broken_worksheet_is_fatal() {
        let template = xlsx_builder(&[("Sheet1", "")])
            .entry("xl/worksheets/sheet1.xml", "<worksheet><sheetData><row></worksheet>")
            .build();
        let err = WorkbookEngine::new()
            .render_bytes(template, &Value::from(json!({"Sheet1": [{"a": 1}]})))
            .unwrap_err();
        assert!(matches!(err, TemplateError::Fatal { ref part, .. } if part == "xl/worksheets/sheet1.xml"));
    }
}
