//! In-memory fixture packages for unit tests.

use crate::archive::Archive;
use crate::common::xml::unescape_xml;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const DOCX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

pub const DOCX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

pub const XLSX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

pub const XLSX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

pub const XLSX_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// A styles part large enough to lift any fixture above the size floor.
pub fn padding_styles() -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="{W_NS}">"#);
    for i in 0..12 {
        xml.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="Heading{i}"><w:name w:val="heading {i}"/><w:rPr><w:b/><w:sz w:val="{}"/></w:rPr></w:style>"#,
            20 + i * 2
        ));
    }
    xml.push_str("</w:styles>");
    xml
}

/// Builds stored (uncompressed) ZIP packages.
#[derive(Default)]
pub struct PackageBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything a .docx needs except `word/document.xml`.
    pub fn docx_parts() -> Self {
        Self::new()
            .entry("[Content_Types].xml", DOCX_CONTENT_TYPES)
            .entry("_rels/.rels", DOCX_ROOT_RELS)
            .entry("word/styles.xml", padding_styles())
    }

    /// Add an entry, replacing the content of an earlier one with the same name.
    pub fn entry(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref().to_vec();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = content,
            None => self.entries.push((name.to_string(), content)),
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in self.entries {
            writer.start_file(name.as_str(), options).unwrap();
            writer.write_all(&content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

/// Wrap body XML into a complete `word/document.xml`.
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    )
}

/// A complete .docx whose body is `body`.
pub fn docx_with_body(body: &str) -> Vec<u8> {
    PackageBuilder::docx_parts()
        .entry("word/document.xml", document_xml(body))
        .build()
}

/// Wrap rows into a complete worksheet part.
pub fn worksheet_xml(rows: &str) -> String {
    let data = if rows.is_empty() {
        "<sheetData/>".to_string()
    } else {
        format!("<sheetData>{rows}</sheetData>")
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1"/><sheetViews><sheetView workbookViewId="0"/></sheetViews>{data}<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#
    )
}

/// Workbook parts for the given sheets, without building.
pub fn xlsx_builder(sheets: &[(&str, &str)]) -> PackageBuilder {
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr/><bookViews><workbookView/></bookViews><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, (name, _)) in sheets.iter().enumerate() {
        let n = i + 1;
        workbook.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }
    let styles_id = sheets.len() + 1;
    rels.push_str(&format!(
        r#"<Relationship Id="rId{styles_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    ));
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");

    let mut builder = PackageBuilder::new()
        .entry("[Content_Types].xml", XLSX_CONTENT_TYPES)
        .entry("_rels/.rels", XLSX_ROOT_RELS)
        .entry("xl/workbook.xml", workbook)
        .entry("xl/_rels/workbook.xml.rels", rels)
        .entry("xl/styles.xml", XLSX_STYLES);
    for (i, (_, rows)) in sheets.iter().enumerate() {
        builder = builder.entry(&format!("xl/worksheets/sheet{}.xml", i + 1), worksheet_xml(rows));
    }
    builder
}

/// A complete .xlsx with one worksheet per `(name, rows)` pair.
pub fn xlsx_with_sheets(sheets: &[(&str, &str)]) -> Vec<u8> {
    xlsx_builder(sheets).build()
}

/// Concatenated text of every `w:t` in a part, paragraphs and breaks as `\n`.
pub fn part_text(data: &[u8], part: &str) -> String {
    let archive = Archive::open(data.to_vec()).unwrap();
    let xml = archive.read_string(part).unwrap();
    let mut out = String::new();
    let mut rest = xml.as_str();
    while let Some(lt) = rest.find('<') {
        let after = &rest[lt..];
        let gt = after.find('>').unwrap();
        let tag = &after[..=gt];
        rest = &after[gt + 1..];
        if tag == "</w:p>" || tag.starts_with("<w:br") {
            out.push('\n');
        } else if (tag.starts_with("<w:t>") || tag.starts_with("<w:t ")) && !tag.ends_with("/>") {
            let close = rest.find("</w:t>").unwrap();
            out.push_str(&unescape_xml(&rest[..close]));
            rest = &rest[close..];
        }
    }
    out
}

/// Text of the main document part.
pub fn document_text(data: &[u8]) -> String {
    part_text(data, "word/document.xml")
}
