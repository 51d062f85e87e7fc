//! Sheet and styles part resolution through the workbook relationships.

use crate::archive::Archive;
use crate::common::xml::unescape_xml;
use crate::ooxml::error::{Result, TemplateError};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const DEFAULT_STYLES_PART: &str = "xl/styles.xml";

/// A worksheet as listed in the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetRef {
    pub name: String,
    /// Archive path of the worksheet part
    pub part: String,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WorkbookParts {
    pub sheets: Vec<SheetRef>,
    pub styles: Option<String>,
    pub shared_strings: Option<String>,
}

impl WorkbookParts {
    pub fn sheet(&self, name: &str) -> Option<&SheetRef> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// Read `xl/workbook.xml` and its relationships.
pub(crate) fn read(archive: &Archive) -> Result<WorkbookParts> {
    let workbook = archive
        .read_string(WORKBOOK_PART)
        .map_err(|e| TemplateError::fatal(WORKBOOK_PART, e.to_string()))?;
    let rels = if archive.contains(WORKBOOK_RELS_PART) {
        archive
            .read_string(WORKBOOK_RELS_PART)
            .map_err(|e| TemplateError::fatal(WORKBOOK_RELS_PART, e.to_string()))?
    } else {
        String::new()
    };

    let declared = parse_sheets(&workbook).map_err(|r| TemplateError::fatal(WORKBOOK_PART, r))?;
    let relationships = parse_relationships(&rels).map_err(|r| TemplateError::fatal(WORKBOOK_RELS_PART, r))?;

    let mut parts = WorkbookParts::default();
    for (name, rel_id) in declared {
        match relationships.iter().find(|r| r.id == rel_id) {
            Some(rel) => parts.sheets.push(SheetRef {
                name,
                part: resolve_target(&rel.target),
            }),
            None => tracing::warn!(sheet = %name, rel_id = %rel_id, "sheet has no relationship"),
        }
    }
    parts.styles = relationships
        .iter()
        .find(|r| r.kind.ends_with("/styles"))
        .map(|r| resolve_target(&r.target))
        .or_else(|| archive.contains(DEFAULT_STYLES_PART).then(|| DEFAULT_STYLES_PART.to_string()));
    parts.shared_strings = relationships
        .iter()
        .find(|r| r.kind.ends_with("/sharedStrings"))
        .map(|r| resolve_target(&r.target));
    Ok(parts)
}

#[derive(Debug)]
struct Relationship {
    id: String,
    kind: String,
    target: String,
}

pub(crate) fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| unescape_xml(&String::from_utf8_lossy(&a.value)))
}

/// `(name, relationship id)` for every `<sheet>` element.
fn parse_sheets(xml: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event().map_err(|e| format!("XML error: {e}"))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(id)) = (attribute(&e, b"name"), attribute(&e, b"r:id")) {
                    sheets.push((name, id));
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(sheets)
}

fn parse_relationships(xml: &str) -> std::result::Result<Vec<Relationship>, String> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();
    loop {
        match reader.read_event().map_err(|e| format!("XML error: {e}"))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                    rels.push(Relationship {
                        id,
                        kind: attribute(&e, b"Type").unwrap_or_default(),
                        target,
                    });
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(rels)
}

/// Archive path of a relationship target relative to `xl/`.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = vec!["xl"];
    for segment in target.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Shared string table of the workbook, indexed by position.
pub(crate) fn read_shared_strings(archive: &Archive, part: &str) -> Result<Vec<String>> {
    let xml = archive
        .read_string(part)
        .map_err(|e| TemplateError::fatal(part, e.to_string()))?;
    parse_shared_strings(&xml).map_err(|r| TemplateError::fatal(part, r))
}

fn parse_shared_strings(xml: &str) -> std::result::Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut text_start: Option<usize> = None;
    let mut phonetic = false;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|e| format!("XML error: {e}"))?;
        let after = reader.buffer_position() as usize;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic = true,
                b"t" if !phonetic => text_start = Some(after),
                _ => {},
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"rPh" => phonetic = false,
                b"t" => {
                    if let (Some(start), Some(text)) = (text_start.take(), current.as_mut()) {
                        text.push_str(&unescape_xml(&xml[start..before]));
                    }
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(strings)
}
