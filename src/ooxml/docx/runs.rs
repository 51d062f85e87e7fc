//! Paragraph text reassembly and redistribution.
//!
//! Word splits what the author typed as `{customer.full_name}` across several
//! runs whenever spell checking, revision tracking or formatting touched part
//! of it. Each paragraph's `w:t` contents are therefore concatenated into one
//! logical string, placeholders are matched there, and the substituted text
//! is written back into the text node where each placeholder started. Token
//! fragments are cut from the nodes that follow. Only `w:t` contents change,
//! so run properties and all other markup survive untouched.

use super::tokens::{self, Token};
use crate::common::xml::{escape_xml, unescape_xml};
use quick_xml::Reader;
use quick_xml::events::Event;
use smallvec::SmallVec;

/// Byte ranges of one `<w:t>` element within a part.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextNode {
    open_start: usize,
    open_end: usize,
    content_end: usize,
    preserve: bool,
}

type Paragraph = SmallVec<[TextNode; 8]>;

/// How placeholders are resolved while rewriting a part.
pub(crate) struct Substitution<'a> {
    pub start: char,
    pub end: char,
    pub linebreaks: bool,
    /// Returns replacement text, or `None` when the path is unresolved
    pub resolve: &'a dyn Fn(&str) -> Option<String>,
}

/// Result of rewriting one part.
#[derive(Debug, Default)]
pub(crate) struct PartOutcome {
    /// The rewritten XML, `None` when nothing changed
    pub xml: Option<String>,
    pub substitutions: usize,
    /// Unresolved paths in first-seen order, possibly repeated
    pub unresolved: Vec<String>,
    pub warnings: Vec<String>,
}

struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// Group the `w:t` elements of a part by paragraph.
///
/// Fails with a description when the part is not well-formed XML.
pub(crate) fn collect_paragraphs(xml: &str) -> Result<Vec<Paragraph>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut groups: Vec<Paragraph> = Vec::new();
    let mut open_paragraphs: Vec<Paragraph> = Vec::new();
    let mut open_text: Option<(usize, usize, bool)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {e}", reader.error_position()))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => open_paragraphs.push(Paragraph::new()),
                b"w:t" => {
                    let preserve = e.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"xml:space" && a.value.as_ref() == b"preserve"
                    });
                    open_text = Some((before, after, preserve));
                },
                _ => {},
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => {
                    if let Some((open_start, open_end, preserve)) = open_text.take() {
                        let content_end = memchr::memrchr(b'<', &xml.as_bytes()[..after])
                            .unwrap_or(open_end);
                        let node = TextNode {
                            open_start,
                            open_end,
                            content_end,
                            preserve,
                        };
                        match open_paragraphs.last_mut() {
                            Some(paragraph) => paragraph.push(node),
                            None => groups.push(smallvec::smallvec![node]),
                        }
                    }
                },
                b"w:p" => {
                    if let Some(paragraph) = open_paragraphs.pop()
                        && !paragraph.is_empty()
                    {
                        groups.push(paragraph);
                    }
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if !open_paragraphs.is_empty() || open_text.is_some() {
        return Err("unexpected end of part inside an open paragraph".to_string());
    }
    Ok(groups)
}

/// Substitute every placeholder in a part.
pub(crate) fn rewrite_part(xml: &str, subst: &Substitution<'_>) -> Result<PartOutcome, String> {
    let paragraphs = collect_paragraphs(xml)?;
    let mut outcome = PartOutcome::default();
    let mut edits: Vec<Edit> = Vec::new();

    for paragraph in &paragraphs {
        let texts: SmallVec<[String; 8]> = paragraph
            .iter()
            .map(|node| unescape_xml(&xml[node.open_end..node.content_end]))
            .collect();

        let mut full = String::new();
        let mut bounds: SmallVec<[(usize, usize); 8]> = SmallVec::new();
        for text in &texts {
            bounds.push((full.len(), full.len() + text.len()));
            full.push_str(text);
        }

        let (found, warnings) = tokens::scan(&full, subst.start, subst.end);
        outcome.warnings.extend(warnings);
        if found.is_empty() {
            continue;
        }

        let resolved: Vec<(Token, String)> = found
            .into_iter()
            .map(|token| {
                let replacement = match (subst.resolve)(&token.path) {
                    Some(text) => {
                        outcome.substitutions += 1;
                        text
                    },
                    None => {
                        outcome.unresolved.push(token.path.clone());
                        String::new()
                    },
                };
                (token, replacement)
            })
            .collect();

        for ((node, old), &(ns, ne)) in paragraph.iter().zip(&texts).zip(&bounds) {
            let new = rebuild_node(&full, ns, ne, &resolved);
            if &new != old {
                edits.push(node_edit(node, &new, subst.linebreaks));
            }
        }
    }

    if !edits.is_empty() {
        edits.sort_by_key(|e| e.start);
        let mut out = String::with_capacity(xml.len() + edits.len() * 16);
        let mut pos = 0;
        for edit in &edits {
            out.push_str(&xml[pos..edit.start]);
            out.push_str(&edit.replacement);
            pos = edit.end;
        }
        out.push_str(&xml[pos..]);
        outcome.xml = Some(out);
    }

    Ok(outcome)
}

/// New logical text of the node spanning `[ns, ne)` of `full`.
fn rebuild_node(full: &str, ns: usize, ne: usize, tokens: &[(Token, String)]) -> String {
    let mut out = String::new();
    let mut pos = ns;
    for (token, replacement) in tokens {
        if token.end <= ns || token.start >= ne {
            continue;
        }
        if token.start > pos {
            out.push_str(&full[pos..token.start]);
        }
        if token.start >= ns {
            out.push_str(replacement);
        }
        pos = pos.max(token.end.min(ne));
    }
    if pos < ne {
        out.push_str(&full[pos..ne]);
    }
    out
}

fn node_edit(node: &TextNode, text: &str, linebreaks: bool) -> Edit {
    let has_breaks = linebreaks && text.contains('\n');
    let needs_preserve = has_breaks
        || text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace);

    let content = if has_breaks {
        text.split('\n')
            .map(escape_xml)
            .collect::<Vec<_>>()
            .join(r#"</w:t><w:br/><w:t xml:space="preserve">"#)
    } else {
        escape_xml(text)
    };

    if needs_preserve && !node.preserve {
        Edit {
            start: node.open_start,
            end: node.content_end,
            replacement: format!(r#"<w:t xml:space="preserve">{content}"#),
        }
    } else {
        Edit {
            start: node.open_end,
            end: node.content_end,
            replacement: content,
        }
    }
}
