//! Date cell format registration in `xl/styles.xml`.

use memchr::memmem;

/// Built-in number format 14 (`m/d/yyyy`, shown in the reader's locale).
const DATE_XF: &str = r#"<xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#;

/// Append a date cell format to `cellXfs`.
///
/// Returns the rewritten styles part and the new format's index, or `None`
/// when the part has no `cellXfs` list to extend.
pub(crate) fn add_date_format(xml: &str) -> Option<(String, u32)> {
    let bytes = xml.as_bytes();
    let open = memmem::find(bytes, b"<cellXfs")?;
    let open_end = open + memchr::memchr(b'>', &bytes[open..])? + 1;
    if bytes[open_end - 2] == b'/' {
        return None;
    }
    let close = open_end + memmem::find(&bytes[open_end..], b"</cellXfs>")?;

    let body = &bytes[open_end..close];
    let existing = memmem::find_iter(body, b"<xf ").count() + memmem::find_iter(body, b"<xf>").count();
    let index = existing as u32;

    let open_tag = set_count(&xml[open..open_end], index + 1);
    let mut out = String::with_capacity(xml.len() + DATE_XF.len() + 8);
    out.push_str(&xml[..open]);
    out.push_str(&open_tag);
    out.push_str(&xml[open_end..close]);
    out.push_str(DATE_XF);
    out.push_str(&xml[close..]);
    Some((out, index))
}

/// Replace (or add) the `count` attribute of an opening tag.
fn set_count(tag: &str, count: u32) -> String {
    if let Some(pos) = tag.find("count=\"") {
        let value_start = pos + "count=\"".len();
        if let Some(len) = tag[value_start..].find('"') {
            return format!("{}{}{}", &tag[..value_start], count, &tag[value_start + len..]);
        }
    }
    let insert = tag.len() - 1;
    format!(r#"{} count="{}"{}"#, &tag[..insert], count, &tag[insert..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::XLSX_STYLES;

    #[test]
    fn test_add_date_format() {
        let (xml, index) = add_date_format(XLSX_STYLES).unwrap();
        assert_eq!(index, 1);
        assert!(xml.contains(r#"<cellXfs count="2">"#));
        assert!(xml.contains(&format!("{DATE_XF}</cellXfs>")));
        assert!(xml.contains(r#"<xf numFmtId="14""#));

        let (again, index) = add_date_format(&xml).unwrap();
        assert_eq!(index, 2);
        assert!(again.contains(r#"<cellXfs count="3">"#));
    }

    #[test]
    fn test_without_count_attribute() {
        let xml = r#"<styleSheet><cellXfs><xf numFmtId="0"/></cellXfs></styleSheet>"#;
        let (out, index) = add_date_format(xml).unwrap();
        assert_eq!(index, 1);
        assert!(out.starts_with(r#"<styleSheet><cellXfs count="2"><xf numFmtId="0"/>"#));
    }

    #[test]
    fn test_no_cell_formats() {
        assert!(add_date_format("<styleSheet/>").is_none());
        assert!(add_date_format("<styleSheet><cellXfs/></styleSheet>").is_none());
    }
}
