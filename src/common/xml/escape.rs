use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

const NAMED_ENTITIES: [(&str, char); 5] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&apos;", '\''),
];

static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("Failed to build XML escaper")
});

static XML_UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
        .expect("Failed to build XML unescaper")
});

/// Escape XML special characters.
///
/// Substituted template values go through this and nothing else, so a value
/// such as `Smith & Sons <Ltd>` survives as literal text in the output part.
/// Characters XML 1.0 forbids (C0 controls other than tab, newline and
/// carriage return, plus U+FFFE and U+FFFF) are dropped.
///
/// # Examples
///
/// ```
/// use docstamp::common::xml::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<tag>\"hello\"</tag>"), "&lt;tag&gt;&quot;hello&quot;&lt;/tag&gt;");
/// ```
pub fn escape_xml(s: &str) -> String {
    const REPLACEMENTS: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];
    if s.chars().all(is_xml_char) {
        return XML_ESCAPER.replace_all(s, &REPLACEMENTS);
    }
    let cleaned: String = s.chars().filter(|&c| is_xml_char(c)).collect();
    XML_ESCAPER.replace_all(&cleaned, &REPLACEMENTS)
}

/// Whether XML 1.0 allows `c` in character data.
#[inline]
pub fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= '\u{20}' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

/// Unescape XML text content.
///
/// Decodes the five predefined entities and numeric character references
/// (`&#160;`, `&#xA0;`). Unknown or malformed references are left unchanged.
///
/// # Examples
///
/// ```
/// use docstamp::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
/// assert_eq!(unescape_xml("&invalid;"), "&invalid;");
/// assert_eq!(unescape_xml("a&#160;b&#x41;"), "a\u{a0}bA");
/// ```
pub fn unescape_xml(s: &str) -> String {
    if memchr::memmem::find(s.as_bytes(), b"&#").is_none() {
        return XML_UNESCAPER.replace_all(s, &["&", "<", ">", "\"", "'"]);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = memchr::memchr(b'&', rest.as_bytes()) {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_reference(rest) {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            },
            None => {
                out.push('&');
                rest = &rest[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

/// Decode the reference at the start of `s`, returning the character and the
/// reference's byte length.
fn decode_reference(s: &str) -> Option<(char, usize)> {
    if let Some(&(entity, c)) = NAMED_ENTITIES.iter().find(|(entity, _)| s.starts_with(entity)) {
        return Some((c, entity.len()));
    }
    let body = s.strip_prefix("&#")?;
    let semi = body.find(';')?;
    let digits = &body[..semi];
    let code = match digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    Some((char::from_u32(code)?, semi + 3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_special_characters() {
        assert_eq!(escape_xml("&<>\"'"), "&amp;&lt;&gt;&quot;&apos;");
        assert_eq!(escape_xml("Nguyen Van A"), "Nguyen Van A");
    }

    #[test]
    fn test_escape_drops_forbidden_characters() {
        assert_eq!(escape_xml("line\u{000B}tab\u{0001}"), "linetab");
        assert_eq!(escape_xml("a\tb\r\nc"), "a\tb\r\nc");
        assert_eq!(escape_xml("x\u{FFFE}\u{FFFF}<"), "x&lt;");
        assert_eq!(escape_xml("\u{0000}"), "");
    }

    #[test]
    fn test_unescape_leaves_plain_ampersand() {
        assert_eq!(unescape_xml("a & b"), "a & b");
        assert_eq!(unescape_xml("&amp"), "&amp");
    }

    #[test]
    fn test_unescape_character_references() {
        assert_eq!(unescape_xml("&#78;guyen&#x20;&amp;&#X41;"), "Nguyen &A");
        assert_eq!(unescape_xml("&#;&#xZZ;&#12"), "&#;&#xZZ;&#12");
        assert_eq!(unescape_xml("&amp;#38;"), "&#38;");
    }

    #[test]
    fn test_unescape_reverses_escape() {
        let text = "Công ty <TNHH> & \"Cổ phần\"";
        assert_eq!(unescape_xml(&escape_xml(text)), text);
    }
}
