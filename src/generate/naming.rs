//! Output file names.

use crate::common::DocumentKind;
use chrono::NaiveDateTime;
use uuid::Uuid;

const FOLDS: &[(&str, char)] = &[
    ("àáạảãâầấậẩẫăằắặẳẵäå", 'a'),
    ("èéẹẻẽêềếệểễ", 'e'),
    ("ìíịỉĩ", 'i'),
    ("òóọỏõôồốộổỗơờớợởỡö", 'o'),
    ("ùúụủũưừứựửữü", 'u'),
    ("ỳýỵỷỹ", 'y'),
    ("đ", 'd'),
    ("çćč", 'c'),
    ("ñń", 'n'),
    ("šś", 's'),
    ("žź", 'z'),
];

fn fold(c: char) -> Option<char> {
    if c.is_ascii_alphanumeric() {
        return Some(c.to_ascii_lowercase());
    }
    let lower = c.to_lowercase().next()?;
    FOLDS
        .iter()
        .find(|(chars, _)| chars.contains(lower))
        .map(|&(_, ascii)| ascii)
}

/// Lowercase ASCII slug with `_` between words; Vietnamese diacritics fold
/// to their base letter. Never empty.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        // Combining marks of decomposed text
        if ('\u{300}'..='\u{36f}').contains(&c) {
            continue;
        }
        match fold(c) {
            Some(ascii) => slug.push(ascii),
            None if !slug.is_empty() && !slug.ends_with('_') => slug.push('_'),
            None => {},
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("document");
    }
    slug
}

/// `<slug>_<YYYYMMDD_HHMMSS>_<8 hex>.<ext>`
pub fn output_file_name(display_name: &str, kind: DocumentKind, at: NaiveDateTime) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.{}",
        slugify(display_name),
        at.format("%Y%m%d_%H%M%S"),
        &id[..8],
        kind.extension()
    )
}
