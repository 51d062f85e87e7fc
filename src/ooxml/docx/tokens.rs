//! Placeholder scanning over reassembled paragraph text.

/// A placeholder found in logical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte offset of the start delimiter
    pub start: usize,
    /// Byte offset just past the end delimiter
    pub end: usize,
    /// Trimmed inner text: a dotted path or bare key
    pub path: String,
}

/// Find every `start ... end` token in `text`.
///
/// Unterminated start delimiters and empty tokens stay literal text and are
/// reported in the returned warnings. When a start delimiter repeats before the
/// end delimiter, the innermost one opens the token.
pub fn scan(text: &str, start: char, end: char) -> (Vec<Token>, Vec<String>) {
    let mut tokens = Vec::new();
    let mut warnings = Vec::new();
    let (open_len, close_len) = (start.len_utf8(), end.len_utf8());
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(start) {
        let mut open = cursor + found;
        let Some(close) = text[open + open_len..].find(end).map(|p| p + open + open_len) else {
            warnings.push(format!("unterminated placeholder at \"{}\"", excerpt(&text[open..])));
            break;
        };

        let inner = &text[open + open_len..close];
        if let Some(nested) = inner.rfind(start) {
            warnings.push(format!("stray '{start}' before \"{}\"", excerpt(&text[open..close])));
            open = open + open_len + nested;
        }

        let path = text[open + open_len..close].trim();
        if path.is_empty() {
            warnings.push(format!("empty placeholder \"{}\"", &text[open..close + close_len]));
        } else {
            tokens.push(Token {
                start: open,
                end: close + close_len,
                path: path.to_string(),
            });
        }
        cursor = close + close_len;
    }

    (tokens, warnings)
}

fn excerpt(s: &str) -> &str {
    match s.char_indices().nth(24) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
