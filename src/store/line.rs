//! Line classification for the sectioned text format.
//!
//! Every rule works on the trimmed line:
//! - `[Name]` is a section header; the name is taken verbatim between the brackets
//! - `#`, `;` and `//` start a comment (checked before key parsing)
//! - `key=value` with `=` past index 0 is a key line, both halves trimmed
//! - anything else is an opaque raw line

/// One classified input line, borrowing from the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Comment,
    Header(&'a str),
    Key { key: &'a str, value: &'a str },
    Raw,
}

/// Classify a raw (untrimmed) line.
pub fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() {
        Line::Blank
    } else if is_comment(line) {
        Line::Comment
    } else if let Some(name) = header_name(line) {
        Line::Header(name)
    } else if let Some((key, value)) = split_key_value(line) {
        Line::Key { key, value }
    } else {
        Line::Raw
    }
}

/// True if the trimmed line starts with a comment marker.
pub fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with(';') || line.starts_with("//")
}

/// Section name of a trimmed `[Name]` line.
pub fn header_name(line: &str) -> Option<&str> {
    if line.len() >= 2 && line.starts_with('[') && line.ends_with(']') {
        Some(&line[1..line.len() - 1])
    } else {
        None
    }
}

/// Split a trimmed line at its first `=`; `None` if there is no key.
pub fn split_key_value(line: &str) -> Option<(&str, &str)> {
    match line.find('=') {
        Some(idx) if idx > 0 => Some((line[..idx].trim(), line[idx + 1..].trim())),
        _ => None,
    }
}

/// Case-insensitive name comparison used for sections, keys and variables.
pub fn same_name(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        a.eq_ignore_ascii_case(b)
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

pub fn format_header(name: &str) -> String {
    format!("[{}]", name)
}

pub fn format_key(key: &str, value: &str) -> String {
    format!("{}={}", key, value)
}
