//! Request and result types for store operations.

use crate::store::line::{self, Line};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Unit of batch key reads, writes, renames and deletes.
///
/// On read input `value` is ignored; on read output `None` means not found.
/// For renames `value` carries the new key name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    pub section: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl KeyRequest {
    /// Request without a value (read or delete).
    pub fn new(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            value: None,
        }
    }

    /// Request carrying a value (write) or new key name (rename).
    pub fn with_value(
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub(crate) fn targets(&self, section: &str, key: &str) -> bool {
        line::same_name(&self.section, section) && line::same_name(self.key.trim(), key)
    }
}

/// A parsed key line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Every key of one section, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntries {
    pub name: String,
    pub entries: Vec<KeyValue>,
}

/// Section header substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRename {
    pub from: String,
    pub to: String,
}

impl SectionRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Literal line destined for a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLine {
    pub section: String,
    pub line: String,
}

impl RawLine {
    pub fn new(section: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            line: line.into(),
        }
    }
}

/// Where raw lines land inside their section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawPosition {
    /// After the existing body, before its trailing blank lines
    #[default]
    Append,
    /// Directly after the section header
    Prepend,
}

pub(crate) fn check_section(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("section name must not be empty".to_string()));
    }
    check_single_line("section name", name)
}

pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidInput("key must not be empty".to_string()));
    }
    if key.contains('=') {
        return Err(Error::InvalidInput(format!("key must not contain '=': {}", key)));
    }
    check_single_line("key", key)?;
    // A key line must not read back as a comment or a header, whatever its value.
    let trimmed = key.trim();
    if line::is_comment(trimmed) || trimmed.starts_with('[') {
        return Err(Error::InvalidInput(format!(
            "key must not start with a comment marker or '[': {}",
            key
        )));
    }
    match line::classify(&line::format_key(key, "")) {
        Line::Key { key: parsed, .. } if parsed == trimmed => Ok(()),
        _ => Err(Error::InvalidInput(format!("key does not parse as a key: {}", key))),
    }
}

pub(crate) fn check_value(value: &str) -> Result<()> {
    check_single_line("value", value)
}

/// Raw lines must not contain line breaks or look like a section header.
pub(crate) fn check_raw_line(raw: &str) -> Result<()> {
    check_single_line("raw line", raw)?;
    if matches!(line::classify(raw), Line::Header(_)) {
        return Err(Error::InvalidInput(format!(
            "raw line must not be a section header: {}",
            raw
        )));
    }
    Ok(())
}

fn check_single_line(what: &str, text: &str) -> Result<()> {
    if text.contains(['\n', '\r']) {
        return Err(Error::InvalidInput(format!(
            "{} must not contain line breaks",
            what
        )));
    }
    Ok(())
}
