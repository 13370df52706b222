//! Command implementations for the inistore CLI.
//!
//! Each command runs one store or variable operation and returns a result
//! struct that can be printed as JSON (default) or as human text.

use crate::store::{ConfigStore, KeyValue, RawPosition, SectionRename};
use crate::vars::{Scope, VariableResolver};
use crate::{Error, Result};
use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

// === Keys ===

#[derive(Serialize)]
pub struct KeyValueResult {
    pub file: PathBuf,
    pub section: String,
    pub key: String,
    pub value: String,
}

impl Output for KeyValueResult {
    fn to_json(&self) -> String {
        to_json(self)
    }

    fn to_human(&self) -> String {
        self.value.clone()
    }
}

/// Read one key. A missing key is an error so scripts can test the exit code.
pub fn get(store: &ConfigStore, file: &Path, section: &str, key: &str) -> Result<KeyValueResult> {
    let value = store
        .read_key(file, section, key)?
        .ok_or_else(|| {
            Error::NotFound(format!("key [{}] {} in {}", section, key, file.display()))
        })?;
    Ok(KeyValueResult {
        file: file.to_path_buf(),
        section: section.to_string(),
        key: key.to_string(),
        value,
    })
}

pub fn set(
    store: &ConfigStore,
    file: &Path,
    section: &str,
    key: &str,
    value: &str,
) -> Result<KeyValueResult> {
    store.write_key(file, section, key, value)?;
    Ok(KeyValueResult {
        file: file.to_path_buf(),
        section: section.to_string(),
        key: key.to_string(),
        value: value.trim().to_string(),
    })
}

/// Outcome of an edit that may not have found its target.
#[derive(Serialize)]
pub struct EditResult {
    pub file: PathBuf,
    pub action: &'static str,
    pub target: String,
    pub changed: bool,
}

impl Output for EditResult {
    fn to_json(&self) -> String {
        to_json(self)
    }

    fn to_human(&self) -> String {
        if self.changed {
            format!("{}: {} in {}", self.action, self.target, self.file.display())
        } else {
            format!("{}: {} not found in {}", self.action, self.target, self.file.display())
        }
    }
}

pub fn rename_key(
    store: &ConfigStore,
    file: &Path,
    section: &str,
    key: &str,
    new_key: &str,
) -> Result<EditResult> {
    let changed = store.rename_key(file, section, key, new_key)?;
    Ok(EditResult {
        file: file.to_path_buf(),
        action: "renamed key",
        target: format!("[{}] {} -> {}", section, key, new_key),
        changed,
    })
}

pub fn delete_key(
    store: &ConfigStore,
    file: &Path,
    section: &str,
    key: &str,
) -> Result<EditResult> {
    let changed = store.delete_key(file, section, key)?;
    Ok(EditResult {
        file: file.to_path_buf(),
        action: "deleted key",
        target: format!("[{}] {}", section, key),
        changed,
    })
}

// === Sections ===

#[derive(Serialize)]
pub struct SectionList {
    pub file: PathBuf,
    pub sections: Vec<String>,
}

impl Output for SectionList {
    fn to_json(&self) -> String {
        to_json(self)
    }

    fn to_human(&self) -> String {
        self.sections.join("\n")
    }
}

pub fn section_list(store: &ConfigStore, file: &Path) -> Result<SectionList> {
    Ok(SectionList {
        file: file.to_path_buf(),
        sections: store.section_names(file)?,
    })
}

#[derive(Serialize)]
pub struct SectionShow {
    pub file: PathBuf,
    pub section: String,
    pub entries: Vec<KeyValue>,
}

impl Output for SectionShow {
    fn to_json(&self) -> String {
        to_json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("[{}]", self.section)];
        lines.extend(self.entries.iter().map(|kv| format!("{}={}", kv.key, kv.value)));
        lines.join("\n")
    }
}

pub fn section_show(store: &ConfigStore, file: &Path, section: &str) -> Result<SectionShow> {
    let entries = store
        .read_section(file, section)?
        .ok_or_else(|| section_not_found(file, section))?;
    Ok(SectionShow {
        file: file.to_path_buf(),
        section: section.to_string(),
        entries,
    })
}

#[derive(Serialize)]
pub struct SectionRaw {
    pub file: PathBuf,
    pub section: String,
    pub lines: Vec<String>,
}

impl Output for SectionRaw {
    fn to_json(&self) -> String {
        to_json(self)
    }

    fn to_human(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn section_raw(
    store: &ConfigStore,
    file: &Path,
    section: &str,
    include_blank: bool,
) -> Result<SectionRaw> {
    let lines = store
        .read_raw_section(file, section, include_blank)?
        .ok_or_else(|| section_not_found(file, section))?;
    Ok(SectionRaw {
        file: file.to_path_buf(),
        section: section.to_string(),
        lines,
    })
}

/// Per-section outcome of a batch section edit.
#[derive(Serialize)]
pub struct SectionBatch {
    pub file: PathBuf,
    pub action: &'static str,
    pub results: Vec<SectionOutcome>,
}

#[derive(Serialize)]
pub struct SectionOutcome {
    pub section: String,
    pub changed: bool,
}

impl Output for SectionBatch {
    fn to_json(&self) -> String {
        to_json(self)
    }

    fn to_human(&self) -> String {
        self.results
            .iter()
            .map(|r| {
                let mark = if r.changed { "ok" } else { "skipped" };
                format!("{} [{}]: {}", self.action, r.section, mark)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn section_batch(
    file: &Path,
    action: &'static str,
    sections: &[String],
    changed: Vec<bool>,
) -> SectionBatch {
    SectionBatch {
        file: file.to_path_buf(),
        action,
        results: sections
            .iter()
            .zip(changed)
            .map(|(section, changed)| SectionOutcome {
                section: section.clone(),
                changed,
            })
            .collect(),
    }
}

pub fn section_add(store: &ConfigStore, file: &Path, sections: &[String]) -> Result<SectionBatch> {
    let created = store.add_sections(file, sections)?;
    Ok(section_batch(file, "add", sections, created))
}

pub fn section_delete(
    store: &ConfigStore,
    file: &Path,
    sections: &[String],
) -> Result<SectionBatch> {
    let deleted = store.delete_sections(file, sections)?;
    Ok(section_batch(file, "delete", sections, deleted))
}

pub fn section_rename(
    store: &ConfigStore,
    file: &Path,
    from: &str,
    to: &str,
) -> Result<EditResult> {
    let changed = store.rename_sections(file, &[SectionRename::new(from, to)])?;
    Ok(EditResult {
        file: file.to_path_buf(),
        action: "renamed section",
        target: format!("[{}] -> [{}]", from, to),
        changed: changed.first().copied().unwrap_or(false),
    })
}

/// Replace a section body from arguments, or from `input` when given.
pub fn section_replace(
    store: &ConfigStore,
    file: &Path,
    section: &str,
    lines: &[String],
    input: Option<Box<dyn BufRead>>,
) -> Result<EditResult> {
    match input {
        Some(reader) => store.write_section_fast_from(file, section, reader)?,
        None => store.write_section_fast(file, section, lines)?,
    }
    Ok(EditResult {
        file: file.to_path_buf(),
        action: "replaced section",
        target: format!("[{}]", section),
        changed: true,
    })
}

fn section_not_found(file: &Path, section: &str) -> Error {
    Error::NotFound(format!("section [{}] in {}", section, file.display()))
}

// === Whole-file operations ===

pub fn raw_line(
    store: &ConfigStore,
    file: &Path,
    section: &str,
    line: &str,
    prepend: bool,
) -> Result<EditResult> {
    let position = if prepend {
        RawPosition::Prepend
    } else {
        RawPosition::Append
    };
    store.write_raw_line(file, section, line, position)?;
    Ok(EditResult {
        file: file.to_path_buf(),
        action: "inserted line",
        target: format!("[{}] {}", section, line),
        changed: true,
    })
}

pub fn compact(store: &ConfigStore, file: &Path) -> Result<EditResult> {
    let changed = store.compact(file)?;
    Ok(EditResult {
        file: file.to_path_buf(),
        action: "compacted",
        target: "key lines".to_string(),
        changed,
    })
}

#[derive(Serialize)]
pub struct MergeResult {
    pub dest: PathBuf,
    pub sources: Vec<PathBuf>,
}

impl Output for MergeResult {
    fn to_json(&self) -> String {
        to_json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Merged {} file(s) into {}",
            self.sources.len(),
            self.dest.display()
        )
    }
}

pub fn merge(store: &ConfigStore, dest: &Path, sources: &[PathBuf]) -> Result<MergeResult> {
    store.merge(sources, dest)?;
    Ok(MergeResult {
        dest: dest.to_path_buf(),
        sources: sources.to_vec(),
    })
}

// === Variables ===

#[derive(Serialize)]
pub struct ExpandResult {
    pub input: String,
    pub output: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

impl Output for ExpandResult {
    fn to_json(&self) -> String {
        to_json(self)
    }

    fn to_human(&self) -> String {
        self.output.clone()
    }
}

/// Where `expand` takes its variables from.
pub struct VariableSource<'a> {
    pub file: Option<&'a Path>,
    pub section: &'a str,
    pub scope: Scope,
    pub assignments: &'a [(String, String)],
}

pub fn expand(store: &ConfigStore, text: &str, source: VariableSource<'_>) -> Result<ExpandResult> {
    let mut vars = VariableResolver::new();
    let mut rejected = Vec::new();
    if let Some(file) = source.file {
        let report = vars.import_section(store, file, source.section, source.scope)?;
        rejected.extend(report.rejected);
    }
    for (name, value) in source.assignments {
        vars.set_value(Scope::Local, name, value)?;
    }
    Ok(ExpandResult {
        input: text.to_string(),
        output: vars.expand(text)?,
        rejected,
    })
}
