//! Read-only store operations.

use super::ConfigStore;
use super::line::{self, Line};
use super::request::{KeyRequest, KeyValue, SectionEntries};
use crate::Result;
use indexmap::IndexMap;
use std::path::Path;
use tracing::debug;

impl ConfigStore {
    /// Value of one key, or `None` if the file, section or key is missing.
    pub fn read_key(
        &self,
        file: impl AsRef<Path>,
        section: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let mut values = self.read_keys(file, &[KeyRequest::new(section, key)])?;
        Ok(values.pop().flatten())
    }

    /// Values for a batch of keys, aligned with `requests`.
    ///
    /// The first occurrence of a key inside its section wins. The scan stops
    /// once every request has an answer.
    pub fn read_keys(
        &self,
        file: impl AsRef<Path>,
        requests: &[KeyRequest],
    ) -> Result<Vec<Option<String>>> {
        let path = file.as_ref();
        let mut values: Vec<Option<String>> = vec![None; requests.len()];
        if requests.is_empty() {
            return Ok(values);
        }

        self.scan(path, |source| {
            let mut remaining = requests.len();
            let mut section: Option<String> = None;
            while let Some(raw) = source.next_line()? {
                match line::classify(&raw) {
                    Line::Header(name) => section = Some(name.to_string()),
                    Line::Key { key, value } => {
                        let Some(current) = section.as_deref() else {
                            continue;
                        };
                        for (req, slot) in requests.iter().zip(values.iter_mut()) {
                            if slot.is_none() && req.targets(current, key) {
                                *slot = Some(value.to_string());
                                remaining -= 1;
                            }
                        }
                        if remaining == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            Ok(())
        })?;

        debug!(
            file = %path.display(),
            requested = requests.len(),
            found = values.iter().filter(|v| v.is_some()).count(),
            "read keys"
        );
        Ok(values)
    }

    /// Key/value pairs of one section, `None` if it is absent.
    pub fn read_section(
        &self,
        file: impl AsRef<Path>,
        section: &str,
    ) -> Result<Option<Vec<KeyValue>>> {
        let mut sections = self.read_sections(file, &[section])?;
        Ok(sections.pop().flatten())
    }

    /// Key/value pairs of several sections in one pass, aligned with
    /// `sections`. Comments and raw lines are skipped.
    pub fn read_sections(
        &self,
        file: impl AsRef<Path>,
        sections: &[impl AsRef<str>],
    ) -> Result<Vec<Option<Vec<KeyValue>>>> {
        self.collect_sections(file.as_ref(), sections, |raw| match line::classify(raw) {
            Line::Key { key, value } => Some(KeyValue::new(key, value)),
            _ => None,
        })
    }

    /// Trimmed lines of one section, comments excluded.
    pub fn read_raw_section(
        &self,
        file: impl AsRef<Path>,
        section: &str,
        include_blank: bool,
    ) -> Result<Option<Vec<String>>> {
        let mut sections = self.read_raw_sections(file, &[section], include_blank)?;
        Ok(sections.pop().flatten())
    }

    /// Trimmed lines of several sections in one pass, aligned with
    /// `sections`.
    pub fn read_raw_sections(
        &self,
        file: impl AsRef<Path>,
        sections: &[impl AsRef<str>],
        include_blank: bool,
    ) -> Result<Vec<Option<Vec<String>>>> {
        self.collect_sections(file.as_ref(), sections, |raw| match line::classify(raw) {
            Line::Comment => None,
            Line::Blank if !include_blank => None,
            _ => Some(raw.trim().to_string()),
        })
    }

    /// Feed the trimmed body lines of one section to `visit` as they are
    /// read, without collecting them. Comments are skipped. Returns whether
    /// the section exists.
    ///
    /// The shared lock is held until the scan ends, so `visit` must not call
    /// back into the store for the same file.
    pub fn stream_raw_section(
        &self,
        file: impl AsRef<Path>,
        section: &str,
        include_blank: bool,
        mut visit: impl FnMut(&str) -> Result<()>,
    ) -> Result<bool> {
        let path = file.as_ref();
        let mut found = false;
        let mut streamed = 0usize;
        self.scan(path, |source| {
            let mut inside = false;
            while let Some(raw) = source.next_line()? {
                match line::classify(&raw) {
                    Line::Header(name) => {
                        inside = line::same_name(section, name);
                        found |= inside;
                    }
                    _ if !inside => {}
                    Line::Comment => {}
                    Line::Blank if !include_blank => {}
                    _ => {
                        visit(raw.trim())?;
                        streamed += 1;
                    }
                }
            }
            Ok(())
        })?;

        debug!(file = %path.display(), section, found, streamed, "streamed section");
        Ok(found)
    }

    /// Whole file as ordered sections. Repeated headers are merged and a
    /// later duplicate key replaces the earlier value in place.
    pub fn read_all(&self, file: impl AsRef<Path>) -> Result<Vec<SectionEntries>> {
        let path = file.as_ref();
        let mut sections: IndexMap<String, (String, IndexMap<String, KeyValue>)> =
            IndexMap::new();

        self.scan(path, |source| {
            let mut current: Option<String> = None;
            while let Some(raw) = source.next_line()? {
                match line::classify(&raw) {
                    Line::Header(name) => {
                        let id = name.to_lowercase();
                        sections
                            .entry(id.clone())
                            .or_insert_with(|| (name.to_string(), IndexMap::new()));
                        current = Some(id);
                    }
                    Line::Key { key, value } => {
                        let Some(entries) = current
                            .as_ref()
                            .and_then(|id| sections.get_mut(id))
                            .map(|(_, entries)| entries)
                        else {
                            continue;
                        };
                        entries.insert(key.to_lowercase(), KeyValue::new(key, value));
                    }
                    _ => {}
                }
            }
            Ok(())
        })?;

        Ok(sections
            .into_values()
            .map(|(name, entries)| SectionEntries {
                name,
                entries: entries.into_values().collect(),
            })
            .collect())
    }

    /// Distinct section names in file order, as first spelled.
    pub fn section_names(&self, file: impl AsRef<Path>) -> Result<Vec<String>> {
        let mut names: IndexMap<String, String> = IndexMap::new();
        self.scan(file.as_ref(), |source| {
            while let Some(raw) = source.next_line()? {
                if let Line::Header(name) = line::classify(&raw) {
                    names
                        .entry(name.to_lowercase())
                        .or_insert_with(|| name.to_string());
                }
            }
            Ok(())
        })?;
        Ok(names.into_values().collect())
    }

    pub fn contains_section(&self, file: impl AsRef<Path>, section: &str) -> Result<bool> {
        self.scan(file.as_ref(), |source| {
            while let Some(raw) = source.next_line()? {
                if let Line::Header(name) = line::classify(&raw) {
                    if line::same_name(name, section) {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        })
    }

    /// Gather the body lines of the requested sections, mapped through
    /// `pick`. Sections never seen stay `None`.
    fn collect_sections<T: Clone>(
        &self,
        path: &Path,
        sections: &[impl AsRef<str>],
        pick: impl Fn(&str) -> Option<T>,
    ) -> Result<Vec<Option<Vec<T>>>> {
        let mut results: Vec<Option<Vec<T>>> = sections.iter().map(|_| None).collect();
        if sections.is_empty() {
            return Ok(results);
        }

        self.scan(path, |source| {
            let mut active: Vec<usize> = Vec::new();
            while let Some(raw) = source.next_line()? {
                if let Line::Header(name) = line::classify(&raw) {
                    active.clear();
                    for (idx, wanted) in sections.iter().enumerate() {
                        if line::same_name(wanted.as_ref(), name) {
                            results[idx].get_or_insert_with(Vec::new);
                            active.push(idx);
                        }
                    }
                    continue;
                }
                if active.is_empty() {
                    continue;
                }
                let Some(item) = pick(&raw) else {
                    continue;
                };
                for &idx in &active {
                    if let Some(items) = results[idx].as_mut() {
                        items.push(item.clone());
                    }
                }
            }
            Ok(())
        })?;

        debug!(
            file = %path.display(),
            requested = sections.len(),
            found = results.iter().filter(|r| r.is_some()).count(),
            "read sections"
        );
        Ok(results)
    }
}
