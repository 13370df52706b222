//! Upserts, raw line injection, section replacement, compaction and merge.

use super::line::{self, Line};
use super::request::{self, KeyRequest, RawLine, RawPosition};
use super::stage::StageWriter;
use super::{ConfigStore, Missing};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::io::{self, BufRead};
use std::path::Path;
use tracing::debug;

/// Outstanding upserts. Duplicate `(section, key)` pairs collapse into the
/// first entry with the last value.
struct PendingKeys {
    entries: Vec<PendingKey>,
}

struct PendingKey {
    section: String,
    key: String,
    value: String,
    written: bool,
}

impl PendingKeys {
    fn new(requests: &[KeyRequest]) -> Result<Self> {
        let mut entries: Vec<PendingKey> = Vec::with_capacity(requests.len());
        for req in requests {
            request::check_section(&req.section)?;
            request::check_key(&req.key)?;
            let value = req.value.as_deref().ok_or_else(|| {
                Error::InvalidInput(format!("no value given for [{}] {}", req.section, req.key))
            })?;
            request::check_value(value)?;

            let key = req.key.trim();
            let existing = entries.iter_mut().find(|e| {
                line::same_name(&e.section, &req.section) && line::same_name(&e.key, key)
            });
            match existing {
                Some(existing) => existing.value = value.trim().to_string(),
                None => entries.push(PendingKey {
                    section: req.section.clone(),
                    key: key.to_string(),
                    value: value.trim().to_string(),
                    written: false,
                }),
            }
        }
        Ok(Self { entries })
    }

    fn wants_section(&self, section: &str) -> bool {
        self.entries
            .iter()
            .any(|e| !e.written && line::same_name(&e.section, section))
    }

    /// Claim the entry for a key line found in `section`.
    fn take(&mut self, section: &str, key: &str) -> Option<String> {
        let entry = self.entries.iter_mut().find(|e| {
            !e.written && line::same_name(&e.section, section) && line::same_name(&e.key, key)
        })?;
        entry.written = true;
        Some(line::format_key(&entry.key, &entry.value))
    }

    /// Claim every remaining entry of `section` as formatted key lines.
    fn take_section(&mut self, section: &str) -> Vec<String> {
        self.entries
            .iter_mut()
            .filter(|e| !e.written && line::same_name(&e.section, section))
            .map(|e| {
                e.written = true;
                line::format_key(&e.key, &e.value)
            })
            .collect()
    }

    /// Sections with unwritten entries, in first-reference order.
    fn remaining_sections(&self) -> Vec<String> {
        let mut sections: Vec<String> = Vec::new();
        for entry in self.entries.iter().filter(|e| !e.written) {
            if !sections.iter().any(|s| line::same_name(s, &entry.section)) {
                sections.push(entry.section.clone());
            }
        }
        sections
    }

    fn unwritten(&self) -> usize {
        self.entries.iter().filter(|e| !e.written).count()
    }
}

/// Body of a target section, held until its end is reached.
struct SectionBuffer {
    name: String,
    lines: Vec<String>,
}

impl SectionBuffer {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: Vec::new(),
        }
    }

    /// Split off the trailing blank lines.
    fn split_trailing_blanks(&mut self) -> Vec<String> {
        let keep = self
            .lines
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map_or(0, |idx| idx + 1);
        self.lines.split_off(keep)
    }
}

impl ConfigStore {
    /// Insert or update one key, creating the section and file as needed.
    pub fn write_key(
        &self,
        file: impl AsRef<Path>,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.write_keys(file, &[KeyRequest::with_value(section, key, value)])
    }

    /// Insert or update a batch of keys in one pass.
    ///
    /// Sections that do not exist are appended at the end of the file in
    /// the order they were first referenced. Fails without touching the
    /// file unless every entry was placed.
    pub fn write_keys(&self, file: impl AsRef<Path>, requests: &[KeyRequest]) -> Result<()> {
        let path = file.as_ref();
        let mut pending = PendingKeys::new(requests)?;
        if pending.entries.is_empty() {
            return Ok(());
        }

        self.rewrite(path, Missing::Create, |source, out| {
            let mut current: Option<SectionBuffer> = None;
            while let Some(raw) = source.next_line()? {
                if let Line::Header(name) = line::classify(&raw) {
                    if let Some(buffer) = current.take() {
                        flush_keys(buffer, &mut pending, out)?;
                        out.separate()?;
                    }
                    if pending.wants_section(name) {
                        current = Some(SectionBuffer::new(name));
                    }
                    out.write_line(&raw)?;
                    continue;
                }
                match current.as_mut() {
                    Some(buffer) => buffer.lines.push(raw),
                    None => out.write_line(&raw)?,
                }
            }
            if let Some(buffer) = current.take() {
                flush_keys(buffer, &mut pending, out)?;
            }

            for section in pending.remaining_sections() {
                out.separate()?;
                out.write_line(&line::format_header(&section))?;
                for entry in pending.take_section(&section) {
                    out.write_line(&entry)?;
                }
            }

            let unwritten = pending.unwritten();
            if unwritten > 0 {
                return Err(Error::Incomplete {
                    file: path.display().to_string(),
                    unwritten,
                });
            }
            Ok(true)
        })?;

        debug!(file = %path.display(), entries = requests.len(), "wrote keys");
        Ok(())
    }

    /// Insert one literal line into a section.
    pub fn write_raw_line(
        &self,
        file: impl AsRef<Path>,
        section: &str,
        raw: &str,
        position: RawPosition,
    ) -> Result<()> {
        self.write_raw_lines(file, &[RawLine::new(section, raw)], position)
    }

    /// Insert literal lines into their sections, creating absent sections.
    ///
    /// `Append` places the lines after the section's last non-blank line,
    /// `Prepend` directly after its header. Lines keep their given order.
    pub fn write_raw_lines(
        &self,
        file: impl AsRef<Path>,
        lines: &[RawLine],
        position: RawPosition,
    ) -> Result<()> {
        let path = file.as_ref();
        let mut pending: IndexMap<String, (String, Vec<String>)> = IndexMap::new();
        for item in lines {
            request::check_section(&item.section)?;
            request::check_raw_line(&item.line)?;
            pending
                .entry(item.section.to_lowercase())
                .or_insert_with(|| (item.section.clone(), Vec::new()))
                .1
                .push(item.line.clone());
        }
        if pending.is_empty() {
            return Ok(());
        }

        self.rewrite(path, Missing::Create, |source, out| {
            let mut current: Option<(SectionBuffer, Vec<String>)> = None;
            while let Some(raw) = source.next_line()? {
                if let Line::Header(name) = line::classify(&raw) {
                    if let Some((buffer, inserted)) = current.take() {
                        flush_raw(buffer, inserted, position, out)?;
                    }
                    out.write_line(&raw)?;
                    if let Some((_, inserted)) = pending.shift_remove(&name.to_lowercase()) {
                        current = Some((SectionBuffer::new(name), inserted));
                    }
                    continue;
                }
                match current.as_mut() {
                    Some((buffer, _)) => buffer.lines.push(raw),
                    None => out.write_line(&raw)?,
                }
            }
            if let Some((buffer, inserted)) = current.take() {
                flush_raw(buffer, inserted, position, out)?;
            }

            for (_, (section, inserted)) in pending.drain(..) {
                out.separate()?;
                out.write_line(&line::format_header(&section))?;
                for raw in inserted {
                    out.write_line(&raw)?;
                }
            }
            Ok(true)
        })?;

        debug!(file = %path.display(), lines = lines.len(), ?position, "wrote raw lines");
        Ok(())
    }

    /// Replace a section's body with `lines`, verbatim.
    ///
    /// The section is appended if absent. Later repeated headers of the
    /// same section are dropped with their bodies.
    pub fn write_section_fast(
        &self,
        file: impl AsRef<Path>,
        section: &str,
        lines: &[impl AsRef<str>],
    ) -> Result<()> {
        let body = lines.iter().map(|l| Ok::<_, io::Error>(l.as_ref().to_string()));
        self.replace_section(file.as_ref(), section, body)
    }

    /// Like [`ConfigStore::write_section_fast`], pulling the body from a
    /// reader one line at a time.
    pub fn write_section_fast_from<R: BufRead>(
        &self,
        file: impl AsRef<Path>,
        section: &str,
        reader: R,
    ) -> Result<()> {
        let body = reader.lines().map(|l| {
            l.map(|mut text| {
                if text.ends_with('\r') {
                    text.pop();
                }
                text
            })
        });
        self.replace_section(file.as_ref(), section, body)
    }

    fn replace_section(
        &self,
        path: &Path,
        section: &str,
        body: impl Iterator<Item = io::Result<String>>,
    ) -> Result<()> {
        request::check_section(section)?;

        self.rewrite(path, Missing::Create, |source, out| {
            let mut body = Some(body);
            let mut skipping = false;
            while let Some(raw) = source.next_line()? {
                if let Line::Header(name) = line::classify(&raw) {
                    if line::same_name(name, section) {
                        if let Some(body) = body.take() {
                            out.write_line(&raw)?;
                            write_body(body, out)?;
                        }
                        skipping = true;
                        continue;
                    }
                    if skipping {
                        out.separate()?;
                        skipping = false;
                    }
                }
                if !skipping {
                    out.write_line(&raw)?;
                }
            }

            if let Some(body) = body.take() {
                out.separate()?;
                out.write_line(&line::format_header(section))?;
                write_body(body, out)?;
            }
            Ok(true)
        })?;

        debug!(file = %path.display(), section, "replaced section");
        Ok(())
    }

    /// Rewrite every key line as `key=value`. Returns whether anything
    /// changed; an unchanged file is not rewritten.
    pub fn compact(&self, file: impl AsRef<Path>) -> Result<bool> {
        let path = file.as_ref();
        let changed = self.rewrite(path, Missing::Fail, |source, out| {
            let mut changed = false;
            while let Some(raw) = source.next_line()? {
                match line::classify(&raw) {
                    Line::Key { key, value } => {
                        let normalized = line::format_key(key, value);
                        changed |= normalized != raw;
                        out.write_line(&normalized)?;
                    }
                    _ => out.write_line(&raw)?,
                }
            }
            Ok(changed)
        })?;

        debug!(file = %path.display(), changed, "compacted");
        Ok(changed)
    }

    /// Replay every key of each source into `dest`, in order, so later
    /// sources win. Missing sources contribute nothing.
    pub fn merge(&self, sources: &[impl AsRef<Path>], dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        for source in sources {
            let sections = self.read_all(source)?;
            let mut requests = Vec::new();
            let mut empty = Vec::new();
            for section in &sections {
                if section.entries.is_empty() {
                    empty.push(section.name.as_str());
                }
                requests.extend(section.entries.iter().map(|kv| {
                    KeyRequest::with_value(&section.name, &kv.key, &kv.value)
                }));
            }
            self.write_keys(dest, &requests)?;
            if !empty.is_empty() {
                self.add_sections(dest, &empty)?;
            }
            debug!(
                source = %source.as_ref().display(),
                dest = %dest.display(),
                keys = requests.len(),
                "merged"
            );
        }
        Ok(())
    }
}

/// Emit a buffered target section: trailing blanks dropped, matching keys
/// replaced, remaining entries appended.
fn flush_keys(
    mut buffer: SectionBuffer,
    pending: &mut PendingKeys,
    out: &mut StageWriter,
) -> Result<()> {
    buffer.split_trailing_blanks();
    for raw in &buffer.lines {
        let replaced = match line::classify(raw) {
            Line::Key { key, .. } => pending.take(&buffer.name, key),
            _ => None,
        };
        out.write_line(replaced.as_deref().unwrap_or(raw))?;
    }
    for entry in pending.take_section(&buffer.name) {
        out.write_line(&entry)?;
    }
    Ok(())
}

fn flush_raw(
    mut buffer: SectionBuffer,
    inserted: Vec<String>,
    position: RawPosition,
    out: &mut StageWriter,
) -> Result<()> {
    let trailing = buffer.split_trailing_blanks();
    let (first, second) = match position {
        RawPosition::Prepend => (inserted, buffer.lines),
        RawPosition::Append => (buffer.lines, inserted),
    };
    for raw in first.iter().chain(&second).chain(&trailing) {
        out.write_line(raw)?;
    }
    Ok(())
}

fn write_body(body: impl Iterator<Item = io::Result<String>>, out: &mut StageWriter) -> Result<()> {
    for raw in body {
        let raw = raw?;
        request::check_raw_line(&raw)?;
        out.write_line(&raw)?;
    }
    Ok(())
}
