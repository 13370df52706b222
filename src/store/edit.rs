//! Key deletes and renames, and section header edits.

use super::line::{self, Line};
use super::request::{self, KeyRequest, SectionRename};
use super::{ConfigStore, Missing};
use crate::{Error, Result};
use std::path::Path;
use tracing::debug;

impl ConfigStore {
    /// Delete the first occurrence of a key. `false` if nothing was deleted.
    pub fn delete_key(&self, file: impl AsRef<Path>, section: &str, key: &str) -> Result<bool> {
        let done = self.delete_keys(file, &[KeyRequest::new(section, key)])?;
        Ok(done.first().copied().unwrap_or(false))
    }

    /// Delete a batch of keys in one pass. The file is only rewritten if at
    /// least one key was found.
    pub fn delete_keys(
        &self,
        file: impl AsRef<Path>,
        requests: &[KeyRequest],
    ) -> Result<Vec<bool>> {
        let path = file.as_ref();
        for req in requests {
            request::check_section(&req.section)?;
            request::check_key(&req.key)?;
        }
        let mut done = vec![false; requests.len()];
        if requests.is_empty() {
            return Ok(done);
        }

        self.rewrite(path, Missing::Skip, |source, out| {
            let mut section: Option<String> = None;
            while let Some(raw) = source.next_line()? {
                match line::classify(&raw) {
                    Line::Header(name) => section = Some(name.to_string()),
                    Line::Key { key, .. } => {
                        if let Some(current) = section.as_deref() {
                            if claim(requests, &mut done, current, key) {
                                continue;
                            }
                        }
                    }
                    _ => {}
                }
                out.write_line(&raw)?;
            }
            Ok(done.contains(&true))
        })?;

        debug!(
            file = %path.display(),
            deleted = done.iter().filter(|d| **d).count(),
            "deleted keys"
        );
        Ok(done)
    }

    /// Rename the first occurrence of a key, keeping its value.
    pub fn rename_key(
        &self,
        file: impl AsRef<Path>,
        section: &str,
        key: &str,
        new_key: &str,
    ) -> Result<bool> {
        let done = self.rename_keys(file, &[KeyRequest::with_value(section, key, new_key)])?;
        Ok(done.first().copied().unwrap_or(false))
    }

    /// Rename a batch of keys in one pass. Each request's `value` is the
    /// new key name.
    pub fn rename_keys(
        &self,
        file: impl AsRef<Path>,
        requests: &[KeyRequest],
    ) -> Result<Vec<bool>> {
        let path = file.as_ref();
        let mut targets = Vec::with_capacity(requests.len());
        for req in requests {
            request::check_section(&req.section)?;
            request::check_key(&req.key)?;
            let new_key = req.value.as_deref().ok_or_else(|| {
                Error::InvalidInput(format!(
                    "no new name given for [{}] {}",
                    req.section, req.key
                ))
            })?;
            request::check_key(new_key)?;
            targets.push(new_key.trim());
        }
        let mut done = vec![false; requests.len()];
        if requests.is_empty() {
            return Ok(done);
        }

        self.rewrite(path, Missing::Skip, |source, out| {
            let mut section: Option<String> = None;
            while let Some(raw) = source.next_line()? {
                match line::classify(&raw) {
                    Line::Header(name) => section = Some(name.to_string()),
                    Line::Key { key, value } => {
                        if let Some(current) = section.as_deref() {
                            if let Some(idx) = first_unclaimed(requests, &done, current, key) {
                                // Identical requests are all satisfied by this line.
                                claim(requests, &mut done, current, key);
                                out.write_line(&line::format_key(targets[idx], value))?;
                                continue;
                            }
                        }
                    }
                    _ => {}
                }
                out.write_line(&raw)?;
            }
            Ok(done.contains(&true))
        })?;

        debug!(
            file = %path.display(),
            renamed = done.iter().filter(|d| **d).count(),
            "renamed keys"
        );
        Ok(done)
    }

    /// Add an empty section at the end of the file. `false` if it exists.
    pub fn add_section(&self, file: impl AsRef<Path>, section: &str) -> Result<bool> {
        let created = self.add_sections(file, &[section])?;
        Ok(created.first().copied().unwrap_or(false))
    }

    /// Add several sections; per item `true` if it was created. The file is
    /// left alone when every section already exists.
    pub fn add_sections(
        &self,
        file: impl AsRef<Path>,
        sections: &[impl AsRef<str>],
    ) -> Result<Vec<bool>> {
        let path = file.as_ref();
        let names: Vec<&str> = sections.iter().map(|s| s.as_ref()).collect();
        for name in &names {
            request::check_section(name)?;
        }
        let mut created = vec![false; names.len()];
        if names.is_empty() {
            return Ok(created);
        }

        self.rewrite(path, Missing::Create, |source, out| {
            let mut exists = vec![false; names.len()];
            while let Some(raw) = source.next_line()? {
                if let Line::Header(found) = line::classify(&raw) {
                    for (name, seen) in names.iter().zip(exists.iter_mut()) {
                        *seen |= line::same_name(name, found);
                    }
                }
                out.write_line(&raw)?;
            }

            for (idx, &name) in names.iter().enumerate() {
                let repeated = names[..idx].iter().any(|prev| line::same_name(prev, name));
                if exists[idx] || repeated {
                    continue;
                }
                out.separate()?;
                out.write_line(&line::format_header(name))?;
                created[idx] = true;
            }
            Ok(created.contains(&true))
        })?;

        debug!(
            file = %path.display(),
            created = created.iter().filter(|c| **c).count(),
            "added sections"
        );
        Ok(created)
    }

    /// Delete a section with its body. `false` if it was not found.
    pub fn delete_section(&self, file: impl AsRef<Path>, section: &str) -> Result<bool> {
        let done = self.delete_sections(file, &[section])?;
        Ok(done.first().copied().unwrap_or(false))
    }

    /// Delete several sections in one pass. Repeated headers of a section
    /// are all removed.
    pub fn delete_sections(
        &self,
        file: impl AsRef<Path>,
        sections: &[impl AsRef<str>],
    ) -> Result<Vec<bool>> {
        let path = file.as_ref();
        let names: Vec<&str> = sections.iter().map(|s| s.as_ref()).collect();
        for name in &names {
            request::check_section(name)?;
        }
        let mut done = vec![false; names.len()];
        if names.is_empty() {
            return Ok(done);
        }

        self.rewrite(path, Missing::Skip, |source, out| {
            let mut skipping = false;
            while let Some(raw) = source.next_line()? {
                if let Line::Header(found) = line::classify(&raw) {
                    skipping = false;
                    for (name, hit) in names.iter().zip(done.iter_mut()) {
                        if line::same_name(name, found) {
                            *hit = true;
                            skipping = true;
                        }
                    }
                }
                if !skipping {
                    out.write_line(&raw)?;
                }
            }
            Ok(done.contains(&true))
        })?;

        debug!(
            file = %path.display(),
            deleted = done.iter().filter(|d| **d).count(),
            "deleted sections"
        );
        Ok(done)
    }

    /// Rename a section header, leaving its body untouched.
    pub fn rename_section(&self, file: impl AsRef<Path>, from: &str, to: &str) -> Result<bool> {
        let done = self.rename_sections(file, &[SectionRename::new(from, to)])?;
        Ok(done.first().copied().unwrap_or(false))
    }

    /// Rename several section headers in one pass.
    ///
    /// Fails with [`Error::InvalidInput`] if a new name is already used by
    /// a section that is not itself being renamed, or if two sections would
    /// end up with the same name.
    pub fn rename_sections(
        &self,
        file: impl AsRef<Path>,
        renames: &[SectionRename],
    ) -> Result<Vec<bool>> {
        let path = file.as_ref();
        for rename in renames {
            request::check_section(&rename.from)?;
            request::check_section(&rename.to)?;
        }
        let mut done = vec![false; renames.len()];
        if renames.is_empty() {
            return Ok(done);
        }

        self.rewrite(path, Missing::Skip, |source, out| {
            let mut taken = vec![false; renames.len()];
            let mut applied = vec![false; renames.len()];
            while let Some(raw) = source.next_line()? {
                let Line::Header(found) = line::classify(&raw) else {
                    out.write_line(&raw)?;
                    continue;
                };
                let renamed = renames.iter().position(|r| line::same_name(&r.from, found));
                match renamed {
                    Some(idx) => {
                        applied[idx] = true;
                        for (rename, hit) in renames.iter().zip(done.iter_mut()) {
                            *hit |= line::same_name(&rename.from, found);
                        }
                        out.write_line(&line::format_header(&renames[idx].to))?;
                    }
                    None => {
                        for (rename, clash) in renames.iter().zip(taken.iter_mut()) {
                            *clash |= line::same_name(&rename.to, found);
                        }
                        out.write_line(&raw)?;
                    }
                }
            }

            let clash = renames
                .iter()
                .zip(done.iter().zip(&taken))
                .find(|(_, (hit, clash))| **hit && **clash);
            if let Some((rename, _)) = clash {
                return Err(Error::InvalidInput(format!(
                    "cannot rename [{}] to [{}]: section already exists",
                    rename.from, rename.to
                )));
            }
            let merged = applied.iter().enumerate().filter(|(_, a)| **a).find_map(|(i, _)| {
                renames[i + 1..]
                    .iter()
                    .zip(&applied[i + 1..])
                    .find(|(other, a)| **a && line::same_name(&other.to, &renames[i].to))
                    .map(|(other, _)| (&renames[i], other))
            });
            if let Some((first, second)) = merged {
                return Err(Error::InvalidInput(format!(
                    "cannot rename both [{}] and [{}] to [{}]",
                    first.from, second.from, first.to
                )));
            }
            Ok(done.contains(&true))
        })?;

        debug!(
            file = %path.display(),
            renamed = done.iter().filter(|d| **d).count(),
            "renamed sections"
        );
        Ok(done)
    }
}

/// Index of the first not yet satisfied request for `key` in `section`.
fn first_unclaimed(
    requests: &[KeyRequest],
    done: &[bool],
    section: &str,
    key: &str,
) -> Option<usize> {
    requests
        .iter()
        .zip(done)
        .position(|(req, hit)| !*hit && req.targets(section, key))
}

/// Mark every unsatisfied request for `key` in `section` as done.
fn claim(requests: &[KeyRequest], done: &mut [bool], section: &str, key: &str) -> bool {
    let mut any = false;
    for (req, hit) in requests.iter().zip(done.iter_mut()) {
        if !*hit && req.targets(section, key) {
            *hit = true;
            any = true;
        }
    }
    any
}
