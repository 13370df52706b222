//! `%Name%` variables in two scopes.
//!
//! A [`VariableResolver`] keeps raw (unexpanded) values for a `Local` and a
//! `Global` scope. Names are case-insensitive and Local shadows Global
//! wherever a name is looked up. Values are expanded lazily by
//! [`VariableResolver::expand`].
//!
//! ## Expansion
//!
//! Each pass replaces every `%name%` pair of the current text. Passes repeat
//! while `%` remains, at most once per defined variable plus one; running
//! past that bound means the variables reference each other in a cycle.
//! Unknown names are kept visibly as `#$pName#$p`. The expanded text may
//! not grow past [`MAX_EXPANDED_LEN`] bytes (see
//! [`VariableResolver::with_max_len`]).

use crate::store::line::{self, Line};
use crate::store::ConfigStore;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Marker placed around names that have no value.
pub const UNRESOLVED_MARKER: &str = "#$p";

/// Default cap on the length of an expanded string, in bytes.
pub const MAX_EXPANDED_LEN: usize = 1 << 20;

/// Variable scope.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Global => "global",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReport {
    /// Names that were set
    pub applied: Vec<String>,
    /// Names (or unparsable lines) that were refused
    pub rejected: Vec<String>,
}

impl AddReport {
    /// True if nothing was refused.
    pub fn is_success(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    raw: String,
}

/// Two-scope variable table.
///
/// Not synchronized; one resolver belongs to one running session.
#[derive(Debug, Clone, Default)]
pub struct VariableResolver {
    local: IndexMap<String, Variable>,
    global: IndexMap<String, Variable>,
    max_len: Option<usize>,
}

impl VariableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap expanded output at `max_len` bytes instead of [`MAX_EXPANDED_LEN`].
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Set a raw value. `key` may be bare (`Name`) or wrapped (`%Name%`).
    ///
    /// A value containing its own `%key%` token is refused and the scope is
    /// left unchanged.
    pub fn set_value(&mut self, scope: Scope, key: &str, raw: &str) -> Result<()> {
        let name = normalize_name(key)?;
        let token = format!("%{}%", name).to_lowercase();
        if raw.to_lowercase().contains(&token) {
            warn!(%scope, name, raw, "variable references itself");
            return Err(Error::SelfReference {
                name: name.to_string(),
                value: raw.to_string(),
            });
        }
        self.scope_mut(scope).insert(
            name.to_lowercase(),
            Variable {
                name: name.to_string(),
                raw: raw.to_string(),
            },
        );
        trace!(%scope, name, raw, "variable set");
        Ok(())
    }

    /// Expanded value of a variable in one scope.
    pub fn get_value(&self, scope: Scope, key: &str) -> Result<Option<String>> {
        let name = normalize_name(key)?;
        match self.scope(scope).get(&name.to_lowercase()) {
            Some(var) => self.expand(&var.raw).map(Some),
            None => Ok(None),
        }
    }

    /// Raw value from either scope, Local first.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        let name = parse_var_name(key).unwrap_or(key);
        let id = name.to_lowercase();
        self.local
            .get(&id)
            .or_else(|| self.global.get(&id))
            .map(|var| var.raw.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Number of variables over both scopes.
    pub fn len(&self) -> usize {
        self.local.len() + self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace every `%name%` in `text` until none remain.
    pub fn expand(&self, text: &str) -> Result<String> {
        let mut current = text.to_string();
        let max_passes = self.len() + 1;
        for pass in 0..max_passes {
            if !current.contains('%') {
                return Ok(current);
            }
            current = self.expand_once(&current)?;
            trace!(pass, text = %current, "expansion pass");
        }
        if current.contains('%') {
            return Err(Error::CircularReference(text.to_string()));
        }
        Ok(current)
    }

    fn expand_once(&self, text: &str) -> Result<String> {
        if text.matches('%').count() % 2 == 1 {
            return Err(Error::Format(format!(
                "variable names must be enclosed by %: {}",
                text
            )));
        }
        let limit = self.max_len.unwrap_or(MAX_EXPANDED_LEN);
        let mut out = String::with_capacity(text.len());
        for (idx, part) in text.split('%').enumerate() {
            if idx % 2 == 0 {
                out.push_str(part);
                continue;
            }
            if part.is_empty() {
                return Err(Error::Format(format!("empty variable name in {}", text)));
            }
            match self.lookup(part) {
                Some(raw) => out.push_str(raw),
                None => {
                    out.push_str(UNRESOLVED_MARKER);
                    out.push_str(part);
                    out.push_str(UNRESOLVED_MARKER);
                }
            }
            if out.len() > limit {
                return Err(Error::ExpansionTooLarge {
                    text: text.to_string(),
                    limit,
                });
            }
        }
        Ok(out)
    }

    /// Set many values, continuing past refused ones.
    pub fn add_variables<K, V>(
        &mut self,
        scope: Scope,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> AddReport
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut report = AddReport::default();
        for (key, raw) in entries {
            let key = key.as_ref();
            match self.set_value(scope, key, raw.as_ref()) {
                Ok(()) => report.applied.push(parse_var_name(key).unwrap_or(key).to_string()),
                Err(e) => {
                    debug!(%scope, key, error = %e, "variable rejected");
                    report.rejected.push(key.to_string());
                }
            }
        }
        report
    }

    /// Import `%Name%=Value` lines. Blank and comment lines are skipped;
    /// any other line that is not var-style is rejected.
    pub fn add_variable_lines(
        &mut self,
        scope: Scope,
        lines: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> AddReport {
        let mut entries = Vec::new();
        let mut malformed = Vec::new();
        for raw in lines {
            let raw = raw.as_ref();
            match line::classify(raw) {
                Line::Blank | Line::Comment => {}
                Line::Key { key, value } if parse_var_name(key).is_some() => {
                    entries.push((key.to_string(), value.to_string()));
                }
                _ => malformed.push(raw.trim().to_string()),
            }
        }
        let mut report = self.add_variables(scope, entries);
        report.rejected.extend(malformed);
        report
    }

    /// Load the var-style keys of a store section into `scope`. A missing
    /// section imports nothing.
    pub fn import_section(
        &mut self,
        store: &ConfigStore,
        file: impl AsRef<Path>,
        section: &str,
        scope: Scope,
    ) -> Result<AddReport> {
        let file = file.as_ref();
        let Some(entries) = store.read_section(file, section)? else {
            debug!(file = %file.display(), section, "no variable section");
            return Ok(AddReport::default());
        };

        let mut report = AddReport::default();
        let mut var_entries = Vec::with_capacity(entries.len());
        for kv in entries {
            if parse_var_name(&kv.key).is_some() {
                var_entries.push((kv.key, kv.value));
            } else {
                report.rejected.push(kv.key);
            }
        }
        let added = self.add_variables(scope, var_entries);
        report.applied = added.applied;
        report.rejected.extend(added.rejected);
        debug!(
            file = %file.display(),
            section,
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            "imported variables"
        );
        Ok(report)
    }

    /// Set a value and persist it to `file` as `%key%=raw`.
    pub fn set_permanent(
        &mut self,
        store: &ConfigStore,
        file: impl AsRef<Path>,
        section: &str,
        scope: Scope,
        key: &str,
        raw: &str,
    ) -> Result<()> {
        self.set_value(scope, key, raw)?;
        let name = normalize_name(key)?;
        store.write_key(file, section, &format!("%{}%", name), raw)
    }

    /// Clear one scope.
    pub fn reset_variables(&mut self, scope: Scope) {
        self.scope_mut(scope).clear();
    }

    /// Variables of one scope as `(name, raw)`, in insertion order.
    pub fn entries(&self, scope: Scope) -> impl Iterator<Item = (&str, &str)> {
        self.scope(scope)
            .values()
            .map(|var| (var.name.as_str(), var.raw.as_str()))
    }

    fn scope(&self, scope: Scope) -> &IndexMap<String, Variable> {
        match scope {
            Scope::Local => &self.local,
            Scope::Global => &self.global,
        }
    }

    fn scope_mut(&mut self, scope: Scope) -> &mut IndexMap<String, Variable> {
        match scope {
            Scope::Local => &mut self.local,
            Scope::Global => &mut self.global,
        }
    }
}

impl std::fmt::Display for VariableResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for scope in [Scope::Local, Scope::Global] {
            writeln!(f, "[{}]", scope)?;
            for (name, raw) in self.entries(scope) {
                match self.expand(raw) {
                    Ok(expanded) => writeln!(f, "%{}%={} => {}", name, raw, expanded)?,
                    Err(e) => writeln!(f, "%{}%={} => error: {}", name, raw, e)?,
                }
            }
        }
        Ok(())
    }
}

/// Name inside `%Name%`, or `None` if `text` is not exactly one wrapped name.
pub fn parse_var_name(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix('%')?.strip_suffix('%')?;
    if inner.is_empty() || inner.contains('%') {
        None
    } else {
        Some(inner)
    }
}

fn normalize_name(key: &str) -> Result<&str> {
    let key = key.trim();
    let name = parse_var_name(key).unwrap_or(key);
    if name.is_empty() || name.contains('%') {
        return Err(Error::InvalidInput(format!("invalid variable name: {}", key)));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_nested_expansion() {
        let mut vars = VariableResolver::new();
        vars.set_value(Scope::Local, "A", "1").unwrap();
        vars.set_value(Scope::Local, "%B%", "%A%2").unwrap();
        assert_eq!(vars.get_value(Scope::Local, "B").unwrap().as_deref(), Some("12"));
        assert_eq!(vars.get_value(Scope::Local, "%b%").unwrap().as_deref(), Some("12"));
        assert_eq!(vars.get_value(Scope::Global, "B").unwrap(), None);
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut vars = VariableResolver::new();
        vars.set_value(Scope::Local, "Dir", "C:\\base").unwrap();
        let err = vars
            .set_value(Scope::Local, "Dir", "%DIR%\\sub")
            .unwrap_err();
        assert!(matches!(err, Error::SelfReference { .. }));
        assert_eq!(vars.lookup("dir"), Some("C:\\base"));
    }

    #[test]
    fn test_local_shadows_global() {
        let mut vars = VariableResolver::new();
        vars.set_value(Scope::Global, "OS", "global").unwrap();
        vars.set_value(Scope::Local, "os", "local").unwrap();
        assert_eq!(vars.lookup("OS"), Some("local"));
        assert_eq!(vars.expand("[%Os%]").unwrap(), "[local]");
        vars.reset_variables(Scope::Local);
        assert_eq!(vars.expand("[%Os%]").unwrap(), "[global]");
        assert!(vars.contains_key("%os%"));
    }

    #[test]
    fn test_unresolved_names_are_marked() {
        let vars = VariableResolver::new();
        assert_eq!(vars.expand("a%Missing%b").unwrap(), "a#$pMissing#$pb");
        assert_eq!(vars.expand("plain text").unwrap(), "plain text");
    }

    #[test]
    fn test_format_errors() {
        let vars = VariableResolver::new();
        assert!(matches!(vars.expand("%Base%Dir%"), Err(Error::Format(_))));
        assert!(matches!(vars.expand("100%% sure"), Err(Error::Format(_))));
    }

    #[test]
    fn test_indirect_cycle_detected() {
        let mut vars = VariableResolver::new();
        vars.set_value(Scope::Local, "A", "x%B%").unwrap();
        vars.set_value(Scope::Local, "B", "y%A%").unwrap();
        assert!(matches!(
            vars.expand("%A%"),
            Err(Error::CircularReference(_))
        ));
        assert!(matches!(
            vars.get_value(Scope::Local, "B"),
            Err(Error::CircularReference(_))
        ));
    }

    #[test]
    fn test_doubling_chain_hits_length_cap() {
        let mut vars = VariableResolver::new();
        vars.set_value(Scope::Local, "V40", "xy").unwrap();
        for i in 1..40 {
            let next = format!("%V{}%%V{}%", i + 1, i + 1);
            vars.set_value(Scope::Local, &format!("V{}", i), &next).unwrap();
        }
        assert!(matches!(
            vars.expand("%V1%"),
            Err(Error::ExpansionTooLarge { limit: MAX_EXPANDED_LEN, .. })
        ));

        let vars = vars.with_max_len(64);
        assert!(matches!(
            vars.expand("%V34%"),
            Err(Error::ExpansionTooLarge { limit: 64, .. })
        ));
        assert_eq!(vars.expand("%V36%").unwrap().len(), 32);
    }

    #[test]
    fn test_long_chain_within_bound() {
        let mut vars = VariableResolver::new();
        vars.set_value(Scope::Local, "V0", "end").unwrap();
        for i in 1..20 {
            vars.set_value(Scope::Local, &format!("V{}", i), &format!("%V{}%", i - 1))
                .unwrap();
        }
        assert_eq!(vars.expand("%V19%").unwrap(), "end");
    }

    #[test]
    fn test_add_variables_reports() {
        let mut vars = VariableResolver::new();
        let report = vars.add_variables(
            Scope::Global,
            [("%A%", "1"), ("B", "%b%"), ("C", "%A%")],
        );
        assert_eq!(report.applied, vec!["A", "C"]);
        assert_eq!(report.rejected, vec!["B"]);
        assert!(!report.is_success());
        assert_eq!(vars.get_value(Scope::Global, "C").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_add_variable_lines() {
        let mut vars = VariableResolver::new();
        let report = vars.add_variable_lines(
            Scope::Local,
            ["%Name% = Value", "", "// note", "Plain=1", "Echo,Hi"],
        );
        assert_eq!(report.applied, vec!["Name"]);
        assert_eq!(report.rejected, vec!["Plain=1", "Echo,Hi"]);
        assert_eq!(vars.lookup("name"), Some("Value"));
    }

    #[test]
    fn test_parse_var_name() {
        assert_eq!(parse_var_name("%Name%"), Some("Name"));
        assert_eq!(parse_var_name(" %Name% "), Some("Name"));
        assert_eq!(parse_var_name("Name"), None);
        assert_eq!(parse_var_name("%%"), None);
        assert_eq!(parse_var_name("%A%B%"), None);
        assert_eq!(parse_var_name("%"), None);
    }

    #[test]
    fn test_import_section_and_set_permanent() {
        let env = TestEnv::new();
        let path = env.write(
            "script.ini",
            "[Variables]\n%Base%=C:\\Work\n%Out%=%Base%\\out\nNotAVar=1\n",
        );
        let store = env.store();
        let mut vars = VariableResolver::new();

        let report = vars
            .import_section(&store, &path, "variables", Scope::Local)
            .unwrap();
        assert_eq!(report.applied, vec!["Base", "Out"]);
        assert_eq!(report.rejected, vec!["NotAVar"]);
        assert_eq!(vars.expand("%Out%").unwrap(), "C:\\Work\\out");

        vars.set_permanent(&store, &path, "Variables", Scope::Local, "Base", "D:\\Next")
            .unwrap();
        assert_eq!(vars.expand("%Out%").unwrap(), "D:\\Next\\out");
        assert_eq!(
            store.read_key(&path, "Variables", "%base%").unwrap().as_deref(),
            Some("D:\\Next")
        );

        let missing = vars
            .import_section(&store, &path, "Absent", Scope::Global)
            .unwrap();
        assert_eq!(missing, AddReport::default());
    }

    #[test]
    fn test_display_lists_both_scopes() {
        let mut vars = VariableResolver::new();
        vars.set_value(Scope::Local, "A", "1").unwrap();
        vars.set_value(Scope::Global, "B", "%A%%A%").unwrap();
        assert_eq!(
            vars.to_string(),
            "[local]\n%A%=1 => 1\n[global]\n%B%=%A%%A% => 11\n"
        );
    }
}
