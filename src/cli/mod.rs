//! CLI argument definitions for inistore.

use crate::vars::Scope;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version string with build metadata, shown by `--version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuilt:  ",
    env!("INISTORE_BUILD_TIMESTAMP"),
    "\ncommit: ",
    env!("INISTORE_GIT_COMMIT"),
);

/// inistore - edit sectioned key/value files safely from scripts.
///
/// Every change is written to a temp file and moved over the original, so a
/// file is never left half written.
#[derive(Parser, Debug)]
#[command(name = "inistore")]
#[command(
    author,
    version,
    long_version = LONG_VERSION,
    about = "Edit [Section] / Key=Value files and expand %variables%",
    long_about = None
)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Store settings file (TOML). Can also be set via INISTORE_CONFIG.
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a key's value (exits 1 if it does not exist)
    Get {
        /// File to read
        file: PathBuf,
        /// Section name (case-insensitive)
        section: String,
        /// Key name (case-insensitive)
        key: String,
    },

    /// Insert or update a key, creating the section and file if needed
    Set {
        /// File to edit
        file: PathBuf,
        /// Section name
        section: String,
        /// Key name
        key: String,
        /// New value
        value: String,
    },

    /// Rename a key, keeping its value
    RenameKey {
        /// File to edit
        file: PathBuf,
        /// Section name
        section: String,
        /// Current key name
        key: String,
        /// New key name
        new_key: String,
    },

    /// Delete a key
    DeleteKey {
        /// File to edit
        file: PathBuf,
        /// Section name
        section: String,
        /// Key name
        key: String,
    },

    /// Section commands
    Section {
        #[command(subcommand)]
        command: SectionCommands,
    },

    /// Insert a literal line into a section
    RawLine {
        /// File to edit
        file: PathBuf,
        /// Section name (created if missing)
        section: String,
        /// Line to insert, verbatim
        line: String,

        /// Insert right after the header instead of after the last line
        #[arg(long)]
        prepend: bool,
    },

    /// Normalize every key line to `key=value`
    Compact {
        /// File to edit (must exist)
        file: PathBuf,
    },

    /// Copy every key of the source files into a destination file
    Merge {
        /// Destination file (created if missing)
        dest: PathBuf,

        /// Source files, applied in order so later ones win
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Expand %Name% placeholders in a string
    Expand {
        /// Text to expand
        text: String,

        /// Load `%Name%=Value` entries from this file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Section holding the variables
        #[arg(short, long, default_value = "Variables", requires = "file")]
        section: String,

        /// Scope the file's variables are loaded into
        #[arg(long, value_enum, default_value = "local")]
        scope: Scope,

        /// Extra local variable (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
}

/// Section subcommands
#[derive(Subcommand, Debug)]
pub enum SectionCommands {
    /// List section names in file order
    List {
        /// File to read
        file: PathBuf,
    },

    /// Show a section's keys and values
    Show {
        /// File to read
        file: PathBuf,
        /// Section name
        section: String,
    },

    /// Show a section's lines verbatim (comments excluded)
    Raw {
        /// File to read
        file: PathBuf,
        /// Section name
        section: String,

        /// Keep blank lines
        #[arg(long)]
        blank: bool,
    },

    /// Add empty sections
    Add {
        /// File to edit
        file: PathBuf,
        /// Section names
        #[arg(required = true)]
        sections: Vec<String>,
    },

    /// Delete sections and their bodies
    Delete {
        /// File to edit
        file: PathBuf,
        /// Section names
        #[arg(required = true)]
        sections: Vec<String>,
    },

    /// Rename a section header
    Rename {
        /// File to edit
        file: PathBuf,
        /// Current name
        from: String,
        /// New name
        to: String,
    },

    /// Replace a section's body
    Replace {
        /// File to edit
        file: PathBuf,
        /// Section name
        section: String,

        /// New body lines
        #[arg(conflicts_with = "stdin")]
        lines: Vec<String>,

        /// Read the new body from stdin
        #[arg(long)]
        stdin: bool,
    },
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    if name.trim().is_empty() {
        return Err(format!("empty variable name in '{}'", s));
    }
    Ok((name.trim().to_string(), value.to_string()))
}
