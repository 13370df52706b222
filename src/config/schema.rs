//! TOML schema for the store configuration file.

use crate::Result;
use crate::codec::TextCodec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Line terminator written by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    Crlf,
}

impl LineEnding {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lf" | "unix" => Some(LineEnding::Lf),
            "crlf" | "windows" => Some(LineEnding::Crlf),
            _ => None,
        }
    }

    /// The terminator itself.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LineEnding::Lf => "lf",
            LineEnding::Crlf => "crlf",
        }
    }
}

impl std::fmt::Display for LineEnding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Store settings.
///
/// # TOML Schema
///
/// ```toml
/// line-ending = "crlf"
/// new-file-codec = "utf8-bom"
/// temp-dir = "/var/tmp"
/// fsync = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StoreConfig {
    /// Terminator for every line the store writes
    pub line_ending: LineEnding,

    /// Codec for files the store creates (existing files keep theirs)
    pub new_file_codec: TextCodec,

    /// Directory for staged rewrites. When unset the temp file is created
    /// next to the destination so the final rename is atomic.
    pub temp_dir: Option<PathBuf>,

    /// Sync staged files to disk before they replace the destination
    pub fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            line_ending: LineEnding::Lf,
            new_file_codec: TextCodec::Utf8,
            temp_dir: None,
            fsync: true,
        }
    }
}

impl StoreConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate the config values.
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.temp_dir {
            if dir.as_os_str().is_empty() {
                return Err(crate::Error::InvalidInput(
                    "temp-dir must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn with_new_file_codec(mut self, codec: TextCodec) -> Self {
        self.new_file_codec = codec;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}
