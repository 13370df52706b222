//! Precedence resolution for the store configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. `--config PATH` (passed at runtime)
//! 2. `INISTORE_CONFIG` environment variable
//! 3. User config file (`<config_dir>/inistore/config.toml`)
//! 4. Built-in defaults
//!
//! An explicitly named file (1 or 2) must exist; a missing user file just
//! falls through to the defaults.

use crate::Result;
use crate::config::StoreConfig;
use std::path::{Path, PathBuf};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "INISTORE_CONFIG";

/// Tracks where the resolved config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// File named by the `--config` flag
    CliFlag(PathBuf),
    /// File named by an environment variable
    EnvVar(PathBuf),
    /// User config file
    UserFile(PathBuf),
    /// Built-in default values
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliFlag(path) => write!(f, "cli:{}", path.display()),
            ConfigSource::EnvVar(path) => write!(f, "env:{}", path.display()),
            ConfigSource::UserFile(path) => write!(f, "user:{}", path.display()),
            ConfigSource::Default => write!(f, "default"),
        }
    }
}

/// A config together with its source.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: StoreConfig,
    pub source: ConfigSource,
}

/// Default location of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("inistore").join("config.toml"))
}

/// Resolve the config with the full precedence chain.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let env_path = std::env::var_os(CONFIG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    resolve_config_from(explicit, env_path.as_deref(), user_config_path().as_deref())
}

/// Resolve from explicitly supplied candidates (no environment access).
pub fn resolve_config_from(
    explicit: Option<&Path>,
    env_path: Option<&Path>,
    user_path: Option<&Path>,
) -> Result<ResolvedConfig> {
    if let Some(path) = explicit {
        return Ok(ResolvedConfig {
            config: StoreConfig::load(path)?,
            source: ConfigSource::CliFlag(path.to_path_buf()),
        });
    }

    if let Some(path) = env_path {
        return Ok(ResolvedConfig {
            config: StoreConfig::load(path)?,
            source: ConfigSource::EnvVar(path.to_path_buf()),
        });
    }

    if let Some(path) = user_path.filter(|p| p.is_file()) {
        return Ok(ResolvedConfig {
            config: StoreConfig::load(path)?,
            source: ConfigSource::UserFile(path.to_path_buf()),
        });
    }

    Ok(ResolvedConfig {
        config: StoreConfig::default(),
        source: ConfigSource::Default,
    })
}
