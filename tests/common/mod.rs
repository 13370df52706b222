//! Common test utilities for inistore integration tests.
//!
//! Provides `TestEnv` for isolated test environments: a temp directory for
//! store files and a config directory so the user's own
//! `~/.config/inistore/config.toml` never leaks into a test.

#![allow(dead_code)]

use assert_cmd::Command;
use inistore::{ConfigStore, PathLockRegistry};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
pub use tempfile::TempDir;

/// A test environment with isolated files and configuration.
pub struct TestEnv {
    pub dir: TempDir,
    pub config_dir: TempDir,
    pub registry: Arc<PathLockRegistry>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
            registry: Arc::new(PathLockRegistry::new()),
        }
    }

    /// Get a Command for the inistore binary running inside the test directory.
    ///
    /// Points `XDG_CONFIG_HOME`/`HOME` at an empty directory and clears
    /// `INISTORE_CONFIG` per-command for parallel safety.
    pub fn inistore(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_inistore"));
        cmd.current_dir(self.dir.path());
        cmd.env("XDG_CONFIG_HOME", self.config_dir.path());
        cmd.env("HOME", self.config_dir.path());
        cmd.env_remove("INISTORE_CONFIG");
        cmd.env_remove("INISTORE_LOG");
        cmd
    }

    /// Library store sharing this environment's lock registry.
    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(Arc::clone(&self.registry))
    }

    /// Path of a file inside the test directory (not created).
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create a file with the given content and return its path.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a command's stdout as JSON.
pub fn parse_json(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    serde_json::from_str(&text).expect("Invalid JSON")
}
