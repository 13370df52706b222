//! inistore - a crash-safe store for sectioned key/value text files.
//!
//! This library provides the core functionality for the `inistore` CLI tool:
//! streaming edits of `[Section]` / `Key=Value` files under per-file
//! reader/writer locks, and `%Name%` placeholder expansion against a
//! two-tier variable scope loaded from those files.

pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod lock;
pub mod store;
pub mod vars;

pub use codec::{BomDetector, EncodingDetector, TextCodec};
pub use config::{LineEnding, StoreConfig};
pub use lock::{LockMode, PathLockGuard, PathLockRegistry};
pub use store::{ConfigStore, KeyRequest, KeyValue, RawLine, RawPosition, SectionRename};
pub use vars::{AddReport, MAX_EXPANDED_LEN, Scope, VariableResolver};


/// Library-level error type for inistore operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid placeholder syntax: {0}")]
    Format(String),

    #[error("Variable %{name}% references itself in [{value}]")]
    SelfReference { name: String, value: String },

    #[error("Circular variable reference while expanding [{0}]")]
    CircularReference(String),

    #[error("Expanding [{text}] exceeds {limit} bytes")]
    ExpansionTooLarge { text: String, limit: usize },

    #[error("{unwritten} entries could not be written to {file}")]
    Incomplete { file: String, unwritten: usize },
}

/// Result type alias for inistore operations.
pub type Result<T> = std::result::Result<T, Error>;
