//! Configuration for the store.
//!
//! Settings live in a TOML file:
//!
//! ```toml
//! line-ending = "lf"        # or "crlf"
//! new-file-codec = "utf8"   # utf8 | utf8-bom | utf16le | utf16be
//! temp-dir = "/var/tmp"     # optional, default is the edited file's directory
//! fsync = true
//! ```
//!
//! ## Precedence
//!
//! `--config` flag > `INISTORE_CONFIG` env var > user config file > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{CONFIG_ENV, ConfigSource, ResolvedConfig, resolve_config, user_config_path};
pub use schema::{LineEnding, StoreConfig};
