//! Sectioned key/value store.
//!
//! Operates directly on `[Section]` / `Key=Value` text files without ever
//! holding a whole file in memory.
//!
//! ## Rewrites
//!
//! Every mutation is a single forward pass over the current file into a
//! staged temp file, which then replaces the destination in one rename:
//!
//! - exclusive lock on the destination for the whole pass
//! - codec taken from the existing file (or `new-file-codec` for new files)
//! - the temp file is discarded if the pass fails or decides nothing changed
//!
//! Reads take a shared lock and stop as soon as they have their answer.

pub mod line;
mod edit;
mod read;
mod request;
mod stage;
mod write;

pub use line::{Line, classify, is_comment, split_key_value};
pub use request::{KeyRequest, KeyValue, RawLine, RawPosition, SectionEntries, SectionRename};

use crate::codec::{self, BomDetector, EncodingDetector};
use crate::config::StoreConfig;
use crate::lock::{LockMode, PathLockRegistry};
use crate::{Error, Result};
use stage::{Source, StageWriter, StagedFile};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// What a rewrite does when the destination does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
    /// Run against empty input and create the file
    Create,
    /// Do nothing and report no change
    Skip,
    /// Return [`Error::NotFound`]
    Fail,
}

/// Handle for reading and editing store files.
///
/// Cheap to clone; clones share the lock registry and detector.
#[derive(Clone)]
pub struct ConfigStore {
    locks: Arc<PathLockRegistry>,
    detector: Arc<dyn EncodingDetector>,
    config: StoreConfig,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("locks", &self.locks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Create a store with default settings and BOM-based codec detection.
    pub fn new(locks: Arc<PathLockRegistry>) -> Self {
        Self {
            locks,
            detector: Arc::new(BomDetector),
            config: StoreConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the codec detector used for existing files.
    pub fn with_detector(mut self, detector: Arc<dyn EncodingDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn locks(&self) -> &Arc<PathLockRegistry> {
        &self.locks
    }

    /// Run `body` over the file's lines under a shared lock.
    fn scan<T>(&self, path: &Path, body: impl FnOnce(&mut Source) -> Result<T>) -> Result<T> {
        let _guard = self.locks.acquire(path, LockMode::Shared)?;
        let mut source = if path.is_file() {
            let codec = codec::sniff(path, self.detector.as_ref())?;
            Source::open(path, codec)?
        } else {
            Source::empty()
        };
        body(&mut source)
    }

    /// Stream the file through `body` into a staged replacement.
    ///
    /// `body` returns whether its output should replace the file. The
    /// return value reports whether the file was replaced.
    fn rewrite(
        &self,
        path: &Path,
        missing: Missing,
        body: impl FnOnce(&mut Source, &mut StageWriter) -> Result<bool>,
    ) -> Result<bool> {
        let _guard = self.locks.acquire(path, LockMode::Exclusive)?;

        let exists = path.is_file();
        if !exists {
            match missing {
                Missing::Create => {}
                Missing::Skip => return Ok(false),
                Missing::Fail => {
                    return Err(Error::NotFound(format!("file {}", path.display())));
                }
            }
        }

        let codec = if exists {
            codec::sniff(path, self.detector.as_ref())?
        } else {
            self.config.new_file_codec
        };
        let mut source = Source::open(path, codec)?;
        let mut staged = StagedFile::create(path, codec, &self.config)?;

        if !body(&mut source, staged.writer())? {
            debug!(file = %path.display(), "no change, staged output discarded");
            return Ok(false);
        }
        drop(source);
        staged.commit(path, self.config.fsync)?;
        debug!(file = %path.display(), %codec, "file replaced");
        Ok(true)
    }
}
