//! Staged rewrites: a temp file next to the destination that replaces it
//! atomically on commit.

use crate::codec::{LineReader, LineWriter, TextCodec};
use crate::config::StoreConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

/// Output side of a rewrite.
pub(crate) type StageWriter = LineWriter<NamedTempFile>;

/// Temp file being filled with the new content of a destination.
///
/// Dropping it without [`StagedFile::commit`] deletes the temp file and
/// leaves the destination untouched.
pub(crate) struct StagedFile {
    writer: StageWriter,
}

impl StagedFile {
    pub fn create(dest: &Path, codec: TextCodec, config: &StoreConfig) -> io::Result<Self> {
        let dir = stage_dir(dest, config);
        let temp = tempfile::Builder::new()
            .prefix(".inistore-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        Ok(Self {
            writer: LineWriter::new(temp, codec, config.line_ending.as_str())?,
        })
    }

    pub fn writer(&mut self) -> &mut StageWriter {
        &mut self.writer
    }

    /// Flush, sync and move the temp file over `dest`.
    pub fn commit(self, dest: &Path, fsync: bool) -> io::Result<()> {
        let temp = self.writer.finish()?;
        if fsync {
            temp.as_file().sync_all()?;
        }
        if let Ok(meta) = fs::metadata(dest) {
            temp.as_file().set_permissions(meta.permissions())?;
        }

        match temp.persist(dest) {
            Ok(_) => Ok(()),
            Err(err) if err.error.kind() == io::ErrorKind::CrossesDevices => {
                warn!(
                    file = %dest.display(),
                    "temp dir is on another volume, replacing by copy (not atomic)"
                );
                fs::copy(err.file.path(), dest)?;
                Ok(())
            }
            Err(err) => Err(err.error),
        }
    }
}

fn stage_dir(dest: &Path, config: &StoreConfig) -> PathBuf {
    if let Some(dir) = &config.temp_dir {
        return dir.clone();
    }
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Input side of an operation. A missing file reads as empty.
pub(crate) struct Source {
    reader: Option<LineReader>,
}

impl Source {
    pub fn open(path: &Path, codec: TextCodec) -> io::Result<Self> {
        match LineReader::open(path, codec) {
            Ok(reader) => Ok(Self {
                reader: Some(reader),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::empty()),
            Err(e) => Err(e),
        }
    }

    pub fn empty() -> Self {
        Self { reader: None }
    }

    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        match &mut self.reader {
            Some(reader) => reader.read_line(),
            None => Ok(None),
        }
    }
}
