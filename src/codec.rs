//! Text codecs used to read and rewrite store files.
//!
//! Deciding which codec a file uses is delegated to an [`EncodingDetector`]
//! that only sees the file's leading bytes. The store then streams the file
//! line by line with [`LineReader`] and writes the replacement with
//! [`LineWriter`] in the same codec, BOM included.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Number of leading bytes handed to an [`EncodingDetector`].
pub const DETECT_WINDOW: usize = 4;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Encoding of a store file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextCodec {
    /// UTF-8 without byte order mark
    #[default]
    Utf8,
    /// UTF-8 with byte order mark
    Utf8Bom,
    /// UTF-16 little endian with byte order mark
    Utf16le,
    /// UTF-16 big endian with byte order mark
    Utf16be,
}

impl TextCodec {
    /// Byte order mark written at the start of a file in this codec.
    pub fn bom(&self) -> &'static [u8] {
        match self {
            TextCodec::Utf8 => &[],
            TextCodec::Utf8Bom => UTF8_BOM,
            TextCodec::Utf16le => UTF16LE_BOM,
            TextCodec::Utf16be => UTF16BE_BOM,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextCodec::Utf8 => "utf8",
            TextCodec::Utf8Bom => "utf8-bom",
            TextCodec::Utf16le => "utf16le",
            TextCodec::Utf16be => "utf16be",
        }
    }

    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Some(TextCodec::Utf8),
            "utf8-bom" | "utf-8-bom" => Some(TextCodec::Utf8Bom),
            "utf16le" | "utf-16le" | "utf16" => Some(TextCodec::Utf16le),
            "utf16be" | "utf-16be" => Some(TextCodec::Utf16be),
            _ => None,
        }
    }

    fn is_utf16(&self) -> bool {
        matches!(self, TextCodec::Utf16le | TextCodec::Utf16be)
    }
}

impl std::fmt::Display for TextCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Chooses a codec from a file's first [`DETECT_WINDOW`] bytes.
pub trait EncodingDetector: Send + Sync {
    fn detect(&self, head: &[u8]) -> TextCodec;
}

/// Detector that only looks at byte order marks; anything else is UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct BomDetector;

impl EncodingDetector for BomDetector {
    fn detect(&self, head: &[u8]) -> TextCodec {
        if head.starts_with(UTF8_BOM) {
            TextCodec::Utf8Bom
        } else if head.starts_with(UTF16LE_BOM) {
            TextCodec::Utf16le
        } else if head.starts_with(UTF16BE_BOM) {
            TextCodec::Utf16be
        } else {
            TextCodec::Utf8
        }
    }
}

/// Read the leading bytes of `path` and ask `detector` for its codec.
pub fn sniff(path: &Path, detector: &dyn EncodingDetector) -> io::Result<TextCodec> {
    let mut head = Vec::with_capacity(DETECT_WINDOW);
    File::open(path)?
        .take(DETECT_WINDOW as u64)
        .read_to_end(&mut head)?;
    Ok(detector.detect(&head))
}

/// Streaming line reader over a file in a known codec.
///
/// Lines are split on `\n`; a trailing `\r` is removed. A leading BOM is
/// skipped.
pub struct LineReader {
    reader: BufReader<File>,
    codec: TextCodec,
    first: bool,
}

impl LineReader {
    pub fn open(path: &Path, codec: TextCodec) -> io::Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            codec,
            first: true,
        })
    }

    /// Next line without its terminator, or `None` at end of file.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let line = if self.codec.is_utf16() {
            self.read_utf16_line()?
        } else {
            self.read_utf8_line()?
        };
        let Some(mut line) = line else {
            return Ok(None);
        };
        if self.first {
            self.first = false;
            if line.starts_with('\u{FEFF}') {
                line.remove(0);
            }
        }
        if line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn read_utf8_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn read_utf16_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let mut saw_any = false;
        while let Some(unit) = self.read_unit()? {
            saw_any = true;
            if unit == u16::from(b'\n') {
                return Ok(Some(line));
            }
            let ch = if (0xD800..0xDC00).contains(&unit) {
                let low = self.read_unit()?.ok_or_else(|| invalid_utf16(unit))?;
                char::decode_utf16([unit, low])
                    .next()
                    .and_then(|decoded| decoded.ok())
                    .ok_or_else(|| invalid_utf16(low))?
            } else {
                char::from_u32(u32::from(unit)).ok_or_else(|| invalid_utf16(unit))?
            };
            line.push(ch);
        }
        Ok(saw_any.then_some(line))
    }

    fn read_unit(&mut self) -> io::Result<Option<u16>> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let mut bytes = [0u8; 2];
        self.reader.read_exact(&mut bytes)?;
        Ok(Some(match self.codec {
            TextCodec::Utf16be => u16::from_be_bytes(bytes),
            _ => u16::from_le_bytes(bytes),
        }))
    }
}

impl Iterator for LineReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}

fn invalid_utf16(unit: u16) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("invalid UTF-16 code unit 0x{:04X}", unit),
    )
}

/// Buffered line writer producing a given codec and line terminator.
///
/// Remembers whether anything was written and whether the last line was
/// blank, which the store uses to place section separators.
pub struct LineWriter<W: Write> {
    inner: BufWriter<W>,
    codec: TextCodec,
    newline: &'static str,
    last_blank: Option<bool>,
}

impl<W: Write> LineWriter<W> {
    /// Wrap `inner`, writing the codec's BOM immediately.
    pub fn new(inner: W, codec: TextCodec, newline: &'static str) -> io::Result<Self> {
        let mut inner = BufWriter::new(inner);
        inner.write_all(codec.bom())?;
        Ok(Self {
            inner,
            codec,
            newline,
            last_blank: None,
        })
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_str(line)?;
        self.write_str(self.newline)?;
        self.last_blank = Some(line.trim().is_empty());
        Ok(())
    }

    /// Write a blank line unless the output is empty or already ends with one.
    pub fn separate(&mut self) -> io::Result<()> {
        if self.last_blank == Some(false) {
            self.write_line("")?;
        }
        Ok(())
    }

    /// True until the first line is written.
    pub fn is_empty(&self) -> bool {
        self.last_blank.is_none()
    }

    /// Flush buffered output and hand back the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error())
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        match self.codec {
            TextCodec::Utf8 | TextCodec::Utf8Bom => self.inner.write_all(s.as_bytes()),
            TextCodec::Utf16le => {
                for unit in s.encode_utf16() {
                    self.inner.write_all(&unit.to_le_bytes())?;
                }
                Ok(())
            }
            TextCodec::Utf16be => {
                for unit in s.encode_utf16() {
                    self.inner.write_all(&unit.to_be_bytes())?;
                }
                Ok(())
            }
        }
    }
}
