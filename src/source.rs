//! Source buffer loading.
//!
//! Reads the whole input (a path, or `-` for stdin) into one contiguous
//! byte buffer, appends a trailing newline if the file doesn't already end
//! in one, then a NUL sentinel. Every token position and every diagnostic
//! is an offset into this buffer, and the buffer outlives tokenization.

use std::io::{self, Read};
use std::path::Path;

use crate::error::CompileError;

/// The loaded source text plus the display name used in diagnostics.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SourceBuffer {
    /// Load from a path, or from stdin when `path` is `"-"`.
    pub fn load(path: &str) -> Result<Self, CompileError> {
        let (filename, mut raw) = if path == "-" {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|e| CompileError::Io(format!("failed to read stdin: {e}")))?;
            ("<stdin>".to_string(), buf)
        } else {
            let bytes = std::fs::read(Path::new(path))
                .map_err(|e| CompileError::Io(format!("cannot open '{path}': {e}")))?;
            (path.to_string(), bytes)
        };

        if raw.last() != Some(&b'\n') {
            raw.push(b'\n');
        }
        raw.push(0);

        Ok(SourceBuffer {
            filename,
            bytes: raw,
        })
    }

    /// Build a buffer directly from in-memory source text (used by tests and
    /// by library callers that already have the source string).
    pub fn from_str(filename: &str, source: &str) -> Self {
        let mut raw = source.as_bytes().to_vec();
        if raw.last() != Some(&b'\n') {
            raw.push(b'\n');
        }
        raw.push(0);
        SourceBuffer {
            filename: filename.to_string(),
            bytes: raw,
        }
    }

    /// Byte offset one past the last real character: the position of the
    /// NUL sentinel appended by `load`/`from_str`.
    pub fn eof_pos(&self) -> usize {
        self.bytes.len() - 1
    }

    /// 1-based line number containing byte offset `pos`.
    pub fn line_at(&self, pos: usize) -> usize {
        1 + self.bytes[..pos.min(self.bytes.len())]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
    }

    /// 0-based column of `pos` within its line.
    pub fn column_at(&self, pos: usize) -> usize {
        let line_start = self.bytes[..pos]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        pos - line_start
    }

    /// The text of the line containing byte offset `pos`, without its
    /// trailing newline.
    pub fn line_text(&self, pos: usize) -> String {
        let line_start = self.bytes[..pos]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let line_end = self.bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[line_start..line_end]).into_owned()
    }
}
