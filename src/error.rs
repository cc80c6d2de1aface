//! Compiler diagnostics.
//!
//! Every error that reaches the user carries a location: the filename, the
//! 1-based source line, the line's text, and a caret under the offending
//! column. This is the same shape for every stage (tokenizer, parser,
//! codegen) — only the message and the taxonomy tag differ.

use crate::source::SourceBuffer;
use std::fmt;

/// A located diagnostic: everything needed to print `file:line`, the source
/// line, and a caret.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub filename: String,
    pub line: usize,
    pub column: usize,
    pub source_line: String,
    pub message: String,
}

impl Diagnostic {
    pub fn at(buf: &SourceBuffer, pos: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            filename: buf.filename.clone(),
            line: buf.line_at(pos),
            column: buf.column_at(pos),
            source_line: buf.line_text(pos),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:{}: {}", self.filename, self.line, self.message)?;
        writeln!(f, "{}", self.source_line)?;
        write!(f, "{}^", " ".repeat(self.column))
    }
}

/// The error taxonomy this compiler reports. `Io` and `Internal` don't
/// always have a source location to point at; the other three always do.
#[derive(Debug, Clone)]
pub enum CompileError {
    Io(String),
    Lexical(Diagnostic),
    Syntax(Diagnostic),
    Semantic(Diagnostic),
    Internal(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Io(msg) => write!(f, "I/O error: {msg}"),
            CompileError::Lexical(d) => write!(f, "{d}"),
            CompileError::Syntax(d) => write!(f, "{d}"),
            CompileError::Semantic(d) => write!(f, "{d}"),
            CompileError::Internal(msg) => write!(f, "internal compiler error: {msg}"),
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_renders_caret_under_column() {
        let buf = SourceBuffer::from_str("t.c", "int main(){ return &1; }\n");
        let pos = buf.bytes.iter().position(|&b| b == b'&').unwrap();
        let diag = Diagnostic::at(&buf, pos, "not an lvalue");
        let rendered = diag.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("t.c:1:"));
        assert_eq!(lines[2].len(), pos + 1);
        assert!(lines[2].ends_with('^'));
    }

    #[test]
    fn compile_error_display_matches_variant() {
        let err = CompileError::Io("cannot open 'x.c'".to_string());
        assert_eq!(err.to_string(), "I/O error: cannot open 'x.c'");

        let err = CompileError::Internal("unreachable node kind".to_string());
        assert_eq!(
            err.to_string(),
            "internal compiler error: unreachable node kind"
        );
    }
}
