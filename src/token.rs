//! Tokenizer: source bytes -> linear token stream.
//!
//! Scans left to right; at each non-whitespace, non-comment position
//! produces one token and advances, tracking line numbers as a running
//! counter rather than in a separate pass. Once the stream is built,
//! identifiers matching the keyword set are retagged `Keyword`.

use crate::error::CompileError;
use crate::source::SourceBuffer;

pub const KEYWORDS: &[&str] = &[
    "return", "if", "else", "for", "while", "sizeof", "int", "char",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Punct,
    Keyword,
    /// Decoded byte string (escapes already resolved), NUL-terminated by
    /// the caller when building the `char[]` initializer.
    Str(Vec<u8>),
    Num(i64),
    Eof,
}

/// A single token: its kind, the raw lexeme, and where it started.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub pos: usize,
}

impl Token {
    pub fn is(&self, s: &str) -> bool {
        self.text == s
    }
}

struct Lexer<'a> {
    buf: &'a SourceBuffer,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn byte(&self, offset: usize) -> u8 {
        *self.buf.bytes.get(self.pos + offset).unwrap_or(&0)
    }

    fn cur(&self) -> u8 {
        self.byte(0)
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if self.cur() == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.eof_pos()
    }

    fn err(&self, at: usize, msg: impl Into<String>) -> CompileError {
        CompileError::Lexical(crate::error::Diagnostic::at(self.buf, at, msg))
    }
}

pub fn tokenize(buf: &SourceBuffer) -> Result<Vec<Token>, CompileError> {
    let mut lx = Lexer {
        buf,
        pos: 0,
        line: 1,
    };
    let mut tokens = Vec::new();

    while !lx.at_end() {
        let c = lx.cur();

        // Line comment.
        if c == b'/' && lx.byte(1) == b'/' {
            while !lx.at_end() && lx.cur() != b'\n' {
                lx.advance(1);
            }
            continue;
        }

        // Block comment.
        if c == b'/' && lx.byte(1) == b'*' {
            let start = lx.pos;
            lx.advance(2);
            loop {
                if lx.at_end() {
                    return Err(lx.err(start, "unterminated block comment"));
                }
                if lx.cur() == b'*' && lx.byte(1) == b'/' {
                    lx.advance(2);
                    break;
                }
                lx.advance(1);
            }
            continue;
        }

        // Whitespace.
        if c.is_ascii_whitespace() {
            lx.advance(1);
            continue;
        }

        // Number.
        if c.is_ascii_digit() {
            let start = lx.pos;
            let line = lx.line;
            let mut val: i64 = 0;
            while lx.cur().is_ascii_digit() {
                val = val * 10 + (lx.cur() - b'0') as i64;
                lx.advance(1);
            }
            let text = String::from_utf8_lossy(&buf.bytes[start..lx.pos]).into_owned();
            tokens.push(Token {
                kind: TokenKind::Num(val),
                text,
                line,
                pos: start,
            });
            continue;
        }

        // String literal.
        if c == b'"' {
            let start = lx.pos;
            let line = lx.line;
            let decoded = read_string_literal(&mut lx)?;
            let text = String::from_utf8_lossy(&buf.bytes[start..lx.pos]).into_owned();
            tokens.push(Token {
                kind: TokenKind::Str(decoded),
                text,
                line,
                pos: start,
            });
            continue;
        }

        // Identifier.
        if c.is_ascii_alphabetic() || c == b'_' {
            let start = lx.pos;
            let line = lx.line;
            while lx.cur().is_ascii_alphanumeric() || lx.cur() == b'_' {
                lx.advance(1);
            }
            let text = String::from_utf8_lossy(&buf.bytes[start..lx.pos]).into_owned();
            tokens.push(Token {
                kind: TokenKind::Ident,
                text,
                line,
                pos: start,
            });
            continue;
        }

        // Punctuator: two-char operators take priority.
        let two_char = matches!(
            (lx.cur(), lx.byte(1)),
            (b'=', b'=') | (b'!', b'=') | (b'<', b'=') | (b'>', b'=')
        );
        let punct_len = if two_char {
            2
        } else if c.is_ascii_punctuation() {
            1
        } else {
            0
        };

        if punct_len > 0 {
            let start = lx.pos;
            let line = lx.line;
            lx.advance(punct_len);
            let text = String::from_utf8_lossy(&buf.bytes[start..lx.pos]).into_owned();
            tokens.push(Token {
                kind: TokenKind::Punct,
                text,
                line,
                pos: start,
            });
            continue;
        }

        return Err(lx.err(lx.pos, "invalid token"));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line: lx.line,
        pos: lx.pos,
    });

    retag_keywords(&mut tokens);
    Ok(tokens)
}

fn retag_keywords(tokens: &mut [Token]) {
    for t in tokens.iter_mut() {
        if t.kind == TokenKind::Ident && KEYWORDS.contains(&t.text.as_str()) {
            t.kind = TokenKind::Keyword;
        }
    }
}

/// Decode a `"..."` literal starting at the opening quote. Advances the
/// lexer past the closing quote. An unescaped newline or NUL before the
/// close is fatal.
fn read_string_literal(lx: &mut Lexer) -> Result<Vec<u8>, CompileError> {
    let open = lx.pos;
    lx.advance(1); // opening quote
    let mut out = Vec::new();

    loop {
        let c = lx.cur();
        if c == b'"' {
            lx.advance(1);
            break;
        }
        if c == 0 || c == b'\n' {
            return Err(lx.err(open, "unclosed string literal"));
        }
        if c == b'\\' {
            lx.advance(1);
            out.push(read_escape(lx)?);
            continue;
        }
        out.push(c);
        lx.advance(1);
    }

    Ok(out)
}

fn read_escape(lx: &mut Lexer) -> Result<u8, CompileError> {
    let c = lx.cur();
    let byte = match c {
        b'a' => {
            lx.advance(1);
            0x07
        }
        b'b' => {
            lx.advance(1);
            0x08
        }
        b't' => {
            lx.advance(1);
            0x09
        }
        b'n' => {
            lx.advance(1);
            0x0A
        }
        b'v' => {
            lx.advance(1);
            0x0B
        }
        b'f' => {
            lx.advance(1);
            0x0C
        }
        b'r' => {
            lx.advance(1);
            0x0D
        }
        b'e' => {
            lx.advance(1);
            27
        }
        b'0'..=b'7' => {
            let mut val: u32 = 0;
            let mut n = 0;
            while n < 3 && (b'0'..=b'7').contains(&lx.cur()) {
                val = val * 8 + (lx.cur() - b'0') as u32;
                lx.advance(1);
                n += 1;
            }
            (val & 0xFF) as u8
        }
        b'x' => {
            lx.advance(1);
            if !lx.cur().is_ascii_hexdigit() {
                return Err(lx.err(lx.pos, "invalid hex escape sequence"));
            }
            let mut val: u32 = 0;
            while lx.cur().is_ascii_hexdigit() {
                val = val * 16 + hex_digit(lx.cur());
                lx.advance(1);
            }
            (val & 0xFF) as u8
        }
        other => {
            lx.advance(1);
            other
        }
    };
    Ok(byte)
}

fn hex_digit(b: u8) -> u32 {
    match b {
        b'0'..=b'9' => (b - b'0') as u32,
        b'a'..=b'f' => (b - b'a' + 10) as u32,
        b'A'..=b'F' => (b - b'A' + 10) as u32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let buf = SourceBuffer::from_str("t.c", src);
        tokenize(&buf).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_are_retagged() {
        let buf = SourceBuffer::from_str("t.c", "int return x");
        let tokens = tokenize(&buf).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Keyword);
        assert_eq!(tokens[2].kind, TokenKind::Ident);
    }

    #[test]
    fn two_char_operators_take_priority() {
        let buf = SourceBuffer::from_str("t.c", "a <= b");
        let tokens = tokenize(&buf).unwrap();
        assert_eq!(tokens[1].text, "<=");
    }

    #[test]
    fn string_escapes_decode_correctly() {
        let buf = SourceBuffer::from_str("t.c", r#""a\nb\x41\101""#);
        let tokens = tokenize(&buf).unwrap();
        match &tokens[0].kind {
            TokenKind::Str(bytes) => assert_eq!(bytes, &vec![b'a', b'\n', b'b', 0x41, 0o101]),
            other => panic!("expected Str, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_string_is_fatal() {
        let buf = SourceBuffer::from_str("t.c", r#"return "abc;"#);
        let err = tokenize(&buf).unwrap_err();
        assert!(matches!(err, CompileError::Lexical(_)));
    }

    #[test]
    fn unterminated_block_comment_is_fatal() {
        let buf = SourceBuffer::from_str("t.c", "int x; /* never closed");
        let err = tokenize(&buf).unwrap_err();
        assert!(matches!(err, CompileError::Lexical(_)));
    }

    #[test]
    fn eof_token_located_at_nul_sentinel() {
        let buf = SourceBuffer::from_str("t.c", "int x;\nint y;\n");
        let tokens = tokenize(&buf).unwrap();
        let eof = tokens.last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.pos, buf.eof_pos());
        assert_eq!(eof.line, 1 + buf.bytes.iter().filter(|&&b| b == b'\n').count());
    }

    #[test]
    fn line_comments_skip_through_newline() {
        let k = kinds("int x; // trailing comment\nint y;");
        assert_eq!(k.len(), 7); // int x ; int y ; eof
    }
}
