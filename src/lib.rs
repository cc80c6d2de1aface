//! `rvcc`: an ahead-of-time compiler for a small C-like dialect, emitting
//! RV64I assembly text.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod source;
pub mod token;
pub mod types;

use tracing::debug_span;

pub use error::CompileError;
pub use source::SourceBuffer;

/// Compiler knobs. There is no optimization-level or external-builtin axis
/// here — the dialect this compiles has neither.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub filename: String,
    /// Annotate `.byte` directives in `.data` with the printable character
    /// they encode.
    pub emit_byte_comments: bool,
}

impl CompilerOptions {
    pub fn new(filename: impl Into<String>) -> Self {
        CompilerOptions {
            filename: filename.into(),
            emit_byte_comments: true,
        }
    }

    pub fn with_emit_byte_comments(mut self, enabled: bool) -> Self {
        self.emit_byte_comments = enabled;
        self
    }
}

/// Run the full pipeline — tokenize, parse, generate — over already-loaded
/// source text.
pub fn compile_source(source: &str, options: &CompilerOptions) -> Result<String, CompileError> {
    let buf = SourceBuffer::from_str(&options.filename, source);
    compile_buffer(&buf, options.emit_byte_comments)
}

/// Load `path` (or stdin for `-`) and run the pipeline over it.
pub fn compile_file(path: &str) -> Result<String, CompileError> {
    let buf = SourceBuffer::load(path)?;
    compile_buffer(&buf, true)
}

fn compile_buffer(buf: &SourceBuffer, emit_byte_comments: bool) -> Result<String, CompileError> {
    let tokens = {
        let _span = debug_span!("tokenize", file = %buf.filename).entered();
        token::tokenize(buf)?
    };

    let program = {
        let _span = debug_span!("parse", file = %buf.filename).entered();
        parser::Parser::new(buf, tokens).parse()?
    };

    let _span = debug_span!("codegen", file = %buf.filename).entered();
    codegen::codegen(&program, emit_byte_comments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_program_end_to_end() {
        let options = CompilerOptions::new("t.c");
        let asm = compile_source("int main(){ return 1+2*3; }", &options).unwrap();
        assert!(asm.contains("main:"));
        assert!(asm.contains("ret"));
    }

    #[test]
    fn surfaces_a_located_diagnostic_on_failure() {
        let options = CompilerOptions::new("t.c");
        let err = compile_source("int main(){ return &1; }", &options).unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn emit_byte_comments_gates_the_data_section_annotation() {
        let src = r#"int main(){ char *s; s = "hi"; return 0; }"#;

        let with_comments = CompilerOptions::new("t.c");
        let asm = compile_source(src, &with_comments).unwrap();
        assert!(asm.contains("# 'h'"));

        let without_comments = CompilerOptions::new("t.c").with_emit_byte_comments(false);
        let asm = compile_source(src, &without_comments).unwrap();
        assert!(!asm.contains("# 'h'"));
    }
}
