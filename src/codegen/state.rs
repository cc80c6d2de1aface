//! Code generator state: the output buffer, the evaluation-stack depth
//! counter, and the label/return-label bookkeeping shared by `expr.rs`,
//! `stmt.rs`, and `program.rs`.

use std::fmt::Write as _;

use tracing::trace;

use crate::error::CompileError;

pub struct CodeGen {
    out: String,
    /// Incremented on push, decremented on pop; must be zero at the end of
    /// every top-level statement, or a value got pushed and never popped.
    depth: i64,
    label_counter: usize,
    return_label: String,
}

impl CodeGen {
    pub fn new() -> Self {
        CodeGen {
            out: String::new(),
            depth: 0,
            label_counter: 0,
            return_label: String::new(),
        }
    }

    pub fn into_output(self) -> String {
        self.out
    }

    pub(super) fn emit(&mut self, line: impl AsRef<str>) {
        writeln!(self.out, "{}", line.as_ref()).expect("writing to an in-memory String");
    }

    pub(super) fn emit_label(&mut self, label: impl AsRef<str>) {
        writeln!(self.out, "{}:", label.as_ref()).expect("writing to an in-memory String");
    }

    pub(super) fn push(&mut self) {
        self.emit("  addi sp, sp, -8");
        self.emit("  sd a0, 0(sp)");
        self.depth += 1;
    }

    pub(super) fn pop(&mut self, reg: &str) {
        self.emit(format!("  ld {reg}, 0(sp)"));
        self.emit("  addi sp, sp, 8");
        self.depth -= 1;
    }

    /// Asserts the evaluation stack is balanced — called after every
    /// top-level statement in a function body, never after nested ones.
    pub(super) fn assert_balanced(&self) -> Result<(), CompileError> {
        if self.depth != 0 {
            return Err(CompileError::Internal(format!(
                "push/pop imbalance: depth {} at end of statement",
                self.depth
            )));
        }
        Ok(())
    }

    pub(super) fn next_label(&mut self) -> usize {
        let id = self.label_counter;
        self.label_counter += 1;
        trace!(label = id, "allocated control-flow label");
        id
    }

    pub(super) fn set_return_label(&mut self, funcname: &str) {
        self.return_label = format!(".L.return.{funcname}");
    }

    pub(super) fn return_label(&self) -> &str {
        &self.return_label
    }
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}
