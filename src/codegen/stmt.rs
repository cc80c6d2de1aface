//! Statement code generation.

use crate::ast::Stmt;
use crate::error::CompileError;

use super::expr::gen_expr;
use super::state::CodeGen;

pub(super) fn gen_stmt(cg: &mut CodeGen, stmt: &Stmt) -> Result<(), CompileError> {
    match stmt {
        Stmt::ExprStmt { expr, .. } => {
            gen_expr(cg, expr)?;
        }
        Stmt::Block { body, .. } => {
            for s in body {
                gen_stmt(cg, s)?;
            }
        }
        Stmt::Return { expr, .. } => {
            gen_expr(cg, expr)?;
            cg.emit(format!("  j {}", cg.return_label()));
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            let c = cg.next_label();
            gen_expr(cg, cond)?;
            cg.emit(format!("  beqz a0, .L.else.{c}"));
            gen_stmt(cg, then_branch)?;
            cg.emit(format!("  j .L.end.{c}"));
            cg.emit_label(format!(".L.else.{c}"));
            if let Some(branch) = else_branch {
                gen_stmt(cg, branch)?;
            }
            cg.emit_label(format!(".L.end.{c}"));
        }
        Stmt::For {
            init,
            cond,
            inc,
            body,
            ..
        } => {
            let c = cg.next_label();
            if let Some(init) = init {
                gen_stmt(cg, init)?;
            }
            cg.emit_label(format!(".L.begin.{c}"));
            if let Some(cond) = cond {
                gen_expr(cg, cond)?;
                cg.emit(format!("  beqz a0, .L.end.{c}"));
            }
            gen_stmt(cg, body)?;
            if let Some(inc) = inc {
                gen_expr(cg, inc)?;
            }
            cg.emit(format!("  j .L.begin.{c}"));
            cg.emit_label(format!(".L.end.{c}"));
        }
    }
    Ok(())
}
