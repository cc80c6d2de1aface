//! Expression code generation: every node leaves its value in `a0`.

use std::rc::Rc;

use crate::ast::{BinOp, Expr, ObjectKind};
use crate::error::CompileError;
use crate::types::Type;

use super::state::CodeGen;

/// Evaluate `expr` into `a0`.
pub(super) fn gen_expr(cg: &mut CodeGen, expr: &Expr) -> Result<(), CompileError> {
    match expr {
        Expr::Num { val, .. } => {
            cg.emit(format!("  li a0, {val}"));
        }
        Expr::Var { .. } => {
            gen_addr(cg, expr)?;
            if !is_array(expr) {
                load(cg, expr.ty());
            }
        }
        Expr::Neg { expr: child, .. } => {
            gen_expr(cg, child)?;
            cg.emit("  neg a0, a0");
        }
        Expr::Addr { expr: child, .. } => {
            gen_addr(cg, child)?;
        }
        Expr::Deref { expr: child, .. } => {
            gen_expr(cg, child)?;
            if !is_array(expr) {
                load(cg, expr.ty());
            }
        }
        Expr::Assign { lhs, rhs, .. } => {
            gen_addr(cg, lhs)?;
            cg.push();
            gen_expr(cg, rhs)?;
            cg.pop("a1");
            store(cg, lhs.ty());
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            gen_expr(cg, rhs)?;
            cg.push();
            gen_expr(cg, lhs)?;
            cg.pop("a1");
            emit_binop(cg, *op);
        }
        Expr::FnCall { name, args, .. } => {
            gen_call(cg, name, args)?;
        }
        Expr::StmtExpr { body, .. } => {
            for stmt in body {
                super::stmt::gen_stmt(cg, stmt)?;
            }
        }
    }
    Ok(())
}

/// Compute an lvalue's address into `a0`. Only `VAR` and `DEREF` qualify —
/// the parser already rejects every other kind as `&`/`=`'s operand, so
/// reaching anything else here is an internal error.
pub(super) fn gen_addr(cg: &mut CodeGen, expr: &Expr) -> Result<(), CompileError> {
    match expr {
        Expr::Var { obj, .. } => {
            let obj = obj.borrow();
            match &obj.kind {
                ObjectKind::Local { offset } => cg.emit(format!("  addi a0, fp, {offset}")),
                ObjectKind::GlobalVar { .. } => cg.emit(format!("  la a0, {}", obj.name)),
                ObjectKind::Function { .. } => {
                    return Err(CompileError::Internal(
                        "function object used as an lvalue".to_string(),
                    ));
                }
            }
            Ok(())
        }
        Expr::Deref { expr: child, .. } => gen_expr(cg, child),
        _ => Err(CompileError::Internal(
            "non-lvalue expression reached gen_addr".to_string(),
        )),
    }
}

fn gen_call(cg: &mut CodeGen, name: &str, args: &[Expr]) -> Result<(), CompileError> {
    const ARG_REGS: [&str; 6] = ["a0", "a1", "a2", "a3", "a4", "a5"];
    if args.len() > ARG_REGS.len() {
        return Err(CompileError::Internal(format!(
            "call to '{name}' has {} arguments, more than the 6 supported",
            args.len()
        )));
    }

    for arg in args {
        gen_expr(cg, arg)?;
        cg.push();
    }
    for i in (0..args.len()).rev() {
        cg.pop(ARG_REGS[i]);
    }
    cg.emit(format!("  call {name}"));
    Ok(())
}

fn load(cg: &mut CodeGen, ty: Option<&Rc<Type>>) {
    if size_of(ty) == 1 {
        cg.emit("  lb a0, 0(a0)");
    } else {
        cg.emit("  ld a0, 0(a0)");
    }
}

fn store(cg: &mut CodeGen, ty: Option<&Rc<Type>>) {
    if size_of(ty) == 1 {
        cg.emit("  sb a0, 0(a1)");
    } else {
        cg.emit("  sd a0, 0(a1)");
    }
}

fn size_of(ty: Option<&Rc<Type>>) -> usize {
    ty.map(|t| t.size()).unwrap_or(8)
}

fn is_array(expr: &Expr) -> bool {
    matches!(expr.ty().map(|t| t.as_ref()), Some(Type::Array { .. }))
}

fn emit_binop(cg: &mut CodeGen, op: BinOp) {
    match op {
        BinOp::Add => cg.emit("  add a0, a0, a1"),
        BinOp::Sub => cg.emit("  sub a0, a0, a1"),
        BinOp::Mul => cg.emit("  mul a0, a0, a1"),
        BinOp::Div => cg.emit("  div a0, a0, a1"),
        BinOp::Eq => {
            cg.emit("  xor a0, a0, a1");
            cg.emit("  seqz a0, a0");
        }
        BinOp::Ne => {
            cg.emit("  xor a0, a0, a1");
            cg.emit("  snez a0, a0");
        }
        BinOp::Lt => cg.emit("  slt a0, a0, a1"),
        BinOp::Le => {
            cg.emit("  slt a0, a1, a0");
            cg.emit("  xori a0, a0, 1");
        }
    }
}
