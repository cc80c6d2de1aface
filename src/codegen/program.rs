//! Frame-offset assignment and the top-level `.data`/`.text` emission
//! pipeline.

use tracing::debug;

use crate::ast::{ObjRef, ObjectKind, Program, Stmt};
use crate::error::CompileError;

use super::state::CodeGen;
use super::stmt::gen_stmt;

const ARG_REGS: [&str; 6] = ["a0", "a1", "a2", "a3", "a4", "a5"];

pub fn codegen(program: &Program, emit_byte_comments: bool) -> Result<String, CompileError> {
    assign_frame_offsets(program);

    let mut cg = CodeGen::new();
    emit_data_section(&mut cg, program, emit_byte_comments);
    emit_text_section(&mut cg, program)?;
    Ok(cg.into_output())
}

/// Walks each function's local list in source order, assigning frame
/// offsets by subtracting each local's size cumulatively — the first local
/// introduced ends up closest to `fp`. `stack_size` is rounded up to 16.
fn assign_frame_offsets(program: &Program) {
    for obj in &program.globals {
        let mut obj_mut = obj.borrow_mut();
        let ObjectKind::Function {
            locals,
            stack_size,
            ..
        } = &mut obj_mut.kind
        else {
            continue;
        };

        let mut offset: i64 = 0;
        for local in locals.iter() {
            let size = local.borrow().ty.size() as i64;
            offset -= size;
            if let ObjectKind::Local { offset: slot } = &mut local.borrow_mut().kind {
                *slot = offset;
            }
        }
        *stack_size = align_to((-offset) as usize, 16);
        debug!(func = %obj_mut.name, stack_size = *stack_size, "frame offsets assigned");
    }
}

fn align_to(n: usize, align: usize) -> usize {
    (n + align - 1) / align * align
}

fn emit_data_section(cg: &mut CodeGen, program: &Program, emit_byte_comments: bool) {
    cg.emit("  .data");
    for obj in &program.globals {
        let obj = obj.borrow();
        let init_data = match &obj.kind {
            ObjectKind::GlobalVar { init_data } => init_data,
            ObjectKind::Function { .. } => continue,
        };
        match init_data {
            Some(bytes) => {
                cg.emit_label(&obj.name);
                for b in bytes {
                    if emit_byte_comments && (b.is_ascii_graphic() || *b == b' ') {
                        cg.emit(format!("  .byte {b}  # '{}'", *b as char));
                    } else {
                        cg.emit(format!("  .byte {b}"));
                    }
                }
            }
            None => {
                cg.emit(format!("  .globl {}", obj.name));
                cg.emit_label(&obj.name);
                cg.emit(format!("  .zero {}", obj.ty.size()));
            }
        }
    }
}

fn emit_text_section(cg: &mut CodeGen, program: &Program) -> Result<(), CompileError> {
    cg.emit("  .text");
    for obj in &program.globals {
        if matches!(obj.borrow().kind, ObjectKind::Function { .. }) {
            emit_function(cg, obj)?;
        }
    }
    Ok(())
}

fn emit_function(cg: &mut CodeGen, obj: &ObjRef) -> Result<(), CompileError> {
    let obj_ref = obj.borrow();
    let name = obj_ref.name.clone();
    let ObjectKind::Function {
        params,
        body,
        stack_size,
        ..
    } = &obj_ref.kind
    else {
        unreachable!("emit_function called on a non-function object");
    };

    if params.len() > ARG_REGS.len() {
        return Err(CompileError::Internal(format!(
            "function '{name}' has {} parameters, more than the 6 supported",
            params.len()
        )));
    }

    cg.set_return_label(&name);
    cg.emit(format!("  .globl {name}"));
    cg.emit_label(&name);
    cg.emit("  addi sp, sp, -16");
    cg.emit("  sd ra, 8(sp)");
    cg.emit("  sd fp, 0(sp)");
    cg.emit("  mv fp, sp");
    cg.emit(format!("  addi sp, sp, -{stack_size}"));

    for (i, param) in params.iter().enumerate() {
        let param = param.borrow();
        let offset = match param.kind {
            ObjectKind::Local { offset } => offset,
            _ => {
                return Err(CompileError::Internal(
                    "function parameter is not a local object".to_string(),
                ));
            }
        };
        if param.ty.size() == 1 {
            cg.emit(format!("  sb {}, {}(fp)", ARG_REGS[i], offset));
        } else {
            cg.emit(format!("  sd {}, {}(fp)", ARG_REGS[i], offset));
        }
    }

    let top_level = match body {
        Stmt::Block { body, .. } => body.as_slice(),
        other => std::slice::from_ref(other),
    };
    for stmt in top_level {
        gen_stmt(cg, stmt)?;
        cg.assert_balanced()?;
    }

    let return_label = cg.return_label().to_string();
    cg.emit_label(return_label);
    cg.emit("  mv sp, fp");
    cg.emit("  ld fp, 0(sp)");
    cg.emit("  ld ra, 8(sp)");
    cg.emit("  addi sp, sp, 16");
    cg.emit("  ret");
    Ok(())
}
