//! Recursive-descent parser and semantic elaborator.
//!
//! Consumes the token stream produced by [`crate::token::tokenize`],
//! maintains the scope stack and the current function's local-object list,
//! and produces a [`Program`] of typed top-level objects.

use std::rc::Rc;

use tracing::trace;

use crate::ast::{BinOp, Expr, Object, ObjRef, Program, Scopes, Stmt};
use crate::error::{CompileError, Diagnostic};
use crate::source::SourceBuffer;
use crate::token::{Token, TokenKind};
use crate::types::Type;

pub struct Parser<'a> {
    buf: &'a SourceBuffer,
    tokens: Vec<Token>,
    pos: usize,
    scopes: Scopes,
    /// The current function's locals (params first, then body locals), in
    /// declaration order. Reset at the start of each function.
    locals: Vec<ObjRef>,
    anon_counter: usize,
    /// Anonymous globals backing string literals, in encounter order —
    /// appended to the program's global list once parsing finishes, since
    /// a literal can surface deep inside a function body.
    string_literals: Vec<ObjRef>,
}

/// The result of parsing a declarator: the declared name, its type, and —
/// only when that type is `Func` — the parameter names in the same order
/// as the type's parameter list (so a function definition can build its
/// parameter objects without re-parsing).
struct Declared {
    name: String,
    ty: Rc<Type>,
    param_names: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(buf: &'a SourceBuffer, tokens: Vec<Token>) -> Self {
        Parser {
            buf,
            tokens,
            pos: 0,
            scopes: Scopes::new(),
            locals: Vec::new(),
            anon_counter: 0,
            string_literals: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Program, CompileError> {
        let mut program = Program::new();
        while !self.at_eof() {
            let base = self.declspec()?;
            let decl = self.declarator(base.clone())?;
            if matches!(*decl.ty, Type::Func { .. }) {
                let func = self.parse_function(decl)?;
                program.globals.push(func);
            } else {
                self.parse_global_var_rest(base, decl, &mut program)?;
            }
        }
        program.globals.extend(self.string_literals);
        Ok(program)
    }

    // ---- token cursor helpers -----------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn at_eof(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn check(&self, s: &str) -> bool {
        self.cur().is(s)
    }

    fn check_keyword(&self, s: &str) -> bool {
        self.cur().kind == TokenKind::Keyword && self.cur().is(s)
    }

    fn consume(&mut self, s: &str) -> bool {
        if self.check(s) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, s: &str) -> bool {
        if self.check_keyword(s) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) -> Result<(), CompileError> {
        if self.consume(s) {
            Ok(())
        } else {
            Err(self.syntax_err(format!("expected '{s}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<String, CompileError> {
        if self.cur().kind != TokenKind::Ident {
            return Err(self.syntax_err("expected an identifier"));
        }
        let text = self.cur().text.clone();
        self.pos += 1;
        Ok(text)
    }

    fn expect_number(&mut self) -> Result<i64, CompileError> {
        match self.cur().kind {
            TokenKind::Num(v) => {
                self.pos += 1;
                Ok(v)
            }
            _ => Err(self.syntax_err("expected a number")),
        }
    }

    fn at_declspec(&self) -> bool {
        self.check_keyword("int") || self.check_keyword("char")
    }

    fn cur_pos(&self) -> usize {
        self.cur().pos
    }

    fn syntax_err(&self, msg: impl Into<String>) -> CompileError {
        CompileError::Syntax(Diagnostic::at(self.buf, self.cur_pos(), msg))
    }

    fn semantic_err(&self, pos: usize, msg: impl Into<String>) -> CompileError {
        CompileError::Semantic(Diagnostic::at(self.buf, pos, msg))
    }

    // ---- declarations ----------------------------------------------------

    fn declspec(&mut self) -> Result<Rc<Type>, CompileError> {
        if self.consume_keyword("int") {
            return Ok(Rc::new(Type::Int));
        }
        if self.consume_keyword("char") {
            return Ok(Rc::new(Type::Char));
        }
        Err(self.syntax_err("expected 'int' or 'char'"))
    }

    fn declarator(&mut self, base: Rc<Type>) -> Result<Declared, CompileError> {
        let mut ty = base;
        while self.consume("*") {
            ty = Type::pointer_to(ty);
        }
        let name = self.expect_ident()?;
        let (ty, param_names) = self.type_suffix(ty)?;
        Ok(Declared {
            name,
            ty,
            param_names,
        })
    }

    /// `type_suffix = "(" func_params | "[" NUM "]" type_suffix | ε`
    fn type_suffix(&mut self, ty: Rc<Type>) -> Result<(Rc<Type>, Vec<String>), CompileError> {
        if self.consume("(") {
            return self.func_params(ty);
        }
        if self.consume("[") {
            let len = self.expect_number()?;
            if len < 0 {
                return Err(self.syntax_err("array length cannot be negative"));
            }
            self.expect("]")?;
            let (base, param_names) = self.type_suffix(ty)?;
            return Ok((Type::array_of(base, len as usize), param_names));
        }
        Ok((ty, Vec::new()))
    }

    /// `func_params = (param ("," param)*)? ")"`, `param = declspec declarator`
    fn func_params(&mut self, return_ty: Rc<Type>) -> Result<(Rc<Type>, Vec<String>), CompileError> {
        let mut types = Vec::new();
        let mut names = Vec::new();
        if !self.check(")") {
            loop {
                let base = self.declspec()?;
                let d = self.declarator(base)?;
                if matches!(*d.ty, Type::Func { .. }) {
                    return Err(self.syntax_err("a parameter cannot itself be a function"));
                }
                types.push(d.ty);
                names.push(d.name);
                if !self.consume(",") {
                    break;
                }
            }
        }
        self.expect(")")?;
        Ok((Type::func_type(return_ty, types), names))
    }

    fn parse_function(&mut self, decl: Declared) -> Result<ObjRef, CompileError> {
        let Type::Func { params, .. } = decl.ty.as_ref() else {
            return Err(CompileError::Internal(
                "parse_function called on a non-function declarator".to_string(),
            ));
        };
        let param_types = params.clone();

        self.locals = Vec::new();
        self.scopes.push();
        trace!(func = %decl.name, "entering function scope");

        let mut param_objs = Vec::new();
        for (name, ty) in decl.param_names.into_iter().zip(param_types) {
            let obj = Object::new_local(name.clone(), ty);
            self.scopes.declare(name, obj.clone());
            self.locals.push(obj.clone());
            param_objs.push(obj);
        }

        self.expect("{")?;
        let body = self.compound_stmt()?;
        self.scopes.pop();
        trace!(func = %decl.name, locals = self.locals.len(), "leaving function scope");

        Ok(Rc::new(std::cell::RefCell::new(Object {
            name: decl.name,
            ty: decl.ty,
            kind: crate::ast::ObjectKind::Function {
                params: param_objs,
                locals: std::mem::take(&mut self.locals),
                body: Stmt::Block { body, pos: 0 },
                stack_size: 0,
            },
        })))
    }

    fn parse_global_var_rest(
        &mut self,
        base: Rc<Type>,
        first: Declared,
        program: &mut Program,
    ) -> Result<(), CompileError> {
        self.declare_global(first.name, first.ty, program);
        while self.consume(",") {
            let d = self.declarator(base.clone())?;
            self.declare_global(d.name, d.ty, program);
        }
        self.expect(";")?;
        Ok(())
    }

    fn declare_global(&mut self, name: String, ty: Rc<Type>, program: &mut Program) {
        let obj = Object::new_global(name.clone(), ty, None);
        self.scopes.declare(name, obj.clone());
        program.globals.push(obj);
    }

    /// `compound_stmt = (declaration | stmt)* "}"`. The opening `"{"` has
    /// already been consumed by the caller.
    fn compound_stmt(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.scopes.push();
        trace!("block scope pushed");
        let mut stmts = Vec::new();
        while !self.check("}") {
            if self.at_declspec() {
                stmts.extend(self.declaration()?);
            } else {
                stmts.push(self.stmt()?);
            }
        }
        self.expect("}")?;
        self.scopes.pop();
        trace!("block scope popped");
        Ok(stmts)
    }

    fn declaration(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let base = self.declspec()?;
        let mut stmts = Vec::new();
        if !self.check(";") {
            loop {
                let pos = self.cur_pos();
                let d = self.declarator(base.clone())?;
                if matches!(*d.ty, Type::Func { .. }) {
                    return Err(self.semantic_err(pos, "local function declarations are not supported"));
                }
                let obj = Object::new_local(d.name.clone(), d.ty);
                self.scopes.declare(d.name, obj.clone());
                self.locals.push(obj.clone());

                if self.consume("=") {
                    let lhs = self.finish_expr(Expr::Var {
                        obj,
                        pos,
                        ty: None,
                    })?;
                    let rhs = self.assign()?;
                    let assign_pos = pos;
                    let expr = self.new_assign(lhs, rhs, assign_pos)?;
                    stmts.push(Stmt::ExprStmt { expr, pos: assign_pos });
                }
                if !self.consume(",") {
                    break;
                }
            }
        }
        self.expect(";")?;
        Ok(stmts)
    }

    // ---- statements --------------------------------------------------

    fn stmt(&mut self) -> Result<Stmt, CompileError> {
        let pos = self.cur_pos();

        if self.consume_keyword("return") {
            let expr = self.expr()?;
            self.expect(";")?;
            return Ok(Stmt::Return { expr, pos });
        }

        if self.consume_keyword("if") {
            self.expect("(")?;
            let cond = self.expr()?;
            self.expect(")")?;
            let then_branch = Box::new(self.stmt()?);
            let else_branch = if self.consume_keyword("else") {
                Some(Box::new(self.stmt()?))
            } else {
                None
            };
            return Ok(Stmt::If {
                cond,
                then_branch,
                else_branch,
                pos,
            });
        }

        if self.consume_keyword("for") {
            self.expect("(")?;
            let init = Some(Box::new(self.expr_stmt()?));
            let cond = if !self.check(";") {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(";")?;
            let inc = if !self.check(")") {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(")")?;
            let body = Box::new(self.stmt()?);
            return Ok(Stmt::For {
                init,
                cond,
                inc,
                body,
                pos,
            });
        }

        if self.consume_keyword("while") {
            self.expect("(")?;
            let cond = Some(self.expr()?);
            self.expect(")")?;
            let body = Box::new(self.stmt()?);
            return Ok(Stmt::For {
                init: None,
                cond,
                inc: None,
                body,
                pos,
            });
        }

        if self.check("{") {
            self.pos += 1;
            let body = self.compound_stmt()?;
            return Ok(Stmt::Block { body, pos });
        }

        self.expr_stmt()
    }

    fn expr_stmt(&mut self) -> Result<Stmt, CompileError> {
        let pos = self.cur_pos();
        if self.consume(";") {
            return Ok(Stmt::Block { body: Vec::new(), pos });
        }
        let expr = self.expr()?;
        self.expect(";")?;
        Ok(Stmt::ExprStmt { expr, pos })
    }

    // ---- expressions ---------------------------------------------------

    fn expr(&mut self) -> Result<Expr, CompileError> {
        self.assign()
    }

    fn assign(&mut self) -> Result<Expr, CompileError> {
        let pos = self.cur_pos();
        let lhs = self.equality()?;
        if self.consume("=") {
            let rhs = self.assign()?;
            return self.new_assign(lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, CompileError> {
        let mut node = self.relational()?;
        loop {
            let pos = self.cur_pos();
            if self.consume("==") {
                let rhs = self.relational()?;
                node = self.finish_expr(Expr::Binary {
                    op: BinOp::Eq,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                    pos,
                    ty: None,
                })?;
            } else if self.consume("!=") {
                let rhs = self.relational()?;
                node = self.finish_expr(Expr::Binary {
                    op: BinOp::Ne,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                    pos,
                    ty: None,
                })?;
            } else {
                return Ok(node);
            }
        }
    }

    fn relational(&mut self) -> Result<Expr, CompileError> {
        let mut node = self.add()?;
        loop {
            let pos = self.cur_pos();
            if self.consume("<") {
                let rhs = self.add()?;
                node = self.finish_expr(Expr::Binary {
                    op: BinOp::Lt,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                    pos,
                    ty: None,
                })?;
            } else if self.consume("<=") {
                let rhs = self.add()?;
                node = self.finish_expr(Expr::Binary {
                    op: BinOp::Le,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                    pos,
                    ty: None,
                })?;
            } else if self.consume(">") {
                // Desugar `a > b` as `b < a` — swap operands, don't negate
                // (negation would be wrong once/if unsigned types exist).
                let rhs = self.add()?;
                node = self.finish_expr(Expr::Binary {
                    op: BinOp::Lt,
                    lhs: Box::new(rhs),
                    rhs: Box::new(node),
                    pos,
                    ty: None,
                })?;
            } else if self.consume(">=") {
                let rhs = self.add()?;
                node = self.finish_expr(Expr::Binary {
                    op: BinOp::Le,
                    lhs: Box::new(rhs),
                    rhs: Box::new(node),
                    pos,
                    ty: None,
                })?;
            } else {
                return Ok(node);
            }
        }
    }

    fn add(&mut self) -> Result<Expr, CompileError> {
        let mut node = self.mul()?;
        loop {
            let pos = self.cur_pos();
            if self.consume("+") {
                let rhs = self.mul()?;
                node = self.new_add(node, rhs, pos)?;
            } else if self.consume("-") {
                let rhs = self.mul()?;
                node = self.new_sub(node, rhs, pos)?;
            } else {
                return Ok(node);
            }
        }
    }

    fn mul(&mut self) -> Result<Expr, CompileError> {
        let mut node = self.unary()?;
        loop {
            let pos = self.cur_pos();
            if self.consume("*") {
                let rhs = self.unary()?;
                node = self.finish_expr(Expr::Binary {
                    op: BinOp::Mul,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                    pos,
                    ty: None,
                })?;
            } else if self.consume("/") {
                let rhs = self.unary()?;
                node = self.finish_expr(Expr::Binary {
                    op: BinOp::Div,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                    pos,
                    ty: None,
                })?;
            } else {
                return Ok(node);
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let pos = self.cur_pos();
        if self.consume("+") {
            return self.unary();
        }
        if self.consume("-") {
            let expr = self.unary()?;
            return self.finish_expr(Expr::Neg {
                expr: Box::new(expr),
                pos,
                ty: None,
            });
        }
        if self.consume("&") {
            let expr = self.unary()?;
            return self.finish_expr(Expr::Addr {
                expr: Box::new(expr),
                pos,
                ty: None,
            });
        }
        if self.consume("*") {
            let expr = self.unary()?;
            return self.finish_expr(Expr::Deref {
                expr: Box::new(expr),
                pos,
                ty: None,
            });
        }
        self.postfix()
    }

    /// `postfix = primary ("[" expr "]")*`, each subscript desugared to
    /// `*(a + i)` so it goes through the same pointer-aware `+`.
    fn postfix(&mut self) -> Result<Expr, CompileError> {
        let mut node = self.primary()?;
        while self.consume("[") {
            let pos = self.cur_pos();
            let index = self.expr()?;
            self.expect("]")?;
            let sum = self.new_add(node, index, pos)?;
            node = self.finish_expr(Expr::Deref {
                expr: Box::new(sum),
                pos,
                ty: None,
            })?;
        }
        Ok(node)
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let pos = self.cur_pos();

        // Statement expression: `( { stmt+ } )`
        if self.check("(") && self.peek_is("{", 1) {
            self.pos += 1; // "("
            self.pos += 1; // "{"
            let mut body = Vec::new();
            loop {
                body.push(self.stmt()?);
                if self.check("}") {
                    break;
                }
            }
            self.expect("}")?;
            self.expect(")")?;
            return self.finish_expr(Expr::StmtExpr { body, pos, ty: None });
        }

        if self.consume("(") {
            let expr = self.expr()?;
            self.expect(")")?;
            return Ok(expr);
        }

        if self.consume_keyword("sizeof") {
            let expr = self.unary()?;
            let size = expr
                .ty()
                .ok_or_else(|| CompileError::Internal("sizeof operand has no type".to_string()))?
                .size() as i64;
            return self.finish_expr(Expr::Num {
                val: size,
                pos,
                ty: None,
            });
        }

        if self.cur().kind == TokenKind::Ident {
            let name = self.cur().text.clone();
            self.pos += 1;

            if self.consume("(") {
                return self.parse_fn_call(name, pos);
            }

            let obj = self
                .scopes
                .find(&name)
                .ok_or_else(|| self.semantic_err(pos, format!("undefined variable '{name}'")))?;
            return self.finish_expr(Expr::Var { obj, pos, ty: None });
        }

        match &self.cur().kind {
            TokenKind::Num(v) => {
                let val = *v;
                self.pos += 1;
                self.finish_expr(Expr::Num { val, pos, ty: None })
            }
            TokenKind::Str(bytes) => {
                let bytes = bytes.clone();
                self.pos += 1;
                let obj = self.new_string_literal(bytes);
                self.finish_expr(Expr::Var { obj, pos, ty: None })
            }
            _ => Err(self.syntax_err("expected an expression")),
        }
    }

    fn parse_fn_call(&mut self, name: String, pos: usize) -> Result<Expr, CompileError> {
        let mut args = Vec::new();
        if !self.check(")") {
            loop {
                args.push(self.assign()?);
                if !self.consume(",") {
                    break;
                }
            }
        }
        self.expect(")")?;
        self.finish_expr(Expr::FnCall {
            name,
            args,
            pos,
            ty: None,
        })
    }

    fn peek_is(&self, s: &str, offset: usize) -> bool {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.is(s))
            .unwrap_or(false)
    }

    /// Register an anonymous global for a decoded string literal, named
    /// `.L..<n>` with a monotonically increasing counter, typed
    /// `char[len + 1]` (the trailing NUL comes from zero-initialization).
    fn new_string_literal(&mut self, mut bytes: Vec<u8>) -> ObjRef {
        let len = bytes.len() + 1;
        bytes.push(0);
        let name = format!(".L..{}", self.anon_counter);
        self.anon_counter += 1;
        let ty = Type::array_of(Rc::new(Type::Char), len);
        let obj = Object::new_global(name, ty, Some(bytes));
        self.string_literals.push(obj.clone());
        obj
    }

    // ---- type elaboration ----------------------------------------------

    /// Assign `expr`'s type from its already-typed children. Every `Expr`
    /// node is passed through this exactly once, immediately after it is
    /// built — so children are always already typed by the time their
    /// parent is elaborated (idempotent as a consequence: a node this has
    /// already run on is never re-elaborated).
    fn finish_expr(&self, mut expr: Expr) -> Result<Expr, CompileError> {
        let ty = match &expr {
            Expr::Num { .. } => Rc::new(Type::Int),
            Expr::FnCall { .. } => Rc::new(Type::Int),
            Expr::Var { obj, .. } => obj.borrow().ty.clone(),
            Expr::Neg { expr: child, .. } => child
                .ty()
                .cloned()
                .ok_or_else(|| CompileError::Internal("untyped operand to unary -".to_string()))?,
            Expr::Addr { expr: child, .. } => {
                let child_ty = child.ty().ok_or_else(|| {
                    CompileError::Internal("untyped operand to &".to_string())
                })?;
                match child_ty.as_ref() {
                    Type::Array { base, .. } => Type::pointer_to(base.clone()),
                    _ => Type::pointer_to(child_ty.clone()),
                }
            }
            Expr::Deref { expr: child, pos, .. } => {
                let child_ty = child.ty().ok_or_else(|| {
                    CompileError::Internal("untyped operand to *".to_string())
                })?;
                match child_ty.base() {
                    Some(base) => base.clone(),
                    None => {
                        return Err(self.semantic_err(*pos, "invalid pointer dereference"));
                    }
                }
            }
            Expr::Binary { op, lhs, .. } => match op {
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le => Rc::new(Type::Int),
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                    lhs.ty().cloned().ok_or_else(|| {
                        CompileError::Internal("untyped operand to binary operator".to_string())
                    })?
                }
            },
            Expr::Assign { lhs, pos, .. } => {
                if let Some(lhs_ty) = lhs.ty() {
                    if matches!(lhs_ty.as_ref(), Type::Array { .. }) {
                        return Err(self.semantic_err(*pos, "cannot assign to an array"));
                    }
                }
                self.check_lvalue(lhs, *pos)?;
                lhs.ty().cloned().ok_or_else(|| {
                    CompileError::Internal("untyped operand to assignment".to_string())
                })?
            }
            Expr::StmtExpr { body, .. } => match body.last() {
                Some(Stmt::ExprStmt { expr, .. }) => expr
                    .ty()
                    .cloned()
                    .ok_or_else(|| CompileError::Internal("untyped statement expression".to_string()))?,
                _ => Rc::new(Type::Int),
            },
        };
        expr.set_ty(ty);
        Ok(expr)
    }

    /// `&` and `=` require an lvalue: `VAR` or `DEREF`.
    fn check_lvalue(&self, expr: &Expr, pos: usize) -> Result<(), CompileError> {
        match expr {
            Expr::Var { .. } | Expr::Deref { .. } => Ok(()),
            _ => Err(self.semantic_err(pos, "not an lvalue")),
        }
    }

    fn new_assign(&self, lhs: Expr, rhs: Expr, pos: usize) -> Result<Expr, CompileError> {
        self.check_lvalue(&lhs, pos)?;
        self.finish_expr(Expr::Assign {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            pos,
            ty: None,
        })
    }

    /// `+` elaboration: `num + num` is plain arithmetic; a pointer operand
    /// scales the other operand by its referent size; `ptr + ptr` is a
    /// hard error.
    fn new_add(&self, lhs: Expr, rhs: Expr, pos: usize) -> Result<Expr, CompileError> {
        let lhs_ty = require_ty(&lhs)?;
        let rhs_ty = require_ty(&rhs)?;

        if lhs_ty.is_integer() && rhs_ty.is_integer() {
            return self.finish_expr(Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
                ty: None,
            });
        }
        if lhs_ty.base().is_some() && rhs_ty.base().is_some() {
            return Err(self.semantic_err(pos, "invalid operands: pointer + pointer"));
        }

        let (ptr, ptr_ty, num) = if rhs_ty.base().is_some() {
            (rhs, rhs_ty, lhs)
        } else if lhs_ty.base().is_some() {
            (lhs, lhs_ty, rhs)
        } else {
            return Err(self.semantic_err(pos, "invalid operands to '+'"));
        };

        let base = ptr_ty.base().unwrap().clone();
        let scaled = self.scale_by_base_size(num, base.size() as i64, pos)?;
        self.finish_expr(Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(ptr),
            rhs: Box::new(scaled),
            pos,
            ty: None,
        })
    }

    /// `-` elaboration: `num - num` is arithmetic; `ptr - num` scales and
    /// keeps the pointer type; `ptr - ptr` is an element count (byte
    /// difference divided by referent size); `num - ptr` is a hard error.
    fn new_sub(&self, lhs: Expr, rhs: Expr, pos: usize) -> Result<Expr, CompileError> {
        let lhs_ty = require_ty(&lhs)?;
        let rhs_ty = require_ty(&rhs)?;

        if lhs_ty.is_integer() && rhs_ty.is_integer() {
            return self.finish_expr(Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
                ty: None,
            });
        }

        if lhs_ty.base().is_some() && rhs_ty.is_integer() {
            let base = lhs_ty.base().unwrap().clone();
            let scaled = self.scale_by_base_size(rhs, base.size() as i64, pos)?;
            return self.finish_expr(Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(lhs),
                rhs: Box::new(scaled),
                pos,
                ty: None,
            });
        }

        if lhs_ty.base().is_some() && rhs_ty.base().is_some() {
            let base_size = lhs_ty.base().unwrap().size() as i64;
            let diff = self.finish_expr(Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
                ty: None,
            })?;
            let scale = Expr::Num {
                val: base_size,
                pos,
                ty: Some(Rc::new(Type::Int)),
            };
            let mut result = self.finish_expr(Expr::Binary {
                op: BinOp::Div,
                lhs: Box::new(diff),
                rhs: Box::new(scale),
                pos,
                ty: None,
            })?;
            result.set_ty(Rc::new(Type::Int));
            return Ok(result);
        }

        Err(self.semantic_err(pos, "invalid operands to '-'"))
    }

    fn scale_by_base_size(&self, num: Expr, scale: i64, pos: usize) -> Result<Expr, CompileError> {
        if scale == 1 {
            return Ok(num);
        }
        self.finish_expr(Expr::Binary {
            op: BinOp::Mul,
            lhs: Box::new(num),
            rhs: Box::new(Expr::Num {
                val: scale,
                pos,
                ty: Some(Rc::new(Type::Int)),
            }),
            pos,
            ty: None,
        })
    }
}

fn require_ty(e: &Expr) -> Result<Rc<Type>, CompileError> {
    e.ty()
        .cloned()
        .ok_or_else(|| CompileError::Internal("untyped operand reached pointer arithmetic".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn parse_ok(src: &str) -> Program {
        let buf = SourceBuffer::from_str("t.c", src);
        let tokens = tokenize(&buf).unwrap();
        Parser::new(&buf, tokens).parse().unwrap()
    }

    fn parse_err(src: &str) -> CompileError {
        let buf = SourceBuffer::from_str("t.c", src);
        let tokens = tokenize(&buf).unwrap();
        Parser::new(&buf, tokens).parse().unwrap_err()
    }

    #[test]
    fn parses_a_trivial_function() {
        let program = parse_ok("int main(){ return 1+2*3; }");
        assert_eq!(program.globals.len(), 1);
    }

    #[test]
    fn global_variable_gets_zero_init_data() {
        let program = parse_ok("int g; int main(){ g=42; return g; }");
        let g = program.globals[0].borrow();
        assert_eq!(g.name, "g");
        match &g.kind {
            crate::ast::ObjectKind::GlobalVar { init_data } => assert!(init_data.is_none()),
            _ => panic!("expected a global variable"),
        }
    }

    #[test]
    fn not_an_lvalue_is_semantic_error() {
        let err = parse_err("int main(){ return &1; }");
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn dereference_of_non_pointer_is_semantic_error() {
        let err = parse_err("int main(){ int x; return *x; }");
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn pointer_plus_pointer_is_semantic_error() {
        let err = parse_err("int main(){ int *p; int *q; return p+q; }");
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn assigning_to_an_array_is_semantic_error() {
        let err = parse_err("int main(){ int a[3]; int b[3]; a=b; return 0; }");
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn undefined_variable_is_semantic_error() {
        let err = parse_err("int main(){ return x; }");
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn subscript_desugars_like_pointer_deref_add() {
        // a[i] and *(a+i) should produce the same shape of tree: a DEREF
        // over an ADD whose left operand is the array/pointer.
        let program = parse_ok("int main(){ int a[3]; return a[1]; }");
        let main_fn = &program.globals[0];
        let body = match &main_fn.borrow().kind {
            crate::ast::ObjectKind::Function { body, .. } => format!("{body:?}"),
            _ => panic!("expected function"),
        };
        assert!(body.contains("Deref"));
        assert!(body.contains("Add"));
    }

    #[test]
    fn pointer_arithmetic_is_commutative_in_shape() {
        let a = parse_ok("int main(){ int *p; return p+1; }");
        let b = parse_ok("int main(){ int *p; return 1+p; }");
        let shape = |program: &Program| match &program.globals[0].borrow().kind {
            crate::ast::ObjectKind::Function { body, .. } => format!("{body:?}"),
            _ => panic!("expected function"),
        };
        // Both should normalize to "pointer on the left, scaled int on the right".
        assert_eq!(shape(&a), shape(&b));
    }

    #[test]
    fn sizeof_becomes_an_integer_literal() {
        let program = parse_ok("int main(){ int a[3]; return sizeof(a); }");
        let body = match &program.globals[0].borrow().kind {
            crate::ast::ObjectKind::Function { body, .. } => format!("{body:?}"),
            _ => panic!("expected function"),
        };
        assert!(body.contains("val: 24"));
    }

    #[test]
    fn string_literal_becomes_anonymous_global() {
        let program = parse_ok(r#"int main(){ return 0; } "#);
        assert_eq!(program.globals.len(), 1);
        let program2 = parse_ok(r#"int main(){ char *s; s = "hi"; return 0; }"#);
        // main + the anonymous string global
        assert_eq!(program2.globals.len(), 2);
        let lit = &program2.globals[1].borrow();
        assert_eq!(lit.name, ".L..0");
    }

    #[test]
    fn unclosed_paren_before_star_is_syntax_error() {
        let err = parse_err("int main(){ int *p; return *p + *; }");
        assert!(matches!(err, CompileError::Syntax(_)));
    }
}
