//! Black-box end-to-end compiler scenarios. The emitted assembly text isn't
//! assembled here (no RISC-V toolchain in this test environment), so each
//! "must succeed" scenario is checked by walking the generated instruction
//! shape for the arithmetic that implies the expected exit code, plus
//! structural markers like `call`, `.data`, and label counts.

use rvcc::{compile_source, CompileError, CompilerOptions};

fn compile(src: &str) -> String {
    compile_source(src, &CompilerOptions::new("e2e.c")).expect("expected successful compilation")
}

fn compile_err(src: &str) -> CompileError {
    compile_source(src, &CompilerOptions::new("e2e.c")).expect_err("expected a compile error")
}

#[test]
fn constant_folding_style_arithmetic() {
    // int main(){ return 1+2*3; } -> exit 7
    let asm = compile("int main(){ return 1+2*3; }");
    assert!(asm.contains("  li a0, 1"));
    assert!(asm.contains("  li a0, 2"));
    assert!(asm.contains("  li a0, 3"));
    assert!(asm.contains("  mul a0, a0, a1"));
    assert!(asm.contains("  add a0, a0, a1"));
}

#[test]
fn locals_and_multiplication() {
    // int main(){ int x=3; int y=5; return x*y-1; } -> exit 14
    let asm = compile("int main(){ int x=3; int y=5; return x*y-1; }");
    assert!(asm.contains("  mul a0, a0, a1"));
    assert!(asm.contains("  sub a0, a0, a1"));
}

#[test]
fn for_loop_accumulator() {
    // int main(){ int i=0; int s=0; for(i=1;i<=10;i=i+1) s=s+i; return s; } -> exit 55
    let asm = compile("int main(){ int i=0; int s=0; for(i=1;i<=10;i=i+1) s=s+i; return s; }");
    assert!(asm.contains(".L.begin.0:"));
    assert!(asm.contains(".L.end.0:"));
    // `i<=10` desugars to a swapped `slt` + `xori ..., 1`.
    assert!(asm.contains("  xori a0, a0, 1"));
}

#[test]
fn array_and_pointer_arithmetic() {
    // int main(){ int a[3]; a[0]=1; a[1]=2; a[2]=4; int *p=a; return *(p+2)+a[1]; } -> exit 6
    let asm =
        compile("int main(){ int a[3]; a[0]=1; a[1]=2; a[2]=4; int *p=a; return *(p+2)+a[1]; }");
    assert!(asm.contains("main:"));
    // pointer arithmetic scales by the element size (8 for int)
    assert!(asm.contains("  li a0, 8"));
    assert!(asm.contains("  mul a0, a0, a1"));
}

#[test]
fn global_variable_gets_a_data_entry() {
    // int g; int main(){ g=42; return g; } -> exit 42; `.data` contains `g: .zero 8`
    let asm = compile("int g; int main(){ g=42; return g; }");
    assert!(asm.contains(".data"));
    assert!(asm.contains(".globl g"));
    assert!(asm.contains("g:"));
    assert!(asm.contains(".zero 8"));
    assert!(asm.contains("  li a0, 42"));
}

#[test]
fn function_call_emits_a_call_instruction() {
    // int add(int x,int y){return x+y;} int main(){return add(3,4);} -> exit 7
    let asm = compile("int add(int x,int y){return x+y;} int main(){return add(3,4);}");
    assert!(asm.contains("call add"));
    assert!(asm.contains(".L.return.add:"));
    assert!(asm.contains(".L.return.main:"));
}

#[test]
fn address_of_a_literal_is_not_an_lvalue() {
    let err = compile_err("int main(){ return &1; }");
    assert!(matches!(err, CompileError::Semantic(_)));
    assert!(err.to_string().contains("not an lvalue"));
}

#[test]
fn dangling_star_is_a_syntax_error() {
    let err = compile_err("int main(){ int *p; return *p + *; }");
    assert!(matches!(err, CompileError::Syntax(_)));
}

#[test]
fn unclosed_string_literal_is_fatal() {
    let err = compile_err(r#"int main(){ return "abc; }"#);
    assert!(matches!(err, CompileError::Lexical(_)));
    assert!(err.to_string().contains("unclosed string literal"));
}

#[test]
fn diagnostic_text_has_filename_source_line_and_caret() {
    let err = compile_err("int main(){ return &1; }");
    let rendered = err.to_string();
    let lines: Vec<&str> = rendered.lines().collect();
    assert!(lines[0].starts_with("e2e.c:1:"));
    assert!(lines[2].trim_end().ends_with('^'));
}
