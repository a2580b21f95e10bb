//! End-to-end scenarios run under both executors, asserting identical stdout
//! (and, for error cases, identical `RuntimeError`s).

use dynlang::back::Vm;
use dynlang::error::RuntimeError;
use dynlang::eval::Evaluator;
use dynlang::front::parse;
use dynlang::middle::lower;
use pretty_assertions::assert_eq;

fn run_vm(src: &str) -> Result<String, RuntimeError> {
    let program = parse(src).expect("source parses");
    let ir = lower(&program)?;
    let mut out = Vec::new();
    Vm::new(ir).run(&mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn run_tree(src: &str) -> Result<String, RuntimeError> {
    let program = parse(src).expect("source parses");
    let mut out = Vec::new();
    Evaluator::new().run(&program, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn assert_both(src: &str, expected: &str) {
    assert_eq!(run_vm(src).unwrap(), expected, "VM output mismatch");
    assert_eq!(run_tree(src).unwrap(), expected, "tree evaluator output mismatch");
}

#[test]
fn scenario_arithmetic() {
    assert_both("let x = 3; let y = 4; print(x * y + 1);", "13\n");
}

#[test]
fn scenario_list_index_assign() {
    assert_both("let arr = [1,2,3]; arr[1] = 99; print(arr);", "[1, 99, 3]\n");
}

#[test]
fn scenario_recursive_factorial() {
    let src = "function fact(n) { if (n <= 1) { return 1; } else { return n * fact(n - 1); } }\nprint(fact(5));";
    assert_both(src, "120\n");
}

#[test]
fn scenario_while_string_concat() {
    let src = r#"let s = ""; let i = 0; while (i < 3) { s = s + "ab"; i = i + 1; } print(s);"#;
    assert_both(src, "ababab\n");
}

#[test]
fn scenario_type_and_size_builtins() {
    let src = r#"print(type([1, 2])); print(type("x")); print(size("hello"));"#;
    assert_both(src, "list\nstring\n5\n");
}

#[test]
fn scenario_append_and_remove() {
    let src = "let a = [1,2,3]; a = append(a, 4); a = remove(a, 0); print(a);";
    assert_both(src, "[2, 3, 4]\n");
}

#[test]
fn boundary_list_index_out_of_bounds_both_ends() {
    let low = "let a = [1,2,3]; print(a[-1]);";
    let high = "let a = [1,2,3]; print(a[3]);";
    for src in [low, high] {
        assert!(matches!(run_vm(src), Err(RuntimeError::IndexOutOfBounds { .. })));
        assert!(matches!(run_tree(src), Err(RuntimeError::IndexOutOfBounds { .. })));
    }
}

#[test]
fn boundary_string_index_out_of_bounds_both_ends() {
    let low = r#"let s = "hi"; print(s[-1]);"#;
    let high = r#"let s = "hi"; print(s[2]);"#;
    for src in [low, high] {
        assert!(matches!(run_vm(src), Err(RuntimeError::IndexOutOfBounds { .. })));
        assert!(matches!(run_tree(src), Err(RuntimeError::IndexOutOfBounds { .. })));
    }
}

#[test]
fn boundary_divide_by_zero() {
    let src = "print(5 / 0);";
    assert_eq!(run_vm(src).unwrap_err(), RuntimeError::DivideByZero);
    assert_eq!(run_tree(src).unwrap_err(), RuntimeError::DivideByZero);
}

#[test]
fn boundary_type_mismatch() {
    let src = "print(true + 1);";
    assert!(matches!(run_vm(src), Err(RuntimeError::TypeMismatch { .. })));
    assert!(matches!(run_tree(src), Err(RuntimeError::TypeMismatch { .. })));
}

#[test]
fn boundary_arity_mismatch() {
    let src = "function fact(n) { return n; } fact();";
    assert!(matches!(run_vm(src), Err(RuntimeError::ArityMismatch { .. })));
    assert!(matches!(run_tree(src), Err(RuntimeError::ArityMismatch { .. })));
}

#[test]
fn boundary_bare_return_skips_rest_of_block() {
    let src = "function f() { return; print(1); } f(); print(2);";
    assert_both(src, "2\n");
}
