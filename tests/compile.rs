//! End-to-end scenarios over the full pipeline: source text in, assembly
//! listing or structured error out.

use floc::{CompileError, compile};

fn assembly(source: &str) -> String {
  compile(source).expect("compile").assembly
}

/// Byte offset of `needle` in `haystack`, panicking with context.
fn offset(haystack: &str, needle: &str) -> usize {
  match haystack.find(needle) {
    Some(at) => at,
    None => panic!("expected {needle:?} in:\n{haystack}"),
  }
}

#[test]
fn arithmetic_is_evaluated_in_source_order() {
  // 2 + 3 * 4: the three literals are pushed in order, the multiply
  // combines 3 and 4, the add folds in 2, and the result reaches printf.
  let asm = assembly("ecrire(2+3*4);");
  let two = offset(&asm, "mov\tr1, #2");
  let three = offset(&asm, "mov\tr1, #3");
  let four = offset(&asm, "mov\tr1, #4");
  let mul = offset(&asm, "mul\tr0, r1, r0");
  let add = offset(&asm, "add\tr0, r1, r0");
  let print = offset(&asm, "bl\tprintf");
  assert!(two < three && three < four);
  assert!(four < mul && mul < add && add < print);
}

#[test]
fn integer_condition_is_rejected() {
  let err = compile("si (3+4) { ecrire(1); }").expect_err("integer condition");
  assert!(matches!(err, CompileError::TypeMismatch { .. }));
}

#[test]
fn undeclared_function_produces_no_assembly() {
  let err = compile("foo();").expect_err("unknown function");
  assert!(matches!(err, CompileError::UnknownSymbol { .. }));
}

#[test]
fn declared_and_actual_return_types_must_agree() {
  let source = "entier f() { retourner Vrai; } ecrire(f());";
  let err = compile(source).expect_err("boolean returned as entier");
  assert!(matches!(err, CompileError::TypeMismatch { .. }));
}

#[test]
fn while_loop_has_one_top_one_exit_and_one_back_edge() {
  let asm = assembly("tantque (lire() > 0) { ecrire(lire()); }");
  let tops = asm.lines().filter(|line| line.trim() == ".e0:").count();
  let exits = asm.lines().filter(|line| line.trim() == ".e1:").count();
  let back_edges = asm
    .lines()
    .filter(|line| line.trim_start().starts_with("b\t.e0"))
    .count();
  assert_eq!(tops, 1);
  assert_eq!(exits, 1);
  assert_eq!(back_edges, 1);
}

#[test]
fn table_mode_lists_both_functions_with_distinct_footprints() {
  let source = "\
entier double(entier n) { retourner n * 2; }
entier somme(entier a, entier b) { retourner a + b; }
ecrire(somme(double(1), 2));
";
  let result = compile(source).expect("compile");
  let table = result.symbols.to_string();
  assert!(table.contains("double"));
  assert!(table.contains("somme"));
  assert!(table.contains("4 octets"));
  assert!(table.contains("8 octets"));
}

#[test]
fn listing_carries_the_runtime_boilerplate() {
  let asm = assembly("ecrire(1);");
  assert!(asm.starts_with(".global __aeabi_idiv"));
  assert!(asm.contains(".boolean_or:"));
  assert!(asm.contains(".boolean_not:"));
  assert!(asm.contains(".LC0:"));
  assert!(asm.contains(".LC1:"));
  assert!(asm.contains("\nmain:\n"));
}

#[test]
fn user_functions_get_a_prefixed_label() {
  let asm = assembly("entier f() { retourner 1; } ecrire(f());");
  assert!(asm.contains("\n_f:\n"));
  assert!(asm.contains("\tbl\t_f"));
}

#[test]
fn main_exits_with_zero() {
  let asm = assembly("ecrire(1);");
  let main_at = offset(&asm, "\nmain:\n");
  let exit_at = offset(&asm, "mov\tr0, #0\t\t@ exit code");
  assert!(exit_at > main_at);
}

#[test]
fn lexical_errors_carry_their_line() {
  let err = compile("ecrire(1);\n$").expect_err("bad character");
  assert!(matches!(
    err,
    CompileError::UnexpectedCharacter { ch: '$', line: 2 }
  ));
}
