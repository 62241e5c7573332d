//! Code generation: lower the Flo syntax tree into 32-bit ARM assembly.
//!
//! The emitter is a single forward pass over the tree with no intermediate
//! representation: type checking, frame layout and instruction emission
//! happen together. Every expression leaves exactly one value on the
//! machine stack until its parent construct consumes it, so the listing
//! stays push/pop balanced at every point. r0/r1 are the operand scratch
//! registers, r2 carries return values and variable loads.

use crate::error::{CompileError, CompileResult};
use crate::parser::{Call, Expr, Function, Instr, Op, Program};
use crate::symbols::SymbolTable;
use crate::ty::{Ty, type_name};

/// Runtime boilerplate emitted once per compiled unit: the AEABI division
/// helpers, the two boolean canonicalisation stubs, and the `scanf` /
/// `printf` format strings used by the builtins.
const HEADER: &str = "\
.global __aeabi_idiv
.global __aeabi_idivmod
.boolean_or:
\tmov\tr0, #1
\tbx\tlr
.boolean_not:
\tmov\tr0, #0
\tbx\tlr
.LC0:
\t.ascii\t\"%d\\000\"
\t.align\t2
.LC1:
\t.ascii\t\"%d\\012\\000\"
\t.text
\t.align\t2
\t.global\tmain
";

/// The result of a successful compilation. `-arm` mode prints the
/// assembly, `-table` mode prints the symbol table; both are produced by
/// the same pass so semantic errors surface identically in either mode.
#[derive(Debug)]
pub struct Compilation {
  pub assembly: String,
  pub symbols: SymbolTable,
}

/// Issues globally unique branch-target names from one monotonically
/// increasing counter. Labels are never reused or scoped; label space is
/// cheap.
#[derive(Debug, Default)]
struct LabelAllocator {
  next: usize,
}

impl LabelAllocator {
  fn fresh(&mut self) -> String {
    let label = format!(".e{}", self.next);
    self.next += 1;
    label
  }
}

/// Compile a whole program into its assembly listing and symbol table.
pub fn generate(program: &Program) -> CompileResult<Compilation> {
  let mut generator = CodeGen::new();
  generator.gen_program(program)?;
  Ok(Compilation {
    assembly: generator.asm,
    symbols: generator.symbols,
  })
}

struct CodeGen {
  asm: String,
  symbols: SymbolTable,
  labels: LabelAllocator,
}

impl CodeGen {
  fn new() -> Self {
    Self {
      asm: String::new(),
      symbols: SymbolTable::new(),
      labels: LabelAllocator::default(),
    }
  }

  /// Append one instruction line: `\topcode\toperands\t\t@ comment`.
  fn instr(&mut self, opcode: &str, operands: &str, comment: &str) {
    self.asm.push('\t');
    self.asm.push_str(opcode);
    if !operands.is_empty() {
      self.asm.push('\t');
      self.asm.push_str(operands);
    }
    if !comment.is_empty() {
      self.asm.push_str("\t\t@ ");
      self.asm.push_str(comment);
    }
    self.asm.push('\n');
  }

  fn label(&mut self, name: &str) {
    self.asm.push_str(name);
    self.asm.push_str(":\n");
  }

  fn prologue(&mut self) {
    self.instr("push", "{fp, lr}", "");
    self.instr("add", "fp, sp, #4", "");
  }

  fn epilogue(&mut self) {
    self.instr("pop", "{fp, pc}", "");
  }

  /// Emit the whole unit: header, every function, then the `main` entry
  /// built from the top-level instructions with an implicit zero exit.
  /// All signatures are registered before any body is generated so that
  /// forward calls resolve.
  fn gen_program(&mut self, program: &Program) -> CompileResult<()> {
    self.asm.push_str(HEADER);

    for function in &program.functions {
      self.symbols.register(function)?;
    }
    for function in &program.functions {
      self.gen_function(function)?;
    }

    self.label("main");
    self.prologue();
    self.gen_instructions(&program.instructions)?;
    self.instr("mov", "r0, #0", "exit code");
    self.epilogue();
    Ok(())
  }

  fn gen_function(&mut self, function: &Function) -> CompileResult<()> {
    self.symbols.enter_scope(&function.name);
    self.label(&format!("_{}", function.name));
    self.prologue();
    let result = self.gen_instructions(&function.body);
    self.epilogue();
    self.symbols.exit_scope();
    result
  }

  fn gen_instructions(&mut self, instructions: &[Instr]) -> CompileResult<()> {
    for instruction in instructions {
      self.gen_instruction(instruction)?;
    }
    Ok(())
  }

  /// Lower one instruction. A call's declared return type is reported so
  /// expression position can reuse this path.
  fn gen_instruction(&mut self, instruction: &Instr) -> CompileResult<Option<Ty>> {
    match instruction {
      Instr::Call(call) => self.gen_call(call),
      Instr::While { cond, body, line } => {
        self.gen_while(cond, body, *line)?;
        Ok(None)
      }
      Instr::If {
        cond,
        then_branch,
        else_branch,
        line,
      } => {
        self.gen_if(cond, then_branch, else_branch.as_deref(), *line)?;
        Ok(None)
      }
      Instr::Return { value, line } => {
        self.gen_return(value, *line)?;
        Ok(None)
      }
    }
  }

  /// Resolve and lower a call, either to a user function (branch-and-link
  /// plus argument cleanup) or to one of the two builtins.
  fn gen_call(&mut self, call: &Call) -> CompileResult<Option<Ty>> {
    let (is_user, is_builtin) = self.symbols.resolve_function(&call.callee);
    if !is_user && !is_builtin {
      return Err(CompileError::UnknownSymbol {
        name: call.callee.clone(),
        line: call.line,
      });
    }

    let mut arg_types = Vec::with_capacity(call.args.len());
    for arg in &call.args {
      arg_types.push(self.gen_expression(arg)?);
    }
    self
      .symbols
      .check_argument_types(&call.callee, &arg_types, call.line)?;

    if is_user {
      self.instr("bl", &format!("_{}", call.callee), "");
      let footprint = self.symbols.footprint_of(&call.callee);
      self.instr("add", &format!("sp, #{footprint}"), "drop the arguments");
    } else {
      match call.callee.as_str() {
        "lire" => self.gen_lire(),
        "ecrire" => self.gen_ecrire(),
        _ => {
          return Err(CompileError::UnknownBuiltin {
            name: call.callee.clone(),
            line: call.line,
          });
        }
      }
    }

    Ok(self.symbols.return_type_of(&call.callee))
  }

  /// `lire`: read one integer from stdin into a fresh stack slot, then
  /// move it into r2.
  fn gen_lire(&mut self) {
    self.instr("ldr", "r0, =.LC0", "scanf format string");
    self.instr("sub", "sp, sp, #4", "slot for the value read");
    self.instr("movs", "r1, sp", "");
    self.instr("bl", "scanf", "");
    self.instr("pop", "{r2}", "value read");
  }

  /// `ecrire`: pop the argument and print it as a decimal integer.
  fn gen_ecrire(&mut self) {
    self.instr("pop", "{r1}", "");
    self.instr("ldr", "r0, =.LC1", "printf format string");
    self.instr("bl", "printf", "");
  }

  /// Evaluate a condition, require it boolean, and branch to
  /// `false_target` when it does not hold.
  fn gen_condition(&mut self, cond: &Expr, false_target: &str, line: usize) -> CompileResult<()> {
    let ty = self.gen_expression(cond)?;
    if ty != Some(Ty::Booleen) {
      return Err(CompileError::TypeMismatch {
        expected: Ty::Booleen.to_string(),
        found: type_name(ty),
        line,
      });
    }
    self.instr("pop", "{r0}", "");
    self.instr("cmp", "r0, #1", "");
    self.instr("bne", false_target, "condition is false");
    Ok(())
  }

  fn gen_while(&mut self, cond: &Expr, body: &[Instr], line: usize) -> CompileResult<()> {
    let loop_top = self.labels.fresh();
    let loop_exit = self.labels.fresh();

    self.label(&loop_top);
    self.gen_condition(cond, &loop_exit, line)?;
    self.gen_instructions(body)?;
    self.instr("b", &loop_top, "back edge");
    self.label(&loop_exit);
    Ok(())
  }

  /// Both branches converge on `join` before the construct's successor.
  fn gen_if(
    &mut self,
    cond: &Expr,
    then_branch: &[Instr],
    else_branch: Option<&[Instr]>,
    line: usize,
  ) -> CompileResult<()> {
    let join = self.labels.fresh();
    let else_target = self.labels.fresh();

    self.gen_condition(cond, &else_target, line)?;
    self.gen_instructions(then_branch)?;
    self.instr("b", &join, "");
    self.label(&else_target);
    if let Some(else_branch) = else_branch {
      self.gen_instructions(else_branch)?;
    }
    self.label(&join);
    Ok(())
  }

  /// `retourner`: only valid inside a function, and the value's type must
  /// match the declared return type. The value travels back in r2.
  fn gen_return(&mut self, value: &Expr, line: usize) -> CompileResult<()> {
    let Some(entry) = self.symbols.current_function() else {
      return Err(CompileError::InvalidReturn { line });
    };
    let expected = entry.return_type;
    let got = self.gen_expression(value)?;
    if got != Some(expected) {
      return Err(CompileError::TypeMismatch {
        expected: expected.to_string(),
        found: type_name(got),
        line,
      });
    }
    self.instr("pop", "{r2}", "return value");
    self.epilogue();
    Ok(())
  }

  /// Lower an expression so that exactly one value of its static type is
  /// the new top of the stack, and report that type. `None` means the
  /// expression produced no observable value (a call to `ecrire`).
  fn gen_expression(&mut self, expression: &Expr) -> CompileResult<Option<Ty>> {
    match expression {
      Expr::Call(call) => {
        let ty = self.gen_call(call)?;
        self.instr("push", "{r2}", "return value");
        Ok(ty)
      }
      Expr::Binary { op, lhs, rhs, line } => self.gen_operation(*op, lhs, rhs.as_deref(), *line),
      Expr::Var { name, line } => {
        let (ty, offset) = self.symbols.resolve_variable(name, *line)?;
        self.instr("ldr", &format!("r2, [fp, #{offset}]"), &format!("load {name}"));
        self.instr("push", "{r2}", "");
        Ok(Some(ty))
      }
      Expr::Int { value } => {
        self.instr("mov", &format!("r1, #{value}"), "");
        self.instr("push", "{r1}", "");
        Ok(Some(Ty::Entier))
      }
      Expr::Bool { value } => {
        let bit = if *value { 1 } else { 0 };
        self.instr("mov", &format!("r1, #{bit}"), "");
        self.instr("push", "{r1}", "");
        Ok(Some(Ty::Booleen))
      }
    }
  }

  /// Evaluate both operands (there is no short-circuiting), pop them into
  /// r1/r0 and dispatch on the operator and the left operand's type.
  fn gen_operation(
    &mut self,
    op: Op,
    lhs: &Expr,
    rhs: Option<&Expr>,
    line: usize,
  ) -> CompileResult<Option<Ty>> {
    // `non` is the only unary operator; any other arity shape means the
    // producer broke the AST contract.
    if (op == Op::Not) != rhs.is_none() {
      return Err(CompileError::UnsupportedConstruct { line });
    }

    let lhs_ty = self.gen_expression(lhs)?;
    if let Some(rhs) = rhs {
      let rhs_ty = self.gen_expression(rhs)?;
      if lhs_ty != rhs_ty {
        return Err(CompileError::TypeMismatch {
          expected: type_name(lhs_ty),
          found: type_name(rhs_ty),
          line,
        });
      }
      self.instr("pop", "{r1}", "right operand");
    }
    self.instr("pop", "{r0}", "left operand");

    let handled = match lhs_ty {
      Some(Ty::Entier) => self.gen_integer_op(op),
      Some(Ty::Booleen) => self.gen_boolean_op(op),
      None => false,
    };

    let mut result_ty = lhs_ty;
    if !handled {
      if op.is_comparison() {
        self.gen_comparison(op);
        result_ty = Some(Ty::Booleen);
      } else {
        return Err(CompileError::UnsupportedOperation {
          op: op.symbol().to_string(),
          ty: type_name(lhs_ty),
          line,
        });
      }
    }

    self.instr("push", "{r0}", "result");
    Ok(result_ty)
  }

  /// Integer arithmetic. Division and modulo go through the AEABI
  /// runtime helpers; the remainder comes back in r1.
  fn gen_integer_op(&mut self, op: Op) -> bool {
    match op {
      Op::Add => self.instr("add", "r0, r1, r0", ""),
      Op::Mul => self.instr("mul", "r0, r1, r0", ""),
      Op::Sub => self.instr("sub", "r0, r0, r1", ""),
      Op::Div => self.instr("bl", "__aeabi_idiv", ""),
      Op::Mod => {
        self.instr("bl", "__aeabi_idivmod", "");
        self.instr("mov", "r0, r1", "remainder");
      }
      _ => return false,
    }
    true
  }

  /// Boolean algebra in the 0/1 domain: AND is a multiply, OR and NOT
  /// use an add-then-compare idiom that calls a runtime stub to force
  /// the result back to canonical 0/1 when the sum reaches 2.
  fn gen_boolean_op(&mut self, op: Op) -> bool {
    match op {
      Op::And => self.instr("mul", "r0, r1, r0", ""),
      Op::Or => {
        self.instr("add", "r0, r1, r0", "");
        self.instr("cmp", "r0, #2", "");
        self.instr("bleq", ".boolean_or", "both sides were true");
      }
      Op::Not => {
        self.instr("add", "r0, #1", "");
        self.instr("cmp", "r0, #2", "");
        self.instr("bleq", ".boolean_not", "operand was true");
      }
      _ => return false,
    }
    true
  }

  /// Relational/equality operators work on either primitive type and
  /// always produce a boolean: compare, then branch through two fresh
  /// labels that load 1 or 0 into r0.
  fn gen_comparison(&mut self, op: Op) {
    let label_true = self.labels.fresh();
    let label_false = self.labels.fresh();

    let suffix = match op {
      Op::Eq => "eq",
      Op::Ne => "ne",
      Op::Le => "le",
      Op::Ge => "ge",
      Op::Lt => "lt",
      Op::Gt => "gt",
      _ => unreachable!("not a comparison operator"),
    };

    self.instr("cmp", "r0, r1", "");
    self.instr(&format!("b{suffix}"), &label_true, "");
    self.instr("mov", "r0, #0", "");
    self.instr("b", &label_false, "");
    self.label(&label_true);
    self.instr("mov", "r0, #1", "");
    self.label(&label_false);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn compile(source: &str) -> CompileResult<Compilation> {
    let tokens = tokenize(source)?;
    let program = parse(tokens, source)?;
    generate(&program)
  }

  fn assembly(source: &str) -> String {
    compile(source).expect("compile").assembly
  }

  fn count_lines(asm: &str, needle: &str) -> usize {
    asm.lines().filter(|line| line.trim() == needle).count()
  }

  #[test]
  fn literal_is_materialised_and_pushed() {
    let asm = assembly("ecrire(7);");
    assert!(asm.contains("\tmov\tr1, #7"));
    assert!(asm.contains("\tbl\tprintf"));
  }

  #[test]
  fn booleans_lower_to_zero_and_one() {
    let asm = assembly("ecrire(Vrai); ecrire(Faux);");
    assert!(asm.contains("\tmov\tr1, #1"));
    assert!(asm.contains("\tmov\tr1, #0"));
  }

  #[test]
  fn modulo_copies_the_remainder() {
    let asm = assembly("ecrire(7 % 3);");
    let idivmod = asm.find("__aeabi_idivmod").expect("helper call");
    let copy = asm.find("mov\tr0, r1").expect("remainder copy");
    assert!(copy > idivmod);
  }

  #[test]
  fn both_or_operands_are_evaluated() {
    // No short-circuiting: both literal pushes appear before the add.
    let asm = assembly("ecrire(Vrai ou Faux);");
    let first = asm.find("mov\tr1, #1").expect("left operand");
    let second = asm.find("mov\tr1, #0").expect("right operand");
    let combine = asm.find("bleq\t.boolean_or").expect("canonicalisation");
    assert!(first < second && second < combine);
  }

  #[test]
  fn comparison_result_is_boolean() {
    // `(1 < 2) et Vrai` only type-checks if the comparison is boolean.
    assert!(compile("ecrire((1 < 2) et Vrai);").is_ok());
  }

  #[test]
  fn comparison_works_on_booleans_too() {
    assert!(compile("ecrire(Vrai == Faux);").is_ok());
  }

  #[test]
  fn operand_types_must_agree() {
    let err = compile("ecrire(1 + Vrai);").expect_err("mixed operands");
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
  }

  #[test]
  fn arithmetic_on_booleans_is_unsupported() {
    let err = compile("ecrire(Vrai + Faux);").expect_err("bool arithmetic");
    assert!(matches!(err, CompileError::UnsupportedOperation { .. }));
  }

  #[test]
  fn and_on_integers_is_unsupported() {
    let err = compile("ecrire(1 et 2);").expect_err("integer et");
    assert!(matches!(err, CompileError::UnsupportedOperation { .. }));
  }

  #[test]
  fn condition_must_be_boolean() {
    let err = compile("si (3 + 4) { ecrire(1); }").expect_err("integer condition");
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
  }

  #[test]
  fn unknown_function_is_rejected() {
    let err = compile("foo();").expect_err("unknown callee");
    assert!(matches!(err, CompileError::UnknownSymbol { .. }));
  }

  #[test]
  fn unknown_variable_is_rejected() {
    let err = compile("entier f() { retourner x; } ecrire(f());").expect_err("unknown variable");
    assert!(matches!(err, CompileError::UnknownSymbol { .. }));
  }

  #[test]
  fn return_type_must_match_declaration() {
    let err = compile("entier f() { retourner Vrai; } ecrire(f());").expect_err("bad return");
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
  }

  #[test]
  fn return_at_top_level_is_rejected() {
    let err = compile("retourner 1;").expect_err("top-level return");
    assert!(matches!(err, CompileError::InvalidReturn { .. }));
  }

  #[test]
  fn ecrire_value_cannot_feed_an_operator() {
    let err = compile("ecrire(ecrire(1) + 2);").expect_err("void operand");
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
  }

  #[test]
  fn while_loop_emits_one_back_edge() {
    let asm = assembly("tantque (lire() != 0) { ecrire(1); }");
    assert_eq!(count_lines(&asm, ".e0:"), 1, "one loop-top definition");
    assert_eq!(count_lines(&asm, ".e1:"), 1, "one loop-exit definition");
    let back_edges = asm
      .lines()
      .filter(|line| line.trim_start().starts_with("b\t.e0"))
      .count();
    assert_eq!(back_edges, 1, "one unconditional back edge");
  }

  #[test]
  fn if_branches_converge_on_the_join_label() {
    let asm = assembly("si (Vrai) { ecrire(1); } sinon { ecrire(2); }");
    // Join allocated first, else target second.
    assert_eq!(count_lines(&asm, ".e0:"), 1);
    assert_eq!(count_lines(&asm, ".e1:"), 1);
    let jump_to_join = asm
      .lines()
      .position(|line| line.trim_start().starts_with("b\t.e0"))
      .expect("then branch jumps to join");
    let join_def = asm.lines().position(|line| line.trim() == ".e0:").expect("join");
    let else_def = asm.lines().position(|line| line.trim() == ".e1:").expect("else");
    assert!(jump_to_join < else_def && else_def < join_def);
  }

  #[test]
  fn user_call_drops_its_arguments() {
    let asm = assembly("entier f(entier a, entier b) { retourner a; } ecrire(f(1, 2));");
    assert!(asm.contains("\tbl\t_f"));
    assert!(asm.contains("\tadd\tsp, #8"));
  }

  #[test]
  fn forward_calls_resolve() {
    // `f` calls `g` although `g` is declared after it.
    let source = "entier f() { retourner g(); } entier g() { retourner 1; } ecrire(f());";
    assert!(compile(source).is_ok());
  }

  #[test]
  fn push_pop_balance_over_a_whole_program() {
    let asm = assembly("ecrire(2 + 3 * 4); si (1 < 2) { ecrire(1); }");
    let pushes = asm.matches("\tpush\t").count();
    let pops = asm.matches("\tpop\t").count();
    assert_eq!(pushes, pops);
  }

  #[test]
  fn compilation_is_deterministic() {
    let source = "entier f(entier n) { retourner n * 2; } tantque (lire() != 0) { ecrire(f(3)); }";
    let first = assembly(source);
    let second = assembly(source);
    assert_eq!(first, second);
  }
}
