//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose: one enum covers the
//! lexical, syntactic and semantic failure modes, each message carrying
//! the source line where the defect was found. The first error aborts
//! the whole compilation; there is no recovery or aggregation.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("line {line}: unexpected character '{ch}'"))]
  UnexpectedCharacter { ch: char, line: usize },

  #[snafu(display("line {line}: expected {expected}, but got \"{got}\""))]
  UnexpectedToken {
    expected: String,
    got: String,
    line: usize,
  },

  #[snafu(display("line {line}: function '{name}' is already declared"))]
  DuplicateDeclaration { name: String, line: usize },

  #[snafu(display("line {line}: unknown symbol '{name}'"))]
  UnknownSymbol { name: String, line: usize },

  #[snafu(display("line {line}: type mismatch: expected {expected}, got {found}"))]
  TypeMismatch {
    expected: String,
    found: String,
    line: usize,
  },

  #[snafu(display("line {line}: operator '{op}' is not supported for type {ty}"))]
  UnsupportedOperation {
    op: String,
    ty: String,
    line: usize,
  },

  #[snafu(display("line {line}: unknown builtin function '{name}'"))]
  UnknownBuiltin { name: String, line: usize },

  #[snafu(display("line {line}: 'retourner' is only valid inside a function"))]
  InvalidReturn { line: usize },

  #[snafu(display("line {line}: malformed construct in the syntax tree"))]
  UnsupportedConstruct { line: usize },
}
