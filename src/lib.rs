//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the program tree.
//! - `symbols` tracks declared functions, their signatures and the frame
//!   offsets of their variables.
//! - `codegen` checks semantics and lowers the tree into 32-bit ARM
//!   assembly in a single pass.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod symbols;
pub mod tokenizer;
pub mod ty;

pub use codegen::Compilation;
pub use error::{CompileError, CompileResult};

/// Compile Flo source into its assembly listing and symbol table.
pub fn compile(source: &str) -> CompileResult<Compilation> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens, source)?;
  codegen::generate(&program)
}
