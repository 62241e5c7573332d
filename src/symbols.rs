//! Symbol table and scope management.
//!
//! Functions are stored in an arena vector in registration order and
//! referenced by index; the active scope is an explicit stack of indices,
//! so leaving a function scope is a plain pop. Outside any function the
//! lookup falls back to the implicit top-level scope, which owns no
//! variables. The two builtins (`lire`, `ecrire`) live outside the arena
//! and are consulted as a second tier when a call target is resolved.

use std::collections::HashMap;
use std::fmt;

use crate::error::{CompileError, CompileResult};
use crate::parser::Function;
use crate::ty::{Ty, type_name};

/// Width of one stack slot on the target machine, in bytes.
pub const WORD: i64 = 4;

/// A local variable (today: a parameter) with its frame-pointer offset.
#[derive(Debug, Clone)]
pub struct Variable {
  pub name: String,
  pub ty: Ty,
  pub offset: i64,
}

/// Registered metadata for one program-defined function.
#[derive(Debug, Clone)]
pub struct FunctionEntry {
  pub name: String,
  pub return_type: Ty,
  pub params: Vec<Ty>,
  /// Stack space occupied by the arguments, deallocated by the caller.
  pub footprint: i64,
  pub locals: Vec<Variable>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
  functions: Vec<FunctionEntry>,
  index: HashMap<String, usize>,
  /// Stack of active function indices; empty means top level.
  scopes: Vec<usize>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_builtin(name: &str) -> bool {
    matches!(name, "lire" | "ecrire")
  }

  /// Register a function's signature and lay out its parameters.
  ///
  /// Arguments are pushed left to right by the caller, so with `n`
  /// parameters the first one sits deepest in the frame at `fp + 4n`
  /// and the last at `fp + 4`. Duplicates are rejected, including
  /// clashes with the builtin names.
  pub fn register(&mut self, function: &Function) -> CompileResult<()> {
    if self.index.contains_key(&function.name) || Self::is_builtin(&function.name) {
      return Err(CompileError::DuplicateDeclaration {
        name: function.name.clone(),
        line: function.line,
      });
    }

    let count = function.params.len() as i64;
    let locals: Vec<Variable> = function
      .params
      .iter()
      .enumerate()
      .map(|(i, param)| Variable {
        name: param.name.clone(),
        ty: param.ty,
        offset: WORD * (count - i as i64),
      })
      .collect();

    let entry = FunctionEntry {
      name: function.name.clone(),
      return_type: function.return_type,
      params: function.params.iter().map(|p| p.ty).collect(),
      footprint: WORD * count,
      locals,
    };
    self.index.insert(function.name.clone(), self.functions.len());
    self.functions.push(entry);
    Ok(())
  }

  /// Make `name` the active scope for variable lookups.
  pub fn enter_scope(&mut self, name: &str) {
    let idx = *self
      .index
      .get(name)
      .expect("scope entered for an unregistered function");
    self.scopes.push(idx);
  }

  /// Pop back to the enclosing scope.
  pub fn exit_scope(&mut self) {
    self.scopes.pop();
  }

  /// Name of the enclosing function, if code generation is inside one.
  pub fn current_function(&self) -> Option<&FunctionEntry> {
    self.scopes.last().map(|&idx| &self.functions[idx])
  }

  /// Resolve a variable in the active scope to its type and offset.
  pub fn resolve_variable(&self, name: &str, line: usize) -> CompileResult<(Ty, i64)> {
    if let Some(entry) = self.current_function()
      && let Some(var) = entry.locals.iter().find(|v| v.name == name)
    {
      return Ok((var.ty, var.offset));
    }
    Err(CompileError::UnknownSymbol {
      name: name.to_string(),
      line,
    })
  }

  /// Two-tier call-target lookup: `(is_user_defined, is_builtin)`.
  pub fn resolve_function(&self, name: &str) -> (bool, bool) {
    (self.index.contains_key(name), Self::is_builtin(name))
  }

  /// Declared return type of a resolved call target. `None` means the
  /// callee produces no observable value (`ecrire`). The caller must
  /// have resolved the name first.
  pub fn return_type_of(&self, name: &str) -> Option<Ty> {
    match name {
      "lire" => Some(Ty::Entier),
      "ecrire" => None,
      _ => {
        let idx = *self
          .index
          .get(name)
          .expect("return type queried for an unresolved function");
        Some(self.functions[idx].return_type)
      }
    }
  }

  /// Stack space the caller must release after the callee returns.
  pub fn footprint_of(&self, name: &str) -> i64 {
    let idx = *self
      .index
      .get(name)
      .expect("footprint queried for an unresolved function");
    self.functions[idx].footprint
  }

  /// Verify arity and positional types of a call against the registered
  /// signature. `ecrire` accepts one argument of either primitive type.
  pub fn check_argument_types(
    &self,
    name: &str,
    supplied: &[Option<Ty>],
    line: usize,
  ) -> CompileResult<()> {
    match name {
      "lire" => {
        if supplied.is_empty() {
          return Ok(());
        }
        Err(CompileError::TypeMismatch {
          expected: "lire()".to_string(),
          found: format_signature(name, supplied),
          line,
        })
      }
      "ecrire" => {
        if matches!(supplied, [Some(_)]) {
          return Ok(());
        }
        Err(CompileError::TypeMismatch {
          expected: "ecrire(entier|booleen)".to_string(),
          found: format_signature(name, supplied),
          line,
        })
      }
      _ => {
        let idx = *self
          .index
          .get(name)
          .expect("argument check for an unresolved function");
        let params = &self.functions[idx].params;
        let matches = supplied.len() == params.len()
          && supplied
            .iter()
            .zip(params.iter())
            .all(|(got, want)| *got == Some(*want));
        if matches {
          return Ok(());
        }
        let expected: Vec<String> = params.iter().map(|t| t.to_string()).collect();
        Err(CompileError::TypeMismatch {
          expected: format!("{name}({})", expected.join(", ")),
          found: format_signature(name, supplied),
          line,
        })
      }
    }
  }
}

fn format_signature(name: &str, types: &[Option<Ty>]) -> String {
  let rendered: Vec<String> = types.iter().map(|t| type_name(*t)).collect();
  format!("{name}({})", rendered.join(", "))
}

impl fmt::Display for SymbolTable {
  /// Human-readable dump in registration order, used by `-table` mode.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "--- table des symboles ---")?;
    if self.functions.is_empty() {
      writeln!(f, "(aucune fonction)")?;
      return Ok(());
    }
    writeln!(
      f,
      "{:<20} | {:<8} | {:<20} | {}",
      "fonction", "retour", "parametres", "memoire"
    )?;
    for entry in &self.functions {
      let params: Vec<String> = entry.params.iter().map(|t| t.to_string()).collect();
      writeln!(
        f,
        "{:<20} | {:<8} | {:<20} | {} octets",
        entry.name,
        entry.return_type.to_string(),
        params.join(", "),
        entry.footprint
      )?;
      for var in &entry.locals {
        writeln!(f, "    fp+{:<4} : {} ({})", var.offset, var.name, var.ty)?;
      }
    }
    Ok(())
  }
}
