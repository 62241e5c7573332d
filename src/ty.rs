//! The closed set of Flo primitive types.

use std::fmt;

/// A Flo value type. The language only knows whole numbers and booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
  Entier,
  Booleen,
}

impl fmt::Display for Ty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Ty::Entier => write!(f, "entier"),
      Ty::Booleen => write!(f, "booleen"),
    }
  }
}

/// Render an optional type for diagnostics. `None` is the "no value"
/// case: a call to a builtin that produces nothing observable.
pub fn type_name(ty: Option<Ty>) -> String {
  match ty {
    Some(t) => t.to_string(),
    None => "rien".to_string(),
  }
}
