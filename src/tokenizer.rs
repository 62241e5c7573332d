//! Lexical analysis: turns raw Flo source into a vector of tokens.
//!
//! The tokenizer is intentionally tiny – it knows nothing about semantics
//! beyond recognising keywords, literals and operators. Multi-character
//! punctuators are matched before single-character ones to avoid
//! ambiguity, and `#` comments run to the end of the line.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Ident,
  Int,
  Bool,
  /// A type name: `entier` or `booleen`.
  Type,
  If,
  Else,
  While,
  Return,
  And,
  Or,
  Not,
  Punct,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  /// Literal payload: the integer value, or 0/1 for `Faux`/`Vrai`.
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
  pub line: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, line: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
      line,
    }
  }
}

fn keyword_kind(text: &str) -> Option<TokenKind> {
  match text {
    "entier" | "booleen" => Some(TokenKind::Type),
    "si" => Some(TokenKind::If),
    "sinon" => Some(TokenKind::Else),
    "tantque" => Some(TokenKind::While),
    "retourner" => Some(TokenKind::Return),
    "et" => Some(TokenKind::And),
    "ou" => Some(TokenKind::Or),
    "non" => Some(TokenKind::Not),
    _ => None,
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;
  let mut line = 1;

  while i < bytes.len() {
    let c = bytes[i];
    if c == b'\n' {
      line += 1;
      i += 1;
      continue;
    }
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if c == b'#' {
      while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
      }
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i64>()
        .map_err(|_| CompileError::UnexpectedToken {
          expected: "a number".to_string(),
          got: text.to_string(),
          line,
        })?;
      tokens.push(Token::new(TokenKind::Int, start, i - start, line, Some(value)));
      continue;
    }

    if c.is_ascii_alphabetic() {
      let start = i;
      i += 1;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let text = &input[start..i];
      let token = match text {
        "Vrai" => Token::new(TokenKind::Bool, start, i - start, line, Some(1)),
        "Faux" => Token::new(TokenKind::Bool, start, i - start, line, Some(0)),
        _ => {
          let kind = keyword_kind(text).unwrap_or(TokenKind::Ident);
          Token::new(kind, start, i - start, line, None)
        }
      };
      tokens.push(token);
      continue;
    }

    if let Some(op) = ["==", "!=", "<=", ">="]
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punct, i, op.len(), line, None));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'+' | b'-' | b'*' | b'/' | b'%' | b'(' | b')' | b';' | b',' | b'{' | b'}' | b'=' | b'<' | b'>'
    ) {
      tokens.push(Token::new(TokenKind::Punct, i, 1, line, None));
      i += 1;
      continue;
    }

    let ch = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::UnexpectedCharacter { ch, line });
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, line, None));
  Ok(tokens)
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .expect("tokenize")
      .iter()
      .map(|t| t.kind)
      .collect()
  }

  #[test]
  fn keywords_and_identifiers() {
    assert_eq!(
      kinds("si sinon tantque retourner et ou non entier booleen toto"),
      vec![
        TokenKind::If,
        TokenKind::Else,
        TokenKind::While,
        TokenKind::Return,
        TokenKind::And,
        TokenKind::Or,
        TokenKind::Not,
        TokenKind::Type,
        TokenKind::Type,
        TokenKind::Ident,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn boolean_literals_carry_values() {
    let tokens = tokenize("Vrai Faux").expect("tokenize");
    assert_eq!(tokens[0].kind, TokenKind::Bool);
    assert_eq!(tokens[0].value, Some(1));
    assert_eq!(tokens[1].value, Some(0));
  }

  #[test]
  fn comments_are_skipped_and_lines_counted() {
    let tokens = tokenize("1 # un commentaire\n2").expect("tokenize");
    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens[1].line, 2);
    assert_eq!(tokens.len(), 3); // 1, 2, EOF
  }

  #[test]
  fn multi_char_operators_win_over_single() {
    let source = "<= < == =";
    let tokens = tokenize(source).expect("tokenize");
    let texts: Vec<&str> = tokens[..4].iter().map(|t| token_text(t, source)).collect();
    assert_eq!(texts, vec!["<=", "<", "==", "="]);
  }

  #[test]
  fn unexpected_character_is_reported_with_line() {
    let err = tokenize("1\n@").expect_err("should fail");
    assert!(matches!(
      err,
      CompileError::UnexpectedCharacter { ch: '@', line: 2 }
    ));
  }
}
