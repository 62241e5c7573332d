//! Recursive-descent parser producing the Flo syntax tree.
//!
//! The parser mirrors the classic chibicc structure: a precedence-climbing
//! set of expression helpers with a thin statement layer on top, so
//! sequencing lives outside the expression tree. Function definitions come
//! first in a source file, followed by the top-level instructions that form
//! the implicit `main`.

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};
use crate::ty::Ty;

/// Operators recognised by the language. `Not` is the only unary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  And,
  Or,
  Not,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl Op {
  /// The source spelling, used in diagnostics.
  pub fn symbol(&self) -> &'static str {
    match self {
      Op::Add => "+",
      Op::Sub => "-",
      Op::Mul => "*",
      Op::Div => "/",
      Op::Mod => "%",
      Op::And => "et",
      Op::Or => "ou",
      Op::Not => "non",
      Op::Eq => "==",
      Op::Ne => "!=",
      Op::Lt => "<",
      Op::Le => "<=",
      Op::Gt => ">",
      Op::Ge => ">=",
    }
  }

  pub fn is_comparison(&self) -> bool {
    matches!(self, Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge)
  }
}

/// A function invocation, usable both as a statement and as an expression.
#[derive(Debug, Clone)]
pub struct Call {
  pub callee: String,
  pub args: Vec<Expr>,
  pub line: usize,
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone)]
pub enum Expr {
  Call(Call),
  /// Unary operators carry no right operand.
  Binary {
    op: Op,
    lhs: Box<Expr>,
    rhs: Option<Box<Expr>>,
    line: usize,
  },
  Var {
    name: String,
    line: usize,
  },
  Int {
    value: i64,
  },
  Bool {
    value: bool,
  },
}

/// A single instruction. This set is closed: the code generator matches
/// it exhaustively.
#[derive(Debug, Clone)]
pub enum Instr {
  Call(Call),
  While {
    cond: Expr,
    body: Vec<Instr>,
    line: usize,
  },
  If {
    cond: Expr,
    then_branch: Vec<Instr>,
    else_branch: Option<Vec<Instr>>,
    line: usize,
  },
  Return {
    value: Expr,
    line: usize,
  },
}

#[derive(Debug, Clone)]
pub struct Param {
  pub name: String,
  pub ty: Ty,
}

#[derive(Debug, Clone)]
pub struct Function {
  pub name: String,
  pub params: Vec<Param>,
  pub return_type: Ty,
  pub body: Vec<Instr>,
  pub line: usize,
}

/// A whole source file: function definitions followed by the top-level
/// instruction list.
#[derive(Debug, Clone)]
pub struct Program {
  pub functions: Vec<Function>,
  pub instructions: Vec<Instr>,
}

/// Parse a token stream into a [`Program`].
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source);

  let mut functions = Vec::new();
  while matches!(stream.peek().map(|t| t.kind), Some(TokenKind::Type)) {
    functions.push(parse_function(&mut stream)?);
  }

  let mut instructions = Vec::new();
  while !stream.is_eof() {
    instructions.push(parse_instruction(&mut stream)?);
  }

  Ok(Program {
    functions,
    instructions,
  })
}

fn parse_function(stream: &mut TokenStream) -> CompileResult<Function> {
  let line = stream.line();
  let return_type = parse_type(stream)?;
  let name = parse_ident(stream)?;

  stream.skip("(")?;
  let mut params = Vec::new();
  if !stream.equal(")") {
    loop {
      let ty = parse_type(stream)?;
      let param = parse_ident(stream)?;
      params.push(Param { name: param, ty });
      if !stream.equal(",") {
        break;
      }
    }
    stream.skip(")")?;
  }

  let body = parse_block(stream)?;
  Ok(Function {
    name,
    params,
    return_type,
    body,
    line,
  })
}

/// `{ instruction* }`
fn parse_block(stream: &mut TokenStream) -> CompileResult<Vec<Instr>> {
  stream.skip("{")?;
  let mut instructions = Vec::new();
  while !stream.equal("}") {
    if stream.is_eof() {
      return Err(stream.unexpected("\"}\""));
    }
    instructions.push(parse_instruction(stream)?);
  }
  Ok(instructions)
}

fn parse_instruction(stream: &mut TokenStream) -> CompileResult<Instr> {
  let line = stream.line();
  match stream.peek().map(|t| t.kind) {
    Some(TokenKind::While) => {
      stream.advance();
      stream.skip("(")?;
      let cond = parse_expr(stream)?;
      stream.skip(")")?;
      let body = parse_block(stream)?;
      Ok(Instr::While { cond, body, line })
    }
    Some(TokenKind::If) => {
      stream.advance();
      stream.skip("(")?;
      let cond = parse_expr(stream)?;
      stream.skip(")")?;
      let then_branch = parse_block(stream)?;
      let else_branch = if matches!(stream.peek().map(|t| t.kind), Some(TokenKind::Else)) {
        stream.advance();
        Some(parse_block(stream)?)
      } else {
        None
      };
      Ok(Instr::If {
        cond,
        then_branch,
        else_branch,
        line,
      })
    }
    Some(TokenKind::Return) => {
      stream.advance();
      let value = parse_expr(stream)?;
      stream.skip(";")?;
      Ok(Instr::Return { value, line })
    }
    Some(TokenKind::Ident) => {
      let call = parse_call(stream)?;
      stream.skip(";")?;
      Ok(Instr::Call(call))
    }
    _ => Err(stream.unexpected("an instruction")),
  }
}

/// `IDENT '(' args? ')'`
fn parse_call(stream: &mut TokenStream) -> CompileResult<Call> {
  let line = stream.line();
  let callee = parse_ident(stream)?;
  stream.skip("(")?;
  let mut args = Vec::new();
  if !stream.equal(")") {
    loop {
      args.push(parse_expr(stream)?);
      if !stream.equal(",") {
        break;
      }
    }
    stream.skip(")")?;
  }
  Ok(Call { callee, args, line })
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_or(stream)
}

fn parse_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_and(stream)?;

  while matches!(stream.peek().map(|t| t.kind), Some(TokenKind::Or)) {
    let line = stream.line();
    stream.advance();
    let rhs = parse_and(stream)?;
    node = Expr::Binary {
      op: Op::Or,
      lhs: Box::new(node),
      rhs: Some(Box::new(rhs)),
      line,
    };
  }

  Ok(node)
}

fn parse_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_comparison(stream)?;

  while matches!(stream.peek().map(|t| t.kind), Some(TokenKind::And)) {
    let line = stream.line();
    stream.advance();
    let rhs = parse_comparison(stream)?;
    node = Expr::Binary {
      op: Op::And,
      lhs: Box::new(node),
      rhs: Some(Box::new(rhs)),
      line,
    };
  }

  Ok(node)
}

fn parse_comparison(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_add(stream)?;

  loop {
    let op = match stream
      .peek()
      .filter(|token| token.kind == TokenKind::Punct)
      .map(|token| token_text(token, stream.source))
    {
      Some("==") => Op::Eq,
      Some("!=") => Op::Ne,
      Some("<=") => Op::Le,
      Some(">=") => Op::Ge,
      Some("<") => Op::Lt,
      Some(">") => Op::Gt,
      _ => break,
    };

    let line = stream.line();
    stream.advance();
    let rhs = parse_add(stream)?;
    node = Expr::Binary {
      op,
      lhs: Box::new(node),
      rhs: Some(Box::new(rhs)),
      line,
    };
  }

  Ok(node)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_mul(stream)?;

  loop {
    let op = match stream
      .peek()
      .filter(|token| token.kind == TokenKind::Punct)
      .map(|token| token_text(token, stream.source))
    {
      Some("+") => Op::Add,
      Some("-") => Op::Sub,
      _ => break,
    };

    let line = stream.line();
    stream.advance();
    let rhs = parse_mul(stream)?;
    node = Expr::Binary {
      op,
      lhs: Box::new(node),
      rhs: Some(Box::new(rhs)),
      line,
    };
  }

  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_unary(stream)?;

  loop {
    let op = match stream
      .peek()
      .filter(|token| token.kind == TokenKind::Punct)
      .map(|token| token_text(token, stream.source))
    {
      Some("*") => Op::Mul,
      Some("/") => Op::Div,
      Some("%") => Op::Mod,
      _ => break,
    };

    let line = stream.line();
    stream.advance();
    let rhs = parse_unary(stream)?;
    node = Expr::Binary {
      op,
      lhs: Box::new(node),
      rhs: Some(Box::new(rhs)),
      line,
    };
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  if matches!(stream.peek().map(|t| t.kind), Some(TokenKind::Not)) {
    let line = stream.line();
    stream.advance();
    let operand = parse_unary(stream)?;
    return Ok(Expr::Binary {
      op: Op::Not,
      lhs: Box::new(operand),
      rhs: None,
      line,
    });
  }

  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  match stream.peek().map(|t| t.kind) {
    Some(TokenKind::Int) => {
      let value = stream.literal_value()?;
      Ok(Expr::Int { value })
    }
    Some(TokenKind::Bool) => {
      let value = stream.literal_value()?;
      Ok(Expr::Bool { value: value != 0 })
    }
    Some(TokenKind::Ident) => {
      // Lookahead distinguishes a call from a plain variable reference.
      if stream.next_is_punct("(") {
        Ok(Expr::Call(parse_call(stream)?))
      } else {
        let line = stream.line();
        let name = parse_ident(stream)?;
        Ok(Expr::Var { name, line })
      }
    }
    _ => Err(stream.unexpected("an expression")),
  }
}

fn parse_type(stream: &mut TokenStream) -> CompileResult<Ty> {
  let Some(token) = stream.peek() else {
    return Err(stream.unexpected("a type name"));
  };
  if token.kind != TokenKind::Type {
    return Err(stream.unexpected("a type name"));
  }
  let ty = match token_text(token, stream.source) {
    "entier" => Ty::Entier,
    _ => Ty::Booleen,
  };
  stream.advance();
  Ok(ty)
}

fn parse_ident(stream: &mut TokenStream) -> CompileResult<String> {
  let Some(token) = stream.peek() else {
    return Err(stream.unexpected("an identifier"));
  };
  if token.kind != TokenKind::Ident {
    return Err(stream.unexpected("an identifier"));
  }
  let name = token_text(token, stream.source).to_string();
  stream.advance();
  Ok(name)
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser advances `pos` as it
  /// consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn advance(&mut self) {
    self.pos += 1;
  }

  /// Source line of the current token, for diagnostics and AST nodes.
  fn line(&self) -> usize {
    self.peek().map(|t| t.line).unwrap_or(1)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punct
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  /// True when the token after the current one is the given punctuator.
  fn next_is_punct(&self, op: &str) -> bool {
    matches!(
      self.tokens.get(self.pos + 1),
      Some(token)
        if token.kind == TokenKind::Punct && token_text(token, self.source) == op
    )
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.unexpected(&format!("\"{s}\"")))
    }
  }

  /// Consume the current literal token and return its payload.
  fn literal_value(&mut self) -> CompileResult<i64> {
    if let Some(token) = self.peek()
      && let Some(value) = token.value
    {
      self.pos += 1;
      return Ok(value);
    }
    Err(self.unexpected("a literal"))
  }

  fn unexpected(&self, expected: &str) -> CompileError {
    let got = describe_token(self.peek(), self.source);
    CompileError::UnexpectedToken {
      expected: expected.to_string(),
      got,
      line: self.line(),
    }
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }
}
