use core::ast::Node;
use core::errors::{Diagnostic, Stage};
use core::tokens::{Token, TokenKind};

mod parse_collections;
mod parse_declarations;
mod parse_expressions;
mod parse_statements;

/// If the current token matches any of the given kinds, consume it and
/// return true; otherwise leave the cursor untouched and return false.
#[macro_export]
macro_rules! match_tok {
  ($s:expr, $id:ident $(| $ids:ident)*) => {
    $s.matches(&core::tokens::TokenKind::$id) $(|| $s.matches(&core::tokens::TokenKind::$ids))*
  };
}

/// True if the current token matches any of the given kinds, without
/// consuming it.
#[macro_export]
macro_rules! check_tok {
  ($s:expr, $id:ident $(| $ids:ident)*) => {
    $s.check(&core::tokens::TokenKind::$id) $(|| $s.check(&core::tokens::TokenKind::$ids))*
  };
}

/// A reference to the current token's kind.
#[macro_export]
macro_rules! curr_tk {
  ($s:ident) => {
    $s.curr().kind
  };
}

pub type PResult<T> = Result<T, Diagnostic>;

/// A function/lambda context the parser is currently nested inside,
/// tracked so `return`/`yield`/`defer`/`await` can be rejected outside
/// one (`spec.md §4.2`).
#[derive(Debug, Clone, Copy)]
struct FunctionCtx {
  is_async: bool,
}

/// Converts a token stream into a sequence of top-level declaration/
/// statement nodes, recovering from syntax errors at statement
/// boundaries so a single pass can surface more than one diagnostic
/// (`spec.md §4.2`, mirroring the lexer's best-effort recovery).
pub fn parse(tokens: &[Token], filename: &str) -> (Vec<Node>, Vec<Diagnostic>) {
  let mut parser = Parser::new(tokens, filename);
  let program = parser.parse_program();
  (program, parser.errors)
}

pub struct Parser<'a> {
  tokens: &'a [Token],
  current: usize,
  filename: &'a str,
  errors: Vec<Diagnostic>,
  is_in_panic: bool,
  current_loop: bool,
  current_function: Option<FunctionCtx>,
  /// Name of the enclosing class while parsing its member declarations,
  /// empty at module scope. Carried onto `VarDecl`/`FunDecl`/`ClassDecl`
  /// as `owner` (`spec.md §3`).
  current_owner: String,
}

impl<'a> Parser<'a> {
  fn new(tokens: &'a [Token], filename: &'a str) -> Self {
    Parser {
      tokens,
      current: 0,
      filename,
      errors: Vec::new(),
      is_in_panic: false,
      current_loop: false,
      current_function: None,
      current_owner: String::new(),
    }
  }

  fn parse_program(&mut self) -> Vec<Node> {
    let mut program = Vec::new();

    while !self.check(&TokenKind::EOF) {
      match self.parse_declaration() {
        Ok(node) => program.push(node),
        Err(diagnostic) => {
          self.errors.push(diagnostic);
          self.synchronize();
        }
      }
    }

    program
  }

  fn prev(&self) -> &Token {
    &self.tokens[self.current - 1]
  }

  fn curr(&self) -> &Token {
    &self.tokens[self.current]
  }

  fn next_tok(&self) -> &Token {
    &self.tokens[(self.current + 1).min(self.tokens.len() - 1)]
  }

  fn check(&self, kind: &TokenKind) -> bool {
    &self.curr().kind == kind
  }

  fn matches(&mut self, kind: &TokenKind) -> bool {
    if self.check(kind) {
      self.advance();
      true
    } else {
      false
    }
  }

  fn advance(&mut self) -> &Token {
    if !self.check(&TokenKind::EOF) {
      self.current += 1;
    }
    self.prev()
  }

  fn consume(&mut self, kind: &TokenKind, message: &str) -> PResult<Token> {
    if self.check(kind) {
      Ok(self.advance().clone())
    } else if *kind == TokenKind::SEMICOLON {
      Err(self.error_at_prev(message))
    } else {
      Err(self.error_at_current(message))
    }
  }

  fn error_at_current(&self, message: impl Into<String>) -> Diagnostic {
    self.error_at_tok(self.curr(), message)
  }

  fn error_at_prev(&self, message: impl Into<String>) -> Diagnostic {
    self.error_at_tok(self.prev(), message)
  }

  fn error_at_tok(&self, tok: &Token, message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(Stage::Parsing, self.filename, tok.line, tok.lexeme.clone(), message.into())
  }

  /// Skips tokens until a plausible statement boundary is reached, so a
  /// single parse error doesn't cascade into a flood of spurious ones.
  fn synchronize(&mut self) {
    self.is_in_panic = false;

    while !self.check(&TokenKind::EOF) {
      if self.prev().kind == TokenKind::SEMICOLON {
        return;
      }

      use TokenKind::*;
      if matches!(
        self.curr().kind,
        CLASS_KW | FUN_KW | VAR_KW | CONST_KW | FOR_KW | IF_KW | WHILE_KW | RETURN_KW | IMPORT_KW
      ) {
        return;
      }

      self.advance();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use core::ast::NodeKind;
  use core::tokens::TokenKind;

  fn parse_src(src: &str) -> Vec<Node> {
    let (tokens, lex_errors) = lexer::lex(src, "test.jpl");
    assert!(lex_errors.is_empty(), "unexpected lex errors: {lex_errors:?}");
    let (ast, errors) = parse(&tokens, "test.jpl");
    assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
    ast
  }

  #[test]
  fn var_decl_without_initializer_defaults_to_none() {
    let ast = parse_src("var x;");
    match &ast[0].kind {
      NodeKind::VarDecl { name, value, is_const, is_static, .. } => {
        assert_eq!(name, "x");
        assert!(value.is_none());
        assert!(!is_const);
        assert!(!is_static);
      }
      other => panic!("expected VarDecl, got {other:?}"),
    }
  }

  #[test]
  fn const_decl_requires_literal_initializer_and_implies_static() {
    let ast = parse_src("const PI = 3;");
    match &ast[0].kind {
      NodeKind::VarDecl { is_const, is_static, value, .. } => {
        assert!(is_const);
        assert!(is_static, "VarDecl.is_const must imply is_static");
        assert!(value.is_some());
      }
      other => panic!("expected VarDecl, got {other:?}"),
    }
  }

  #[test]
  fn arithmetic_precedence_binds_multiplication_tighter_than_addition() {
    let ast = parse_src("1 + 2 * 3;");
    let NodeKind::ExprStmt(expr) = &ast[0].kind else { panic!("expected ExprStmt") };
    match &expr.kind {
      NodeKind::Binary { operator: TokenKind::PLUS, left, right } => {
        assert!(matches!(left.kind, NodeKind::IntLiteral(_)));
        assert!(matches!(right.kind, NodeKind::Binary { operator: TokenKind::STAR, .. }));
      }
      other => panic!("expected top-level '+' binary node, got {other:?}"),
    }
  }

  #[test]
  fn c_style_for_desugars_into_block_with_while() {
    let ast = parse_src("for (var i = 0; i < 10; i += 1) { }");
    match &ast[0].kind {
      NodeKind::Block(stmts) => {
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0].kind, NodeKind::VarDecl { .. }));
        match &stmts[1].kind {
          NodeKind::While { body, .. } => {
            let NodeKind::Block(body_stmts) = &body.kind else { panic!("expected while body Block") };
            assert_eq!(body_stmts.len(), 2, "loop body block should carry the increment as a trailing statement");
          }
          other => panic!("expected While, got {other:?}"),
        }
      }
      other => panic!("expected desugared for-loop Block, got {other:?}"),
    }
  }

  #[test]
  fn break_outside_loop_is_a_parse_error() {
    let (tokens, _) = lexer::lex("break;", "test.jpl");
    let (_, errors) = parse(&tokens, "test.jpl");
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn await_outside_async_function_is_a_parse_error() {
    let (tokens, _) = lexer::lex("fun f() { return await 1; }", "test.jpl");
    let (_, errors) = parse(&tokens, "test.jpl");
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn assignment_target_must_be_identifier_or_slice() {
    let ast = parse_src("a.b = 1;");
    let NodeKind::ExprStmt(expr) = &ast[0].kind else { panic!("expected ExprStmt") };
    assert!(matches!(expr.kind, NodeKind::SetItem { .. }), "dot-assignment should lower to SetItem, not Assignment");
  }
}
