use core::ast::{Node, NodeKind};
use core::tokens::TokenKind;

use crate::{check_tok, match_tok, PResult, Parser};

/// The modifier prefix shared by `var`/`const`/`fun`/`class` declarations:
/// `(private|public)? (static|dynamic)? (async)? (var|const|fun|class)`.
#[derive(Debug, Clone, Copy, Default)]
struct Modifiers {
  is_private: bool,
  is_static: bool,
  is_async: bool,
}

impl<'a> Parser<'a> {
  /// ```bnf
  /// DECLARATION ::= MODIFIERS? (VAR_DECL | FUN_DECL | CLASS_DECL) | STATEMENT
  /// ```
  pub(crate) fn parse_declaration(&mut self) -> PResult<Node> {
    let modifiers = self.parse_modifiers()?;

    use TokenKind::*;
    match self.curr().kind {
      VAR_KW | CONST_KW => self.parse_var_decl(modifiers),
      FUN_KW => self.parse_fun_decl(modifiers),
      CLASS_KW => self.parse_class_decl(modifiers),
      _ if modifiers_present(&modifiers) => {
        Err(self.error_at_current("Expected 'var', 'const', 'fun', or 'class' after the declaration modifiers."))
      }
      _ => self.parse_statement(),
    }
  }

  fn parse_modifiers(&mut self) -> PResult<Modifiers> {
    use TokenKind::*;
    let mut modifiers = Modifiers::default();

    if match_tok![self, PRIVATE_KW] {
      modifiers.is_private = true;
    } else if match_tok![self, PUBLIC_KW] {
      modifiers.is_private = false;
    }

    if match_tok![self, STATIC_KW] {
      modifiers.is_static = true;
    } else if match_tok![self, DYNAMIC_KW] {
      modifiers.is_static = false;
    }

    if match_tok![self, ASYNC_KW] {
      modifiers.is_async = true;
    }

    Ok(modifiers)
  }

  /// ```bnf
  /// VAR_DECL ::= ("var" | "const") IDENT ("=" EXPR)? ";"
  /// ```
  fn parse_var_decl(&mut self, modifiers: Modifiers) -> PResult<Node> {
    let node = self.parse_var_decl_body(modifiers)?;
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the variable declaration.")?;
    Ok(node)
  }

  pub(crate) fn parse_var_decl_no_semi(&mut self) -> PResult<Node> {
    self.parse_var_decl_body(Modifiers::default())
  }

  fn parse_var_decl_body(&mut self, modifiers: Modifiers) -> PResult<Node> {
    let kw_tok = self.advance().clone();
    let is_const = kw_tok.kind == TokenKind::CONST_KW;

    let name_tok = self.consume(&TokenKind::IDENTIFIER, "Expected a variable name.")?;

    let value = if match_tok![self, ASSIGN] { Some(Box::new(self.parse_expr()?)) } else { None };

    if is_const && !value.as_ref().map(|v| v.is_const_literal()).unwrap_or(false) {
      return Err(self.error_at_tok(&name_tok, "A 'const' declaration requires a constant-literal initializer."));
    }

    Ok(Node::new(
      kw_tok,
      NodeKind::VarDecl {
        name: name_tok.lexeme,
        value,
        is_const,
        is_static: is_const || modifiers.is_static,
        is_private: modifiers.is_private,
        owner: self.current_owner.clone(),
      },
    ))
  }

  /// ```bnf
  /// FUN_DECL ::= "fun" IDENT PARAMS BLOCK
  /// ```
  fn parse_fun_decl(&mut self, modifiers: Modifiers) -> PResult<Node> {
    let kw_tok = self.advance().clone();
    let name_tok = self.consume(&TokenKind::IDENTIFIER, "Expected a function name.")?;
    let params = self.parse_param_list()?;

    let enclosing_function = self.current_function.replace(crate::FunctionCtx { is_async: modifiers.is_async });
    let enclosing_loop = self.current_loop;
    self.current_loop = false;

    let brace_tok = self.consume(&TokenKind::L_BRACE, "Expected '{' to begin the function body.")?;
    let body = self.parse_block(brace_tok)?;

    self.current_function = enclosing_function;
    self.current_loop = enclosing_loop;

    Ok(Node::new(
      kw_tok,
      NodeKind::FunDecl {
        name: name_tok.lexeme,
        params,
        body: Box::new(body),
        is_async: modifiers.is_async,
        is_generator: false,
        is_static: modifiers.is_static,
        is_private: modifiers.is_private,
        owner: self.current_owner.clone(),
      },
    ))
  }

  /// ```bnf
  /// CLASS_DECL ::= "class" IDENT ("<" IDENT ("," IDENT)*)? "{" DECLARATION* "}"
  /// ```
  fn parse_class_decl(&mut self, modifiers: Modifiers) -> PResult<Node> {
    let kw_tok = self.advance().clone();
    let name_tok = self.consume(&TokenKind::IDENTIFIER, "Expected a class name.")?;

    let mut parents = Vec::new();
    if match_tok![self, LESS] {
      parents.push(self.consume(&TokenKind::IDENTIFIER, "Expected a parent class name.")?.lexeme);
      while match_tok![self, COMMA] {
        parents.push(self.consume(&TokenKind::IDENTIFIER, "Expected a parent class name.")?.lexeme);
      }
    }

    self.consume(&TokenKind::L_BRACE, "Expected '{' to begin the class body.")?;

    let enclosing_owner = std::mem::replace(&mut self.current_owner, name_tok.lexeme.clone());
    let mut body = Vec::new();
    while !check_tok![self, R_BRACE | EOF] {
      body.push(self.parse_declaration()?);
    }
    self.current_owner = enclosing_owner;

    self.consume(&TokenKind::R_BRACE, "Expected '}' to close the class body.")?;

    Ok(Node::new(
      kw_tok,
      NodeKind::ClassDecl {
        name: name_tok.lexeme,
        body,
        parents,
        is_static: modifiers.is_static,
        is_private: modifiers.is_private,
        owner: self.current_owner.clone(),
      },
    ))
  }
}

fn modifiers_present(modifiers: &Modifiers) -> bool {
  modifiers.is_private || modifiers.is_static || modifiers.is_async
}
