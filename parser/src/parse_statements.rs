use core::ast::{ExceptHandler, Node, NodeKind};
use core::tokens::{Token, TokenKind};

use crate::{check_tok, match_tok, PResult, Parser};

impl<'a> Parser<'a> {
  /// ```bnf
  /// STATEMENT ::= IF | WHILE | FOR | FOREACH | BLOCK | RETURN | BREAK
  ///             | CONTINUE | DEL | ASSERT | RAISE | IMPORT | FROM_IMPORT
  ///             | TRY | DEFER | EXPR_STMT
  /// ```
  pub(crate) fn parse_statement(&mut self) -> PResult<Node> {
    use TokenKind::*;

    match self.curr().kind {
      IF_KW => self.parse_if_stmt(),
      WHILE_KW => self.parse_while_stmt(),
      FOR_KW => self.parse_for_stmt(),
      FOREACH_KW => self.parse_foreach_stmt(),
      L_BRACE => {
        let tok = self.advance().clone();
        self.parse_block(tok)
      }
      RETURN_KW => self.parse_return_stmt(),
      BREAK_KW => self.parse_break_stmt(),
      CONTINUE_KW => self.parse_continue_stmt(),
      DEL_KW => self.parse_del_stmt(),
      ASSERT_KW => self.parse_assert_stmt(),
      RAISE_KW => self.parse_raise_stmt(),
      IMPORT_KW => self.parse_import_stmt(),
      FROM_KW => self.parse_from_import_stmt(),
      TRY_KW => self.parse_try_stmt(),
      DEFER_KW => self.parse_defer_stmt(),
      _ => self.parse_expr_stmt(),
    }
  }

  pub(crate) fn parse_block(&mut self, brace_tok: Token) -> PResult<Node> {
    let mut stmts = Vec::new();
    while !check_tok![self, R_BRACE | EOF] {
      stmts.push(self.parse_declaration()?);
    }
    self.consume(&TokenKind::R_BRACE, "Expected '}' to close the block.")?;
    Ok(Node::new(brace_tok, NodeKind::Block(stmts)))
  }

  fn parse_if_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    let condition = self.parse_expr()?;
    let brace_tok = self.consume(&TokenKind::L_BRACE, "Expected '{' after 'if' condition.")?;
    let then_branch = self.parse_block(brace_tok)?;

    let else_branch = if match_tok![self, ELSE_KW] {
      if self.check(&TokenKind::IF_KW) {
        Some(Box::new(self.parse_if_stmt()?))
      } else {
        let brace_tok = self.consume(&TokenKind::L_BRACE, "Expected '{' after 'else'.")?;
        Some(Box::new(self.parse_block(brace_tok)?))
      }
    } else {
      None
    };

    Ok(Node::new(
      tok,
      NodeKind::If { condition: Box::new(condition), then_branch: Box::new(then_branch), else_branch },
    ))
  }

  fn parse_while_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    let condition = self.parse_expr()?;
    let brace_tok = self.consume(&TokenKind::L_BRACE, "Expected '{' after 'while' condition.")?;

    let enclosing_loop = self.current_loop;
    self.current_loop = true;
    let body = self.parse_block(brace_tok)?;
    self.current_loop = enclosing_loop;

    Ok(Node::new(tok, NodeKind::While { condition: Box::new(condition), body: Box::new(body) }))
  }

  /// Desugars `for (init; cond; incr) { body }` into
  /// `Block[init, While(cond, Block[body, incr])]` — no `for` node
  /// survives past the parser (`spec.md §3`, "C-style for is desugared").
  /// The increment runs after the body on every iteration, C semantics
  /// (`spec.md §9`, resolving the stated source ambiguity).
  fn parse_for_stmt(&mut self) -> PResult<Node> {
    let for_tok = self.advance().clone();
    self.consume(&TokenKind::L_PAREN, "Expected '(' after 'for'.")?;

    let initializer = if match_tok![self, SEMICOLON] {
      None
    } else {
      let decl = self.parse_declaration_no_terminator_check()?;
      Some(decl)
    };

    let condition = if check_tok![self, SEMICOLON] {
      Node::new(self.curr().clone(), NodeKind::BoolLiteral(true))
    } else {
      self.parse_expr()?
    };
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the loop condition.")?;

    let increment = if check_tok![self, R_PAREN] { None } else { Some(self.parse_expr()?) };
    self.consume(&TokenKind::R_PAREN, "Expected ')' after the for-loop clauses.")?;

    let brace_tok = self.consume(&TokenKind::L_BRACE, "Expected '{' to begin the for-loop body.")?;
    let enclosing_loop = self.current_loop;
    self.current_loop = true;
    let body = self.parse_block(brace_tok.clone())?;
    self.current_loop = enclosing_loop;

    let mut loop_block_stmts = vec![body];
    if let Some(incr) = increment {
      let incr_tok = incr.token.clone();
      loop_block_stmts.push(Node::new(incr_tok, NodeKind::ExprStmt(Box::new(incr))));
    }
    let loop_body = Node::new(brace_tok, NodeKind::Block(loop_block_stmts));

    let while_node =
      Node::new(for_tok.clone(), NodeKind::While { condition: Box::new(condition), body: Box::new(loop_body) });

    let mut outer_stmts = Vec::new();
    if let Some(init) = initializer {
      outer_stmts.push(init);
    }
    outer_stmts.push(while_node);

    Ok(Node::new(for_tok, NodeKind::Block(outer_stmts)))
  }

  /// A single declaration/expression-statement used inside a `for`
  /// header, where the trailing `;` is consumed by the `for` grammar
  /// itself rather than by the inner parse.
  fn parse_declaration_no_terminator_check(&mut self) -> PResult<Node> {
    let node = if check_tok![self, VAR_KW | CONST_KW] {
      self.parse_var_decl_no_semi()?
    } else {
      let expr = self.parse_expr()?;
      let tok = expr.token.clone();
      Node::new(tok, NodeKind::ExprStmt(Box::new(expr)))
    };
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the for-loop initializer.")?;
    Ok(node)
  }

  /// ```bnf
  /// FOREACH ::= "foreach" "(" IDENT ":" EXPR ")" BLOCK
  /// ```
  fn parse_foreach_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    self.consume(&TokenKind::L_PAREN, "Expected '(' after 'foreach'.")?;
    let name_tok = self.consume(&TokenKind::IDENTIFIER, "Expected loop variable name.")?;
    self.consume(&TokenKind::COLON, "Expected ':' after the loop variable name.")?;
    let iterable = self.parse_expr()?;
    self.consume(&TokenKind::R_PAREN, "Expected ')' after the 'foreach' header.")?;

    let brace_tok = self.consume(&TokenKind::L_BRACE, "Expected '{' to begin the 'foreach' body.")?;
    let enclosing_loop = self.current_loop;
    self.current_loop = true;
    let body = self.parse_block(brace_tok)?;
    self.current_loop = enclosing_loop;

    Ok(Node::new(tok, NodeKind::ForEach { name: name_tok.lexeme, iterable: Box::new(iterable), body: Box::new(body) }))
  }

  fn parse_return_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    if self.current_function.is_none() {
      return Err(self.error_at_tok(&tok, "'return' is only valid inside a function."));
    }
    let value = if check_tok![self, SEMICOLON] { None } else { Some(Box::new(self.parse_expr()?)) };
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the return statement.")?;
    Ok(Node::new(tok, NodeKind::Return(value)))
  }

  fn parse_break_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    if !self.current_loop {
      return Err(self.error_at_tok(&tok, "'break' is only valid inside a loop."));
    }
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after 'break'.")?;
    Ok(Node::new(tok, NodeKind::Break))
  }

  fn parse_continue_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    if !self.current_loop {
      return Err(self.error_at_tok(&tok, "'continue' is only valid inside a loop."));
    }
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after 'continue'.")?;
    Ok(Node::new(tok, NodeKind::Continue))
  }

  fn parse_del_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    let target = self.parse_expr()?;
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after 'del' target.")?;
    Ok(Node::new(tok, NodeKind::Del(Box::new(target))))
  }

  fn parse_assert_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    let condition = self.parse_expr()?;
    let message = if match_tok![self, COMMA] { Some(Box::new(self.parse_expr()?)) } else { None };
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the assert statement.")?;
    Ok(Node::new(tok, NodeKind::Assert { condition: Box::new(condition), message }))
  }

  fn parse_raise_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    let value = if check_tok![self, SEMICOLON] { None } else { Some(Box::new(self.parse_expr()?)) };
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the raise statement.")?;
    Ok(Node::new(tok, NodeKind::Raise(value)))
  }

  /// ```bnf
  /// IMPORT ::= "import" STRING ";"
  /// ```
  fn parse_import_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    let path_tok = self.consume(&TokenKind::STRING, "Expected a module path string after 'import'.")?;
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the import statement.")?;
    Ok(Node::new(tok, NodeKind::Import { path: path_tok.lexeme }))
  }

  /// ```bnf
  /// FROM_IMPORT ::= "from" IDENT "import" IDENT ("," IDENT)* ";"
  /// ```
  fn parse_from_import_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    let module_tok = self.consume(&TokenKind::IDENTIFIER, "Expected a module name after 'from'.")?;
    self.consume(&TokenKind::IMPORT_KW, "Expected 'import' after the module name.")?;

    let mut names = vec![self.consume(&TokenKind::IDENTIFIER, "Expected an imported name.")?.lexeme];
    while match_tok![self, COMMA] {
      names.push(self.consume(&TokenKind::IDENTIFIER, "Expected an imported name.")?.lexeme);
    }
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the import statement.")?;

    Ok(Node::new(tok, NodeKind::FromImport { module: module_tok.lexeme, names }))
  }

  /// ```bnf
  /// TRY ::= "try" BLOCK ("except" IDENT? ("as" IDENT)? BLOCK)* ("else" BLOCK)? ("finally" BLOCK)?
  /// ```
  fn parse_try_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    let body_brace = self.consume(&TokenKind::L_BRACE, "Expected '{' after 'try'.")?;
    let body = self.parse_block(body_brace)?;

    let mut handlers = Vec::new();
    let mut seen_catch_all = false;

    while match_tok![self, EXCEPT_KW] {
      if seen_catch_all {
        return Err(self.error_at_prev("A catch-all 'except' clause must be the last handler."));
      }

      let exc_type = if check_tok![self, IDENTIFIER] {
        Some(Box::new(self.parse_primary()?))
      } else {
        seen_catch_all = true;
        None
      };

      let alias = if match_tok![self, AS_KW] {
        Some(self.consume(&TokenKind::IDENTIFIER, "Expected an alias name after 'as'.")?.lexeme)
      } else {
        None
      };

      let handler_brace = self.consume(&TokenKind::L_BRACE, "Expected '{' to begin the 'except' body.")?;
      let handler_body = self.parse_block(handler_brace)?;

      handlers.push(ExceptHandler { body: Box::new(handler_body), exc_type, alias });
    }

    let else_branch = if match_tok![self, ELSE_KW] {
      let brace = self.consume(&TokenKind::L_BRACE, "Expected '{' after 'else'.")?;
      Some(Box::new(self.parse_block(brace)?))
    } else {
      None
    };

    let finally = if match_tok![self, FINALLY_KW] {
      let brace = self.consume(&TokenKind::L_BRACE, "Expected '{' after 'finally'.")?;
      Some(Box::new(self.parse_block(brace)?))
    } else {
      None
    };

    Ok(Node::new(tok, NodeKind::Try { body: Box::new(body), handlers, else_branch, finally }))
  }

  fn parse_defer_stmt(&mut self) -> PResult<Node> {
    let tok = self.advance().clone();
    if self.current_function.is_none() {
      return Err(self.error_at_tok(&tok, "'defer' is only valid inside a function."));
    }
    let expr = self.parse_expr()?;
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the deferred expression.")?;
    Ok(Node::new(tok, NodeKind::Defer(Box::new(expr))))
  }

  fn parse_expr_stmt(&mut self) -> PResult<Node> {
    let expr = self.parse_expr()?;
    let tok = expr.token.clone();
    self.consume(&TokenKind::SEMICOLON, "Expected ';' after the expression.")?;
    Ok(Node::new(tok, NodeKind::ExprStmt(Box::new(expr))))
  }
}
