use core::ast::{Node, NodeKind};
use core::tokens::{Token, TokenKind};

use crate::{check_tok, match_tok, PResult, Parser};

impl<'a> Parser<'a> {
  /// ```bnf
  /// EXPRESSION ::= ASSIGNMENT
  /// ```
  pub(crate) fn parse_expr(&mut self) -> PResult<Node> {
    self.parse_assignment()
  }

  /// ```bnf
  /// ASSIGNMENT ::= (CALL "." IDENT | IDENT | LOGICAL_OR) (ASSIGN_OP ASSIGNMENT)?
  /// ASSIGN_OP  ::= "=" | "+=" | "-=" | "*=" | "/=" | "//=" | "%=" | "**="
  ///              | "&=" | "|=" | "^=" | "<<=" | ">>="
  /// ```
  pub(crate) fn parse_assignment(&mut self) -> PResult<Node> {
    let target = self.parse_logical_or()?;

    if self.curr().kind.is_assign() {
      let op_tok = self.advance().clone();
      let value = self.parse_assignment()?;
      return self.build_assignment(target, op_tok, value);
    }

    Ok(target)
  }

  fn build_assignment(&mut self, target: Node, op_tok: Token, value: Node) -> PResult<Node> {
    if matches!(&target.kind, NodeKind::Identifier(_) | NodeKind::Slice { .. }) {
      return Ok(Node::new(
        op_tok.clone(),
        NodeKind::Assignment { target: Box::new(target), op: op_tok.kind, value: Box::new(value) },
      ));
    }

    match target.kind {
      NodeKind::GetItem { object, name } => {
        if op_tok.kind != TokenKind::ASSIGN {
          return Err(self.error_at_tok_owned(&op_tok, "Compound assignment is not supported on a member target."));
        }
        Ok(Node::new(op_tok, NodeKind::SetItem { object, name, value: Box::new(value) }))
      }
      _ => Err(self.error_at_tok_owned(&op_tok, "Invalid assignment target.")),
    }
  }

  fn error_at_tok_owned(&self, tok: &Token, message: &str) -> core::errors::Diagnostic {
    self.error_at_tok(tok, message)
  }

  /// ```bnf
  /// LOGICAL_OR ::= LOGICAL_AND (("||" | "or") LOGICAL_AND)*
  /// ```
  pub(crate) fn parse_logical_or(&mut self) -> PResult<Node> {
    let mut left = self.parse_logical_and()?;
    while match_tok![self, OR_KW] {
      let op = self.prev().clone();
      let right = self.parse_logical_and()?;
      left = Self::binary_node(op, left, right);
    }
    Ok(left)
  }

  /// ```bnf
  /// LOGICAL_AND ::= EQUALITY (("&&" | "and") EQUALITY)*
  /// ```
  pub(crate) fn parse_logical_and(&mut self) -> PResult<Node> {
    let mut left = self.parse_equality()?;
    while match_tok![self, AND_KW] {
      let op = self.prev().clone();
      let right = self.parse_equality()?;
      left = Self::binary_node(op, left, right);
    }
    Ok(left)
  }

  /// ```bnf
  /// EQUALITY ::= COMPARISON (("==" | "!=") COMPARISON)*
  /// ```
  pub(crate) fn parse_equality(&mut self) -> PResult<Node> {
    let mut left = self.parse_comparison()?;
    while match_tok![self, EQ | NOT_EQ] {
      let op = self.prev().clone();
      let right = self.parse_comparison()?;
      left = Self::binary_node(op, left, right);
    }
    Ok(left)
  }

  /// ```bnf
  /// COMPARISON ::= BITWISE_OR (("<" | "<=" | ">" | ">=" | "as" | "is" | "isnot" | "of") BITWISE_OR)*
  /// ```
  pub(crate) fn parse_comparison(&mut self) -> PResult<Node> {
    let mut left = self.parse_bitwise_or()?;
    while match_tok![self, LESS | LESS_EQ | GREATER | GREATER_EQ | AS_KW | IS_KW | ISNOT_KW | OF_KW] {
      let op = self.prev().clone();
      let right = self.parse_bitwise_or()?;
      left = Self::binary_node(op, left, right);
    }
    Ok(left)
  }

  /// ```bnf
  /// BITWISE_OR ::= BITWISE_AND ("|" BITWISE_AND)*
  /// ```
  pub(crate) fn parse_bitwise_or(&mut self) -> PResult<Node> {
    let mut left = self.parse_bitwise_and()?;
    while match_tok![self, PIPE] {
      let op = self.prev().clone();
      let right = self.parse_bitwise_and()?;
      left = Self::binary_node(op, left, right);
    }
    Ok(left)
  }

  /// ```bnf
  /// BITWISE_AND ::= TERM ("&" TERM)*
  /// ```
  pub(crate) fn parse_bitwise_and(&mut self) -> PResult<Node> {
    let mut left = self.parse_term()?;
    while match_tok![self, AMP] {
      let op = self.prev().clone();
      let right = self.parse_term()?;
      left = Self::binary_node(op, left, right);
    }
    Ok(left)
  }

  /// ```bnf
  /// TERM ::= FACTOR (("+" | "-") FACTOR)*
  /// ```
  pub(crate) fn parse_term(&mut self) -> PResult<Node> {
    let mut left = self.parse_factor()?;
    while match_tok![self, PLUS | MINUS] {
      let op = self.prev().clone();
      let right = self.parse_factor()?;
      left = Self::binary_node(op, left, right);
    }
    Ok(left)
  }

  /// ```bnf
  /// FACTOR ::= POW (("*" | "/" | "//" | "%") POW)*
  /// ```
  pub(crate) fn parse_factor(&mut self) -> PResult<Node> {
    let mut left = self.parse_pow()?;
    while match_tok![self, STAR | SLASH | DOUBLE_SLASH | PERCENT] {
      let op = self.prev().clone();
      let right = self.parse_pow()?;
      left = Self::binary_node(op, left, right);
    }
    Ok(left)
  }

  /// Right-associative. `spec.md §4.2` lists `**` under both `factor`
  /// and a dedicated `pow` level; this parser gives it its own
  /// right-recursive level between `factor` and `unary`, which is the
  /// only reading consistent with it being called out as
  /// right-associative (see `DESIGN.md`).
  ///
  /// ```bnf
  /// POW ::= UNARY ("**" POW)?
  /// ```
  pub(crate) fn parse_pow(&mut self) -> PResult<Node> {
    let left = self.parse_unary()?;
    if match_tok![self, DOUBLE_STAR] {
      let op = self.prev().clone();
      let right = self.parse_pow()?;
      return Ok(Self::binary_node(op, left, right));
    }
    Ok(left)
  }

  /// ```bnf
  /// UNARY ::= ("-" | "~" | "!" | "+") UNARY | CALL
  /// ```
  pub(crate) fn parse_unary(&mut self) -> PResult<Node> {
    if match_tok![self, MINUS | TILDE | BANG | PLUS] {
      let op = self.prev().clone();
      let operand = self.parse_unary()?;
      return Ok(Node::new(op.clone(), NodeKind::Unary { operator: op.kind, operand: Box::new(operand) }));
    }
    self.parse_call()
  }

  /// ```bnf
  /// CALL ::= PRIMARY ( "(" ARGS? ")" | "." IDENT | "[" SLICE "]" )*
  /// ```
  pub(crate) fn parse_call(&mut self) -> PResult<Node> {
    let mut expr = self.parse_primary()?;

    loop {
      if match_tok![self, L_PAREN] {
        expr = self.parse_call_expr(expr)?;
      } else if match_tok![self, DOT] {
        expr = self.parse_member_access(expr)?;
      } else if match_tok![self, L_BRACKET] {
        expr = self.parse_slice_expr(expr)?;
      } else {
        break;
      }
    }

    Ok(expr)
  }

  fn parse_member_access(&mut self, object: Node) -> PResult<Node> {
    let tok = self.consume(&TokenKind::IDENTIFIER, "Expected member name after '.'.")?;
    let name = tok.lexeme.clone();
    Ok(Node::new(tok, NodeKind::GetItem { object: Box::new(object), name }))
  }

  /// ```bnf
  /// SLICE ::= EXPR? (":" EXPR? (":" EXPR?)?)?
  /// ```
  fn parse_slice_expr(&mut self, target: Node) -> PResult<Node> {
    let start_tok = self.curr().clone();

    let start = if check_tok![self, COLON | R_BRACKET] { None } else { Some(Box::new(self.parse_expr()?)) };

    let (stop, step) = if match_tok![self, COLON] {
      let stop = if check_tok![self, COLON | R_BRACKET] { None } else { Some(Box::new(self.parse_expr()?)) };
      let step = if match_tok![self, COLON] {
        if check_tok![self, R_BRACKET] { None } else { Some(Box::new(self.parse_expr()?)) }
      } else {
        None
      };
      (stop, step)
    } else {
      (None, None)
    };

    self.consume(&TokenKind::R_BRACKET, "Expected ']' to close the index/slice expression.")?;

    Ok(Node::new(start_tok, NodeKind::Slice { target: Box::new(target), start, stop, step }))
  }

  /// ```bnf
  /// ARGS ::= (IDENT ":=" EXPR | EXPR) ("," (IDENT ":=" EXPR | EXPR))*
  /// ```
  fn parse_call_expr(&mut self, callee: Node) -> PResult<Node> {
    let paren_tok = self.prev().clone();
    let mut positional_args = Vec::new();
    let mut keyword_args: Vec<(String, Node)> = Vec::new();

    if !check_tok![self, R_PAREN] {
      loop {
        if positional_args.len() + keyword_args.len() >= 255 {
          return Err(self.error_at_current("A call cannot take more than 255 arguments."));
        }

        if self.check(&TokenKind::IDENTIFIER) && self.next_tok().kind == TokenKind::COLON {
          let name_tok = self.advance().clone();
          self.advance(); // consume ':'
          let name = name_tok.lexeme.clone();

          if keyword_args.iter().any(|(n, _)| n == &name) {
            return Err(self.error_at_tok(&name_tok, "Duplicate keyword argument name."));
          }

          let value = self.parse_expr()?;
          keyword_args.push((name, value));
        } else {
          if !keyword_args.is_empty() {
            return Err(self.error_at_current("Positional argument cannot follow a keyword argument."));
          }
          positional_args.push(self.parse_expr()?);
        }

        if !match_tok![self, COMMA] {
          break;
        }
      }
    }

    self.consume(&TokenKind::R_PAREN, "Expected ')' after call arguments.")?;

    Ok(Node::new(paren_tok, NodeKind::Call { callee: Box::new(callee), positional_args, keyword_args }))
  }

  fn binary_node(op: Token, left: Node, right: Node) -> Node {
    Node::new(op.clone(), NodeKind::Binary { operator: op.kind, left: Box::new(left), right: Box::new(right) })
  }

  /// ```bnf
  /// PRIMARY ::= LITERAL | IDENT | GROUPING_OR_TUPLE | LIST | SET_OR_DICT
  ///           | LAMBDA | "await" UNARY | "yield" EXPR?
  /// ```
  pub(crate) fn parse_primary(&mut self) -> PResult<Node> {
    use TokenKind::*;

    let tok = self.curr().clone();

    match tok.kind {
      INT => {
        self.advance();
        Ok(Node::new(tok.clone(), NodeKind::IntLiteral(tok.lexeme)))
      }
      FLOAT => {
        self.advance();
        Ok(Node::new(tok.clone(), NodeKind::FloatLiteral(tok.lexeme)))
      }
      HEX => {
        self.advance();
        Ok(Node::new(tok.clone(), NodeKind::HexLiteral(tok.lexeme)))
      }
      OCTAL => {
        self.advance();
        Ok(Node::new(tok.clone(), NodeKind::OctalLiteral(tok.lexeme)))
      }
      BINARY => {
        self.advance();
        Ok(Node::new(tok.clone(), NodeKind::BinaryLiteral(tok.lexeme)))
      }
      STRING => {
        self.advance();
        Ok(Node::new(tok.clone(), NodeKind::StringLiteral(tok.lexeme)))
      }
      TRUE => {
        self.advance();
        Ok(Node::new(tok, NodeKind::BoolLiteral(true)))
      }
      FALSE => {
        self.advance();
        Ok(Node::new(tok, NodeKind::BoolLiteral(false)))
      }
      NIL => {
        self.advance();
        Ok(Node::new(tok, NodeKind::NilLiteral))
      }
      NAN => {
        self.advance();
        Ok(Node::new(tok, NodeKind::NanLiteral))
      }
      INF => {
        self.advance();
        Ok(Node::new(tok, NodeKind::InfLiteral))
      }
      IDENTIFIER => {
        self.advance();
        Ok(Node::new(tok.clone(), NodeKind::Identifier(tok.lexeme)))
      }
      L_PAREN => {
        self.advance();
        self.parse_grouping_or_tuple(tok)
      }
      L_BRACKET => {
        self.advance();
        self.parse_list_literal(tok)
      }
      L_BRACE => {
        self.advance();
        self.parse_set_or_dict_literal(tok)
      }
      LAMBDA_KW => {
        self.advance();
        self.parse_lambda(tok, false)
      }
      ASYNC_KW if self.next_tok().kind == LAMBDA_KW => {
        self.advance();
        self.advance();
        self.parse_lambda(tok, true)
      }
      AWAIT_KW => {
        self.advance();
        if self.current_function.map(|f| f.is_async) != Some(true) {
          return Err(self.error_at_tok(&tok, "'await' is only valid inside an async function."));
        }
        let operand = self.parse_unary()?;
        Ok(Node::new(tok, NodeKind::Await(Box::new(operand))))
      }
      YIELD_KW => {
        self.advance();
        if self.current_function.is_none() {
          return Err(self.error_at_tok(&tok, "'yield' is only valid inside a function."));
        }
        let value = if check_tok![self, SEMICOLON | R_PAREN | R_BRACKET | R_BRACE | COMMA] {
          None
        } else {
          Some(Box::new(self.parse_expr()?))
        };
        Ok(Node::new(tok, NodeKind::Yield(value)))
      }
      _ => Err(self.error_at_current("Expected an expression.")),
    }
  }

}
