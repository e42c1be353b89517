use core::ast::{Node, NodeKind, Param};
use core::tokens::{Token, TokenKind};

use crate::{check_tok, match_tok, PResult, Parser};

impl<'a> Parser<'a> {
  /// `(expr)` is a grouping; `(expr,)` or `(expr, expr, ...)` is a
  /// tuple; `()` is an empty tuple (`spec.md §4.2`).
  pub(crate) fn parse_grouping_or_tuple(&mut self, paren_tok: Token) -> PResult<Node> {
    if match_tok![self, R_PAREN] {
      return Ok(Node::new(paren_tok, NodeKind::TupleLiteral(Vec::new())));
    }

    let first = self.parse_expr()?;

    if match_tok![self, COMMA] {
      let mut items = vec![first];
      while !check_tok![self, R_PAREN] {
        items.push(self.parse_expr()?);
        if !match_tok![self, COMMA] {
          break;
        }
      }
      self.consume(&TokenKind::R_PAREN, "Expected ')' to close the tuple literal.")?;
      return Ok(Node::new(paren_tok, NodeKind::TupleLiteral(items)));
    }

    self.consume(&TokenKind::R_PAREN, "Expected ')' to close the grouped expression.")?;
    Ok(Node::new(paren_tok, NodeKind::Grouping(Box::new(first))))
  }

  /// ```bnf
  /// LIST ::= "[" (EXPR ("," EXPR)* ","?)? "]"
  /// ```
  pub(crate) fn parse_list_literal(&mut self, bracket_tok: Token) -> PResult<Node> {
    let mut items = Vec::new();
    if !check_tok![self, R_BRACKET] {
      loop {
        items.push(self.parse_expr()?);
        if !match_tok![self, COMMA] || check_tok![self, R_BRACKET] {
          break;
        }
      }
    }
    self.consume(&TokenKind::R_BRACKET, "Expected ']' to close the list literal.")?;
    Ok(Node::new(bracket_tok, NodeKind::ListLiteral(items)))
  }

  /// `{}` is an empty dict. The first member decides whether the rest of
  /// the literal is a set or a dict: a `:` right after the first
  /// expression commits to a dict (`spec.md §4.2`).
  ///
  /// ```bnf
  /// SET_OR_DICT ::= "{" "}" | "{" EXPR ("," EXPR)* ","? "}"
  ///               | "{" EXPR ":" EXPR ("," EXPR ":" EXPR)* ","? "}"
  /// ```
  pub(crate) fn parse_set_or_dict_literal(&mut self, brace_tok: Token) -> PResult<Node> {
    if match_tok![self, R_BRACE] {
      return Ok(Node::new(brace_tok, NodeKind::DictLiteral { keys: Vec::new(), values: Vec::new() }));
    }

    let first = self.parse_expr()?;

    if match_tok![self, COLON] {
      let mut keys = vec![first];
      let mut values = vec![self.parse_expr()?];
      while match_tok![self, COMMA] {
        if check_tok![self, R_BRACE] {
          break;
        }
        keys.push(self.parse_expr()?);
        self.consume(&TokenKind::COLON, "Expected ':' between dict key and value.")?;
        values.push(self.parse_expr()?);
      }
      self.consume(&TokenKind::R_BRACE, "Expected '}' to close the dict literal.")?;
      return Ok(Node::new(brace_tok, NodeKind::DictLiteral { keys, values }));
    }

    let mut items = vec![first];
    while match_tok![self, COMMA] {
      if check_tok![self, R_BRACE] {
        break;
      }
      items.push(self.parse_expr()?);
    }
    self.consume(&TokenKind::R_BRACE, "Expected '}' to close the set literal.")?;
    Ok(Node::new(brace_tok, NodeKind::SetLiteral(items)))
  }

  /// ```bnf
  /// LAMBDA ::= "async"? "lambda" PARAMS (BLOCK | EXPR)
  /// ```
  pub(crate) fn parse_lambda(&mut self, kw_tok: Token, is_async: bool) -> PResult<Node> {
    let params = self.parse_param_list()?;

    let enclosing = self.current_function.replace(crate::FunctionCtx { is_async });
    let body = if match_tok![self, L_BRACE] {
      let brace_tok = self.prev().clone();
      self.parse_block(brace_tok)?
    } else {
      self.parse_expr()?
    };
    self.current_function = enclosing;

    Ok(Node::new(kw_tok, NodeKind::Lambda { params, body: Box::new(body), is_generator: false }))
  }

  /// ```bnf
  /// PARAMS ::= "(" (PARAM ("," PARAM)*)? ")"
  /// PARAM  ::= IDENT ("=" EXPR)?
  /// ```
  pub(crate) fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
    self.consume(&TokenKind::L_PAREN, "Expected '(' to begin the parameter list.")?;

    let mut params = Vec::new();
    let mut seen_default = false;

    if !check_tok![self, R_PAREN] {
      loop {
        if params.len() >= 255 {
          return Err(self.error_at_current("A function cannot take more than 255 parameters."));
        }

        let name_tok = self.consume(&TokenKind::IDENTIFIER, "Expected parameter name.")?;
        let default = if match_tok![self, ASSIGN] {
          seen_default = true;
          Some(Box::new(self.parse_expr()?))
        } else {
          if seen_default {
            return Err(self.error_at_tok(&name_tok, "A non-default parameter cannot follow a default parameter."));
          }
          None
        };

        params.push(Param { name: name_tok.lexeme, default });

        if !match_tok![self, COMMA] {
          break;
        }
      }
    }

    self.consume(&TokenKind::R_PAREN, "Expected ')' to close the parameter list.")?;
    Ok(params)
  }
}
