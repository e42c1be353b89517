//! AST → AST constant-folding / static-analysis pass (`spec.md §4.3`).
//!
//! Implemented as a single recursive rewrite over the tree, in the same
//! visitor-dispatch shape as the teacher's `Analyzers::symbols` resolver
//! (a flat match on node kind, repointed here at constant folding and
//! numeric normalization instead of symbol resolution).

use core::ast::{ExceptHandler, Node, NodeKind, Param};
use core::errors::{Warning, WarningKind};
use core::tokens::TokenKind;
use core::utils::{decimal, parse_int_from_lexeme_base, parse_int_lexeme};

/// Tuning knobs for a single optimizer pass.
#[derive(Debug, Clone, Copy)]
pub struct Options {
  /// When true, no rewriting happens at all — the AST is returned
  /// unchanged and only warnings are collected (`spec.md §4.3`,
  /// "Optimization is pure w.r.t. the source program").
  pub dry_run: bool,
  /// When true, binary expressions over two integer literals are folded
  /// at compile time. Numeric normalization and grouping unnesting are
  /// unconditional (they're not "optimizations" so much as canonical-form
  /// rewrites the compiler relies on).
  pub fold_constants: bool,
}

impl Default for Options {
  fn default() -> Self {
    Options { dry_run: false, fold_constants: true }
  }
}

/// Runs the optimizer over a parsed top-level program, returning the
/// (possibly rewritten) AST plus any warnings collected along the way.
pub fn optimize(ast: Vec<Node>, filename: &str, options: Options) -> (Vec<Node>, Vec<Warning>) {
  let mut opt = Optimizer { filename, warnings: Vec::new(), options, globals: Vec::new() };
  opt.collect_globals(&ast);

  let out = if options.dry_run {
    for node in &ast {
      opt.scan_warnings(node);
    }
    ast
  } else {
    ast.into_iter().map(|n| opt.visit(n)).collect()
  };

  (out, opt.warnings)
}

struct Optimizer<'a> {
  filename: &'a str,
  warnings: Vec<Warning>,
  options: Options,
  /// Top-level declaration names, used by the `localShadowsGlobal` check.
  globals: Vec<String>,
}

impl<'a> Optimizer<'a> {
  fn collect_globals(&mut self, ast: &[Node]) {
    for node in ast {
      let name = match &node.kind {
        NodeKind::VarDecl { name, .. } => Some(name),
        NodeKind::FunDecl { name, .. } => Some(name),
        NodeKind::ClassDecl { name, .. } => Some(name),
        _ => None,
      };
      if let Some(name) = name {
        self.globals.push(name.clone());
      }
    }
  }

  fn warn(&mut self, kind: WarningKind, node: &Node, message: impl Into<String>) {
    self.warnings.push(Warning {
      kind,
      file: self.filename.to_string(),
      line: node.token.line,
      lexeme: node.token.lexeme.clone(),
      message: message.into(),
    });
  }

  // ---------------------------------------------------------------
  // Dry-run: warnings only, no rewriting.
  // ---------------------------------------------------------------

  fn scan_warnings(&mut self, node: &Node) {
    self.check_node_warnings(node);
    for child in Self::children(node) {
      self.scan_warnings(child);
    }
    if let NodeKind::Block(stmts) = &node.kind {
      self.check_unreachable(stmts);
    }
  }

  fn check_node_warnings(&mut self, node: &Node) {
    match &node.kind {
      NodeKind::Binary { operator, left, right } => {
        if matches!(operator, TokenKind::IS_KW | TokenKind::ISNOT_KW) && (left.is_literal() || right.is_literal()) {
          self.warn(WarningKind::IsWithALiteral, node, "'is'/'isnot' compares identity, not value, with a literal.");
        }
        if matches!(operator, TokenKind::EQ | TokenKind::NOT_EQ) && (is_singleton(left) || is_singleton(right)) {
          self.warn(WarningKind::EqualityWithSingleton, node, "Comparing equality with a singleton literal.");
        }
      }
      NodeKind::VarDecl { name, .. } if self.globals.contains(name) => {
        self.warn(WarningKind::LocalShadowsGlobal, node, format!("Local '{name}' shadows a global of the same name."));
      }
      _ => {}
    }
  }

  fn check_unreachable(&mut self, stmts: &[Node]) {
    let mut terminated_at = None;
    for (i, stmt) in stmts.iter().enumerate() {
      if let Some(_) = terminated_at {
        self.warn(WarningKind::UnreachableCode, stmt, "Unreachable code after a terminating statement.");
      }
      if is_terminating(stmt) {
        terminated_at = Some(i);
      }
    }
  }

  // ---------------------------------------------------------------
  // Rewrite pass.
  // ---------------------------------------------------------------

  fn visit(&mut self, node: Node) -> Node {
    let token = node.token.clone();
    self.check_node_warnings(&node);

    match node.kind {
      NodeKind::IntLiteral(lex) => self.normalize_int(token, &lex, 10),
      NodeKind::HexLiteral(lex) => self.normalize_int(token, &lex, 16),
      NodeKind::OctalLiteral(lex) => self.normalize_int(token, &lex, 8),
      NodeKind::BinaryLiteral(lex) => self.normalize_int(token, &lex, 2),

      NodeKind::Grouping(inner) => self.visit(*inner),

      NodeKind::Unary { operator, operand } => {
        let operand = self.visit(*operand);
        self.fold_unary(token, operator, operand)
      }

      NodeKind::Binary { operator, left, right } => {
        let left = self.visit(*left);
        let right = self.visit(*right);
        self.fold_binary(token, operator, left, right)
      }

      NodeKind::ListLiteral(items) => Node::new(token, NodeKind::ListLiteral(self.visit_all(items))),
      NodeKind::TupleLiteral(items) => Node::new(token, NodeKind::TupleLiteral(self.visit_all(items))),
      NodeKind::SetLiteral(items) => Node::new(token, NodeKind::SetLiteral(self.visit_all(items))),
      NodeKind::DictLiteral { keys, values } => {
        Node::new(token, NodeKind::DictLiteral { keys: self.visit_all(keys), values: self.visit_all(values) })
      }

      NodeKind::Call { callee, positional_args, keyword_args } => Node::new(
        token,
        NodeKind::Call {
          callee: Box::new(self.visit(*callee)),
          positional_args: self.visit_all(positional_args),
          keyword_args: keyword_args.into_iter().map(|(n, v)| (n, self.visit(v))).collect(),
        },
      ),

      NodeKind::GetItem { object, name } => {
        Node::new(token, NodeKind::GetItem { object: Box::new(self.visit(*object)), name })
      }
      NodeKind::SetItem { object, name, value } => Node::new(
        token,
        NodeKind::SetItem { object: Box::new(self.visit(*object)), name, value: Box::new(self.visit(*value)) },
      ),

      NodeKind::Slice { target, start, stop, step } => Node::new(
        token,
        NodeKind::Slice {
          target: Box::new(self.visit(*target)),
          start: start.map(|e| Box::new(self.visit(*e))),
          stop: stop.map(|e| Box::new(self.visit(*e))),
          step: step.map(|e| Box::new(self.visit(*e))),
        },
      ),

      NodeKind::Assignment { target, op, value } => Node::new(
        token,
        NodeKind::Assignment { target: Box::new(self.visit(*target)), op, value: Box::new(self.visit(*value)) },
      ),

      NodeKind::Lambda { params, body, is_generator } => Node::new(
        token,
        NodeKind::Lambda { params: self.visit_params(params), body: Box::new(self.visit(*body)), is_generator },
      ),

      NodeKind::ExprStmt(e) => Node::new(token, NodeKind::ExprStmt(Box::new(self.visit(*e)))),

      NodeKind::If { condition, then_branch, else_branch } => Node::new(
        token,
        NodeKind::If {
          condition: Box::new(self.visit(*condition)),
          then_branch: Box::new(self.visit(*then_branch)),
          else_branch: else_branch.map(|e| Box::new(self.visit(*e))),
        },
      ),

      NodeKind::While { condition, body } => Node::new(
        token,
        NodeKind::While { condition: Box::new(self.visit(*condition)), body: Box::new(self.visit(*body)) },
      ),

      NodeKind::ForEach { name, iterable, body } => Node::new(
        token,
        NodeKind::ForEach { name, iterable: Box::new(self.visit(*iterable)), body: Box::new(self.visit(*body)) },
      ),

      NodeKind::Block(stmts) => {
        let stmts = self.visit_all(stmts);
        self.check_unreachable(&stmts);
        Node::new(token, NodeKind::Block(stmts))
      }

      NodeKind::Return(v) => Node::new(token, NodeKind::Return(v.map(|e| Box::new(self.visit(*e))))),
      NodeKind::Break => Node::new(token, NodeKind::Break),
      NodeKind::Continue => Node::new(token, NodeKind::Continue),
      NodeKind::Del(e) => Node::new(token, NodeKind::Del(Box::new(self.visit(*e)))),

      NodeKind::Assert { condition, message } => Node::new(
        token,
        NodeKind::Assert { condition: Box::new(self.visit(*condition)), message: message.map(|e| Box::new(self.visit(*e))) },
      ),

      NodeKind::Raise(v) => Node::new(token, NodeKind::Raise(v.map(|e| Box::new(self.visit(*e))))),
      NodeKind::Yield(v) => Node::new(token, NodeKind::Yield(v.map(|e| Box::new(self.visit(*e))))),
      NodeKind::Await(e) => Node::new(token, NodeKind::Await(Box::new(self.visit(*e)))),
      NodeKind::Defer(e) => Node::new(token, NodeKind::Defer(Box::new(self.visit(*e)))),

      NodeKind::Try { body, handlers, else_branch, finally } => Node::new(
        token,
        NodeKind::Try {
          body: Box::new(self.visit(*body)),
          handlers: handlers
            .into_iter()
            .map(|h| ExceptHandler {
              body: Box::new(self.visit(*h.body)),
              exc_type: h.exc_type.map(|e| Box::new(self.visit(*e))),
              alias: h.alias,
            })
            .collect(),
          else_branch: else_branch.map(|e| Box::new(self.visit(*e))),
          finally: finally.map(|e| Box::new(self.visit(*e))),
        },
      ),

      NodeKind::VarDecl { name, value, is_const, is_static, is_private, owner } => Node::new(
        token,
        NodeKind::VarDecl {
          name,
          value: value.map(|e| Box::new(self.visit(*e))),
          is_const,
          is_static,
          is_private,
          owner,
        },
      ),

      NodeKind::FunDecl { name, params, body, is_async, is_generator, is_static, is_private, owner } => Node::new(
        token,
        NodeKind::FunDecl {
          name,
          params: self.visit_params(params),
          body: Box::new(self.visit(*body)),
          is_async,
          is_generator,
          is_static,
          is_private,
          owner,
        },
      ),

      NodeKind::ClassDecl { name, body, parents, is_static, is_private, owner } => Node::new(
        token,
        NodeKind::ClassDecl { name, body: self.visit_all(body), parents, is_static, is_private, owner },
      ),

      // Leaves with nothing to rewrite.
      other @ (NodeKind::FloatLiteral(_)
      | NodeKind::StringLiteral(_)
      | NodeKind::BoolLiteral(_)
      | NodeKind::NilLiteral
      | NodeKind::NanLiteral
      | NodeKind::InfLiteral
      | NodeKind::Identifier(_)
      | NodeKind::Import { .. }
      | NodeKind::FromImport { .. }) => Node::new(token, other),
    }
  }

  fn visit_all(&mut self, nodes: Vec<Node>) -> Vec<Node> {
    nodes.into_iter().map(|n| self.visit(n)).collect()
  }

  fn visit_params(&mut self, params: Vec<Param>) -> Vec<Param> {
    params
      .into_iter()
      .map(|p| Param { name: p.name, default: p.default.map(|e| Box::new(self.visit(*e))) })
      .collect()
  }

  /// Parses an integer literal of the given radix into its canonical
  /// decimal lexeme (`spec.md §4.3`, "numeric normalization"). On
  /// overflow, records a `valueOverflow` warning and leaves the original
  /// literal kind untouched so the compiler produces the hard error
  /// (`spec.md §8` scenario 5).
  fn normalize_int(&mut self, token: core::tokens::Token, lexeme: &str, radix: u32) -> Node {
    let parsed = if radix == 10 { parse_int_lexeme(lexeme) } else { parse_int_from_lexeme_base(lexeme, radix) };

    match parsed {
      Ok(n) => {
        let canonical = decimal(n);
        Node::new(token, NodeKind::IntLiteral(canonical))
      }
      Err(_) => {
        let kind = match radix {
          10 => NodeKind::IntLiteral(lexeme.to_string()),
          16 => NodeKind::HexLiteral(lexeme.to_string()),
          8 => NodeKind::OctalLiteral(lexeme.to_string()),
          _ => NodeKind::BinaryLiteral(lexeme.to_string()),
        };
        let node = Node::new(token, kind);
        self.warn(WarningKind::ValueOverflow, &node, "Integer literal is out of range for a 64-bit value.");
        node
      }
    }
  }

  fn fold_unary(&mut self, token: core::tokens::Token, operator: TokenKind, operand: Node) -> Node {
    if self.options.fold_constants && operator == TokenKind::MINUS && operand.is_int_literal() {
      if let NodeKind::IntLiteral(lex) = &operand.kind {
        if let Ok(n) = parse_int_lexeme(lex) {
          match n.checked_neg() {
            Some(neg) => return Node::new(token, NodeKind::IntLiteral(decimal(neg))),
            None => {
              let node = Node::new(token.clone(), NodeKind::Unary { operator, operand: Box::new(operand) });
              self.warn(WarningKind::ValueUnderflow, &node, "Negation underflows a 64-bit integer.");
              return node;
            }
          }
        }
      }
    }
    Node::new(token, NodeKind::Unary { operator, operand: Box::new(operand) })
  }

  /// Folds `left OP right` when both operands are integer literals
  /// (`spec.md §4.3`). `/` always produces a float literal; overflow
  /// cancels the fold and records a warning instead.
  fn fold_binary(&mut self, token: core::tokens::Token, operator: TokenKind, left: Node, right: Node) -> Node {
    let rebuild = |op, l: Node, r: Node| Node::new(token.clone(), NodeKind::Binary { operator: op, left: Box::new(l), right: Box::new(r) });

    if !self.options.fold_constants || !left.is_int_literal() || !right.is_int_literal() {
      return rebuild(operator, left, right);
    }

    let (NodeKind::IntLiteral(lhs_lex), NodeKind::IntLiteral(rhs_lex)) = (&left.kind, &right.kind) else {
      return rebuild(operator, left, right);
    };

    let (Ok(lhs), Ok(rhs)) = (parse_int_lexeme(lhs_lex), parse_int_lexeme(rhs_lex)) else {
      return rebuild(operator, left, right);
    };

    use TokenKind::*;
    let folded: Option<i64> = match operator {
      PLUS => lhs.checked_add(rhs),
      MINUS => lhs.checked_sub(rhs),
      STAR => lhs.checked_mul(rhs),
      DOUBLE_SLASH => (rhs != 0).then(|| lhs.checked_div(rhs)).flatten(),
      DOUBLE_STAR => u32::try_from(rhs).ok().and_then(|p| lhs.checked_pow(p)),
      PERCENT => (rhs != 0).then(|| lhs.checked_rem(rhs)).flatten(),
      CARET => Some(lhs ^ rhs),
      AMP => Some(lhs & rhs),
      PIPE => Some(lhs | rhs),
      SHR => u32::try_from(rhs).ok().map(|s| lhs.wrapping_shr(s)),
      SHL => u32::try_from(rhs).ok().map(|s| lhs.wrapping_shl(s)),
      SLASH => {
        let node = rebuild(operator, left, right);
        if rhs == 0 {
          return node;
        }
        self.warn(WarningKind::ImplicitConversion, &node, "Integer division with '/' implicitly converts to a float.");
        return Node::new(node.token, NodeKind::FloatLiteral(decimal_float(lhs as f64 / rhs as f64)));
      }
      _ => return rebuild(operator, left, right),
    };

    match folded {
      Some(value) => Node::new(token, NodeKind::IntLiteral(decimal(value))),
      None => {
        let node = rebuild(operator, left, right);
        self.warn(WarningKind::ValueOverflow, &node, "Constant-folded expression overflows a 64-bit integer.");
        node
      }
    }
  }

  fn children(node: &Node) -> Vec<&Node> {
    match &node.kind {
      NodeKind::Grouping(e) | NodeKind::Del(e) | NodeKind::Await(e) | NodeKind::Defer(e) => vec![e.as_ref()],
      NodeKind::Unary { operand, .. } => vec![operand.as_ref()],
      NodeKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
      NodeKind::ListLiteral(v) | NodeKind::TupleLiteral(v) | NodeKind::SetLiteral(v) => v.iter().collect(),
      NodeKind::DictLiteral { keys, values } => keys.iter().chain(values.iter()).collect(),
      NodeKind::Call { callee, positional_args, keyword_args } => {
        let mut v = vec![callee.as_ref()];
        v.extend(positional_args.iter());
        v.extend(keyword_args.iter().map(|(_, n)| n));
        v
      }
      NodeKind::GetItem { object, .. } => vec![object.as_ref()],
      NodeKind::SetItem { object, value, .. } => vec![object.as_ref(), value.as_ref()],
      NodeKind::Slice { target, start, stop, step } => {
        let mut v = vec![target.as_ref()];
        v.extend(start.as_deref());
        v.extend(stop.as_deref());
        v.extend(step.as_deref());
        v
      }
      NodeKind::Assignment { target, value, .. } => vec![target.as_ref(), value.as_ref()],
      NodeKind::Lambda { body, .. } => vec![body.as_ref()],
      NodeKind::ExprStmt(e) => vec![e.as_ref()],
      NodeKind::If { condition, then_branch, else_branch } => {
        let mut v = vec![condition.as_ref(), then_branch.as_ref()];
        v.extend(else_branch.as_deref());
        v
      }
      NodeKind::While { condition, body } => vec![condition.as_ref(), body.as_ref()],
      NodeKind::ForEach { iterable, body, .. } => vec![iterable.as_ref(), body.as_ref()],
      NodeKind::Block(stmts) => stmts.iter().collect(),
      NodeKind::Return(v) | NodeKind::Raise(v) | NodeKind::Yield(v) => v.as_deref().into_iter().collect(),
      NodeKind::Assert { condition, message } => {
        let mut v = vec![condition.as_ref()];
        v.extend(message.as_deref());
        v
      }
      NodeKind::Try { body, handlers, else_branch, finally } => {
        let mut v = vec![body.as_ref()];
        v.extend(handlers.iter().map(|h| h.body.as_ref()));
        v.extend(else_branch.as_deref());
        v.extend(finally.as_deref());
        v
      }
      NodeKind::VarDecl { value, .. } => value.as_deref().into_iter().collect(),
      NodeKind::FunDecl { body, .. } => vec![body.as_ref()],
      NodeKind::ClassDecl { body, .. } => body.iter().collect(),
      _ => vec![],
    }
  }
}

fn is_singleton(node: &Node) -> bool {
  matches!(node.kind, NodeKind::NilLiteral | NodeKind::NanLiteral | NodeKind::InfLiteral | NodeKind::BoolLiteral(_))
}

fn is_terminating(node: &Node) -> bool {
  matches!(node.kind, NodeKind::Return(_) | NodeKind::Break | NodeKind::Continue | NodeKind::Raise(_))
}

/// Renders a folded `/` result as a float lexeme, trimming to a
/// reasonably canonical form without claiming more precision than f64
/// actually has.
fn decimal_float(n: f64) -> String {
  if n.fract() == 0.0 && n.is_finite() {
    format!("{n:.1}")
  } else {
    n.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use core::tokens::Token;

  fn int_tok(lexeme: &str, kind: TokenKind) -> Token {
    Token::new(kind, lexeme, 1, (0, lexeme.len()))
  }

  fn leaf(kind: NodeKind, tok: Token) -> Node {
    Node::new(tok, kind)
  }

  #[test]
  fn numeric_normalization_hex_to_decimal() {
    let tok = int_tok("0xFF", TokenKind::HEX);
    let node = leaf(NodeKind::HexLiteral("0xFF".to_string()), tok.clone());
    let (out, warnings) = optimize(vec![Node::new(tok, NodeKind::ExprStmt(Box::new(node)))], "t", Options::default());
    assert!(warnings.is_empty());
    match &out[0].kind {
      NodeKind::ExprStmt(e) => match &e.kind {
        NodeKind::IntLiteral(lex) => assert_eq!(lex, "255"),
        other => panic!("expected IntLiteral(\"255\"), got {other:?}"),
      },
      other => panic!("expected ExprStmt, got {other:?}"),
    }
  }

  #[test]
  fn constant_folding_arithmetic() {
    let tok = int_tok("+", TokenKind::PLUS);
    let left = leaf(NodeKind::IntLiteral("1".to_string()), int_tok("1", TokenKind::INT));
    let right_inner = leaf(NodeKind::IntLiteral("2".to_string()), int_tok("2", TokenKind::INT));
    let right_tok = int_tok("3", TokenKind::INT);
    let right = leaf(
      NodeKind::Binary {
        operator: TokenKind::STAR,
        left: Box::new(right_inner),
        right: Box::new(leaf(NodeKind::IntLiteral("3".to_string()), right_tok)),
      },
      tok.clone(),
    );
    let expr = Node::new(tok, NodeKind::Binary { operator: TokenKind::PLUS, left: Box::new(left), right: Box::new(right) });
    let (out, _) = optimize(vec![expr], "t", Options::default());
    assert_eq!(int_lit(&out[0]), Some("7"));
  }

  #[test]
  fn division_folds_to_float() {
    let tok = int_tok("/", TokenKind::SLASH);
    let left = leaf(NodeKind::IntLiteral("7".to_string()), int_tok("7", TokenKind::INT));
    let right = leaf(NodeKind::IntLiteral("2".to_string()), int_tok("2", TokenKind::INT));
    let expr = Node::new(tok, NodeKind::Binary { operator: TokenKind::SLASH, left: Box::new(left), right: Box::new(right) });
    let (out, warnings) = optimize(vec![expr], "t", Options::default());
    assert!(matches!(out[0].kind, NodeKind::FloatLiteral(_)));
    assert!(warnings.iter().any(|w| w.kind == WarningKind::ImplicitConversion));
  }

  #[test]
  fn overflowing_hex_literal_warns_and_is_left_for_the_compiler() {
    let lex = "0xFFFFFFFFFFFFFFFFF";
    let tok = int_tok(lex, TokenKind::HEX);
    let node = leaf(NodeKind::HexLiteral(lex.to_string()), tok.clone());
    let (out, warnings) = optimize(vec![node], "t", Options::default());
    assert!(warnings.iter().any(|w| w.kind == WarningKind::ValueOverflow));
    assert!(matches!(out[0].kind, NodeKind::HexLiteral(_)));
  }

  #[test]
  fn idempotent_modulo_warnings() {
    let tok = int_tok("+", TokenKind::PLUS);
    let left = leaf(NodeKind::IntLiteral("1".to_string()), int_tok("1", TokenKind::INT));
    let right = leaf(NodeKind::IntLiteral("2".to_string()), int_tok("2", TokenKind::INT));
    let expr = Node::new(tok, NodeKind::Binary { operator: TokenKind::PLUS, left: Box::new(left), right: Box::new(right) });
    let (once, _) = optimize(vec![expr], "t", Options::default());
    let (twice, _) = optimize(once.clone(), "t", Options::default());
    assert_eq!(int_lit(&once[0]), int_lit(&twice[0]));
  }

  #[test]
  fn grouping_unnests() {
    let inner_tok = int_tok("1", TokenKind::INT);
    let inner = leaf(NodeKind::IntLiteral("1".to_string()), inner_tok.clone());
    let group_tok = int_tok("(", TokenKind::L_PAREN);
    let grouped = Node::new(group_tok.clone(), NodeKind::Grouping(Box::new(Node::new(group_tok, NodeKind::Grouping(Box::new(inner))))));
    let (out, _) = optimize(vec![grouped], "t", Options::default());
    assert_eq!(int_lit(&out[0]), Some("1"));
  }

  fn int_lit(node: &Node) -> Option<&str> {
    match &node.kind {
      NodeKind::IntLiteral(lex) => Some(lex.as_str()),
      _ => None,
    }
  }
}
