use crate::{CResult, Compiler};
use core::ast::{Node, NodeKind};
use core::bytecode::OpCode;
use core::chunk::{ConstValue, StrModifier};
use core::tokens::TokenKind;
use core::utils::{parse_int_from_lexeme_base, parse_int_lexeme};

impl<'a> Compiler<'a> {
  /// Compiles `node` as an expression, leaving exactly one value on the
  /// stack when it returns `Ok`.
  pub(crate) fn compile_expr(&mut self, node: &Node) -> CResult<()> {
    let line = node.token.line;

    match &node.kind {
      NodeKind::IntLiteral(lex) | NodeKind::HexLiteral(lex) | NodeKind::OctalLiteral(lex) => {
        let decimal = self.canonical_int(&node.token.kind, lex, &node.token)?;
        let slot = self.add_const(ConstValue::Number(decimal), &node.token)?;
        self.load_const(slot, line);
      }
      NodeKind::BinaryLiteral(lex) => {
        let decimal = self.canonical_int(&TokenKind::BINARY, lex, &node.token)?;
        let slot = self.add_const(ConstValue::Number(decimal), &node.token)?;
        self.load_const(slot, line);
      }
      NodeKind::FloatLiteral(lex) => {
        let slot = self.add_const(ConstValue::Number(lex.replace('_', "")), &node.token)?;
        self.load_const(slot, line);
      }
      NodeKind::StringLiteral(s) => {
        let slot = self.add_const(ConstValue::Str { value: s.clone(), modifier: StrModifier::Plain }, &node.token)?;
        self.load_const(slot, line);
      }
      NodeKind::BoolLiteral(true) => self.chunk.write_op(OpCode::True, line),
      NodeKind::BoolLiteral(false) => self.chunk.write_op(OpCode::False, line),
      NodeKind::NilLiteral => self.chunk.write_op(OpCode::Nil, line),
      NodeKind::NanLiteral => self.chunk.write_op(OpCode::Nan, line),
      NodeKind::InfLiteral => self.chunk.write_op(OpCode::Inf, line),

      NodeKind::Identifier(name) => self.compile_name_load(name, &node.token)?,

      NodeKind::Grouping(inner) => self.compile_expr(inner)?,

      NodeKind::Unary { operator, operand } => {
        self.compile_expr(operand)?;
        let op = match operator {
          TokenKind::MINUS => OpCode::UnaryNegate,
          TokenKind::BANG => OpCode::LogicalNot,
          TokenKind::TILDE => OpCode::UnaryNot,
          _ => return Err(self.error(&node.token, "Unsupported unary operator.")),
        };
        self.chunk.write_op(op, line);
      }

      NodeKind::Binary { operator, left, right } => self.compile_binary(*operator, left, right, &node.token, line)?,

      NodeKind::ListLiteral(items) => self.compile_sequence(items, OpCode::BuildList, &node.token, line)?,
      NodeKind::TupleLiteral(items) => self.compile_sequence(items, OpCode::BuildTuple, &node.token, line)?,
      NodeKind::SetLiteral(items) => self.compile_sequence(items, OpCode::BuildSet, &node.token, line)?,
      NodeKind::DictLiteral { keys, values } => {
        for (k, v) in keys.iter().zip(values.iter()) {
          self.compile_expr(k)?;
          self.compile_expr(v)?;
        }
        self.chunk.write_op(OpCode::BuildDict, line);
        self.chunk.write_u24(keys.len() as u32, line);
      }

      NodeKind::Call { callee, positional_args, keyword_args } => {
        if !keyword_args.is_empty() {
          return Err(self.error(&node.token, "Keyword arguments are not supported by this compiler's call convention."));
        }
        self.compile_expr(callee)?;
        for arg in positional_args {
          self.compile_expr(arg)?;
        }
        self.chunk.write_op(OpCode::Call, line);
        self.chunk.write_u24(positional_args.len() as u32, line);
      }

      NodeKind::GetItem { object, name } => {
        self.compile_expr(object)?;
        let slot = self.add_const(ConstValue::Identifier(name.clone()), &node.token)?;
        self.load_const(slot, line);
        self.chunk.write_op(OpCode::GetItem, line);
      }

      NodeKind::SetItem { object, name, value } => {
        self.compile_expr(value)?;
        self.compile_expr(object)?;
        let slot = self.add_const(ConstValue::Identifier(name.clone()), &node.token)?;
        self.load_const(slot, line);
        self.chunk.write_op(OpCode::SetItem, line);
      }

      NodeKind::Slice { target, start, stop, step } => {
        self.compile_expr(target)?;
        self.compile_slice_part(start, line)?;
        self.compile_slice_part(stop, line)?;
        self.compile_slice_part(step, line)?;
        self.chunk.write_op(OpCode::Slice, line);
      }

      NodeKind::Assignment { target, op, value } => self.compile_assignment(target, *op, value, &node.token, line)?,

      NodeKind::Yield(value) => {
        match value {
          Some(v) => self.compile_expr(v)?,
          None => self.chunk.write_op(OpCode::Nil, line),
        }
        self.chunk.write_op(OpCode::Yield, line);
      }

      NodeKind::Await(inner) => {
        self.compile_expr(inner)?;
        self.chunk.write_op(OpCode::Await, line);
      }

      NodeKind::Lambda { params, body, is_generator } => {
        let slot = self.compile_nested_function("<lambda>", params, body, false, *is_generator, true, &node.token)?;
        self.load_const(slot, line);
      }

      _ => return Err(self.error(&node.token, "This node is not a valid expression in this position.")),
    }

    Ok(())
  }

  fn compile_slice_part(&mut self, part: &Option<Box<Node>>, line: usize) -> CResult<()> {
    match part {
      Some(n) => self.compile_expr(n),
      None => {
        self.chunk.write_op(OpCode::Nil, line);
        Ok(())
      }
    }
  }

  fn compile_sequence(&mut self, items: &[Node], op: OpCode, tok: &core::tokens::Token, line: usize) -> CResult<()> {
    for item in items {
      self.compile_expr(item)?;
    }
    if items.len() > core::chunk::MAX_U24 {
      return Err(self.error(tok, "Too many elements in a single collection literal."));
    }
    self.chunk.write_op(op, line);
    self.chunk.write_u24(items.len() as u32, line);
    Ok(())
  }

  pub(crate) fn canonical_int(&mut self, kind: &TokenKind, lexeme: &str, tok: &core::tokens::Token) -> CResult<String> {
    let value = match kind {
      TokenKind::HEX => parse_int_from_lexeme_base(lexeme, 16),
      TokenKind::OCTAL => parse_int_from_lexeme_base(lexeme, 8),
      TokenKind::BINARY => parse_int_from_lexeme_base(lexeme, 2),
      _ => parse_int_lexeme(lexeme),
    };
    match value {
      Ok(n) => Ok(core::utils::decimal(n)),
      Err(_) => Err(self.error(tok, "Integer literal overflows the compiler's 64-bit constant representation.")),
    }
  }

  fn compile_binary(&mut self, operator: TokenKind, left: &Node, right: &Node, tok: &core::tokens::Token, line: usize) -> CResult<()> {
    match operator {
      TokenKind::AND_KW => {
        self.compile_expr(left)?;
        let short_circuit = self.emit_jump_placeholder(OpCode::LongJumpIfFalse, line);
        self.chunk.write_op(OpCode::Pop, line);
        self.compile_expr(right)?;
        self.patch_jump(short_circuit, OpCode::JumpIfFalse, OpCode::LongJumpIfFalse, tok)?;
        return Ok(());
      }
      TokenKind::OR_KW => {
        self.compile_expr(left)?;
        let short_circuit = self.emit_jump_placeholder(OpCode::LongJumpIfTrue, line);
        self.chunk.write_op(OpCode::Pop, line);
        self.compile_expr(right)?;
        self.patch_jump(short_circuit, OpCode::JumpIfTrue, OpCode::LongJumpIfTrue, tok)?;
        return Ok(());
      }
      _ => {}
    }

    self.compile_expr(left)?;
    self.compile_expr(right)?;

    let op = match operator {
      TokenKind::PLUS => OpCode::BinaryAdd,
      TokenKind::MINUS => OpCode::BinarySub,
      TokenKind::STAR => OpCode::BinaryMul,
      TokenKind::SLASH => OpCode::BinaryDiv,
      TokenKind::DOUBLE_SLASH => OpCode::BinaryFloorDiv,
      TokenKind::DOUBLE_STAR => OpCode::BinaryPow,
      TokenKind::PERCENT => OpCode::BinaryMod,
      TokenKind::SHL => OpCode::BinaryShiftLeft,
      TokenKind::SHR => OpCode::BinaryShiftRight,
      TokenKind::CARET => OpCode::BinaryXor,
      TokenKind::PIPE => OpCode::BinaryOr,
      TokenKind::AMP => OpCode::BinaryAnd,
      TokenKind::EQ => OpCode::EqualTo,
      TokenKind::NOT_EQ => OpCode::NotEqualTo,
      TokenKind::GREATER => OpCode::GreaterThan,
      TokenKind::LESS => OpCode::LessThan,
      TokenKind::GREATER_EQ => OpCode::GreaterOrEqual,
      TokenKind::LESS_EQ => OpCode::LessOrEqual,
      TokenKind::AS_KW => OpCode::BinaryAs,
      TokenKind::IS_KW => OpCode::BinaryIs,
      TokenKind::ISNOT_KW => OpCode::BinaryIsNot,
      TokenKind::OF_KW => OpCode::BinaryOf,
      _ => return Err(self.error(tok, "Unsupported binary operator.")),
    };
    self.chunk.write_op(op, line);
    Ok(())
  }

  /// Resolves `name` as a static slot (`LoadFast`) or, failing that, as a
  /// dynamic name lookup (`LoadName` against an interned identifier
  /// constant), per `spec.md §4.4`'s two-tier resolution model.
  pub(crate) fn compile_name_load(&mut self, name: &str, tok: &core::tokens::Token) -> CResult<()> {
    let line = tok.line;
    if let Some(entry) = self.resolve(name) {
      if let Some(slot) = entry.const_slot {
        self.load_const(slot, line);
        return Ok(());
      }
    }
    if let Some(slot) = self.resolve_slot(name) {
      self.chunk.write_op(OpCode::LoadFast, line);
      self.chunk.write_u24(slot as u32, line);
      return Ok(());
    }
    let const_slot = self.add_const(ConstValue::Identifier(name.to_string()), tok)?;
    self.chunk.write_op(OpCode::LoadName, line);
    self.chunk.write_u24(const_slot, line);
    Ok(())
  }

  fn compile_assignment(&mut self, target: &Node, op: TokenKind, value: &Node, tok: &core::tokens::Token, line: usize) -> CResult<()> {
    if op.is_compound_assign() {
      return self.compile_compound_assignment(target, op, value, tok, line);
    }

    match &target.kind {
      NodeKind::Identifier(name) => {
        self.compile_expr(value)?;
        self.store_name(name, tok, line)?;
      }
      NodeKind::Slice { target: inner, start, stop, step } => {
        self.compile_expr(value)?;
        self.compile_expr(inner)?;
        self.compile_slice_part(start, line)?;
        self.compile_slice_part(stop, line)?;
        self.compile_slice_part(step, line)?;
        self.chunk.write_op(OpCode::SetSlice, line);
      }
      _ => return Err(self.error(tok, "Invalid assignment target.")),
    }
    Ok(())
  }

  /// Desugars `target OP= value` into `target = target OP value`, per
  /// `SPEC_FULL.md §4`'s resolution of the spec's partially-wired
  /// compound-assignment note. Re-evaluates the target's subexpressions a
  /// second time for slice targets — acceptable for a single-pass
  /// compiler with no common-subexpression elimination.
  fn compile_compound_assignment(&mut self, target: &Node, op: TokenKind, value: &Node, tok: &core::tokens::Token, line: usize) -> CResult<()> {
    let binary_op = match op {
      TokenKind::PLUS_EQ => OpCode::BinaryAdd,
      TokenKind::MINUS_EQ => OpCode::BinarySub,
      TokenKind::STAR_EQ => OpCode::BinaryMul,
      TokenKind::SLASH_EQ => OpCode::BinaryDiv,
      TokenKind::DOUBLE_SLASH_EQ => OpCode::BinaryFloorDiv,
      TokenKind::PERCENT_EQ => OpCode::BinaryMod,
      TokenKind::DOUBLE_STAR_EQ => OpCode::BinaryPow,
      TokenKind::AMP_EQ => OpCode::BinaryAnd,
      TokenKind::PIPE_EQ => OpCode::BinaryOr,
      TokenKind::CARET_EQ => OpCode::BinaryXor,
      TokenKind::SHL_EQ => OpCode::BinaryShiftLeft,
      TokenKind::SHR_EQ => OpCode::BinaryShiftRight,
      _ => return Err(self.error(tok, "Unsupported compound assignment operator.")),
    };

    match &target.kind {
      NodeKind::Identifier(name) => {
        self.compile_name_load(name, tok)?;
        self.compile_expr(value)?;
        self.chunk.write_op(binary_op, line);
        self.store_name(name, tok, line)?;
      }
      NodeKind::Slice { target: inner, start, stop, step } => {
        self.compile_expr(inner)?;
        self.compile_slice_part(start, line)?;
        self.compile_slice_part(stop, line)?;
        self.compile_slice_part(step, line)?;
        self.chunk.write_op(OpCode::Slice, line);
        self.compile_expr(value)?;
        self.chunk.write_op(binary_op, line);
        self.compile_expr(inner)?;
        self.compile_slice_part(start, line)?;
        self.compile_slice_part(stop, line)?;
        self.compile_slice_part(step, line)?;
        self.chunk.write_op(OpCode::SetSlice, line);
      }
      _ => return Err(self.error(tok, "Invalid compound assignment target.")),
    }
    Ok(())
  }

  /// Stores the top-of-stack value into `name`, leaving it on the stack
  /// (assignment is itself an expression, per `spec.md §4.2`).
  pub(crate) fn store_name(&mut self, name: &str, tok: &core::tokens::Token, line: usize) -> CResult<()> {
    if let Some(entry) = self.resolve(name) {
      if entry.is_const {
        return Err(self.error(tok, format!("Cannot assign to const name '{name}'.")));
      }
    }
    if let Some(slot) = self.resolve_slot(name) {
      self.chunk.write_op(OpCode::StoreFast, line);
      self.chunk.write_u24(slot as u32, line);
      return Ok(());
    }
    let const_slot = self.add_const(ConstValue::Identifier(name.to_string()), tok)?;
    self.chunk.write_op(OpCode::StoreName, line);
    self.chunk.write_u24(const_slot, line);
    Ok(())
  }
}
