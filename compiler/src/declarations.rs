use crate::{CResult, Compiler};
use core::ast::{Node, NodeKind, Param};
use core::bytecode::OpCode;
use core::chunk::{ClassConst, ConstValue, FunctionConst, StrModifier};
use core::tokens::Token;

impl<'a> Compiler<'a> {
  pub(crate) fn compile_var_decl(&mut self, node: &Node) -> CResult<()> {
    let (name, value, is_const, is_static, is_private, owner) = match &node.kind {
      NodeKind::VarDecl { name, value, is_const, is_static, is_private, owner } => {
        (name, value, *is_const, *is_static, *is_private, owner)
      }
      _ => unreachable!("compile_var_decl called on a non-VarDecl node"),
    };
    let line = node.token.line;

    if is_const {
      let value_node = value.as_ref().expect("the parser requires a constant-literal initializer for 'const'");
      let const_value = self.literal_to_const(value_node)?;
      let slot = self.add_const(const_value, &node.token)?;
      self.declare_const(name, owner, is_private, slot);
      return Ok(());
    }

    match value {
      Some(v) => self.compile_expr(v)?,
      None => self.chunk.write_op(OpCode::Nil, line),
    }

    if is_static {
      self.declare_static(name, owner, is_private);
    } else {
      let const_slot = self.add_const(ConstValue::Var(name.clone()), &node.token)?;
      self.chunk.write_op(OpCode::DeclareName, line);
      self.chunk.write_u24(const_slot, line);
    }
    Ok(())
  }

  pub(crate) fn compile_fun_decl(&mut self, node: &Node) -> CResult<()> {
    let (name, params, body, is_async, is_generator, is_static, is_private, owner) = match &node.kind {
      NodeKind::FunDecl { name, params, body, is_async, is_generator, is_static, is_private, owner } => {
        (name, params, body, *is_async, *is_generator, *is_static, *is_private, owner)
      }
      _ => unreachable!("compile_fun_decl called on a non-FunDecl node"),
    };
    let line = node.token.line;

    let slot = self.compile_nested_function(name, params, body, is_async, is_generator, false, &node.token)?;
    self.load_const(slot, line);

    if is_static {
      self.declare_static(name, owner, is_private);
    } else {
      let const_slot = self.add_const(ConstValue::Var(name.clone()), &node.token)?;
      self.chunk.write_op(OpCode::DeclareName, line);
      self.chunk.write_u24(const_slot, line);
    }
    Ok(())
  }

  /// Class bodies compile their `fun` members into [`FunctionConst`]
  /// methods. `SPEC_FULL.md §8` leaves field declarations and inheritance
  /// resolution as future work alongside the rest of the class-method
  /// model (no closures, no `self` binding beyond what the VM supplies at
  /// runtime) — non-function members are accepted by the parser but
  /// carry no representation in [`ClassConst`], so they're skipped here
  /// rather than rejected.
  pub(crate) fn compile_class_decl(&mut self, node: &Node) -> CResult<()> {
    let (name, body, parents, is_static, is_private, owner) = match &node.kind {
      NodeKind::ClassDecl { name, body, parents, is_static, is_private, owner } => {
        (name, body, parents, *is_static, *is_private, owner)
      }
      _ => unreachable!("compile_class_decl called on a non-ClassDecl node"),
    };
    let line = node.token.line;

    let mut methods = Vec::new();
    for member in body {
      if let NodeKind::FunDecl { name: mname, params, body: mbody, .. } = &member.kind {
        methods.push(self.compile_function_chunk(mname, params, mbody, &member.token)?);
      }
    }

    let class_const = ClassConst { name: name.clone(), parents: parents.clone(), methods };
    let slot = self.add_const(ConstValue::Class(class_const), &node.token)?;
    self.chunk.write_op(OpCode::MakeClass, line);
    self.chunk.write_u24(slot, line);

    if is_static {
      self.declare_static(name, owner, is_private);
    } else {
      let const_slot = self.add_const(ConstValue::Var(name.clone()), &node.token)?;
      self.chunk.write_op(OpCode::DeclareName, line);
      self.chunk.write_u24(const_slot, line);
    }
    Ok(())
  }

  /// Compiles a function/lambda body in a fresh nested [`Compiler`],
  /// registers the result in the *enclosing* chunk's constant pool, and
  /// returns its slot. `SPEC_FULL.md §8`: no upvalue/closure capture —
  /// each nested body sees only its own parameters and globals resolved
  /// dynamically at call time, same as the top-level chunk.
  pub(crate) fn compile_nested_function(
    &mut self,
    name: &str,
    params: &[Param],
    body: &Node,
    is_async: bool,
    is_generator: bool,
    as_lambda: bool,
    tok: &Token,
  ) -> CResult<u32> {
    let _ = (is_async, is_generator); // execution semantics are a VM concern, out of scope here
    let func_const = self.compile_function_chunk(name, params, body, tok)?;
    let value = if as_lambda { ConstValue::Lambda(func_const) } else { ConstValue::Function(func_const) };
    self.add_const(value, tok)
  }

  fn compile_function_chunk(&mut self, name: &str, params: &[Param], body: &Node, tok: &Token) -> CResult<FunctionConst> {
    let mut nested = Compiler::new(self.filename, true);
    nested.begin_scope();
    for p in params {
      nested.declare_static(&p.name, "", false);
    }

    nested.compile_decl(body)?;

    let needs_implicit_return = !matches!(nested.chunk.code.last().copied(), Some(b) if b == u8::from(OpCode::Return));
    if needs_implicit_return {
      nested.compile_defers(tok.line)?;
      nested.chunk.write_op(OpCode::Nil, tok.line);
      nested.chunk.write_op(OpCode::Return, tok.line);
    }
    nested.end_scope_silent();

    if let Some(first_error) = nested.errors.into_iter().next() {
      return Err(first_error);
    }

    let min_arity = params.iter().filter(|p| p.default.is_none()).count() as u8;
    let max_arity = params.len() as u8;
    Ok(FunctionConst { name: name.to_string(), min_arity, max_arity, chunk: nested.chunk })
  }

  /// Converts a `const`-eligible literal node directly into a pooled
  /// constant, without emitting any bytecode — `const` names never touch
  /// the runtime stack (`spec.md §4.4`).
  fn literal_to_const(&mut self, node: &Node) -> CResult<ConstValue> {
    match &node.kind {
      NodeKind::IntLiteral(lex) => Ok(ConstValue::Number(self.canonical_int(&node.token.kind, lex, &node.token)?)),
      NodeKind::HexLiteral(lex) => Ok(ConstValue::Number(self.canonical_int(&node.token.kind, lex, &node.token)?)),
      NodeKind::OctalLiteral(lex) => Ok(ConstValue::Number(self.canonical_int(&node.token.kind, lex, &node.token)?)),
      NodeKind::BinaryLiteral(lex) => Ok(ConstValue::Number(self.canonical_int(&core::tokens::TokenKind::BINARY, lex, &node.token)?)),
      NodeKind::FloatLiteral(lex) => Ok(ConstValue::Number(lex.replace('_', ""))),
      NodeKind::StringLiteral(s) => Ok(ConstValue::Str { value: s.clone(), modifier: StrModifier::Plain }),
      NodeKind::BoolLiteral(true) => Ok(ConstValue::True),
      NodeKind::BoolLiteral(false) => Ok(ConstValue::False),
      NodeKind::NilLiteral => Ok(ConstValue::Nil),
      NodeKind::NanLiteral => Ok(ConstValue::Nan),
      NodeKind::InfLiteral => Ok(ConstValue::Inf),
      _ => Err(self.error(&node.token, "Not a constant literal.")),
    }
  }
}
