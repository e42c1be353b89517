use crate::{CResult, Compiler, LoopCtx};
use core::ast::{Node, NodeKind};
use core::bytecode::OpCode;
use core::chunk::ConstValue;
use core::tokens::Token;

impl<'a> Compiler<'a> {
  /// Top-level dispatch used for every position a declaration can occur
  /// (program body, block body, class body): declarations fall through to
  /// [`Compiler::compile_var_decl`]/[`Compiler::compile_fun_decl`]/
  /// [`Compiler::compile_class_decl`]; everything else is a statement.
  pub(crate) fn compile_decl(&mut self, node: &Node) -> CResult<()> {
    match &node.kind {
      NodeKind::VarDecl { .. } => self.compile_var_decl(node),
      NodeKind::FunDecl { .. } => self.compile_fun_decl(node),
      NodeKind::ClassDecl { .. } => self.compile_class_decl(node),
      _ => self.compile_stmt(node),
    }
  }

  fn compile_stmt(&mut self, node: &Node) -> CResult<()> {
    let line = node.token.line;

    match &node.kind {
      NodeKind::ExprStmt(expr) => {
        self.compile_expr(expr)?;
        self.chunk.write_op(OpCode::Pop, line);
      }

      NodeKind::Block(stmts) => {
        self.begin_scope();
        for stmt in stmts {
          self.compile_decl(stmt)?;
        }
        self.end_scope(line);
      }

      NodeKind::If { condition, then_branch, else_branch } => self.compile_if(condition, then_branch, else_branch.as_deref(), &node.token, line)?,

      NodeKind::While { condition, body } => self.compile_while(condition, body, &node.token, line)?,

      NodeKind::ForEach { name, iterable, body } => self.compile_foreach(name, iterable, body, &node.token, line)?,

      NodeKind::Return(value) => {
        if !self.in_function {
          return Err(self.error(&node.token, "'return' outside of a function body."));
        }
        self.compile_defers(line)?;
        match value {
          Some(v) => self.compile_expr(v)?,
          None => self.chunk.write_op(OpCode::Nil, line),
        }
        self.chunk.write_op(OpCode::Return, line);
      }

      NodeKind::Break => {
        let loop_ctx = self.loops.last().ok_or_else(|| self.error(&node.token, "'break' outside of a loop."))?;
        let pop_count = (self.names.len() - loop_ctx.names_depth) as u32;
        self.emit_pops(pop_count, line);
        let offset = self.emit_jump_placeholder(OpCode::Break, line);
        self.loops.last_mut().unwrap().break_patches.push(offset);
      }

      NodeKind::Continue => {
        let loop_ctx = self.loops.last().ok_or_else(|| self.error(&node.token, "'continue' outside of a loop."))?;
        let pop_count = (self.names.len() - loop_ctx.names_depth) as u32;
        let loop_start = loop_ctx.start;
        self.emit_pops(pop_count, line);
        self.emit_backward_jump(loop_start, OpCode::JumpBackwards, OpCode::LongJumpBackwards, line)?;
      }

      NodeKind::Del(target) => {
        match &target.kind {
          NodeKind::Identifier(name) => {
            if let Some(slot) = self.resolve_slot(name) {
              self.chunk.write_op(OpCode::DeleteFast, line);
              self.chunk.write_u24(slot as u32, line);
            } else {
              let const_slot = self.add_const(ConstValue::Identifier(name.clone()), &node.token)?;
              self.chunk.write_op(OpCode::DeleteName, line);
              self.chunk.write_u24(const_slot, line);
            }
          }
          _ => return Err(self.error(&node.token, "'del' requires a plain name target.")),
        }
      }

      NodeKind::Assert { condition, message } => {
        self.compile_expr(condition)?;
        match message {
          Some(m) => self.compile_expr(m)?,
          None => self.chunk.write_op(OpCode::Nil, line),
        }
        self.chunk.write_op(OpCode::Assert, line);
      }

      NodeKind::Raise(value) => {
        match value {
          Some(v) => {
            self.compile_expr(v)?;
            self.chunk.write_op(OpCode::Raise, line);
          }
          None => self.chunk.write_op(OpCode::ReRaise, line),
        }
      }

      NodeKind::Defer(expr) => {
        if !self.in_function {
          return Err(self.error(&node.token, "'defer' outside of a function body."));
        }
        self.defers.push((**expr).clone());
      }

      NodeKind::Try { body, handlers, else_branch, finally } => self.compile_try(body, handlers, else_branch.as_deref(), finally.as_deref(), line)?,

      // Cross-module linking is out of scope (`SPEC_FULL.md §7`, Non-goals);
      // both forms are accepted by the parser but compile to nothing.
      NodeKind::Import { .. } | NodeKind::FromImport { .. } => {}

      _ => {
        // Bare expression-shaped nodes (Yield/Await used outside an
        // ExprStmt wrapper never reach this arm from the parser, but
        // guard against it rather than panicking).
        self.compile_expr(node)?;
        self.chunk.write_op(OpCode::Pop, line);
      }
    }

    Ok(())
  }

  fn compile_if(&mut self, condition: &Node, then_branch: &Node, else_branch: Option<&Node>, tok: &Token, line: usize) -> CResult<()> {
    self.compile_expr(condition)?;
    let jmp_else = self.emit_jump_placeholder(OpCode::LongJumpIfFalsePop, line);
    self.compile_decl(then_branch)?;

    if let Some(else_branch) = else_branch {
      let mut jmp_end = self.emit_jump_placeholder(OpCode::LongJumpForwards, line);
      // `jmp_else`'s target is exactly here: right after `jmp_end`'s bytes,
      // before the else branch. `jmp_end` already physically exists in the
      // chunk (unpatched) at this point, so if patching `jmp_else` now
      // downgrades it and shrinks the chunk, `jmp_end`'s recorded offset
      // must shift down by one to stay valid for its own patch below.
      if let Some(shrink_pos) = self.patch_jump(jmp_else, OpCode::JumpIfFalsePop, OpCode::LongJumpIfFalsePop, tok)? {
        if jmp_end > shrink_pos {
          jmp_end -= 1;
        }
      }
      self.compile_decl(else_branch)?;
      self.patch_jump(jmp_end, OpCode::JumpForwards, OpCode::LongJumpForwards, tok)?;
    } else {
      self.patch_jump(jmp_else, OpCode::JumpIfFalsePop, OpCode::LongJumpIfFalsePop, tok)?;
    }
    Ok(())
  }

  fn compile_while(&mut self, condition: &Node, body: &Node, tok: &Token, line: usize) -> CResult<()> {
    let loop_start = self.chunk.len();
    self.compile_expr(condition)?;
    let exit_patch = self.emit_jump_placeholder(OpCode::LongJumpIfFalsePop, line);

    self.loops.push(LoopCtx { start: loop_start, break_patches: Vec::new(), names_depth: self.names.len() });
    self.compile_decl(body)?;
    let loop_ctx = self.loops.pop().unwrap();

    self.emit_backward_jump(loop_start, OpCode::JumpBackwards, OpCode::LongJumpBackwards, line)?;

    // `break` is always an unconditional jump clear of the loop; only the
    // condition-exit placeholder means "pop the false condition and jump".
    let mut pending: Vec<(usize, OpCode, OpCode)> =
      loop_ctx.break_patches.into_iter().map(|offset| (offset, OpCode::JumpForwards, OpCode::LongJumpForwards)).collect();
    pending.push((exit_patch, OpCode::JumpIfFalsePop, OpCode::LongJumpIfFalsePop));
    self.patch_pending(pending, tok)?;
    Ok(())
  }

  /// Compiles `foreach (name: iterable) { body }` using a hidden iterator
  /// slot pushed by `MakeIter` and advanced each iteration by
  /// `ForIterNextOrJump`, which pushes the next element or jumps past the
  /// loop on exhaustion — grounded in the teacher's real VM's
  /// `MakeIter`/`ForIterNextOrJump` pair (see DESIGN.md; `spec.md §4.4`'s
  /// opcode table has no iteration primitive of its own).
  fn compile_foreach(&mut self, name: &str, iterable: &Node, body: &Node, tok: &Token, line: usize) -> CResult<()> {
    self.compile_expr(iterable)?;
    self.chunk.write_op(OpCode::MakeIter, line);

    self.begin_scope();
    let names_depth = self.names.len();
    let loop_start = self.chunk.len();
    let exit_patch = self.emit_jump_placeholder(OpCode::LongForIterNextOrJump, line);
    self.declare_static(name, "", false);

    self.loops.push(LoopCtx { start: loop_start, break_patches: Vec::new(), names_depth });
    self.compile_decl(body)?;
    let loop_ctx = self.loops.pop().unwrap();

    self.emit_backward_jump(loop_start, OpCode::JumpBackwards, OpCode::LongJumpBackwards, line)?;

    // Same split as `compile_while`: `break` jumps clear of the loop
    // unconditionally, while the placeholder left at `loop_start` means
    // "advance the iterator, or jump here if it's exhausted".
    let mut pending: Vec<(usize, OpCode, OpCode)> =
      loop_ctx.break_patches.into_iter().map(|offset| (offset, OpCode::JumpForwards, OpCode::LongJumpForwards)).collect();
    pending.push((exit_patch, OpCode::ForIterNextOrJump, OpCode::LongForIterNextOrJump));
    self.patch_pending(pending, tok)?;

    // Both the exhausted-iterator exit and every `break` land here with
    // the loop variable already off the stack — `break` popped it
    // explicitly above, and the exhaustion path never pushed it in the
    // first place (`ForIterNextOrJump` only pushes a value when it
    // doesn't jump). Only the hidden iterator underneath remains.
    self.end_scope_silent();
    self.chunk.write_op(OpCode::Pop, line);
    Ok(())
  }

  fn compile_try(&mut self, body: &Node, handlers: &[core::ast::ExceptHandler], else_branch: Option<&Node>, finally: Option<&Node>, line: usize) -> CResult<()> {
    self.chunk.write_op(OpCode::BeginTry, line);
    self.compile_decl(body)?;
    self.chunk.write_op(OpCode::FinishTry, line);

    for handler in handlers {
      self.begin_scope();
      if let Some(exc_type) = &handler.exc_type {
        self.compile_expr(exc_type)?;
        self.chunk.write_op(OpCode::Pop, line);
      }
      if let Some(alias) = &handler.alias {
        self.declare_static(alias, "", false);
        self.chunk.write_op(OpCode::Nil, line);
      }
      self.compile_decl(&handler.body)?;
      self.end_scope(line);
    }

    if let Some(else_branch) = else_branch {
      self.compile_decl(else_branch)?;
    }
    if let Some(finally) = finally {
      self.compile_decl(finally)?;
    }
    Ok(())
  }

  /// Emits the compiled deferred expressions registered by `defer` in
  /// this function, in declaration order, immediately before any `return`
  /// or the implicit function-end return.
  pub(crate) fn compile_defers(&mut self, line: usize) -> CResult<()> {
    let defers = self.defers.clone();
    for expr in &defers {
      self.compile_expr(expr)?;
      self.chunk.write_op(OpCode::Pop, line);
    }
    Ok(())
  }
}
