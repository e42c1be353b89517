//! AST → [`Chunk`] single-pass bytecode compiler (`spec.md §4.4`).
//!
//! Mirrors the teacher's `Compiler` crate's shape (a struct wrapping the
//! current chunk plus an `emit_*` helper family) but compiles this
//! pipeline's flat `NodeKind` tree directly via a `match`, rather than the
//! teacher's `ASTVisitor` trait over an arena — the closed tagged union
//! design note in `spec.md §9` calls for flat dispatch, not virtual
//! methods, and there is no arena here to visit.

mod declarations;
mod expressions;
mod statements;

use core::ast::Node;
use core::bytecode::OpCode;
use core::chunk::{Chunk, ConstValue};
use core::errors::{Diagnostic, Stage};
use core::tokens::Token;

pub type CResult<T> = Result<T, Diagnostic>;

/// A single entry in the compiler's flat name table. `spec.md §4.4`:
/// "a vector `names` holds entries `{ identifier, owner, depth,
/// is_private, is_const }`... A local's runtime stack slot equals its
/// index in `names`."
#[derive(Debug, Clone)]
struct NameEntry {
  name: String,
  #[allow(dead_code)] // carried for parity with `spec.md §3`'s owner field; not consulted by this compiler
  owner: String,
  depth: i32,
  #[allow(dead_code)]
  is_private: bool,
  is_const: bool,
  /// Index into `Chunk::consts` holding the literal value, for `const`
  /// names — they never occupy a runtime stack slot (`spec.md §4.4`:
  /// "const names are re-emitted as LoadConstant of their literal").
  const_slot: Option<u32>,
}

/// The loop context tracked while compiling a `while`/desugared `for`/
/// `foreach` body, so `break` can be patched once the loop's end is known.
struct LoopCtx {
  start: usize,
  /// Offsets of `OpCode::Break` placeholders emitted inside this loop.
  break_patches: Vec<usize>,
  /// Depth of `names` on loop entry, so `continue`/`break` know how many
  /// locals to pop before jumping back to the condition/iterator check.
  names_depth: usize,
}

/// One pipeline compilation unit: the top-level program, or a single
/// function/lambda body. Nested function bodies get their own
/// `Compiler` with a fresh `names`/`chunk` pair (`SPEC_FULL.md §8`).
pub struct Compiler<'a> {
  filename: &'a str,
  chunk: Chunk,
  names: Vec<NameEntry>,
  scope_depth: i32,
  loops: Vec<LoopCtx>,
  /// Whether the enclosing declaration context is a function body (so
  /// `defer` has somewhere to splice its epilogue and `return` has an
  /// exit path to join). `None` at top level.
  in_function: bool,
  /// Deferred expressions registered by `defer` in the current function,
  /// compiled once and spliced onto every exit path in declaration order.
  defers: Vec<Node>,
  errors: Vec<Diagnostic>,
}

/// Compiles a parsed (and optimized) top-level program into a finished
/// [`Chunk`]. `spec.md §4.4`: "Processes top-level declarations in
/// order, finishes with an implicit `Return` opcode (unless the program
/// is empty), and verifies scope-depth balance on exit."
pub fn compile(ast: Vec<Node>, filename: &str) -> Result<Chunk, Vec<Diagnostic>> {
  let mut compiler = Compiler::new(filename, false);
  compiler.compile_program(ast);

  if compiler.errors.is_empty() {
    Ok(compiler.chunk)
  } else {
    Err(compiler.errors)
  }
}

impl<'a> Compiler<'a> {
  fn new(filename: &'a str, in_function: bool) -> Self {
    Compiler {
      filename,
      chunk: Chunk::new(true),
      names: Vec::new(),
      scope_depth: -1,
      loops: Vec::new(),
      in_function,
      defers: Vec::new(),
      errors: Vec::new(),
    }
  }

  fn compile_program(&mut self, ast: Vec<Node>) {
    let program_is_empty = ast.is_empty();
    self.begin_scope();

    for node in ast {
      if let Err(diag) = self.compile_decl(&node) {
        self.errors.push(diag);
      }
    }

    // `spec.md §8`'s empty-program scenario: an empty source compiles to
    // a chunk with no code at all, not even the implicit trailing Return.
    if !program_is_empty {
      let exit_line = self.chunk.lines.runs().last().map(|r| r.line as usize).unwrap_or(1);
      self.chunk.write_op(OpCode::Return, exit_line);
    }

    self.end_scope_silent();
  }

  // -------------------------------------------------------------
  // Scope management
  // -------------------------------------------------------------

  fn begin_scope(&mut self) {
    self.scope_depth += 1;
  }

  /// Truncates `names` down to the enclosing depth, emitting `PopN` for
  /// however many stack slots the exiting scope owned (constants don't
  /// occupy a slot and are not counted).
  fn end_scope(&mut self, line: usize) {
    let popped = self.truncate_names_to_enclosing_depth();
    self.emit_pops(popped, line);
  }

  /// Same bookkeeping as [`Self::end_scope`] but emits no bytecode —
  /// for the outermost scope of a program or function body, whose exit
  /// always follows a `Return` (or, for an empty program, follows
  /// nothing at all): any cleanup code there would be unreachable.
  fn end_scope_silent(&mut self) {
    self.truncate_names_to_enclosing_depth();
  }

  fn truncate_names_to_enclosing_depth(&mut self) -> u32 {
    let mut popped = 0u32;
    while let Some(last) = self.names.last() {
      if last.depth < self.scope_depth {
        break;
      }
      if last.const_slot.is_none() {
        popped += 1;
      }
      self.names.pop();
    }
    self.scope_depth -= 1;
    popped
  }

  fn emit_pops(&mut self, count: u32, line: usize) {
    match count {
      0 => {}
      1 => self.chunk.write_op(OpCode::Pop, line),
      n => {
        self.chunk.write_op(OpCode::PopN, line);
        self.chunk.write_u24(n, line);
      }
    }
  }

  // -------------------------------------------------------------
  // Name resolution
  // -------------------------------------------------------------

  /// Registers a freshly-declared static (non-const) name, returning its
  /// stack slot. The caller is responsible for having already compiled
  /// the initializer expression onto the stack (or pushed `Nil` for an
  /// uninitialized `var`), since the slot equals the name's position.
  fn declare_static(&mut self, name: &str, owner: &str, is_private: bool) -> usize {
    self.names.push(NameEntry {
      name: name.to_string(),
      owner: owner.to_string(),
      depth: self.scope_depth,
      is_private,
      is_const: false,
      const_slot: None,
    });
    self.names.len() - 1
  }

  fn declare_const(&mut self, name: &str, owner: &str, is_private: bool, const_slot: u32) {
    self.names.push(NameEntry {
      name: name.to_string(),
      owner: owner.to_string(),
      depth: self.scope_depth,
      is_private,
      is_const: true,
      const_slot: Some(const_slot),
    });
  }

  /// Scans `names` from the tail so inner shadowing wins, per `spec.md
  /// §4.4`: "Lookup scans from the tail for a matching lexeme."
  fn resolve(&self, name: &str) -> Option<&NameEntry> {
    self.names.iter().rev().find(|e| e.name == name)
  }

  fn resolve_slot(&self, name: &str) -> Option<usize> {
    self.names.iter().rposition(|e| e.name == name && e.const_slot.is_none())
  }

  // -------------------------------------------------------------
  // Constant helpers
  // -------------------------------------------------------------

  fn add_const(&mut self, value: ConstValue, tok: &Token) -> CResult<u32> {
    self.chunk.add_constant(value).ok_or_else(|| self.error(tok, "Too many constants in one chunk."))
  }

  fn load_const(&mut self, slot: u32, line: usize) {
    self.chunk.write_op(OpCode::LoadConstant, line);
    self.chunk.write_u24(slot, line);
  }

  // -------------------------------------------------------------
  // Jump helpers (`spec.md §4.4`, "Jump patching")
  // -------------------------------------------------------------

  /// Writes a long-family jump opcode plus a 3-byte placeholder, and
  /// returns the offset of the opcode byte so [`Self::patch_jump`] can
  /// find and possibly shrink it later.
  fn emit_jump_placeholder(&mut self, long_op: OpCode, line: usize) -> usize {
    let offset = self.chunk.len();
    self.chunk.write_op(long_op, line);
    self.chunk.write_u24(0xFF_FFFF, line);
    offset
  }

  /// Patches a placeholder emitted by [`Self::emit_jump_placeholder`] with
  /// the distance to the current end of the chunk, downgrading to
  /// `short_op` when the distance fits in 16 bits, or rewriting the
  /// placeholder's opcode byte to `long_op` otherwise (the placeholder
  /// opcode written at emission time — e.g. `OpCode::Break` — is not
  /// necessarily the long opcode this jump means; only the patch knows
  /// which long/short pair applies). Returns the byte position removed by
  /// the downgrade, if any, so a caller juggling more than one pending
  /// offset into the same stretch of code can shift its other bookkeeping
  /// down by one.
  fn patch_jump(&mut self, offset: usize, short_op: OpCode, long_op: OpCode, tok: &Token) -> CResult<Option<usize>> {
    let long_end = offset + 4; // 1 opcode byte + 3 operand bytes
    let distance = self.chunk.len() - long_end;

    if distance > core::chunk::MAX_U24 {
      return Err(self.error(tok, "Jump distance exceeds the maximum encodable offset."));
    }

    if distance <= u16::MAX as usize {
      self.chunk.patch_byte(offset, short_op.into());
      self.chunk.patch_u16(offset + 1, distance as u16);
      self.chunk.shrink_at(offset + 3);
      Ok(Some(offset + 3))
    } else {
      self.chunk.patch_byte(offset, long_op.into());
      self.chunk.patch_u24(offset + 1, distance as u32);
      Ok(None)
    }
  }

  /// Patches a batch of placeholders that all target the current end of
  /// the chunk (a loop's shared exit point: the forward-exit check plus
  /// every `break` inside it). Each offset carries its own `(short_op,
  /// long_op)` pair since a loop's exit jump and its `break`s don't mean
  /// the same thing — the exit is still conditional/iterator-testing,
  /// while `break` is always an unconditional jump past the loop.
  /// Processing from the highest offset down means each downgrade's byte
  /// removal only ever lands after every offset not yet processed, so no
  /// cross-adjustment is needed — see DESIGN.md's jump-patching entry.
  fn patch_pending(&mut self, mut pending: Vec<(usize, OpCode, OpCode)>, tok: &Token) -> CResult<()> {
    pending.sort_unstable_by(|a, b| b.0.cmp(&a.0));
    for (offset, short_op, long_op) in pending {
      self.patch_jump(offset, short_op, long_op, tok)?;
    }
    Ok(())
  }

  /// Emits a backward jump to `loop_start`, choosing the short or long
  /// opcode up front since the distance is already known.
  fn emit_backward_jump(&mut self, loop_start: usize, short_op: OpCode, long_op: OpCode, line: usize) -> CResult<()> {
    let short_end = self.chunk.len() + 3;
    if short_end >= loop_start && short_end - loop_start <= u16::MAX as usize {
      let distance = (short_end - loop_start) as u16;
      self.chunk.write_op(short_op, line);
      self.chunk.write_u16(distance, line);
    } else {
      let long_end = self.chunk.len() + 4;
      let distance = (long_end - loop_start) as u32;
      self.chunk.write_op(long_op, line);
      self.chunk.write_u24(distance, line);
    }
    Ok(())
  }

  fn error(&self, tok: &Token, message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(Stage::Compiling, self.filename, tok.line, tok.lexeme.clone(), message.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use core::bytecode::OpCode;

  fn compile_src(src: &str) -> Chunk {
    let (tokens, lex_errs) = lexer::lex(src, "t");
    assert!(lex_errs.is_empty(), "{lex_errs:?}");
    let (ast, parse_errs) = parser::parse(&tokens, "t");
    assert!(parse_errs.is_empty(), "{parse_errs:?}");
    let (ast, _warnings) = optimizer::optimize(ast, "t", optimizer::Options::default());
    compile(ast, "t").unwrap_or_else(|errs| panic!("{errs:?}"))
  }

  #[test]
  fn empty_program_compiles_to_empty_chunk() {
    let chunk = compile_src("");
    assert!(chunk.code.is_empty());
    assert!(chunk.consts.is_empty());
    assert!(chunk.lines.is_empty());
  }

  #[test]
  fn arithmetic_fold_then_declare() {
    let chunk = compile_src("var x = 1 + 2 * 3;");
    assert_eq!(chunk.code.last().copied(), Some(OpCode::Return.into()));
    assert!(chunk.consts.iter().any(|c| matches!(c, ConstValue::Number(n) if n == "7")));
  }

  #[test]
  fn short_circuit_and_uses_short_jump() {
    let chunk = compile_src("true and false;");
    assert!(chunk.code.contains(&OpCode::JumpIfFalse.into()));
  }

  #[test]
  fn scope_depth_balances_back_to_sentinel() {
    let chunk = compile_src("{ var x = 1; { var y = 2; } }");
    assert_eq!(chunk.code.last().copied(), Some(OpCode::Return.into()));
  }

  #[test]
  fn while_break_uses_unconditional_jump_forwards() {
    let chunk = compile_src("while (true) { break; }");
    // `break` must land on the unconditional JumpForwards family, distinct
    // from the loop condition's own JumpIfFalsePop exit.
    assert!(chunk.code.contains(&OpCode::JumpForwards.into()));
    assert!(chunk.code.contains(&OpCode::JumpIfFalsePop.into()));
  }

  #[test]
  fn while_continue_pops_loop_local_before_backward_jump() {
    let chunk = compile_src("while (true) { var a = 1; continue; }");
    let backward_pos = chunk
      .code
      .iter()
      .position(|&b| b == OpCode::JumpBackwards.into() || b == OpCode::LongJumpBackwards.into())
      .expect("'continue' should emit a backward jump");
    assert_eq!(
      chunk.code[backward_pos - 1],
      OpCode::Pop.into(),
      "'continue' must pop the loop-local 'a' before jumping back to the condition"
    );
  }

  #[test]
  fn foreach_break_uses_unconditional_jump_forwards() {
    let chunk = compile_src("foreach (x: xs) { break; }");
    assert!(chunk.code.contains(&OpCode::JumpForwards.into()));
    assert!(chunk.code.contains(&OpCode::ForIterNextOrJump.into()));
  }

  #[test]
  fn foreach_continue_pops_loop_var_and_locals_before_backward_jump() {
    let chunk = compile_src("foreach (x: xs) { var a = 1; continue; }");
    let backward_pos = chunk
      .code
      .iter()
      .position(|&b| b == OpCode::JumpBackwards.into() || b == OpCode::LongJumpBackwards.into())
      .expect("'continue' should emit a backward jump");
    // Two slots are live at the 'continue' site: the foreach loop variable
    // 'x' and the body-local 'a' — that's a PopN(2), not a single Pop.
    assert_eq!(chunk.code[backward_pos - 4], OpCode::PopN.into());
  }
}
