use std::fmt;

/// Which pipeline stage produced a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Lexing,
  Parsing,
  Optimizing,
  Compiling,
  Serializing,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Stage::Lexing => "lexing",
      Stage::Parsing => "parsing",
      Stage::Optimizing => "optimizing",
      Stage::Compiling => "compiling",
      Stage::Serializing => "serializing",
    };
    write!(f, "{s}")
  }
}

/// A single fatal error surfaced by some stage of the pipeline.
///
/// Carries enough source-position information to render the message
/// pattern from the design spec: `A fatal error occurred while
/// <stage> '<file>', line <L> at '<lexeme>' -> <message>`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
  pub stage: Stage,
  pub file: String,
  pub line: usize,
  pub lexeme: String,
  pub message: String,
}

impl Diagnostic {
  pub fn new(stage: Stage, file: impl Into<String>, line: usize, lexeme: impl Into<String>, message: impl Into<String>) -> Self {
    Diagnostic { stage, file: file.into(), line, lexeme: lexeme.into(), message: message.into() }
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "A fatal error occurred while {} '{}', line {} at '{}' -> {}",
      self.stage, self.file, self.line, self.lexeme, self.message
    )
  }
}

impl std::error::Error for Diagnostic {}

/// The non-fatal warnings the optimizer may attach to an otherwise
/// successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
  UnreachableCode,
  LocalShadowsGlobal,
  IsWithALiteral,
  EqualityWithSingleton,
  ValueOverflow,
  ValueUnderflow,
  ImplicitConversion,
}

#[derive(Debug, Clone)]
pub struct Warning {
  pub kind: WarningKind,
  pub file: String,
  pub line: usize,
  pub lexeme: String,
  pub message: String,
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "warning in '{}', line {} at '{}' -> {}", self.file, self.line, self.lexeme, self.message)
  }
}
