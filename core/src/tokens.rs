use std::fmt;

/// Zero-based byte offsets delimiting a lexeme in the source string.
pub type ByteSpan = (usize, usize);

/// A single lexical unit produced by the lexer.
///
/// Tokens are immutable once produced and own their lexeme so they can
/// outlive the source string the lexer borrowed (the parser keeps them
/// around on AST nodes purely for diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub line: usize,
  pub span: ByteSpan,
}

impl Token {
  pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, span: ByteSpan) -> Self {
    Token { kind, lexeme: lexeme.into(), line, span }
  }

  /// A zero-width token used to seed a parser/compiler before the first
  /// real token has been consumed.
  pub fn synthetic(kind: TokenKind) -> Self {
    Token { kind, lexeme: String::new(), line: 0, span: (0, 0) }
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.lexeme)
  }
}

/// The closed set of lexical categories recognized by the lexer.
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  // Singletons
  TRUE,
  FALSE,
  NIL,
  INF,
  NAN,

  // Literal families
  INT,
  FLOAT,
  HEX,
  OCTAL,
  BINARY,
  STRING,
  IDENTIFIER,

  // Punctuation / operators
  PLUS,
  MINUS,
  STAR,
  SLASH,
  DOUBLE_SLASH, // //
  PERCENT,
  DOUBLE_STAR, // **
  AMP,         // &
  PIPE,        // |
  CARET,       // ^
  TILDE,       // ~
  SHL,         // <<
  SHR,         // >>
  EQ,          // ==
  NOT_EQ,      // !=
  LESS,
  LESS_EQ,
  GREATER,
  GREATER_EQ,
  ASSIGN, // =
  PLUS_EQ,
  MINUS_EQ,
  STAR_EQ,
  SLASH_EQ,
  DOUBLE_SLASH_EQ,
  PERCENT_EQ,
  DOUBLE_STAR_EQ,
  AMP_EQ,
  PIPE_EQ,
  CARET_EQ,
  SHL_EQ,
  SHR_EQ,
  BANG, // !
  DOT,
  COMMA,
  COLON,
  SEMICOLON,
  L_PAREN,
  R_PAREN,
  L_BRACKET,
  R_BRACKET,
  L_BRACE,
  R_BRACE,

  // Keywords
  IF_KW,
  ELSE_KW,
  WHILE_KW,
  FOR_KW,
  FOREACH_KW,
  FUN_KW,
  LAMBDA_KW,
  CLASS_KW,
  VAR_KW,
  CONST_KW,
  RETURN_KW,
  BREAK_KW,
  CONTINUE_KW,
  IMPORT_KW,
  FROM_KW,
  AS_KW,
  IS_KW,
  ISNOT_KW,
  OF_KW,
  ASYNC_KW,
  AWAIT_KW,
  YIELD_KW,
  DEFER_KW,
  TRY_KW,
  EXCEPT_KW,
  FINALLY_KW,
  RAISE_KW,
  ASSERT_KW,
  DEL_KW,
  STATIC_KW,
  DYNAMIC_KW,
  PUBLIC_KW,
  PRIVATE_KW,
  STRUCT_KW,
  AND_KW,
  OR_KW,

  EOF,
}

impl TokenKind {
  /// True for tokens whose lexeme is meant to be re-parsed as a number.
  pub fn is_numeric_literal(self) -> bool {
    matches!(self, TokenKind::INT | TokenKind::FLOAT | TokenKind::HEX | TokenKind::OCTAL | TokenKind::BINARY)
  }

  /// True for the reassignment family (`+=`, `-=`, ...), excluding plain `=`.
  pub fn is_compound_assign(self) -> bool {
    matches!(
      self,
      TokenKind::PLUS_EQ
        | TokenKind::MINUS_EQ
        | TokenKind::STAR_EQ
        | TokenKind::SLASH_EQ
        | TokenKind::DOUBLE_SLASH_EQ
        | TokenKind::PERCENT_EQ
        | TokenKind::DOUBLE_STAR_EQ
        | TokenKind::AMP_EQ
        | TokenKind::PIPE_EQ
        | TokenKind::CARET_EQ
        | TokenKind::SHL_EQ
        | TokenKind::SHR_EQ
    )
  }

  pub fn is_assign(self) -> bool {
    self == TokenKind::ASSIGN || self.is_compound_assign()
  }
}

/// Maps a scanned identifier lexeme to its reserved keyword kind, if any.
pub fn keyword_kind(id: &str) -> Option<TokenKind> {
  use TokenKind::*;
  Some(match id {
    "true" => TRUE,
    "false" => FALSE,
    "nil" => NIL,
    "inf" => INF,
    "nan" => NAN,
    "if" => IF_KW,
    "else" => ELSE_KW,
    "while" => WHILE_KW,
    "for" => FOR_KW,
    "foreach" => FOREACH_KW,
    "fun" => FUN_KW,
    "lambda" => LAMBDA_KW,
    "class" => CLASS_KW,
    "var" => VAR_KW,
    "const" => CONST_KW,
    "return" => RETURN_KW,
    "break" => BREAK_KW,
    "continue" => CONTINUE_KW,
    "import" => IMPORT_KW,
    "from" => FROM_KW,
    "as" => AS_KW,
    "is" => IS_KW,
    "isnot" => ISNOT_KW,
    "of" => OF_KW,
    "async" => ASYNC_KW,
    "await" => AWAIT_KW,
    "yield" => YIELD_KW,
    "defer" => DEFER_KW,
    "try" => TRY_KW,
    "except" => EXCEPT_KW,
    "finally" => FINALLY_KW,
    "raise" => RAISE_KW,
    "assert" => ASSERT_KW,
    "del" => DEL_KW,
    "static" => STATIC_KW,
    "dynamic" => DYNAMIC_KW,
    "public" => PUBLIC_KW,
    "private" => PRIVATE_KW,
    "struct" => STRUCT_KW,
    "and" => AND_KW,
    "or" => OR_KW,
    _ => return None,
  })
}
