mod lex_numbers;
mod lex_strings;

use core::errors::{Diagnostic, Stage};
use core::tokens::{keyword_kind, Token, TokenKind};

/// Turns `source` into a token stream plus any fatal diagnostics
/// encountered along the way. Lexing never aborts on a bad character or
/// an unterminated literal: the offending span is reported and skipped so
/// that later, unrelated errors in the same file are still surfaced in a
/// single pass (`spec.md §4.1`, "best-effort recovery").
///
/// The returned token list always ends with a single `TokenKind::EOF`.
pub fn lex(source: &str, filename: &str) -> (Vec<Token>, Vec<Diagnostic>) {
  let mut lexer = Lexer::new(source, filename);
  lexer.run();
  (lexer.tokens, lexer.errors)
}

pub(crate) struct Lexer<'a> {
  source: Vec<char>,
  filename: &'a str,
  start: usize,
  current: usize,
  line_num: usize,
  tokens: Vec<Token>,
  errors: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
  fn new(source: &str, filename: &'a str) -> Self {
    Lexer {
      source: source.chars().collect(),
      filename,
      start: 0,
      current: 0,
      line_num: 1,
      tokens: Vec::new(),
      errors: Vec::new(),
    }
  }

  fn run(&mut self) {
    loop {
      self.skip_whitespace_and_comments();
      self.start = self.current;

      if self.is_at_end() {
        self.push_token(TokenKind::EOF);
        break;
      }

      let c = self.advance();

      if c.is_ascii_digit() {
        let kind = self.scan_number();
        self.push_token(kind);
        continue;
      }

      if Self::is_string_prefix(c) && matches!(self.get_current(), '\'' | '"') {
        self.scan_string_token();
        continue;
      }

      if c == '\'' || c == '"' {
        self.current -= 1; // un-consume so scan_string_token sees the quote itself
        self.scan_string_token();
        continue;
      }

      if Self::is_identifier_start(c) {
        while Self::is_identifier_continue(self.get_current()) {
          self.advance();
        }
        let lexeme = self.current_lexeme();
        let kind = keyword_kind(&lexeme).unwrap_or(TokenKind::IDENTIFIER);
        self.push_token(kind);
        continue;
      }

      self.scan_operator(c);
    }
  }

  fn scan_string_token(&mut self) {
    let quote = self.advance();
    let triple = self.get_current() == quote && self.get_next() == quote;
    if triple {
      self.advance();
      self.advance();
    }

    match self.scan_string(quote, triple) {
      Ok(kind) => self.push_token(kind),
      Err(message) => self.push_error(message),
    }
  }

  fn scan_operator(&mut self, c: char) {
    use TokenKind::*;

    let kind = match c {
      '+' => {
        if self.matches('=') {
          PLUS_EQ
        } else {
          PLUS
        }
      }
      '-' => {
        if self.matches('=') {
          MINUS_EQ
        } else {
          MINUS
        }
      }
      '*' => {
        if self.matches('*') {
          if self.matches('=') {
            DOUBLE_STAR_EQ
          } else {
            DOUBLE_STAR
          }
        } else if self.matches('=') {
          STAR_EQ
        } else {
          STAR
        }
      }
      '/' => {
        if self.matches('/') {
          if self.matches('=') {
            DOUBLE_SLASH_EQ
          } else {
            DOUBLE_SLASH
          }
        } else if self.matches('=') {
          SLASH_EQ
        } else {
          SLASH
        }
      }
      '%' => {
        if self.matches('=') {
          PERCENT_EQ
        } else {
          PERCENT
        }
      }
      '&' => {
        if self.matches('=') {
          AMP_EQ
        } else {
          AMP
        }
      }
      '|' => {
        if self.matches('=') {
          PIPE_EQ
        } else {
          PIPE
        }
      }
      '^' => {
        if self.matches('=') {
          CARET_EQ
        } else {
          CARET
        }
      }
      '~' => TILDE,
      '<' => {
        if self.matches('<') {
          if self.matches('=') {
            SHL_EQ
          } else {
            SHL
          }
        } else if self.matches('=') {
          LESS_EQ
        } else {
          LESS
        }
      }
      '>' => {
        if self.matches('>') {
          if self.matches('=') {
            SHR_EQ
          } else {
            SHR
          }
        } else if self.matches('=') {
          GREATER_EQ
        } else {
          GREATER
        }
      }
      '=' => {
        if self.matches('=') {
          EQ
        } else {
          ASSIGN
        }
      }
      '!' => {
        if self.matches('=') {
          NOT_EQ
        } else {
          BANG
        }
      }
      '.' => DOT,
      ',' => COMMA,
      ':' => COLON,
      ';' => SEMICOLON,
      '(' => L_PAREN,
      ')' => R_PAREN,
      '[' => L_BRACKET,
      ']' => R_BRACKET,
      '{' => L_BRACE,
      '}' => R_BRACE,
      other => {
        self.push_error(format!("unexpected character '{other}'"));
        return;
      }
    };

    self.push_token(kind);
  }

  fn skip_whitespace_and_comments(&mut self) {
    loop {
      match self.get_current() {
        ' ' | '\t' | '\r' => {
          self.advance();
        }
        '\n' => {
          self.line_num += 1;
          self.advance();
        }
        '/' if self.get_next() == '/' => {
          while self.get_current() != '\n' && !self.is_at_end() {
            self.advance();
          }
        }
        '/' if self.get_next() == '*' => {
          self.advance();
          self.advance();
          self.skip_block_comment();
        }
        _ => break,
      }
    }
  }

  /// Consumes a `/* ... */` block comment, honoring nesting. The opening
  /// `/*` has already been consumed by the caller.
  fn skip_block_comment(&mut self) {
    let mut depth = 1usize;
    while depth > 0 {
      if self.is_at_end() {
        self.push_error("unterminated block comment".to_string());
        return;
      }

      if self.get_current() == '/' && self.get_next() == '*' {
        self.advance();
        self.advance();
        depth += 1;
      } else if self.get_current() == '*' && self.get_next() == '/' {
        self.advance();
        self.advance();
        depth -= 1;
      } else {
        if self.get_current() == '\n' {
          self.line_num += 1;
        }
        self.advance();
      }
    }
  }

  fn is_string_prefix(c: char) -> bool {
    matches!(c, 'b' | 'f' | 'r')
  }

  fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
  }

  fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
  }

  fn current_lexeme(&self) -> String {
    self.source[self.start..self.current].iter().collect()
  }

  fn push_token(&mut self, kind: TokenKind) {
    let lexeme = self.current_lexeme();
    self.tokens.push(Token::new(kind, lexeme, self.line_num, (self.start, self.current)));
  }

  fn push_error(&mut self, message: String) {
    let lexeme = self.current_lexeme();
    self.errors.push(Diagnostic::new(Stage::Lexing, self.filename, self.line_num, lexeme, message));
  }

  fn is_at_end(&self) -> bool {
    self.current >= self.source.len()
  }

  fn get_previous(&self) -> char {
    self.peek_at_absolute(self.current.wrapping_sub(1))
  }

  fn get_current(&self) -> char {
    self.peek_at_absolute(self.current)
  }

  fn get_next(&self) -> char {
    self.peek_at_absolute(self.current + 1)
  }

  fn peek_at(&self, offset: usize) -> char {
    self.peek_at_absolute(self.current + offset)
  }

  fn peek_at_absolute(&self, idx: usize) -> char {
    self.source.get(idx).copied().unwrap_or('\0')
  }

  fn advance(&mut self) -> char {
    let c = self.get_current();
    self.current += 1;
    c
  }

  fn matches(&mut self, expected: char) -> bool {
    if self.get_current() == expected {
      self.current += 1;
      true
    } else {
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    let (tokens, errors) = lex(source, "test.jpl");
    assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
    tokens.into_iter().map(|t| t.kind).collect()
  }

  #[test]
  fn always_ends_in_eof() {
    assert_eq!(kinds(""), vec![TokenKind::EOF]);
    assert_eq!(kinds("1"), vec![TokenKind::INT, TokenKind::EOF]);
  }

  #[test]
  fn lexemes_concatenate_back_to_non_whitespace_input() {
    let source = "var x = 1 + 2; // trailing comment\n";
    let (tokens, errors) = lex(source, "test.jpl");
    assert!(errors.is_empty());
    let rebuilt: String = tokens.iter().filter(|t| t.kind != TokenKind::EOF).map(|t| t.lexeme.as_str()).collect();
    assert_eq!(rebuilt, "varx=1+2;");
  }

  #[test]
  fn numeric_bases_are_tagged_distinctly() {
    assert_eq!(kinds("0x1F"), vec![TokenKind::HEX, TokenKind::EOF]);
    assert_eq!(kinds("0o17"), vec![TokenKind::OCTAL, TokenKind::EOF]);
    assert_eq!(kinds("0b101"), vec![TokenKind::BINARY, TokenKind::EOF]);
    assert_eq!(kinds("3.14"), vec![TokenKind::FLOAT, TokenKind::EOF]);
    assert_eq!(kinds("3e10"), vec![TokenKind::FLOAT, TokenKind::EOF]);
    assert_eq!(kinds("42"), vec![TokenKind::INT, TokenKind::EOF]);
  }

  #[test]
  fn two_character_operators_are_matched_greedily() {
    assert_eq!(kinds("=="), vec![TokenKind::EQ, TokenKind::EOF]);
    assert_eq!(kinds("//not a comment token, a line comment\n!="), vec![TokenKind::NOT_EQ, TokenKind::EOF]);
    assert_eq!(kinds("**="), vec![TokenKind::DOUBLE_STAR_EQ, TokenKind::EOF]);
  }

  #[test]
  fn keywords_are_reclassified_from_identifiers() {
    assert_eq!(kinds("while"), vec![TokenKind::WHILE_KW, TokenKind::EOF]);
    assert_eq!(kinds("whiletrue"), vec![TokenKind::IDENTIFIER, TokenKind::EOF]);
  }

  #[test]
  fn triple_quoted_strings_span_newlines() {
    let (tokens, errors) = lex("\"\"\"a\nb\"\"\"", "test.jpl");
    assert!(errors.is_empty());
    assert_eq!(tokens[0].kind, TokenKind::STRING);
  }

  #[test]
  fn unterminated_string_is_reported_and_recovery_continues() {
    let (tokens, errors) = lex("\"oops\n1", "test.jpl");
    assert_eq!(errors.len(), 1);
    assert!(tokens.iter().any(|t| t.kind == TokenKind::INT));
  }

  #[test]
  fn unterminated_block_comment_is_one_error() {
    let (_, errors) = lex("/* never closes", "test.jpl");
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn unknown_character_is_reported_and_lexing_continues() {
    let (tokens, errors) = lex("1 $ 2", "test.jpl");
    assert_eq!(errors.len(), 1);
    assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::INT).count(), 2);
  }
}
