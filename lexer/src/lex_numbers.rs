use core::tokens::TokenKind;

use crate::Lexer;

impl<'a> Lexer<'a> {
  /// Scans a numeric literal starting at the already-consumed leading
  /// digit. Dispatches to hex/octal/binary on a `0x`/`0o`/`0b` prefix,
  /// otherwise scans a decimal integer, optionally extended into a float
  /// by a fractional part and/or a scientific-notation exponent.
  ///
  /// ```bnf
  /// NUMBER ::= ("0x" HEX_DIGIT+) | ("0o" OCT_DIGIT+) | ("0b" BIN_DIGIT+)
  ///          | (DIGIT+ ("." DIGIT*)? (("e"|"E") ("+"|"-")? DIGIT+)?)
  /// ```
  pub(crate) fn scan_number(&mut self) -> TokenKind {
    if self.get_previous() == '0' {
      match self.get_current() {
        'x' | 'X' => return self.scan_based_digits(TokenKind::HEX, |c| c.is_ascii_hexdigit()),
        'o' | 'O' => return self.scan_based_digits(TokenKind::OCTAL, |c| ('0'..='7').contains(&c)),
        'b' | 'B' => return self.scan_based_digits(TokenKind::BINARY, |c| c == '0' || c == '1'),
        _ => {}
      }
    }

    while self.get_current().is_ascii_digit() {
      self.advance();
    }

    let mut is_float = false;

    if self.get_current() == '.' && self.get_next().is_ascii_digit() {
      is_float = true;
      self.advance(); // consume '.'
      while self.get_current().is_ascii_digit() {
        self.advance();
      }
    }

    if matches!(self.get_current(), 'e' | 'E') {
      let mut lookahead = self.current + 1;
      if matches!(self.source.get(lookahead), Some('+') | Some('-')) {
        lookahead += 1;
      }
      if matches!(self.source.get(lookahead), Some(c) if c.is_ascii_digit()) {
        is_float = true;
        self.advance(); // consume 'e'/'E'
        if matches!(self.get_current(), '+' | '-') {
          self.advance();
        }
        while self.get_current().is_ascii_digit() {
          self.advance();
        }
      }
    }

    if is_float {
      TokenKind::FLOAT
    } else {
      TokenKind::INT
    }
  }

  fn scan_based_digits(&mut self, kind: TokenKind, is_digit: impl Fn(char) -> bool) -> TokenKind {
    self.advance(); // consume the base marker ('x'/'o'/'b')
    while is_digit(self.get_current()) {
      self.advance();
    }
    kind
  }
}
