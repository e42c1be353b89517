use core::tokens::TokenKind;

use crate::Lexer;

impl<'a> Lexer<'a> {
  /// Scans the body of a string literal whose opening quote (and, if
  /// present, triple-quote doubling) has already been consumed by the
  /// caller. `quote` is the delimiter character and `triple` selects
  /// between a single-line string and a triple-quoted, newline-permitting
  /// one.
  ///
  /// Returns `Ok(TokenKind::STRING)` on a clean close, or `Err(message)`
  /// when the source ends before the matching delimiter is found.
  pub(crate) fn scan_string(&mut self, quote: char, triple: bool) -> Result<TokenKind, String> {
    loop {
      if self.is_at_end() {
        return Err(if triple {
          "unterminated triple-quoted string".to_string()
        } else {
          "unterminated string".to_string()
        });
      }

      if self.get_current() == '\\' && !self.is_at_end() {
        self.advance(); // the backslash
        if !self.is_at_end() {
          self.advance(); // the escaped character, whatever it is
        }
        continue;
      }

      if self.get_current() == '\n' {
        if !triple {
          return Err("unterminated string".to_string());
        }
        self.line_num += 1;
        self.advance();
        continue;
      }

      if self.get_current() == quote {
        if !triple {
          self.advance(); // closing quote
          return Ok(TokenKind::STRING);
        }

        if self.peek_at(1) == quote && self.peek_at(2) == quote {
          self.advance();
          self.advance();
          self.advance();
          return Ok(TokenKind::STRING);
        }
      }

      self.advance();
    }
  }
}
