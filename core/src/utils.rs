use std::num::{ParseFloatError, ParseIntError};

/// Parses a decimal integer literal lexeme (`123`, `1_000`) into an i64.
pub fn parse_int_lexeme(lexeme: &str) -> Result<i64, ParseIntError> {
  lexeme.replace('_', "").parse::<i64>()
}

/// Parses a float literal lexeme, including scientific-notation suffixes
/// (`1.5`, `2.`, `.5`, `1e10`, `1.2e-3`) into an f64.
pub fn parse_float_lexeme(lexeme: &str) -> Result<f64, ParseFloatError> {
  lexeme.replace('_', "").parse::<f64>()
}

/// Parses a `0x`/`0o`/`0b`-prefixed literal lexeme into an i64, given the
/// matching radix (16, 8, or 2).
pub fn parse_int_from_lexeme_base(lexeme: &str, radix: u32) -> Result<i64, ParseIntError> {
  let cleaned = lexeme.replace('_', "");
  i64::from_str_radix(&cleaned[2..], radix)
}

/// Renders an integer back to its canonical decimal lexeme, the target
/// form of the optimizer's numeric normalization pass.
pub fn decimal(n: i64) -> String {
  n.to_string()
}
