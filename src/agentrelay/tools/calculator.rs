//! # Calculator
//!
//! Arithmetic evaluation behind the `calculate` tool, built on `evalexpr`.
//!
//! Supported:
//!
//! - **Arithmetic**: `+`, `-`, `*`, `/`, `%`, `^` and `**` (exponentiation)
//! - **Functions**: `abs()`, `sqrt()`, `pow(x, y)`, `round()`, `floor()`, `ceil()`, `min()`, `max()`
//! - **Constants**: `pi`, `e`
//!
//! Integer literals are evaluated as floats, so `7 / 2` is `3.5` rather than `3`.
//!
//! ```rust
//! use agentrelay::tools::calculator::Calculator;
//!
//! let calc = Calculator::new();
//! assert_eq!(calc.evaluate("1 + 2 * 3").unwrap(), 7.0);
//! assert_eq!(calc.evaluate("7 / 2").unwrap(), 3.5);
//! assert!(calc.evaluate("1 / 0").is_err());
//! ```

use std::error::Error;
use std::fmt;

/// Error type for calculator operations
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorError {
    message: String,
}

impl CalculatorError {
    pub fn new(message: impl Into<String>) -> Self {
        CalculatorError {
            message: message.into(),
        }
    }
}

impl fmt::Display for CalculatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Calculator error: {}", self.message)
    }
}

impl Error for CalculatorError {}

pub type CalculatorResult = Result<f64, CalculatorError>;

/// Stateless expression evaluator; cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct Calculator;

impl Calculator {
    pub fn new() -> Self {
        Calculator
    }

    /// Evaluate `expression` to a finite number.
    ///
    /// Division by zero and other non-finite results are errors.
    pub fn evaluate(&self, expression: &str) -> CalculatorResult {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(CalculatorError::new("empty expression"));
        }
        let prepared = prepare_expression(expression);

        let value = evalexpr::eval(&prepared)
            .map_err(|e| CalculatorError::new(format!("Evaluation error: {}", e)))?;
        let number = value
            .as_number()
            .map_err(|_| CalculatorError::new("Result is not a number"))?;
        if !number.is_finite() {
            return Err(CalculatorError::new(
                "division by zero or undefined result",
            ));
        }
        Ok(number)
    }
}

/// Render a result the way a person would write it: `7` rather than `7.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn prepare_expression(expression: &str) -> String {
    let mut prepared = expression.replace("**", "^");
    for (name, evalexpr_name) in [("sqrt", "math::sqrt"), ("abs", "math::abs"), ("pow", "math::pow")]
    {
        prepared = replace_word(&prepared, name, evalexpr_name);
    }
    prepared = replace_word(&prepared, "pi", &format!("{:?}", std::f64::consts::PI));
    prepared = replace_word(&prepared, "e", &format!("{:?}", std::f64::consts::E));
    promote_integers(&prepared)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':'
}

/// Replace `word` only where it is not part of a longer identifier.
fn replace_word(expression: &str, word: &str, replacement: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let word: Vec<char> = word.chars().collect();
    let mut result = String::with_capacity(expression.len());
    let mut i = 0;
    while i < chars.len() {
        let end = i + word.len();
        if end <= chars.len()
            && chars[i..end] == word[..]
            && (i == 0 || !is_word_char(chars[i - 1]))
            && (end == chars.len() || !is_word_char(chars[end]))
        {
            result.push_str(replacement);
            i = end;
            continue;
        }
        result.push(chars[i]);
        i += 1;
    }
    result
}

/// Turn bare integer literals into float literals so division is not truncated.
fn promote_integers(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut result = String::with_capacity(expression.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let starts_number = chars[i].is_ascii_digit()
            && (i == 0 || !(is_word_char(chars[i - 1]) || chars[i - 1] == '.'));
        if !starts_number {
            result.push(chars[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        result.extend(&chars[start..i]);
        let followed_by_fraction = i < chars.len() && (chars[i] == '.' || chars[i].is_alphabetic());
        if !followed_by_fraction {
            result.push_str(".0");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let calc = Calculator::new();
        assert_eq!(calc.evaluate("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(calc.evaluate("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(calc.evaluate("10 / 4").unwrap(), 2.5);
        assert_eq!(calc.evaluate("2 ** 3").unwrap(), 8.0);
        assert_eq!(calc.evaluate("17 % 5").unwrap(), 2.0);
        assert_eq!(calc.evaluate("1.5 + 1.5").unwrap(), 3.0);
    }

    #[test]
    fn test_functions_and_constants() {
        let calc = Calculator::new();
        assert_eq!(calc.evaluate("sqrt(16)").unwrap(), 4.0);
        assert_eq!(calc.evaluate("max(3, 9)").unwrap(), 9.0);
        assert!((calc.evaluate("pi").unwrap() - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_errors() {
        let calc = Calculator::new();
        assert!(calc.evaluate("1 / 0").is_err());
        assert!(calc.evaluate("2 +").is_err());
        assert!(calc.evaluate("   ").is_err());
    }

    #[test]
    fn test_preparation_leaves_identifiers_alone() {
        assert_eq!(promote_integers("atan2(1, 2.5)"), "atan2(1.0, 2.5)");
        assert_eq!(replace_word("exp(e)", "e", "E"), "exp(E)");
        assert_eq!(format_number(408.0), "408");
        assert_eq!(format_number(3.5), "3.5");
    }
}
