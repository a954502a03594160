//! mathcp-eval — arithmetic expression evaluation.
//!
//! `evaluate` runs three stages:
//!
//! ```text
//! "2 * (1 + 3)" ──lexer──► [2, *, (, 1, +, 3, )]
//!               ──rpn────► [2, 1, 3, +, *]
//!               ──rpn────► Int(8)
//! ```
//!
//! Accepted grammar: signed integers and decimals, `+ - * /`, and
//! parentheses. Anything else is an [`EvalError::Syntax`].

pub mod error;
pub mod lexer;
pub mod number;
pub mod rpn;

pub use error::EvalError;
pub use lexer::{Operator, Token, tokenize};
pub use number::Number;
pub use rpn::{eval_postfix, to_postfix};

/// Evaluate `expression` to a number.
pub fn evaluate(expression: &str) -> Result<Number, EvalError> {
    let tokens = tokenize(expression)?;
    let postfix = to_postfix(&tokens)?;
    eval_postfix(&postfix)
}
