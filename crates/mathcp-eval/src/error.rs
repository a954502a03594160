//! Evaluation error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// The expression is malformed.
    #[error("invalid expression: {0}")]
    Syntax(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("tokenizer pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl EvalError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        EvalError::Syntax(message.into())
    }

    /// Whether the input itself was malformed, as opposed to a fault
    /// while computing a well-formed expression.
    pub fn is_syntax(&self) -> bool {
        matches!(self, EvalError::Syntax(_))
    }
}
