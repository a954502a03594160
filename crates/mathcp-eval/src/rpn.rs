//! Infix to postfix conversion and postfix evaluation.

use tracing::debug;

use crate::error::EvalError;
use crate::lexer::Token;
use crate::number::Number;

/// Reorder infix `tokens` into postfix with the shunting-yard algorithm.
/// All operators are left-associative.
pub fn to_postfix(tokens: &[Token]) -> Result<Vec<Token>, EvalError> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();

    for &token in tokens {
        match token {
            Token::Number(_) => output.push(token),
            Token::LParen => stack.push(token),
            Token::RParen => loop {
                match stack.pop() {
                    Some(Token::LParen) => break,
                    Some(op) => output.push(op),
                    None => return Err(EvalError::syntax("unbalanced ')'")),
                }
            },
            Token::Op(op) => {
                while let Some(&Token::Op(top)) = stack.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(Token::Op(top));
                    stack.pop();
                }
                stack.push(token);
            }
        }
    }

    while let Some(token) = stack.pop() {
        if matches!(token, Token::LParen) {
            return Err(EvalError::syntax("unbalanced '('"));
        }
        output.push(token);
    }

    debug!(postfix = %render(&output), "converted expression");
    Ok(output)
}

/// Evaluate a postfix token sequence.
pub fn eval_postfix(postfix: &[Token]) -> Result<Number, EvalError> {
    let mut operands: Vec<Number> = Vec::new();

    for token in postfix {
        match *token {
            Token::Number(n) => operands.push(n),
            Token::Op(op) => {
                let (Some(b), Some(a)) = (operands.pop(), operands.pop()) else {
                    return Err(EvalError::syntax(format!(
                        "operator '{}' is missing an operand",
                        op.symbol()
                    )));
                };
                operands.push(op.apply(a, b)?);
            }
            Token::LParen | Token::RParen => {
                return Err(EvalError::syntax("parenthesis in postfix sequence"));
            }
        }
    }

    match (operands.pop(), operands.is_empty()) {
        (Some(value), true) => Ok(value),
        (None, _) => Err(EvalError::syntax("empty expression")),
        (Some(_), false) => Err(EvalError::syntax("operands without an operator")),
    }
}

fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
