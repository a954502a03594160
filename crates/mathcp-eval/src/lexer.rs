//! Tokenization.
//!
//! A number is any run of digits and dots; every other non-blank
//! character is a token of its own. A `-` directly followed by a number
//! is folded into it as a sign when it sits where an operand is
//! expected: at the start, after an operator, or after `(`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::EvalError;
use crate::number::Number;

const TOKEN_PATTERN: &str = r"[0-9.]+|\S";

static TOKEN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(TOKEN_PATTERN));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Sub),
            "*" => Some(Operator::Mul),
            "/" => Some(Operator::Div),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Operator::Add | Operator::Sub => 1,
            Operator::Mul | Operator::Div => 2,
        }
    }

    /// Compute `a <op> b`. Integer `+ - *` stay exact; `/` and any float
    /// operand go through `f64`.
    pub fn apply(self, a: Number, b: Number) -> Result<Number, EvalError> {
        if let (Number::Int(x), Number::Int(y)) = (a, b) {
            let exact = match self {
                Operator::Add => Some(x.checked_add(y)),
                Operator::Sub => Some(x.checked_sub(y)),
                Operator::Mul => Some(x.checked_mul(y)),
                Operator::Div => None,
            };
            if let Some(result) = exact {
                return result.map(Number::Int).ok_or(EvalError::Overflow);
            }
        }

        let (x, y) = (a.as_f64(), b.as_f64());
        match self {
            Operator::Add => Ok(Number::Float(x + y)),
            Operator::Sub => Ok(Number::Float(x - y)),
            Operator::Mul => Ok(Number::Float(x * y)),
            Operator::Div if y == 0.0 => Err(EvalError::DivisionByZero),
            Operator::Div => Ok(Number::Float(x / y)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    Number(Number),
    Op(Operator),
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Op(op) => write!(f, "{}", op.symbol()),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

/// Split `expression` into tokens.
pub fn tokenize(expression: &str) -> Result<Vec<Token>, EvalError> {
    let pattern = TOKEN.as_ref().map_err(Clone::clone)?;
    let mut tokens = Vec::new();
    // End offset of a `-` that becomes a sign if a number starts right there.
    let mut pending_sign: Option<usize> = None;

    for found in pattern.find_iter(expression) {
        let text = found.as_str();

        if let Some(sign_end) = pending_sign.take() {
            if sign_end == found.start() && is_numeric(text) {
                tokens.push(Token::Number(parse_number(text, true)?));
                continue;
            }
            tokens.push(Token::Op(Operator::Sub));
        }

        if text == "-" && expects_operand(tokens.last()) {
            pending_sign = Some(found.end());
            continue;
        }

        let token = match text {
            "(" => Token::LParen,
            ")" => Token::RParen,
            t if is_numeric(t) => Token::Number(parse_number(t, false)?),
            t => match Operator::from_symbol(t) {
                Some(op) => Token::Op(op),
                None => return Err(EvalError::syntax(format!("unexpected token '{t}'"))),
            },
        };
        tokens.push(token);
    }

    if pending_sign.is_some() {
        tokens.push(Token::Op(Operator::Sub));
    }
    Ok(tokens)
}

fn expects_operand(last: Option<&Token>) -> bool {
    matches!(last, None | Some(Token::Op(_)) | Some(Token::LParen))
}

fn is_numeric(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

fn parse_number(text: &str, negative: bool) -> Result<Number, EvalError> {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        let literal = if negative {
            format!("-{text}")
        } else {
            text.to_string()
        };
        return literal
            .parse::<i64>()
            .map(Number::Int)
            .map_err(|_| EvalError::Overflow);
    }

    let value: f64 = text
        .parse()
        .map_err(|_| EvalError::syntax(format!("malformed number '{text}'")))?;
    Ok(Number::Float(if negative { -value } else { value }))
}
