//! Tokenizer and infix-to-postfix parser.
//!
//! Expressions are made of non-negative decimal literals, the four binary
//! operators and parentheses. `*` and `/` bind tighter than `+` and `-`;
//! operators of equal precedence associate left-to-right. There are no
//! unary operators.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Numbers, operators, parentheses, or any other single non-space character
/// (which is rejected).
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d*)?|\.\d+|[-+*/()]|\S").unwrap());

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Add | Operator::Sub => 1,
            Operator::Mul | Operator::Div => 2,
        }
    }

    /// Compute `lhs <op> rhs`.
    ///
    /// Division by zero is an error, never a silent zero or infinity. So is
    /// a result too large to represent.
    pub fn apply(&self, lhs: f64, rhs: f64) -> Result<f64> {
        let value = match self {
            Operator::Add => lhs + rhs,
            Operator::Sub => lhs - rhs,
            Operator::Mul => lhs * rhs,
            Operator::Div if rhs == 0.0 => return Err(Error::DivisionByZero),
            Operator::Div => lhs / rhs,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Error::Overflow)
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    Number(f64),
    Op(Operator),
    LParen,
    RParen,
}

/// One item of a postfix sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RpnItem {
    Number(f64),
    Op(Operator),
}

impl std::fmt::Display for RpnItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpnItem::Number(n) => write!(f, "{}", n),
            RpnItem::Op(op) => write!(f, "{}", op),
        }
    }
}

/// Split expression text into tokens, discarding whitespace.
///
/// Any character that is not part of a number, an operator or a
/// parenthesis makes the whole expression invalid.
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| classify(m.as_str()))
        .collect()
}

fn classify(s: &str) -> Result<Token> {
    match s {
        "(" => Ok(Token::LParen),
        ")" => Ok(Token::RParen),
        "+" => Ok(Token::Op(Operator::Add)),
        "-" => Ok(Token::Op(Operator::Sub)),
        "*" => Ok(Token::Op(Operator::Mul)),
        "/" => Ok(Token::Op(Operator::Div)),
        _ => match s.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Token::Number(n)),
            Ok(_) => Err(Error::InvalidExpression(format!(
                "number out of range: {}...",
                &s[..s.len().min(16)]
            ))),
            Err(_) => Err(Error::InvalidExpression(format!("unexpected token '{}'", s))),
        },
    }
}

/// Reorder tokens into postfix form with the shunting-yard algorithm.
pub fn to_rpn(tokens: &[Token]) -> Result<Vec<RpnItem>> {
    if tokens.is_empty() {
        return Err(Error::EmptyExpression);
    }

    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();

    for token in tokens {
        match *token {
            Token::Number(n) => output.push(RpnItem::Number(n)),
            Token::Op(op) => {
                while let Some(&Token::Op(top)) = stack.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(RpnItem::Op(top));
                    stack.pop();
                }
                stack.push(Token::Op(op));
            }
            Token::LParen => stack.push(Token::LParen),
            Token::RParen => loop {
                match stack.pop() {
                    Some(Token::Op(op)) => output.push(RpnItem::Op(op)),
                    Some(Token::LParen) => break,
                    _ => {
                        return Err(Error::InvalidExpression(
                            "unmatched closing parenthesis".to_string(),
                        ))
                    }
                }
            },
        }
    }

    while let Some(token) = stack.pop() {
        match token {
            Token::Op(op) => output.push(RpnItem::Op(op)),
            _ => {
                return Err(Error::InvalidExpression(
                    "unclosed opening parenthesis".to_string(),
                ))
            }
        }
    }

    Ok(output)
}

/// Tokenize and convert in one step.
pub fn parse(text: &str) -> Result<Vec<RpnItem>> {
    to_rpn(&tokenize(text)?)
}
