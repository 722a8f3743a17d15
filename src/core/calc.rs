//! Synchronous single-process evaluator.
//!
//! Backs the quick-calculate endpoint and the `calc` subcommand. Uses the
//! same parser as the distributed path but folds the postfix sequence
//! directly on a value stack.

use crate::core::token::{self, RpnItem};
use crate::error::{Error, Result};

/// Evaluate expression text immediately.
pub fn evaluate(text: &str) -> Result<f64> {
    evaluate_rpn(&token::parse(text)?)
}

pub fn evaluate_rpn(rpn: &[RpnItem]) -> Result<f64> {
    let mut stack: Vec<f64> = Vec::with_capacity(rpn.len());

    for item in rpn {
        match *item {
            RpnItem::Number(n) => stack.push(n),
            RpnItem::Op(op) => {
                let (rhs, lhs) = match (stack.pop(), stack.pop()) {
                    (Some(rhs), Some(lhs)) => (rhs, lhs),
                    _ => {
                        return Err(Error::InvalidExpression(format!(
                            "operator '{}' is missing an operand",
                            op
                        )))
                    }
                };
                stack.push(op.apply(lhs, rhs)?);
            }
        }
    }

    match stack.as_slice() {
        [value] => Ok(*value),
        _ => Err(Error::InvalidExpression(format!(
            "expected one result, found {}",
            stack.len()
        ))),
    }
}
