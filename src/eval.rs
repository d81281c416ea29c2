//! Tree evaluation.
//!
//! Evaluation is a plain structural recursion: terminals yield their value, operator
//! nodes apply their primitive to the values of their operands. `select` evaluates
//! its predicate and then only the chosen branch. Nothing is cached between calls.

use crate::errors::EvalError;
use crate::expr::{Node, Terminal};
use crate::ops::Op;
use crate::value::Value;

/// Evaluates `node` to a concrete value.
///
/// # Errors
/// - [`EvalError::UnboundPlaceholder`] if the tree still contains a placeholder
/// - [`EvalError::UnsupportedOperand`] if an operator is applied to a kind it has no
///   semantics for
/// - [`EvalError::IntegerDivisionByZero`] for an integer `/` or `%` by zero
pub fn evaluate(node: &Node) -> Result<Value, EvalError> {
    match node {
        Node::Terminal(Terminal::Placeholder(k)) => Err(EvalError::UnboundPlaceholder(*k)),
        Node::Terminal(t) => t.value().ok_or(EvalError::UnboundPlaceholder(0)),
        Node::Unary(op, a) => Value::unary(*op, evaluate(a)?),
        Node::Binary(op, a, b) => Value::binary(*op, evaluate(a)?, evaluate(b)?),
        Node::Ternary(Op::Select, pred, a, b) => {
            if evaluate(pred)?.truthy() {
                evaluate(a)
            } else {
                evaluate(b)
            }
        }
        Node::Ternary(op, a, b, c) => {
            let (a, b, c) = (evaluate(a)?, evaluate(b)?, evaluate(c)?);
            match op {
                Op::Fma => Ok(Value::Float(a.as_f64().mul_add(b.as_f64(), c.as_f64()))),
                _ => Err(EvalError::UnsupportedOperand {
                    op: *op,
                    kind: a.kind(),
                }),
            }
        }
    }
}

impl Node {
    /// Shorthand for [`evaluate`].
    pub fn evaluate(&self) -> Result<Value, EvalError> {
        evaluate(self)
    }
}
