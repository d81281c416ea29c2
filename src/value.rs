//! Scalar values carried by expression terminals.
//!
//! Terminals hold a [`Value`], which is one of three kinds: booleans, 64-bit
//! integers and 64-bit floats. Binary arithmetic promotes its operands to the
//! wider kind (`Bool < Int < Float`), mirroring the usual arithmetic
//! conversions of numeric code:
//!
//! - `Int + Float → Float`
//! - `Bool * Int → Int`
//! - `Int / Int → Int` (truncating)
//!
//! Comparisons always produce `Bool`, logical operators work on truthiness and
//! bitwise operators are defined for `Int` and `Bool` only. Anything else is an
//! [`EvalError::UnsupportedOperand`].

use std::fmt;

use crate::errors::EvalError;
use crate::ops::Op;

/// The static kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
}

impl ValueKind {
    /// The kind both operands are promoted to in a binary arithmetic operation.
    pub fn promote(self, other: ValueKind) -> ValueKind {
        self.max(other).max(ValueKind::Int)
    }

    /// The kind of `T / V` for a value of kind `self` differentiated with
    /// respect to a unit of kind `unit`.
    pub fn per(self, unit: ValueKind) -> ValueKind {
        self.promote(unit)
    }

    /// The additive identity of this kind.
    pub fn zero(self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
        }
    }

    /// The multiplicative identity of this kind.
    pub fn one(self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(true),
            ValueKind::Int => Value::Int(1),
            ValueKind::Float => Value::Float(1.0),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Float => write!(f, "float"),
        }
    }
}

/// A concrete scalar value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
        }
    }

    /// Converts the value to `f64`; booleans become `0.0` or `1.0`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Bool(b) => f64::from(u8::from(b)),
            Value::Int(i) => i as f64,
            Value::Float(x) => x,
        }
    }

    pub fn truthy(&self) -> bool {
        match *self {
            Value::Bool(b) => b,
            Value::Int(i) => i != 0,
            Value::Float(x) => x != 0.0,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Bool(b) => Some(i64::from(b)),
            Value::Int(i) => Some(i),
            Value::Float(_) => None,
        }
    }

    /// Applies a unary operator's primitive semantics.
    ///
    /// Math functions always compute on the `f64` promotion of the operand.
    /// Classification functions (`is_nan` & co.) return `Bool`.
    pub fn unary(op: Op, v: Value) -> Result<Value, EvalError> {
        let unsupported = || EvalError::UnsupportedOperand { op, kind: v.kind() };
        Ok(match op {
            Op::Identity => v,
            Op::Negate => match v {
                Value::Bool(b) => Value::Int(-i64::from(b)),
                Value::Int(i) => Value::Int(i.wrapping_neg()),
                Value::Float(x) => Value::Float(-x),
            },
            Op::LogicalNot => Value::Bool(!v.truthy()),
            Op::BitNot => match v {
                Value::Bool(b) => Value::Bool(!b),
                Value::Int(i) => Value::Int(!i),
                Value::Float(_) => return Err(unsupported()),
            },
            Op::IPow(n) => match v {
                Value::Float(x) => Value::Float(x.powi(n)),
                // Negative integer powers leave the integers.
                _ if n < 0 => Value::Float(v.as_f64().powi(n)),
                _ => Value::Int(v.as_i64().ok_or_else(unsupported)?.wrapping_pow(n as u32)),
            },
            Op::Abs => match v {
                Value::Int(i) => Value::Int(i.wrapping_abs()),
                Value::Bool(b) => Value::Int(i64::from(b)),
                Value::Float(x) => Value::Float(x.abs()),
            },
            Op::IsFinite => Value::Bool(v.as_f64().is_finite()),
            Op::IsNan => Value::Bool(v.as_f64().is_nan()),
            Op::IsInfinite => Value::Bool(v.as_f64().is_infinite()),
            _ => match op.float_unary() {
                Some(f) => Value::Float(f(v.as_f64())),
                None => return Err(unsupported()),
            },
        })
    }

    /// Applies a binary operator's primitive semantics.
    pub fn binary(op: Op, a: Value, b: Value) -> Result<Value, EvalError> {
        let kind = a.kind().promote(b.kind());
        let unsupported = || EvalError::UnsupportedOperand {
            op,
            kind: a.kind().max(b.kind()),
        };

        match op {
            Op::Plus | Op::Minus | Op::Multiplies | Op::Divides | Op::Modulus => {
                if kind == ValueKind::Float {
                    let (x, y) = (a.as_f64(), b.as_f64());
                    return Ok(Value::Float(match op {
                        Op::Plus => x + y,
                        Op::Minus => x - y,
                        Op::Multiplies => x * y,
                        Op::Divides => x / y,
                        _ => return Err(unsupported()),
                    }));
                }
                let (x, y) = (
                    a.as_i64().ok_or_else(unsupported)?,
                    b.as_i64().ok_or_else(unsupported)?,
                );
                Ok(Value::Int(match op {
                    Op::Plus => x.wrapping_add(y),
                    Op::Minus => x.wrapping_sub(y),
                    Op::Multiplies => x.wrapping_mul(y),
                    Op::Divides | Op::Modulus if y == 0 => {
                        return Err(EvalError::IntegerDivisionByZero)
                    }
                    Op::Divides => x.wrapping_div(y),
                    _ => x.wrapping_rem(y),
                }))
            }
            Op::LogicalAnd => Ok(Value::Bool(a.truthy() && b.truthy())),
            Op::LogicalOr => Ok(Value::Bool(a.truthy() || b.truthy())),
            Op::BitAnd | Op::BitOr | Op::BitXor => match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(match op {
                    Op::BitAnd => x & y,
                    Op::BitOr => x | y,
                    _ => x ^ y,
                })),
                _ => {
                    let x = a.as_i64().ok_or_else(unsupported)?;
                    let y = b.as_i64().ok_or_else(unsupported)?;
                    Ok(Value::Int(match op {
                        Op::BitAnd => x & y,
                        Op::BitOr => x | y,
                        _ => x ^ y,
                    }))
                }
            },
            Op::EqualTo
            | Op::NotEqualTo
            | Op::Less
            | Op::Greater
            | Op::LessEqual
            | Op::GreaterEqual => {
                let ordering = if kind == ValueKind::Float {
                    a.as_f64().partial_cmp(&b.as_f64())
                } else {
                    a.as_i64()
                        .zip(b.as_i64())
                        .map(|(x, y)| x.cmp(&y))
                };
                use std::cmp::Ordering::*;
                Ok(Value::Bool(match (op, ordering) {
                    (Op::NotEqualTo, o) => o != Some(Equal),
                    (_, None) => false,
                    (Op::EqualTo, Some(o)) => o == Equal,
                    (Op::Less, Some(o)) => o == Less,
                    (Op::Greater, Some(o)) => o == Greater,
                    (Op::LessEqual, Some(o)) => o != Greater,
                    (_, Some(o)) => o != Less,
                }))
            }
            _ => match op.float_binary() {
                Some(f) => Ok(Value::Float(f(a.as_f64(), b.as_f64()))),
                None => Err(unsupported()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
