//! The operator catalog.
//!
//! Every operator node in an expression tree is tagged with an [`Op`]. The
//! catalog fixes, per operator, its arity, display symbol and notation, the
//! primitive used to evaluate it and, for the differentiable unary functions,
//! the derivative rule `f'(u)` that the chain rule composes with `du`.

use std::borrow::Cow;
use std::f64::consts::{LN_10, LN_2};
use std::fmt;

use crate::expr::Node;
use crate::math;

/// How a collaborator should render an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    /// `a + b`
    Infix,
    /// `-a`
    Prefix,
    /// `f(a, b)`
    Function,
}

/// An operator tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // arity 1
    Identity,
    Negate,
    LogicalNot,
    BitNot,
    /// Integer power with a fixed exponent
    IPow(i32),
    Abs,
    Exp,
    Exp2,
    ExpM1,
    Ln,
    Log10,
    Log2,
    Ln1p,
    Sqrt,
    Cbrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Ceil,
    Floor,
    Round,
    Trunc,
    Signum,
    IsFinite,
    IsNan,
    IsInfinite,

    // arity 2
    Plus,
    Minus,
    Multiplies,
    Divides,
    Modulus,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    EqualTo,
    NotEqualTo,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Pow,
    Atan2,
    Hypot,
    Fmin,
    Fmax,
    Copysign,

    // arity 3
    /// `select(pred, a, b)`: `a` if `pred` is truthy, otherwise `b`
    Select,
    /// Fused multiply-add `a * b + c`
    Fma,
}

impl Op {
    pub fn arity(&self) -> usize {
        use Op::*;
        match self {
            Plus | Minus | Multiplies | Divides | Modulus | LogicalAnd | LogicalOr | BitAnd
            | BitOr | BitXor | EqualTo | NotEqualTo | Less | Greater | LessEqual
            | GreaterEqual | Pow | Atan2 | Hypot | Fmin | Fmax | Copysign => 2,
            Select | Fma => 3,
            _ => 1,
        }
    }

    /// The bare operator name, without the `ipow` exponent.
    pub fn name(&self) -> &'static str {
        use Op::*;
        match self {
            Identity => "identity",
            Negate => "-",
            LogicalNot => "!",
            BitNot => "~",
            IPow(_) => "ipow",
            Abs => "abs",
            Exp => "exp",
            Exp2 => "exp2",
            ExpM1 => "exp_m1",
            Ln => "ln",
            Log10 => "log10",
            Log2 => "log2",
            Ln1p => "ln_1p",
            Sqrt => "sqrt",
            Cbrt => "cbrt",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Asin => "asin",
            Acos => "acos",
            Atan => "atan",
            Sinh => "sinh",
            Cosh => "cosh",
            Tanh => "tanh",
            Asinh => "asinh",
            Acosh => "acosh",
            Atanh => "atanh",
            Ceil => "ceil",
            Floor => "floor",
            Round => "round",
            Trunc => "trunc",
            Signum => "signum",
            IsFinite => "is_finite",
            IsNan => "is_nan",
            IsInfinite => "is_infinite",
            Plus => "+",
            Minus => "-",
            Multiplies => "*",
            Divides => "/",
            Modulus => "%",
            LogicalAnd => "&&",
            LogicalOr => "||",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            EqualTo => "==",
            NotEqualTo => "!=",
            Less => "<",
            Greater => ">",
            LessEqual => "<=",
            GreaterEqual => ">=",
            Pow => "pow",
            Atan2 => "atan2",
            Hypot => "hypot",
            Fmin => "fmin",
            Fmax => "fmax",
            Copysign => "copysign",
            Select => "select",
            Fma => "fma",
        }
    }

    /// The display symbol, e.g. `+`, `sin` or `ipow<-2>`.
    pub fn symbol(&self) -> Cow<'static, str> {
        match self {
            Op::IPow(n) => Cow::Owned(format!("ipow<{n}>")),
            _ => Cow::Borrowed(self.name()),
        }
    }

    pub fn notation(&self) -> Notation {
        use Op::*;
        match self {
            Negate | LogicalNot | BitNot => Notation::Prefix,
            Plus | Minus | Multiplies | Divides | Modulus | LogicalAnd | LogicalOr | BitAnd
            | BitOr | BitXor | EqualTo | NotEqualTo | Less | Greater | LessEqual
            | GreaterEqual => Notation::Infix,
            _ => Notation::Function,
        }
    }

    /// Whether this is a single-argument math function such as `sin` or `floor`.
    pub fn is_unary_function(&self) -> bool {
        self.arity() == 1
            && self.notation() == Notation::Function
            && !matches!(self, Op::Identity | Op::IPow(_))
    }

    /// The `f64` primitive behind a unary math function.
    pub(crate) fn float_unary(&self) -> Option<fn(f64) -> f64> {
        use Op::*;
        Some(match self {
            Exp => f64::exp,
            Exp2 => f64::exp2,
            ExpM1 => f64::exp_m1,
            Ln => f64::ln,
            Log10 => f64::log10,
            Log2 => f64::log2,
            Ln1p => f64::ln_1p,
            Sqrt => f64::sqrt,
            Cbrt => f64::cbrt,
            Sin => f64::sin,
            Cos => f64::cos,
            Tan => f64::tan,
            Asin => f64::asin,
            Acos => f64::acos,
            Atan => f64::atan,
            Sinh => f64::sinh,
            Cosh => f64::cosh,
            Tanh => f64::tanh,
            Asinh => f64::asinh,
            Acosh => f64::acosh,
            Atanh => f64::atanh,
            Ceil => f64::ceil,
            Floor => f64::floor,
            Round => f64::round,
            Trunc => f64::trunc,
            Signum => f64::signum,
            _ => return None,
        })
    }

    /// The `f64` primitive behind a binary math function.
    pub(crate) fn float_binary(&self) -> Option<fn(f64, f64) -> f64> {
        use Op::*;
        Some(match self {
            Pow => f64::powf,
            Atan2 => f64::atan2,
            Hypot => f64::hypot,
            Fmin => f64::min,
            Fmax => f64::max,
            Copysign => f64::copysign,
            _ => return None,
        })
    }

    /// The registered derivative `f'(u)` of a unary function, if any.
    ///
    /// The differentiator multiplies the returned expression by `du`.
    pub fn unary_derivative(&self, u: &Node) -> Option<Node> {
        use Op::*;
        let u = || u.clone();
        Some(match self {
            Sin => math::cos(u()),
            Cos => -math::sin(u()),
            Tan => math::ipow(-2, math::cos(u())),
            Exp => math::exp(u()),
            Exp2 => LN_2 * math::exp2(u()),
            ExpM1 => math::exp(u()),
            Ln => math::ipow(-1, u()),
            Log10 => math::ipow(-1, u()) / LN_10,
            Log2 => math::ipow(-1, u()) / LN_2,
            Ln1p => math::ipow(-1, 1.0 + u()),
            Sqrt => 0.5 * math::ipow(-1, math::sqrt(u())),
            Cbrt => (1.0 / 3.0) * math::ipow(-2, math::cbrt(u())),
            Asin => math::ipow(-1, math::sqrt(1.0 - math::ipow(2, u()))),
            Acos => -math::ipow(-1, math::sqrt(1.0 - math::ipow(2, u()))),
            Atan => math::ipow(-1, 1.0 + math::ipow(2, u())),
            Sinh => math::cosh(u()),
            Cosh => math::sinh(u()),
            Tanh => math::ipow(-2, math::cosh(u())),
            Asinh => math::ipow(-1, math::sqrt(math::ipow(2, u()) + 1.0)),
            Acosh => math::ipow(-1, math::sqrt(math::ipow(2, u()) - 1.0)),
            Atanh => math::ipow(-1, 1.0 - math::ipow(2, u())),
            Abs => math::signum(u()),
            _ => return None,
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_and_notation() {
        assert_eq!(Op::Plus.arity(), 2);
        assert_eq!(Op::Select.arity(), 3);
        assert_eq!(Op::IPow(4).arity(), 1);
        assert_eq!(Op::Plus.notation(), Notation::Infix);
        assert_eq!(Op::Negate.notation(), Notation::Prefix);
        assert_eq!(Op::Sin.notation(), Notation::Function);
    }

    #[test]
    fn test_symbols() {
        assert_eq!(Op::IPow(-2).symbol(), "ipow<-2>");
        assert_eq!(Op::Multiplies.to_string(), "*");
        assert_eq!(Op::Select.symbol(), "select");
    }

    #[test]
    fn test_unary_functions() {
        assert!(Op::Sin.is_unary_function());
        assert!(Op::Floor.is_unary_function());
        assert!(!Op::Identity.is_unary_function());
        assert!(!Op::IPow(2).is_unary_function());
        assert!(!Op::Negate.is_unary_function());
    }

    #[test]
    fn test_registered_derivatives() {
        let u = Node::var(0, 1.0);
        assert_eq!(Op::Sin.unary_derivative(&u), Some(math::cos(u.clone())));
        assert!(Op::Floor.unary_derivative(&u).is_none());
        assert!(Op::IsNan.unary_derivative(&u).is_none());
    }
}
