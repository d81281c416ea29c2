//! Construction surface for expression trees.
//!
//! Arithmetic, bitwise and negation operators are overloaded on [`Node`] so formulas
//! read like ordinary Rust:
//!
//! ```rust
//! use exprtree_jit::prelude::*;
//!
//! let x = Node::var(0, 1.0);
//! let y = Node::var(1, 2.0);
//! let f = sin(x.clone() * y) + 2.0 * x;
//! assert_eq!(f.node_count(), 8);
//! ```
//!
//! Comparisons, logical connectives, `select` and the math functions are free
//! functions. `!` builds `bit_not`; use [`logical_not`] for the boolean negation.

use crate::expr::Node;
use crate::ops::Op;

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait for Node {
            type Output = Node;
            fn $method(self, rhs: Node) -> Node {
                Node::binary($op, self, rhs)
            }
        }
        binary_operator!(@scalar $trait, $method, $op, f64);
        binary_operator!(@scalar $trait, $method, $op, i64);
        binary_operator!(@scalar $trait, $method, $op, i32);
    };
    (@scalar $trait:ident, $method:ident, $op:expr, $scalar:ty) => {
        impl std::ops::$trait<$scalar> for Node {
            type Output = Node;
            fn $method(self, rhs: $scalar) -> Node {
                Node::binary($op, self, rhs)
            }
        }
        impl std::ops::$trait<Node> for $scalar {
            type Output = Node;
            fn $method(self, rhs: Node) -> Node {
                Node::binary($op, self, rhs)
            }
        }
    };
}

binary_operator!(Add, add, Op::Plus);
binary_operator!(Sub, sub, Op::Minus);
binary_operator!(Mul, mul, Op::Multiplies);
binary_operator!(Div, div, Op::Divides);
binary_operator!(Rem, rem, Op::Modulus);
binary_operator!(BitAnd, bitand, Op::BitAnd);
binary_operator!(BitOr, bitor, Op::BitOr);
binary_operator!(BitXor, bitxor, Op::BitXor);

impl std::ops::Neg for Node {
    type Output = Node;
    fn neg(self) -> Node {
        Node::unary(Op::Negate, self)
    }
}

impl std::ops::Not for Node {
    type Output = Node;
    fn not(self) -> Node {
        Node::unary(Op::BitNot, self)
    }
}

macro_rules! unary_functions {
    ($($(#[$doc:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(u: impl Into<Node>) -> Node {
                Node::unary($op, u)
            }
        )*
    };
}

macro_rules! binary_functions {
    ($($(#[$doc:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(a: impl Into<Node>, b: impl Into<Node>) -> Node {
                Node::binary($op, a, b)
            }
        )*
    };
}

unary_functions! {
    /// Boolean negation of the operand's truthiness.
    logical_not => Op::LogicalNot;
    abs => Op::Abs;
    exp => Op::Exp;
    exp2 => Op::Exp2;
    exp_m1 => Op::ExpM1;
    /// Natural logarithm.
    ln => Op::Ln;
    log10 => Op::Log10;
    log2 => Op::Log2;
    ln_1p => Op::Ln1p;
    sqrt => Op::Sqrt;
    cbrt => Op::Cbrt;
    sin => Op::Sin;
    cos => Op::Cos;
    tan => Op::Tan;
    asin => Op::Asin;
    acos => Op::Acos;
    atan => Op::Atan;
    sinh => Op::Sinh;
    cosh => Op::Cosh;
    tanh => Op::Tanh;
    asinh => Op::Asinh;
    acosh => Op::Acosh;
    atanh => Op::Atanh;
    ceil => Op::Ceil;
    floor => Op::Floor;
    round => Op::Round;
    trunc => Op::Trunc;
    signum => Op::Signum;
    is_finite => Op::IsFinite;
    is_nan => Op::IsNan;
    is_infinite => Op::IsInfinite;
}

binary_functions! {
    equal_to => Op::EqualTo;
    not_equal_to => Op::NotEqualTo;
    less => Op::Less;
    greater => Op::Greater;
    less_equal => Op::LessEqual;
    greater_equal => Op::GreaterEqual;
    logical_and => Op::LogicalAnd;
    logical_or => Op::LogicalOr;
    /// `a` raised to the real power `b`.
    pow => Op::Pow;
    atan2 => Op::Atan2;
    hypot => Op::Hypot;
    fmin => Op::Fmin;
    fmax => Op::Fmax;
    copysign => Op::Copysign;
}

/// `u` raised to the fixed integer power `n`.
pub fn ipow(n: i32, u: impl Into<Node>) -> Node {
    Node::unary(Op::IPow(n), u)
}

/// `a` if `pred` is truthy, otherwise `b`. Only the chosen branch is evaluated.
pub fn select(pred: impl Into<Node>, a: impl Into<Node>, b: impl Into<Node>) -> Node {
    Node::ternary(Op::Select, pred, a, b)
}

/// Fused multiply-add `a * b + c`.
pub fn fma(a: impl Into<Node>, b: impl Into<Node>, c: impl Into<Node>) -> Node {
    Node::ternary(Op::Fma, a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_operator_overloads() {
        let x = Node::var(0, 1.0);
        assert_eq!(
            x.clone() * 2.0,
            Node::binary(Op::Multiplies, x.clone(), Node::terminal(2.0))
        );
        assert_eq!(
            2.0 * x.clone(),
            Node::binary(Op::Multiplies, Node::terminal(2.0), x.clone())
        );
        assert_eq!((x.clone() % 3_i64).op(), Some(Op::Modulus));
        assert_eq!((-x.clone()).op(), Some(Op::Negate));
        assert_eq!((!x.clone()).op(), Some(Op::BitNot));
        assert_eq!((x.clone() ^ x).op(), Some(Op::BitXor));
    }

    #[test]
    fn test_scalar_operands_become_terminals() {
        let expr = Node::var(0, 1.0) + 4_i64;
        let rhs = expr.operands()[1];
        assert_eq!(rhs, &Node::terminal(Value::Int(4)));
    }

    #[test]
    fn test_function_builders() {
        let x = Node::var(0, 0.5);
        assert_eq!(ipow(3, x.clone()).op(), Some(Op::IPow(3)));
        assert_eq!(select(less(x.clone(), 1.0), x.clone(), 0.0).arity(), 3);
        assert_eq!(fma(x.clone(), 2.0, 1.0).op(), Some(Op::Fma));
        assert_eq!(hypot(x.clone(), 1.0).op(), Some(Op::Hypot));
        assert_eq!(logical_not(x).op(), Some(Op::LogicalNot));
    }
}
