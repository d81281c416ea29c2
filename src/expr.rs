//! Expression module for representing typed expression trees.
//!
//! This module defines the core tree types:
//!
//! - `Terminal`: an arity-0 leaf holding a literal, a variable, a placeholder or a
//!   typed zero/one sentinel
//! - `Node`: either a terminal or an operator applied to one, two or three operands
//!
//! The tree is built recursively using `Box<Node>` for operands. Nodes are immutable
//! values: every rewrite produces a new tree, so a tree can be shared freely across
//! threads once built.
//!
//! # Construction
//! Operator nodes are built through [`Node::unary`], [`Node::binary`] and
//! [`Node::ternary`], or through the operator overloads and free functions in
//! [`crate::math`]. Construction *unwraps* its operands: an explicit `identity(u)`
//! wrapper collapses to `u` and raw scalars become literal terminals. Nothing is
//! evaluated at construction time.
//!
//! # Shape
//! Two trees have the same *shape* when they agree on operator tags, arities,
//! terminal kinds, variable slots, placeholder indices and sentinel kinds. Literal
//! values are ignored. Shape comparison is what the simplifier uses to detect
//! convergence.

use std::fmt;

use itertools::Itertools;

use crate::ops::{Notation, Op};
use crate::transform::fold;
use crate::value::{Value, ValueKind};

/// A leaf of the expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// A literal scalar
    Value(Value),
    /// A value tagged with the slot it is differentiated along
    Var { slot: u32, value: Value },
    /// A positional argument resolved at substitution time
    Placeholder(usize),
    /// The typed additive identity
    Zero(ValueKind),
    /// The typed multiplicative identity
    One(ValueKind),
}

impl Terminal {
    /// The concrete value of the terminal, with sentinels converted to their kind.
    ///
    /// Placeholders have no value.
    pub fn value(&self) -> Option<Value> {
        match *self {
            Terminal::Value(v) | Terminal::Var { value: v, .. } => Some(v),
            Terminal::Zero(kind) => Some(kind.zero()),
            Terminal::One(kind) => Some(kind.one()),
            Terminal::Placeholder(_) => None,
        }
    }

    /// The value a printer should show for this terminal.
    ///
    /// Sentinels and placeholders have no scalar of their own and return `None`;
    /// printers render them with their own text.
    pub fn display_value(&self) -> Option<Value> {
        match *self {
            Terminal::Value(v) | Terminal::Var { value: v, .. } => Some(v),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Terminal::Zero(kind) | Terminal::One(kind) => Some(*kind),
            _ => self.value().map(|v| v.kind()),
        }
    }

    pub fn same_shape(&self, other: &Terminal) -> bool {
        match (self, other) {
            (Terminal::Value(a), Terminal::Value(b)) => a.kind() == b.kind(),
            (Terminal::Var { slot: i, value: a }, Terminal::Var { slot: j, value: b }) => {
                i == j && a.kind() == b.kind()
            }
            (Terminal::Placeholder(i), Terminal::Placeholder(j)) => i == j,
            (Terminal::Zero(a), Terminal::Zero(b)) | (Terminal::One(a), Terminal::One(b)) => {
                a == b
            }
            _ => false,
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Value(v) => write!(f, "{v}"),
            Terminal::Var { slot, .. } => write!(f, "x{slot}"),
            Terminal::Placeholder(k) => write!(f, "_{k}"),
            Terminal::Zero(_) => write!(f, "0"),
            Terminal::One(_) => write!(f, "1"),
        }
    }
}

/// An expression tree node.
///
/// The operator's arity is encoded in the variant, so a node can never carry the
/// wrong number of operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Terminal(Terminal),
    Unary(Op, Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Ternary(Op, Box<Node>, Box<Node>, Box<Node>),
}

impl Node {
    /// Wraps a raw value into a literal terminal.
    pub fn terminal(value: impl Into<Value>) -> Node {
        Node::Terminal(Terminal::Value(value.into()))
    }

    /// A variable with the given slot identity and current value.
    ///
    /// Equal slots denote the same differentiation variable; keeping slots
    /// distinct is up to the caller.
    pub fn var(slot: u32, value: impl Into<Value>) -> Node {
        Node::Terminal(Terminal::Var {
            slot,
            value: value.into(),
        })
    }

    pub fn placeholder(index: usize) -> Node {
        Node::Terminal(Terminal::Placeholder(index))
    }

    pub fn zero(kind: ValueKind) -> Node {
        Node::Terminal(Terminal::Zero(kind))
    }

    pub fn one(kind: ValueKind) -> Node {
        Node::Terminal(Terminal::One(kind))
    }

    /// The explicit `identity(n)` wrapper.
    ///
    /// The wrapper is kept as is; it only disappears when the node is used as an
    /// operand of another operator.
    pub fn identity(node: impl Into<Node>) -> Node {
        Node::Unary(Op::Identity, Box::new(node.into()))
    }

    /// Applies a unary operator. Panics in debug builds if `op` is not unary.
    pub fn unary(op: Op, a: impl Into<Node>) -> Node {
        debug_assert_eq!(op.arity(), 1, "`{op}` is not a unary operator");
        Node::Unary(op, operand(a))
    }

    /// Applies a binary operator. Panics in debug builds if `op` is not binary.
    pub fn binary(op: Op, a: impl Into<Node>, b: impl Into<Node>) -> Node {
        debug_assert_eq!(op.arity(), 2, "`{op}` is not a binary operator");
        Node::Binary(op, operand(a), operand(b))
    }

    /// Applies a ternary operator. Panics in debug builds if `op` is not ternary.
    pub fn ternary(op: Op, a: impl Into<Node>, b: impl Into<Node>, c: impl Into<Node>) -> Node {
        debug_assert_eq!(op.arity(), 3, "`{op}` is not a ternary operator");
        Node::Ternary(op, operand(a), operand(b), operand(c))
    }

    /// Rebuilds an operator node from already transformed operands.
    ///
    /// Operands are unwrapped the same way as by the public constructors.
    pub(crate) fn rebuild(op: Op, operands: Vec<Node>) -> Node {
        let mut it = operands.into_iter().map(operand);
        match (it.next(), it.next(), it.next()) {
            (Some(a), None, None) => Node::Unary(op, a),
            (Some(a), Some(b), None) => Node::Binary(op, a, b),
            (Some(a), Some(b), Some(c)) => Node::Ternary(op, a, b, c),
            _ => unreachable!("operator nodes have between one and three operands"),
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Node::Terminal(_) => 0,
            Node::Unary(..) => 1,
            Node::Binary(..) => 2,
            Node::Ternary(..) => 3,
        }
    }

    /// The operator tag, or `None` for a terminal.
    pub fn op(&self) -> Option<Op> {
        match self {
            Node::Terminal(_) => None,
            Node::Unary(op, ..) | Node::Binary(op, ..) | Node::Ternary(op, ..) => Some(*op),
        }
    }

    /// The ordered operands; empty for a terminal.
    pub fn operands(&self) -> Vec<&Node> {
        match self {
            Node::Terminal(_) => vec![],
            Node::Unary(_, a) => vec![&**a],
            Node::Binary(_, a, b) => vec![&**a, &**b],
            Node::Ternary(_, a, b, c) => vec![&**a, &**b, &**c],
        }
    }

    pub fn terminal_ref(&self) -> Option<&Terminal> {
        match self {
            Node::Terminal(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Node::Terminal(_))
    }

    /// Structural comparison ignoring literal values.
    pub fn same_shape(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Terminal(a), Node::Terminal(b)) => a.same_shape(b),
            _ => {
                self.op() == other.op()
                    && self
                        .operands()
                        .into_iter()
                        .zip(other.operands())
                        .all(|(a, b)| a.same_shape(b))
            }
        }
    }

    /// The total number of nodes in the tree, terminals included.
    pub fn node_count(&self) -> usize {
        fold(self, &mut |_, counts: Vec<usize>| 1 + counts.iter().sum::<usize>())
    }

    /// The length of the longest root-to-leaf path; a terminal has depth 1.
    pub fn depth(&self) -> usize {
        fold(self, &mut |_, depths: Vec<usize>| {
            1 + depths.into_iter().max().unwrap_or(0)
        })
    }

    /// Whether a variable with the given slot occurs anywhere in the tree.
    pub fn contains_var(&self, slot: u32) -> bool {
        self.terminals()
            .any(|t| matches!(t, Terminal::Var { slot: s, .. } if *s == slot))
    }

    /// The number of positional arguments the tree expects: one past the highest
    /// placeholder index, or zero if it has none.
    pub fn placeholder_count(&self) -> usize {
        self.terminals()
            .filter_map(|t| match t {
                Terminal::Placeholder(k) => Some(k + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// The distinct variable slots in the tree, in ascending order.
    pub fn slots(&self) -> Vec<u32> {
        self.terminals()
            .filter_map(|t| match t {
                Terminal::Var { slot, .. } => Some(*slot),
                _ => None,
            })
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// The static kind of the value the tree evaluates to, if it can be told
    /// without evaluating. Trees containing placeholders have no static kind.
    pub fn kind(&self) -> Option<ValueKind> {
        use Op::*;
        match self {
            Node::Terminal(t) => t.kind(),
            Node::Unary(op, a) => {
                let kind = a.kind()?;
                Some(match op {
                    Identity => kind,
                    LogicalNot | IsFinite | IsNan | IsInfinite => ValueKind::Bool,
                    BitNot if kind == ValueKind::Bool => ValueKind::Bool,
                    Negate | BitNot | Abs => kind.promote(ValueKind::Int),
                    IPow(n) if *n < 0 => ValueKind::Float,
                    IPow(_) => kind.promote(ValueKind::Int),
                    _ => ValueKind::Float,
                })
            }
            Node::Binary(op, a, b) => {
                let (ka, kb) = (a.kind()?, b.kind()?);
                Some(match op {
                    Plus | Minus | Multiplies | Divides | Modulus => ka.promote(kb),
                    BitAnd | BitOr | BitXor if ka == ValueKind::Bool && kb == ValueKind::Bool => {
                        ValueKind::Bool
                    }
                    BitAnd | BitOr | BitXor => ValueKind::Int,
                    LogicalAnd | LogicalOr | EqualTo | NotEqualTo | Less | Greater
                    | LessEqual | GreaterEqual => ValueKind::Bool,
                    _ => ValueKind::Float,
                })
            }
            Node::Ternary(Select, _, a, b) => Some(a.kind()?.max(b.kind()?)),
            Node::Ternary(..) => Some(ValueKind::Float),
        }
    }

    /// Iterates over every terminal in pre-order.
    pub fn terminals(&self) -> impl Iterator<Item = &Terminal> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                match node {
                    Node::Terminal(t) => return Some(t),
                    _ => stack.extend(node.operands().into_iter().rev()),
                }
            }
            None
        })
    }
}

/// Moves a node into an operand slot, collapsing an `identity` wrapper.
fn operand(node: impl Into<Node>) -> Box<Node> {
    match node.into() {
        Node::Unary(Op::Identity, inner) => inner,
        other => Box::new(other),
    }
}

impl From<Terminal> for Node {
    fn from(terminal: Terminal) -> Self {
        Node::Terminal(terminal)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::terminal(value)
    }
}

impl From<f64> for Node {
    fn from(x: f64) -> Self {
        Node::terminal(x)
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Node::terminal(i)
    }
}

impl From<i32> for Node {
    fn from(i: i32) -> Self {
        Node::terminal(i)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::terminal(b)
    }
}

/// Formats a tree fully parenthesized:
/// - Infix operators as `(a + b)`
/// - Prefix operators as `-a`
/// - Everything else as `f(a, b)`
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Terminal(t) => write!(f, "{t}"),
            Node::Unary(op, a) if op.notation() == Notation::Prefix => {
                write!(f, "{}{a}", op.symbol())
            }
            Node::Binary(op, a, b) if op.notation() == Notation::Infix => {
                write!(f, "({a} {} {b})", op.symbol())
            }
            _ => write!(
                f,
                "{}({})",
                self.op().map(|op| op.symbol()).unwrap_or_default(),
                self.operands().into_iter().join(", ")
            ),
        }
    }
}
