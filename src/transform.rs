//! Generic tree rewriting.
//!
//! A [`Transform`] is offered every node of a tree, top-down. When it returns a
//! replacement, that replacement stands in for the whole subtree and the engine does
//! not look inside the matched node. When it declines, the engine recurses into the
//! operands and rebuilds the node with the same operator. Terminals that are not
//! matched are copied.
//!
//! Rule tables ([`RuleSet`]) pair a shape [`Pattern`] with an action. Rules are kept
//! ordered by specificity so that a lookup always returns the most constrained
//! matching rule; `plus(X, Zero)` wins over `plus(X, Y)` no matter which was
//! declared first.

use std::convert::Infallible;
use std::fmt;

use crate::expr::{Node, Terminal};
use crate::ops::Op;

/// Constraint on the operator of a [`Pattern::Node`].
#[derive(Debug, Clone, PartialEq)]
pub enum OpPattern {
    /// Exactly this operator, including the `ipow` exponent
    Exact(Op),
    /// Any single-argument math function (`sin`, `floor`, ...)
    UnaryFunction,
    /// `ipow<n>` for any `n`
    IPow,
    Any,
}

impl OpPattern {
    fn matches(&self, op: Op) -> bool {
        match self {
            OpPattern::Exact(expected) => *expected == op,
            OpPattern::UnaryFunction => op.is_unary_function(),
            OpPattern::IPow => matches!(op, Op::IPow(_)),
            OpPattern::Any => true,
        }
    }
}

/// A shape pattern over nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Any node
    Any,
    /// Any terminal
    Terminal,
    /// A literal value terminal
    Literal,
    /// A variable, optionally with a fixed slot
    Var(Option<u32>),
    Placeholder,
    /// The zero sentinel of any kind
    Zero,
    /// The one sentinel of any kind
    One,
    /// An operator node whose operands match the given patterns
    Node(OpPattern, Vec<Pattern>),
}

impl Pattern {
    /// Shorthand for `Pattern::Node(OpPattern::Exact(op), operands)`.
    pub fn op(op: Op, operands: impl Into<Vec<Pattern>>) -> Pattern {
        Pattern::Node(OpPattern::Exact(op), operands.into())
    }

    pub fn matches(&self, node: &Node) -> bool {
        match (self, node) {
            (Pattern::Any, _) => true,
            (Pattern::Terminal, Node::Terminal(_)) => true,
            (Pattern::Literal, Node::Terminal(Terminal::Value(_))) => true,
            (Pattern::Var(slot), Node::Terminal(Terminal::Var { slot: s, .. })) => {
                slot.is_none_or(|slot| slot == *s)
            }
            (Pattern::Placeholder, Node::Terminal(Terminal::Placeholder(_))) => true,
            (Pattern::Zero, Node::Terminal(Terminal::Zero(_))) => true,
            (Pattern::One, Node::Terminal(Terminal::One(_))) => true,
            (Pattern::Node(op, operands), _) => {
                node.op().is_some_and(|actual| op.matches(actual))
                    && operands.len() == node.arity()
                    && operands
                        .iter()
                        .zip(node.operands())
                        .all(|(p, n)| p.matches(n))
            }
            _ => false,
        }
    }

    /// The number of constrained positions in the pattern.
    pub fn specificity(&self) -> usize {
        match self {
            Pattern::Any => 0,
            Pattern::Var(Some(_)) => 2,
            Pattern::Node(op, operands) => {
                usize::from(*op != OpPattern::Any)
                    + operands.iter().map(Pattern::specificity).sum::<usize>()
            }
            _ => 1,
        }
    }
}

/// A rule action: receives the rule set's context and the matched node.
pub type Action<C, R> = fn(&mut C, &Node) -> R;

/// A named pattern with its action.
pub struct Rule<C, R> {
    pub name: &'static str,
    pub pattern: Pattern,
    pub action: Action<C, R>,
}

impl<C, R> Rule<C, R> {
    pub fn apply(&self, ctx: &mut C, node: &Node) -> R {
        (self.action)(ctx, node)
    }
}

impl<C, R> fmt::Debug for Rule<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// An ordered rule table.
///
/// Rules are sorted by decreasing specificity; rules of equal specificity keep
/// their declaration order.
pub struct RuleSet<C, R> {
    rules: Vec<Rule<C, R>>,
}

impl<C, R> Default for RuleSet<C, R> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<C, R> RuleSet<C, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule and restores the specificity order.
    pub fn with(mut self, name: &'static str, pattern: Pattern, action: Action<C, R>) -> Self {
        self.rules.push(Rule {
            name,
            pattern,
            action,
        });
        // stable: equal specificity keeps declaration order
        self.rules
            .sort_by_key(|rule| std::cmp::Reverse(rule.pattern.specificity()));
        self
    }

    /// The most specific rule whose pattern matches `node`.
    pub fn find(&self, node: &Node) -> Option<&Rule<C, R>> {
        self.rules.iter().find(|rule| rule.pattern.matches(node))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule<C, R>> {
        self.rules.iter()
    }
}

/// A node-to-node rewrite offered to every node of a tree.
pub trait Transform {
    type Error;

    /// Returns the replacement for `node`, or `None` to let the engine recurse.
    fn apply(&mut self, node: &Node) -> Option<Result<Node, Self::Error>>;
}

struct Matching<F>(F);

impl<F, E> Transform for Matching<F>
where
    F: FnMut(&Node) -> Option<Result<Node, E>>,
{
    type Error = E;

    fn apply(&mut self, node: &Node) -> Option<Result<Node, E>> {
        (self.0)(node)
    }
}

/// Rewrites `node` with `tr`, top-down.
pub fn transform<T: Transform + ?Sized>(node: &Node, tr: &mut T) -> Result<Node, T::Error> {
    if let Some(replacement) = tr.apply(node) {
        return replacement;
    }
    match (node, node.op()) {
        (Node::Terminal(_), _) | (_, None) => Ok(node.clone()),
        (_, Some(op)) => {
            let operands = node
                .operands()
                .into_iter()
                .map(|operand| transform(operand, tr))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Node::rebuild(op, operands))
        }
    }
}

/// Rewrites `node` with a closure playing the role of [`Transform::apply`].
pub fn transform_matching<F, E>(node: &Node, f: F) -> Result<Node, E>
where
    F: FnMut(&Node) -> Option<Result<Node, E>>,
{
    transform(node, &mut Matching(f))
}

/// Replaces every terminal with the closure's result, keeping the operator skeleton.
pub fn transform_terminals<F, E>(node: &Node, mut f: F) -> Result<Node, E>
where
    F: FnMut(&Terminal) -> Result<Node, E>,
{
    transform_matching(node, |n| n.terminal_ref().map(&mut f))
}

/// Infallible variant of [`transform_matching`].
pub fn rewrite<F>(node: &Node, mut f: F) -> Node
where
    F: FnMut(&Node) -> Option<Node>,
{
    match transform_matching(node, |n| f(n).map(Ok::<_, Infallible>)) {
        Ok(node) => node,
        Err(never) => match never {},
    }
}

/// Bottom-up fold. `f` receives each node together with the already folded
/// results of its operands (empty for terminals).
pub fn fold<R, F>(node: &Node, f: &mut F) -> R
where
    F: FnMut(&Node, Vec<R>) -> R,
{
    let operands = node
        .operands()
        .into_iter()
        .map(|operand| fold(operand, f))
        .collect();
    f(node, operands)
}

/// Fallible bottom-up fold; the first error aborts the traversal.
pub fn try_fold<R, E, F>(node: &Node, f: &mut F) -> Result<R, E>
where
    F: FnMut(&Node, Vec<R>) -> Result<R, E>,
{
    let operands = node
        .operands()
        .into_iter()
        .map(|operand| try_fold(operand, f))
        .collect::<Result<Vec<_>, _>>()?;
    f(node, operands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{cos, sin};
    use crate::value::{Value, ValueKind};

    fn x() -> Node {
        Node::var(0, 1.0)
    }

    #[test]
    fn test_specificity_order() {
        let rules: RuleSet<(), &'static str> = RuleSet::new()
            .with("plus", Pattern::op(Op::Plus, [Pattern::Any, Pattern::Any]), |_, _| "plus")
            .with("any", Pattern::Any, |_, _| "any")
            .with(
                "plus-zero",
                Pattern::op(Op::Plus, [Pattern::Any, Pattern::Zero]),
                |_, _| "plus-zero",
            );

        let with_zero = x() + Node::zero(ValueKind::Float);
        let rule = rules.find(&with_zero).unwrap();
        assert_eq!(rule.name, "plus-zero");
        assert_eq!(rule.apply(&mut (), &with_zero), "plus-zero");

        assert_eq!(rules.find(&(x() + x())).unwrap().name, "plus");
        assert_eq!(rules.find(&x()).unwrap().name, "any");
        assert_eq!(rules.len(), 3);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let rules: RuleSet<(), u8> = RuleSet::new()
            .with("first", Pattern::Terminal, |_, _| 1)
            .with("second", Pattern::Literal, |_, _| 2);
        assert_eq!(rules.find(&Node::terminal(1.0)).unwrap().name, "first");
    }

    #[test]
    fn test_patterns() {
        assert!(Pattern::Var(Some(0)).matches(&x()));
        assert!(!Pattern::Var(Some(1)).matches(&x()));
        assert!(Pattern::Node(OpPattern::UnaryFunction, vec![Pattern::Any]).matches(&sin(x())));
        assert!(!Pattern::Node(OpPattern::UnaryFunction, vec![Pattern::Any]).matches(&-x()));
        assert!(Pattern::Node(OpPattern::IPow, vec![Pattern::Any])
            .matches(&crate::math::ipow(-3, x())));
        assert!(!Pattern::op(Op::Plus, [Pattern::Any]).matches(&(x() + 1.0)));
    }

    #[test]
    fn test_matched_subtree_is_not_entered() {
        // sin(sin(x)) -> cos(sin(x)): the inner sin is left alone
        let expr = sin(sin(x()));
        let result = rewrite(&expr, |n| match n {
            Node::Unary(Op::Sin, a) => Some(cos(a.as_ref().clone())),
            _ => None,
        });
        assert_eq!(result, cos(sin(x())));
    }

    #[test]
    fn test_unmatched_nodes_are_rebuilt() {
        let expr = sin(x()) * 2.0;
        let result = rewrite(&expr, |_| None);
        assert_eq!(result, expr);
    }

    #[test]
    fn test_transform_terminals() {
        let expr = x() + Node::placeholder(0);
        let result = transform_terminals(&expr, |t| match t {
            Terminal::Placeholder(_) => Ok::<_, ()>(Node::terminal(3.0)),
            other => Ok(Node::from(other.clone())),
        })
        .unwrap();
        assert_eq!(result, x() + 3.0);

        let err = transform_terminals(&expr, |_| Err::<Node, _>("boom"));
        assert_eq!(err, Err("boom"));
    }

    #[test]
    fn test_fold() {
        let expr = sin(x()) * 2.0 + 1.0;
        let leaves = fold(&expr, &mut |n: &Node, children: Vec<usize>| {
            usize::from(n.is_terminal()) + children.into_iter().sum::<usize>()
        });
        assert_eq!(leaves, 3);

        let literal_sum = try_fold(&expr, &mut |n: &Node, children: Vec<f64>| {
            match n.terminal_ref() {
                Some(Terminal::Value(Value::Float(v))) => Ok(*v),
                Some(_) => Ok(0.0),
                None if n.op() == Some(Op::Sin) => Err("sin"),
                None => Ok(children.iter().sum()),
            }
        });
        assert_eq!(literal_sum, Err("sin"));
    }
}
