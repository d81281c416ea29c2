//! Algebraic simplification of derivative trees.
//!
//! The rules only look at the `Zero` and `One` sentinels the differentiator produces,
//! never at literal values, so they are exact for every value kind:
//!
//! - `x + 0 → x`, `0 + x → x`, `0 + 0 → 0`
//! - `x - 0 → x`, `0 - 0 → 0`
//! - `x * 0 → 0`, `0 * x → 0`, `x * 1 → x`, `1 * x → x`, `1 * 1 → 1`
//! - `x / 1 → x`, `1 / 1 → 1`, `0 / x → 0`
//! - `identity(u) → u`, `ipow<1>(u) → u`
//!
//! A matched rule re-simplifies the surviving operand only. One engine pass cannot
//! see a rule enabled by a rewrite below it (`(0 * x) + y` becomes `0 + y`), so
//! [`Simplifier::simplify`] repeats passes until the tree's shape stops changing.
//! Every rewrite removes nodes, which bounds the number of passes; the configured
//! pass cap is a backstop.

use std::convert::Infallible;
use std::sync::OnceLock;

use tracing::{debug, trace, warn};

use crate::eval::evaluate;
use crate::expr::{Node, Terminal};
use crate::ops::Op;
use crate::options::SimplifyOptions;
use crate::transform::{transform, Pattern, RuleSet, Transform};
use crate::value::ValueKind;

/// Drives the simplification rules over a tree.
#[derive(Debug, Clone, Default)]
pub struct Simplifier {
    options: SimplifyOptions,
}

impl Simplifier {
    pub fn new(options: SimplifyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SimplifyOptions {
        &self.options
    }

    /// Runs a single engine pass.
    pub fn simplify_once(&mut self, node: &Node) -> Node {
        match transform(node, self) {
            Ok(node) => node,
            Err(never) => match never {},
        }
    }

    /// Runs passes until the shape of the tree stops changing.
    pub fn simplify(&mut self, node: &Node) -> Node {
        let mut current = node.clone();
        for pass in 1..=self.options.max_passes {
            let next = self.simplify_once(&current);
            let converged = next.same_shape(&current);
            debug!(pass, nodes = next.node_count(), "simplification pass");
            current = next;
            if converged {
                debug!(pass, "simplification converged");
                return current;
            }
        }
        warn!(
            max_passes = self.options.max_passes,
            "simplification stopped before reaching a fixpoint"
        );
        current
    }

    /// Replaces an operator node over literals with its value.
    fn fold_constant(&self, node: &Node) -> Option<Node> {
        if node.is_terminal() || !node.operands().iter().all(|n| Pattern::Literal.matches(n)) {
            return None;
        }
        match evaluate(node) {
            Ok(value) => Some(Node::terminal(value)),
            Err(err) => {
                trace!(%node, %err, "not folding");
                None
            }
        }
    }
}

impl Transform for Simplifier {
    type Error = Infallible;

    fn apply(&mut self, node: &Node) -> Option<Result<Node, Infallible>> {
        if let Some(rule) = rules().find(node) {
            trace!(rule = rule.name, %node, "simplifying");
            return Some(Ok(rule.apply(self, node)));
        }
        if self.options.fold_constants {
            return self.fold_constant(node).map(Ok);
        }
        None
    }
}

/// One pass with the default options.
pub fn simplify_once(node: &Node) -> Node {
    Simplifier::default().simplify_once(node)
}

/// Simplifies to a fixpoint with the default options.
pub fn simplify(node: &Node) -> Node {
    Simplifier::default().simplify(node)
}

impl Node {
    /// Shorthand for [`simplify`].
    pub fn simplify(&self) -> Node {
        simplify(self)
    }
}

fn sentinel_kind(node: &Node) -> Option<ValueKind> {
    match node.terminal_ref() {
        Some(Terminal::Zero(kind) | Terminal::One(kind)) => Some(*kind),
        _ => None,
    }
}

/// The kind of a sentinel result combining both operands.
fn combined_kind(node: &Node) -> ValueKind {
    node.operands()
        .into_iter()
        .filter_map(|operand| sentinel_kind(operand).or_else(|| operand.kind()))
        .reduce(ValueKind::promote)
        .unwrap_or(ValueKind::Float)
}

fn keep_left(s: &mut Simplifier, node: &Node) -> Node {
    s.simplify_once(node.operands()[0])
}

fn keep_right(s: &mut Simplifier, node: &Node) -> Node {
    s.simplify_once(node.operands()[1])
}

fn zero(_: &mut Simplifier, node: &Node) -> Node {
    Node::zero(combined_kind(node))
}

fn one(_: &mut Simplifier, node: &Node) -> Node {
    Node::one(combined_kind(node))
}

fn rules() -> &'static RuleSet<Simplifier, Node> {
    static RULES: OnceLock<RuleSet<Simplifier, Node>> = OnceLock::new();
    RULES.get_or_init(|| {
        use Pattern::{Any, One, Zero};
        RuleSet::new()
            .with("x+0", Pattern::op(Op::Plus, [Any, Zero]), keep_left)
            .with("0+x", Pattern::op(Op::Plus, [Zero, Any]), keep_right)
            .with("0+0", Pattern::op(Op::Plus, [Zero, Zero]), zero)
            .with("x-0", Pattern::op(Op::Minus, [Any, Zero]), keep_left)
            .with("0-0", Pattern::op(Op::Minus, [Zero, Zero]), zero)
            .with("x*0", Pattern::op(Op::Multiplies, [Any, Zero]), zero)
            .with("0*x", Pattern::op(Op::Multiplies, [Zero, Any]), zero)
            .with("x*1", Pattern::op(Op::Multiplies, [Any, One]), keep_left)
            .with("1*x", Pattern::op(Op::Multiplies, [One, Any]), keep_right)
            .with("1*1", Pattern::op(Op::Multiplies, [One, One]), one)
            .with("x/1", Pattern::op(Op::Divides, [Any, One]), keep_left)
            .with("1/1", Pattern::op(Op::Divides, [One, One]), one)
            .with("0/x", Pattern::op(Op::Divides, [Zero, Any]), zero)
            .with("identity", Pattern::op(Op::Identity, [Any]), keep_left)
            .with("ipow<1>", Pattern::op(Op::IPow(1), [Any]), keep_left)
    })
}
