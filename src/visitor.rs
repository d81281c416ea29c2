//! Read-only traversal for printers and exporters.
//!
//! Provides a clean interface for walking a tree without matching on its
//! structure. Printers that want precedence-aware output, tree dumps or graph
//! exports implement [`NodeVisitor`] and drive it with [`walk`].

use crate::expr::{Node, Terminal};
use crate::ops::{Notation, Op};

/// Trait for visiting the nodes of an expression tree.
///
/// # Example
/// ```rust
/// use exprtree_jit::prelude::*;
/// use exprtree_jit::visitor::{walk, NodeVisitor};
///
/// struct OperatorCounter(usize);
///
/// impl NodeVisitor for OperatorCounter {
///     fn visit_terminal(&mut self, _terminal: &Terminal) {}
///     fn visit_operator(&mut self, _op: Op, _notation: Notation, _symbol: &str, _operands: &[&Node]) -> bool {
///         self.0 += 1;
///         true
///     }
/// }
///
/// let mut counter = OperatorCounter(0);
/// walk(&(sin(Node::var(0, 1.0)) + 1.0), &mut counter);
/// assert_eq!(counter.0, 2);
/// ```
pub trait NodeVisitor {
    /// Visit a leaf.
    fn visit_terminal(&mut self, terminal: &Terminal);

    /// Visit an operator node; return false to skip its operands.
    fn visit_operator(
        &mut self,
        op: Op,
        notation: Notation,
        symbol: &str,
        operands: &[&Node],
    ) -> bool;
}

/// Walks a tree with a visitor, parent before children.
pub fn walk<V: NodeVisitor + ?Sized>(node: &Node, visitor: &mut V) {
    match node {
        Node::Terminal(terminal) => visitor.visit_terminal(terminal),
        _ => {
            let Some(op) = node.op() else { return };
            let operands = node.operands();
            if visitor.visit_operator(op, op.notation(), &op.symbol(), &operands) {
                for operand in operands {
                    walk(operand, visitor);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{ipow, sin};
    use crate::value::ValueKind;

    /// Records every visit as a token, in visiting order.
    #[derive(Default)]
    struct Tokens(Vec<String>);

    impl NodeVisitor for Tokens {
        fn visit_terminal(&mut self, terminal: &Terminal) {
            let token = match terminal.display_value() {
                Some(value) => value.to_string(),
                None => format!("<{terminal:?}>"),
            };
            self.0.push(token);
        }

        fn visit_operator(
            &mut self,
            _op: Op,
            notation: Notation,
            symbol: &str,
            operands: &[&Node],
        ) -> bool {
            self.0.push(format!("{symbol}/{}:{notation:?}", operands.len()));
            symbol != "sin"
        }
    }

    #[test]
    fn test_pre_order() {
        let x = Node::var(0, 1.5);
        let expr = ipow(2, x.clone()) * 3.0 - x;
        let mut tokens = Tokens::default();
        walk(&expr, &mut tokens);
        assert_eq!(
            tokens.0,
            vec!["-/2:Infix", "*/2:Infix", "ipow<2>/1:Function", "1.5", "3", "1.5"]
        );
    }

    #[test]
    fn test_skip_children() {
        let expr = sin(Node::var(0, 1.0)) + Node::one(ValueKind::Int);
        let mut tokens = Tokens::default();
        walk(&expr, &mut tokens);
        assert_eq!(tokens.0, vec!["+/2:Infix", "sin/1:Function", "<One(Int)>"]);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(Terminal::Placeholder(0).display_value(), None);
        assert_eq!(Terminal::Zero(ValueKind::Float).display_value(), None);
        assert!(Terminal::Var {
            slot: 2,
            value: 4.into()
        }
        .display_value()
        .is_some());
    }
}
