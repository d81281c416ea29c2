//! Symbolic differentiation.
//!
//! The derivative of a tree with respect to a variable slot is either a new tree or
//! [`Derivative::NotDependent`], a marker for subtrees whose derivative is provably
//! zero. Independent subtrees are never materialized: the rules combine operand
//! derivatives so that an independent operand simply drops out of the result.
//! `d(x * t + y)` with respect to `x` is `One * t`, not `One * t + x * 0 + 0`.
//!
//! The rules are dispatched through a [`RuleSet`] keyed on the node's shape:
//!
//! | node | derivative |
//! |---|---|
//! | `Var{slot}` | `One` of the value's kind per unit |
//! | other terminals | not dependent |
//! | `f(u)` | `f'(u) * du` (chain rule, catalog rule for `f'`) |
//! | `ipow<n>(u)` | `n * ipow<n-1>(u) * du` |
//! | `a * b` | `da * b + a * db` |
//! | `a / b` | `da / b - a * db * ipow<-2>(b)` |
//! | `pow(a, b)` | `b * pow(a, b - 1) * da + pow(a, b) * ln(a) * db` |
//! | `select(p, a, b)` | `select(p, da, db)` |
//!
//! Anything without a rule is an [`DiffError::UnknownFunction`].

use std::sync::OnceLock;

use tracing::trace;

use crate::errors::DiffError;
use crate::expr::{Node, Terminal};
use crate::math::{ipow, ln, pow, select};
use crate::ops::Op;
use crate::transform::{OpPattern, Pattern, RuleSet};
use crate::value::{Value, ValueKind};

/// The result of differentiating a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivative {
    /// The derivative is provably zero
    NotDependent,
    Expr(Node),
}

impl Derivative {
    pub fn is_independent(&self) -> bool {
        matches!(self, Derivative::NotDependent)
    }

    /// The derivative as a tree, with `NotDependent` materialized as `Zero(kind)`.
    pub fn into_node(self, kind: ValueKind) -> Node {
        match self {
            Derivative::NotDependent => Node::zero(kind),
            Derivative::Expr(node) => node,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Derivative::NotDependent => None,
            Derivative::Expr(node) => Some(node),
        }
    }

    fn map(self, f: impl FnOnce(Node) -> Node) -> Derivative {
        match self {
            Derivative::NotDependent => Derivative::NotDependent,
            Derivative::Expr(node) => Derivative::Expr(f(node)),
        }
    }
}

impl From<Node> for Derivative {
    fn from(node: Node) -> Self {
        Derivative::Expr(node)
    }
}

type DiffResult = Result<Derivative, DiffError>;

/// Differentiation with respect to one variable slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Differentiator {
    slot: u32,
    unit: ValueKind,
    materialize_zeros: bool,
}

impl Differentiator {
    /// Differentiates with respect to `slot`, with a `Float` unit.
    pub fn new(slot: u32) -> Self {
        Self {
            slot,
            unit: ValueKind::Float,
            materialize_zeros: false,
        }
    }

    /// The kind of the variable's unit; derivatives of `T` have kind `T / unit`.
    pub fn with_unit(mut self, unit: ValueKind) -> Self {
        self.unit = unit;
        self
    }

    /// Return explicit `Zero` terminals instead of `NotDependent` at the root.
    pub fn with_materialize_zeros(mut self, materialize_zeros: bool) -> Self {
        self.materialize_zeros = materialize_zeros;
        self
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn unit(&self) -> ValueKind {
        self.unit
    }

    pub fn differentiate(&self, node: &Node) -> DiffResult {
        let mut d = *self;
        let derivative = d.derive(node)?;
        match derivative {
            Derivative::NotDependent if self.materialize_zeros => {
                Ok(Derivative::Expr(Node::zero(self.kind_of(node))))
            }
            other => Ok(other),
        }
    }

    fn derive(&mut self, node: &Node) -> DiffResult {
        match rules().find(node) {
            Some(rule) => {
                trace!(rule = rule.name, %node, slot = self.slot, "differentiating");
                rule.apply(self, node)
            }
            None => Err(unknown_function(node)),
        }
    }

    /// The kind of the derivative of `node`.
    fn kind_of(&self, node: &Node) -> ValueKind {
        node.kind().unwrap_or(ValueKind::Float).per(self.unit)
    }
}

/// Differentiates `node` with respect to `slot`, with a `Float` unit.
pub fn derivative(node: &Node, slot: u32) -> DiffResult {
    Differentiator::new(slot).differentiate(node)
}

/// Differentiates `node` with respect to `slot` with the given unit kind.
pub fn derivative_with_unit(node: &Node, slot: u32, unit: ValueKind) -> DiffResult {
    Differentiator::new(slot).with_unit(unit).differentiate(node)
}

/// Differentiates repeatedly, once per slot in order.
///
/// An independent intermediate result ends the chain.
pub fn derivative_nth(node: &Node, slots: &[u32]) -> DiffResult {
    let mut current = Derivative::Expr(node.clone());
    for &slot in slots {
        current = match current {
            Derivative::NotDependent => return Ok(Derivative::NotDependent),
            Derivative::Expr(node) => derivative(&node, slot)?,
        };
    }
    Ok(current)
}

fn operand(node: &Node, index: usize) -> &Node {
    node.operands()[index]
}

fn variable(d: &mut Differentiator, node: &Node) -> DiffResult {
    Ok(match node {
        Node::Terminal(Terminal::Var { slot, value }) if *slot == d.slot => {
            Node::one(value.kind().per(d.unit)).into()
        }
        _ => Derivative::NotDependent,
    })
}

fn constant(_: &mut Differentiator, _: &Node) -> DiffResult {
    Ok(Derivative::NotDependent)
}

fn identity(d: &mut Differentiator, node: &Node) -> DiffResult {
    d.derive(operand(node, 0))
}

fn unary_function(d: &mut Differentiator, node: &Node) -> DiffResult {
    let u = operand(node, 0);
    let outer = node
        .op()
        .and_then(|op| op.unary_derivative(u))
        .ok_or_else(|| unknown_function(node))?;
    Ok(d.derive(u)?.map(|du| outer * du))
}

fn integer_power(d: &mut Differentiator, node: &Node) -> DiffResult {
    let u = operand(node, 0);
    match node.op() {
        Some(Op::IPow(0)) => Ok(Derivative::NotDependent),
        Some(Op::IPow(1)) => d.derive(u),
        Some(op @ Op::IPow(n)) => match d.derive(u)? {
            Derivative::NotDependent => Ok(Derivative::NotDependent),
            Derivative::Expr(du) => {
                let m = n.checked_sub(1).ok_or(DiffError::ExponentOverflow { op })?;
                let dn = Node::terminal(Value::Int(i64::from(n))) * ipow(m, u.clone()) * du;
                Ok(Derivative::Expr(dn))
            }
        },
        _ => Err(unknown_function(node)),
    }
}

fn negate(d: &mut Differentiator, node: &Node) -> DiffResult {
    Ok(d.derive(operand(node, 0))?.map(|du| -du))
}

fn plus(d: &mut Differentiator, node: &Node) -> DiffResult {
    Ok(match (d.derive(operand(node, 0))?, d.derive(operand(node, 1))?) {
        (Derivative::Expr(da), Derivative::Expr(db)) => (da + db).into(),
        (da @ Derivative::Expr(_), Derivative::NotDependent) => da,
        (Derivative::NotDependent, db) => db,
    })
}

fn minus(d: &mut Differentiator, node: &Node) -> DiffResult {
    Ok(match (d.derive(operand(node, 0))?, d.derive(operand(node, 1))?) {
        (Derivative::Expr(da), Derivative::Expr(db)) => (da - db).into(),
        (da @ Derivative::Expr(_), Derivative::NotDependent) => da,
        (Derivative::NotDependent, db) => db.map(|db| -db),
    })
}

fn multiplies(d: &mut Differentiator, node: &Node) -> DiffResult {
    let (a, b) = (operand(node, 0), operand(node, 1));
    Ok(match (d.derive(a)?, d.derive(b)?) {
        (Derivative::Expr(da), Derivative::Expr(db)) => (da * b.clone() + a.clone() * db).into(),
        (Derivative::Expr(da), Derivative::NotDependent) => (da * b.clone()).into(),
        (Derivative::NotDependent, Derivative::Expr(db)) => (a.clone() * db).into(),
        (Derivative::NotDependent, Derivative::NotDependent) => Derivative::NotDependent,
    })
}

fn divides(d: &mut Differentiator, node: &Node) -> DiffResult {
    let (a, b) = (operand(node, 0), operand(node, 1));
    let quotient_term = |db: Node| a.clone() * db * ipow(-2, b.clone());
    Ok(match (d.derive(a)?, d.derive(b)?) {
        (Derivative::Expr(da), Derivative::Expr(db)) => {
            (da / b.clone() - quotient_term(db)).into()
        }
        (Derivative::Expr(da), Derivative::NotDependent) => (da / b.clone()).into(),
        (Derivative::NotDependent, Derivative::Expr(db)) => (-quotient_term(db)).into(),
        (Derivative::NotDependent, Derivative::NotDependent) => Derivative::NotDependent,
    })
}

fn power(d: &mut Differentiator, node: &Node) -> DiffResult {
    let (a, b) = (operand(node, 0), operand(node, 1));
    let base_term = d
        .derive(a)?
        .map(|da| b.clone() * pow(a.clone(), b.clone() - 1.0) * da);
    let exponent_term = d
        .derive(b)?
        .map(|db| pow(a.clone(), b.clone()) * ln(a.clone()) * db);
    Ok(match (base_term, exponent_term) {
        (Derivative::Expr(l), Derivative::Expr(r)) => (l + r).into(),
        (Derivative::NotDependent, other) | (other, Derivative::NotDependent) => other,
    })
}

fn select_branch(d: &mut Differentiator, node: &Node) -> DiffResult {
    let (pred, a, b) = (operand(node, 0), operand(node, 1), operand(node, 2));
    let (da, db) = (d.derive(a)?, d.derive(b)?);
    if da.is_independent() && db.is_independent() {
        return Ok(Derivative::NotDependent);
    }
    let (ka, kb) = (d.kind_of(a), d.kind_of(b));
    Ok(select(pred.clone(), da.into_node(ka), db.into_node(kb)).into())
}

fn unknown_function(node: &Node) -> DiffError {
    DiffError::UnknownFunction {
        op: node.op().unwrap_or(Op::Identity),
    }
}

fn unknown(_: &mut Differentiator, node: &Node) -> DiffResult {
    Err(unknown_function(node))
}

fn rules() -> &'static RuleSet<Differentiator, DiffResult> {
    static RULES: OnceLock<RuleSet<Differentiator, DiffResult>> = OnceLock::new();
    RULES.get_or_init(|| {
        use Pattern::Any;
        RuleSet::new()
            .with("variable", Pattern::Var(None), variable)
            .with("terminal", Pattern::Terminal, constant)
            .with("identity", Pattern::op(Op::Identity, [Any]), identity)
            .with(
                "unary-function",
                Pattern::Node(OpPattern::UnaryFunction, vec![Any]),
                unary_function,
            )
            .with(
                "ipow",
                Pattern::Node(OpPattern::IPow, vec![Any]),
                integer_power,
            )
            .with("negate", Pattern::op(Op::Negate, [Any]), negate)
            .with("plus", Pattern::op(Op::Plus, [Any, Any]), plus)
            .with("minus", Pattern::op(Op::Minus, [Any, Any]), minus)
            .with("multiplies", Pattern::op(Op::Multiplies, [Any, Any]), multiplies)
            .with("divides", Pattern::op(Op::Divides, [Any, Any]), divides)
            .with("pow", Pattern::op(Op::Pow, [Any, Any]), power)
            .with("select", Pattern::op(Op::Select, [Any, Any, Any]), select_branch)
            .with("unknown", Pattern::Any, unknown)
    })
}

impl Node {
    /// Shorthand for [`derivative`].
    pub fn derivative(&self, slot: u32) -> DiffResult {
        derivative(self, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluate;
    use crate::math::*;
    use crate::simplify::simplify;
    use approx::assert_relative_eq;

    fn x() -> Node {
        Node::var(0, 1.0)
    }

    fn y() -> Node {
        Node::var(1, 2)
    }

    fn expr(d: Derivative) -> Node {
        match d {
            Derivative::Expr(node) => node,
            Derivative::NotDependent => panic!("expected a dependent derivative"),
        }
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            derivative(&x(), 0).unwrap(),
            Derivative::Expr(Node::one(ValueKind::Float))
        );
        assert_eq!(derivative(&x(), 1).unwrap(), Derivative::NotDependent);
        assert_eq!(
            derivative(&Node::terminal(3.0), 0).unwrap(),
            Derivative::NotDependent
        );
        assert_eq!(
            derivative(&Node::identity(x()), 0).unwrap(),
            Derivative::Expr(Node::one(ValueKind::Float))
        );
    }

    #[test]
    fn test_unit_kind() {
        let d = derivative_with_unit(&y(), 1, ValueKind::Int).unwrap();
        assert_eq!(d, Derivative::Expr(Node::one(ValueKind::Int)));
        let d = derivative(&y(), 1).unwrap();
        assert_eq!(d, Derivative::Expr(Node::one(ValueKind::Float)));
    }

    #[test]
    fn test_product_drops_independent_side() {
        let t = Node::terminal(5.0);
        let d = derivative(&(x() * t.clone()), 0).unwrap();
        assert_eq!(d, Derivative::Expr(Node::one(ValueKind::Float) * t));
    }

    #[test]
    fn test_product_simplifies_in_one_pass() {
        let d = expr(derivative(&(x() * y()), 0).unwrap());
        assert_eq!(crate::simplify::simplify_once(&d), y());
    }

    #[test]
    fn test_flux_scenario() {
        let t = Node::terminal(5.0);
        let z = x() * t.clone() + y() + x() * y();

        let dz_dx = simplify(&expr(derivative(&z, 0).unwrap()));
        assert_eq!(dz_dx, t + y());
        assert_eq!(evaluate(&dz_dx).unwrap(), Value::Float(7.0));

        let dz_dy = simplify(&expr(derivative(&z, 1).unwrap()));
        assert_eq!(dz_dy, Node::one(ValueKind::Float) + x());
        assert_eq!(evaluate(&dz_dy).unwrap(), Value::Float(2.0));

        let w = x() + 3.0;
        let dw_dx = simplify(&expr(derivative(&w, 0).unwrap()));
        assert_eq!(dw_dx, Node::one(ValueKind::Float));
        assert_eq!(derivative(&w, 1).unwrap(), Derivative::NotDependent);
    }

    #[test]
    fn test_minus_negates_lone_right_operand() {
        let d = derivative(&(3.0 - x()), 0).unwrap();
        assert_eq!(d, Derivative::Expr(-Node::one(ValueKind::Float)));
    }

    #[test]
    fn test_chain_rule() {
        let d = expr(derivative(&sin(x() * 2.0), 0).unwrap());
        let expected = cos(x() * 2.0) * (Node::one(ValueKind::Float) * 2.0);
        assert_eq!(d, expected);
        assert_relative_eq!(evaluate(&d).unwrap().as_f64(), 2.0 * 2.0_f64.cos());

        assert_eq!(derivative(&sin(y()), 0).unwrap(), Derivative::NotDependent);
    }

    #[test]
    fn test_integer_powers() {
        assert_eq!(
            derivative(&ipow(0, x()), 0).unwrap(),
            Derivative::NotDependent
        );
        assert_eq!(
            derivative(&ipow(1, x()), 0).unwrap(),
            Derivative::Expr(Node::one(ValueKind::Float))
        );
        let x = Node::var(0, 3.0);
        let d = simplify(&expr(derivative(&ipow(3, x.clone()), 0).unwrap()));
        assert_eq!(d, Node::terminal(3) * ipow(2, x));
        assert_relative_eq!(evaluate(&d).unwrap().as_f64(), 27.0);
    }

    #[test]
    fn test_quotient_rule() {
        let x = Node::var(0, 2.0);
        let f = x.clone() / (x.clone() + 1.0);
        let d = expr(derivative(&f, 0).unwrap());
        // 1 / (x + 1)^2
        assert_relative_eq!(evaluate(&d).unwrap().as_f64(), 1.0 / 9.0, epsilon = 1e-12);

        let g = 4.0 / x;
        let d = expr(derivative(&g, 0).unwrap());
        assert_relative_eq!(evaluate(&d).unwrap().as_f64(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_registered_function_rules() {
        let x = Node::var(0, 0.3);
        let cases: Vec<(Node, f64)> = vec![
            (tan(x.clone()), 1.0 / 0.3_f64.cos().powi(2)),
            (exp2(x.clone()), std::f64::consts::LN_2 * 0.3_f64.exp2()),
            (log10(x.clone()), 1.0 / (0.3 * std::f64::consts::LN_10)),
            (ln_1p(x.clone()), 1.0 / 1.3),
            (sqrt(x.clone()), 0.5 / 0.3_f64.sqrt()),
            (cbrt(x.clone()), 1.0 / (3.0 * 0.3_f64.cbrt().powi(2))),
            (asin(x.clone()), 1.0 / (1.0 - 0.09_f64).sqrt()),
            (acos(x.clone()), -1.0 / (1.0 - 0.09_f64).sqrt()),
            (atan(x.clone()), 1.0 / 1.09),
            (tanh(x.clone()), 1.0 / 0.3_f64.cosh().powi(2)),
            (asinh(x.clone()), 1.0 / 1.09_f64.sqrt()),
            (atanh(x.clone()), 1.0 / 0.91),
            (abs(-x.clone()), 1.0),
        ];
        for (f, expected) in cases {
            let d = expr(derivative(&f, 0).unwrap());
            assert_relative_eq!(evaluate(&d).unwrap().as_f64(), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pow_rule() {
        let x = Node::var(0, 2.0);
        let y = Node::var(1, 3.0);
        let f = pow(x.clone(), y.clone());

        let dx = expr(derivative(&f, 0).unwrap());
        assert_relative_eq!(evaluate(&dx).unwrap().as_f64(), 12.0, epsilon = 1e-12);

        let dy = expr(derivative(&f, 1).unwrap());
        assert_relative_eq!(
            evaluate(&dy).unwrap().as_f64(),
            8.0 * 2.0_f64.ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_select_materializes_independent_branch() {
        let f = select(less(x(), 0.0), x() * 2.0, 7.0);
        let d = expr(derivative(&f, 0).unwrap());
        assert_eq!(
            d,
            select(
                less(x(), 0.0),
                Node::one(ValueKind::Float) * 2.0,
                Node::zero(ValueKind::Float)
            )
        );
        assert_eq!(evaluate(&d).unwrap(), Value::Float(0.0));

        let g = select(less(x(), 0.0), 1.0, 2.0);
        assert_eq!(derivative(&g, 0).unwrap(), Derivative::NotDependent);
    }

    #[test]
    fn test_unknown_function() {
        let err = derivative(&floor(x()), 0).unwrap_err();
        assert_eq!(err, DiffError::UnknownFunction { op: Op::Floor });
        assert_eq!(err.to_string(), "cannot differentiate unknown function `floor`");

        let err = derivative(&floor(Node::terminal(2.5)), 0).unwrap_err();
        assert_eq!(err, DiffError::UnknownFunction { op: Op::Floor });

        let err = derivative(&(x() % 2.0), 0).unwrap_err();
        assert_eq!(err, DiffError::UnknownFunction { op: Op::Modulus });
    }

    #[test]
    fn test_extreme_integer_exponents() {
        let err = derivative(&ipow(i32::MIN, x()), 0).unwrap_err();
        assert_eq!(err, DiffError::ExponentOverflow { op: Op::IPow(i32::MIN) });
        assert_eq!(
            derivative(&ipow(i32::MIN, y()), 0).unwrap(),
            Derivative::NotDependent
        );

        let d = expr(derivative(&ipow(i32::MAX, x()), 0).unwrap());
        let Node::Binary(Op::Multiplies, lhs, _) = &d else {
            panic!("expected a product, got {d}");
        };
        assert_eq!(
            **lhs,
            Node::terminal(Value::Int(i64::from(i32::MAX))) * ipow(i32::MAX - 1, x())
        );
    }

    #[test]
    fn test_materialize_zeros() {
        let d = Differentiator::new(1)
            .with_materialize_zeros(true)
            .differentiate(&(x() + 3.0))
            .unwrap();
        assert_eq!(d, Derivative::Expr(Node::zero(ValueKind::Float)));
        assert_eq!(
            Derivative::NotDependent.into_node(ValueKind::Int),
            Node::zero(ValueKind::Int)
        );
    }

    #[test]
    fn test_derivative_nth() {
        let x = Node::var(0, 2.0);
        let f = ipow(3, x.clone());
        let d2 = expr(derivative_nth(&f, &[0, 0]).unwrap());
        assert_relative_eq!(evaluate(&d2).unwrap().as_f64(), 12.0);

        let d = derivative_nth(&f, &[1, 0]).unwrap();
        assert!(d.is_independent());
    }
}
