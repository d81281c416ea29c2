//! Compiled formulas with precompiled first derivatives.
//!
//! A [`Formula`] JIT-compiles a tree once and, for every variable slot the tree
//! reads, compiles its simplified first derivative. Evaluations then run native
//! code only.
//!
//! # Example
//!
//! ```
//! use exprtree_jit::prelude::*;
//!
//! let x = Node::var(0, 0.0);
//! let y = Node::var(1, 0.0);
//! let formula = Formula::new(x.clone() * 2.0 + ipow(2, y)).unwrap();
//! assert_eq!(formula.eval(&[1.0, 2.0]).unwrap(), 6.0);
//! assert_eq!(formula.gradient(&[1.0, 2.0]).unwrap(), vec![2.0, 4.0]);
//! ```
//!
//! # Variable Handling
//!
//! Inputs are indexed by slot, so an input must hold one value per slot up to the
//! highest slot the tree reads. Slots the tree does not read are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use colored::Colorize;

use crate::backends::vector::Vector;
use crate::derivative::{derivative, Derivative};
use crate::errors::FormulaError;
use crate::expr::Node;
use crate::jit::build_function;
use crate::simplify::simplify;
use crate::types::JITFunction;
use crate::value::ValueKind;

/// An expression tree together with its compiled function and derivatives.
pub struct Formula {
    node: Node,
    fun: JITFunction,
    derivatives: HashMap<u32, JITFunction>,
    slots: Vec<u32>,
    inputs: usize,
}

impl std::fmt::Debug for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{\n")?;
        writeln!(f, "    {}: {}\n", "Formula".cyan(), self.node)?;
        writeln!(f, "    {}: {:?}\n", "Slots".cyan(), self.slots)?;
        writeln!(f, "    {}: {}\n", "Inputs".cyan(), self.inputs)?;
        writeln!(f, "}}")?;
        Ok(())
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", "Formula".cyan(), self.node)
    }
}

impl Formula {
    /// Compiles `node` and the first derivative for every slot it reads.
    ///
    /// Compiled functions compute in `f64` (see [`build_function`]): for an `Int` tree,
    /// `y / 2` with `y = 7` evaluates to `3.5` here but to `Int(3)` with
    /// [`evaluate`](crate::eval::evaluate).
    ///
    /// # Errors
    /// Returns `FormulaError` if:
    /// - The tree contains an operator without a derivative rule
    /// - JIT compilation fails for the tree or any derivative
    pub fn new(node: impl Into<Node>) -> Result<Self, FormulaError> {
        let node = node.into();
        let slots = node.slots();
        let inputs = slots.last().map_or(0, |slot| *slot as usize + 1);
        let fun = build_function(&node)?;

        let mut derivatives = HashMap::with_capacity(slots.len());
        for &slot in &slots {
            let derivative_func = compile_derivative(&node, &[slot])?;
            derivatives.insert(slot, derivative_func);
        }

        Ok(Self {
            node,
            fun,
            derivatives,
            slots,
            inputs,
        })
    }

    /// Evaluates the formula for the given inputs.
    ///
    /// # Errors
    /// Returns `FormulaError::InvalidInputLength` if the input does not hold exactly
    /// one value per slot up to the highest slot.
    pub fn eval<V: Vector + ?Sized>(&self, values: &V) -> Result<f64, FormulaError> {
        let values = values.as_slice();
        self.validate_input_length(&values)?;
        Ok((self.fun)(&values))
    }

    /// Computes the first derivatives for every slot the formula reads, in slot order.
    ///
    /// # Errors
    /// Returns `FormulaError::InvalidInputLength` on a wrongly sized input.
    pub fn gradient<V: Vector + ?Sized>(&self, values: &V) -> Result<Vec<f64>, FormulaError> {
        let values = values.as_slice();
        self.validate_input_length(&values)?;
        Ok(self
            .slots
            .iter()
            .map(|slot| (self.derivatives[slot])(&values))
            .collect())
    }

    /// Returns the compiled first derivative for `slot`.
    ///
    /// # Example
    /// ```
    /// # use exprtree_jit::prelude::*;
    /// let x = Node::var(0, 0.0);
    /// let formula = Formula::new(sin(x)).unwrap();
    /// let dx = formula.derivative(0).unwrap();
    /// assert_eq!(dx(&[0.0]), 1.0);
    /// ```
    ///
    /// # Errors
    /// Returns `FormulaError::DerivativeNotFound` if the formula does not read `slot`.
    pub fn derivative(&self, slot: u32) -> Result<&JITFunction, FormulaError> {
        self.derivatives
            .get(&slot)
            .ok_or(FormulaError::DerivativeNotFound(slot))
    }

    /// Compiles the higher-order derivative with respect to `slots`, in order.
    ///
    /// # Example
    /// ```
    /// # use exprtree_jit::prelude::*;
    /// let x = Node::var(0, 0.0);
    /// let y = Node::var(1, 0.0);
    /// let formula = Formula::new(ipow(2, x) * ipow(2, y)).unwrap();
    /// let dxdy = formula.derive_wrt(&[0, 1]).unwrap();
    /// assert_eq!(dxdy(&[2.0, 3.0]), 24.0);
    /// ```
    ///
    /// # Errors
    /// Returns `FormulaError::DerivativeNotFound` if the formula does not read one
    /// of the slots.
    pub fn derive_wrt(&self, slots: &[u32]) -> Result<JITFunction, FormulaError> {
        if let Some(&missing) = slots.iter().find(|slot| !self.slots.contains(slot)) {
            return Err(FormulaError::DerivativeNotFound(missing));
        }
        compile_derivative(&self.node, slots)
    }

    /// Returns the underlying tree.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Returns the compiled evaluation function.
    pub fn fun(&self) -> &JITFunction {
        &self.fun
    }

    /// Returns the slots the formula reads, in ascending order.
    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    fn validate_input_length(&self, values: &[f64]) -> Result<(), FormulaError> {
        if values.len() != self.inputs {
            return Err(FormulaError::InvalidInputLength {
                expected: self.inputs,
                got: values.len(),
            });
        }
        Ok(())
    }
}

impl Clone for Formula {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            fun: Arc::clone(&self.fun),
            derivatives: self.derivatives.clone(),
            slots: self.slots.clone(),
            inputs: self.inputs,
        }
    }
}

/// Differentiates once per slot, simplifying in between, and compiles the result.
fn compile_derivative(node: &Node, slots: &[u32]) -> Result<JITFunction, FormulaError> {
    let mut current = node.clone();
    for &slot in slots {
        current = match derivative(&current, slot)? {
            Derivative::NotDependent => Node::zero(ValueKind::Float),
            Derivative::Expr(d) => simplify(&d),
        };
    }
    Ok(build_function(&current)?)
}
