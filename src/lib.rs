//! Typed expression trees with rule-based rewriting, symbolic differentiation and JIT evaluation.
//!
//! Formulas are built programmatically as immutable trees of literals, variables and
//! operators. The crate provides:
//!
//! - A generic recursive transform engine over shape patterns and rule tables
//! - An evaluator producing `Bool`, `Int` or `Float` values
//! - Exact symbolic derivatives with a fixpoint algebraic simplifier
//! - Positional placeholders for reusable formula templates
//! - JIT compilation of float trees and their derivatives with
//!   [Cranelift](https://github.com/bytecodealliance/wasmtime/tree/main/cranelift)
//!
//! # Example
//!
//! ```rust
//! use exprtree_jit::prelude::*;
//!
//! let x = Node::var(0, 1.0);
//! let y = Node::var(1, 2);
//! let z = x.clone() * 5_i64 + y.clone() + x * y;
//!
//! // d z / d x = 5 + y
//! let dz = derivative(&z, 0).unwrap().into_node(ValueKind::Float);
//! let dz = simplify(&dz);
//! assert_eq!(evaluate(&dz).unwrap().as_f64(), 7.0);
//!
//! // Compile for repeated evaluation
//! let formula = Formula::new(z).unwrap();
//! assert_eq!(formula.gradient(&[1.0, 2.0]).unwrap(), vec![7.0, 2.0]);
//! ```

pub use formula::Formula;

pub mod prelude {
    pub use crate::backends::vector::Vector;
    pub use crate::derivative::{derivative, Derivative, Differentiator};
    pub use crate::errors::{BindError, DiffError, EvalError, FormulaError, JitError};
    pub use crate::eval::evaluate;
    pub use crate::expr::{Node, Terminal};
    pub use crate::formula::Formula;
    pub use crate::jit::build_function;
    pub use crate::math::*;
    pub use crate::ops::{Notation, Op};
    pub use crate::options::SimplifyOptions;
    pub use crate::simplify::{simplify, Simplifier};
    pub use crate::value::{Value, ValueKind};
}

/// Input types accepted by compiled formulas
pub mod backends {
    pub mod vector;
}
/// Symbolic differentiation
pub mod derivative;
/// Error types for the various failure modes
pub mod errors;
/// Tree evaluation
pub mod eval;
/// Expression tree representation
pub mod expr;
/// Compiled formulas with precompiled derivatives
pub mod formula;
/// JIT compilation functionality using Cranelift
pub mod jit;
/// Operator overloads and free functions that build trees
pub mod math;
/// The operator catalog
pub mod ops;
/// Simplifier configuration
pub mod options;
/// Positional placeholders
pub mod placeholders;
/// Algebraic simplification
pub mod simplify;
/// Shape patterns, rule tables and the recursive transform driver
pub mod transform;
/// Type aliases for compiled functions
pub mod types;
/// Scalar values and their kinds
pub mod value;
/// Read-only traversal
pub mod visitor;
/// Native math routines called from JIT-compiled code
pub(crate) mod operators {
    pub(crate) mod libcall;
    pub(crate) mod shims;
}
