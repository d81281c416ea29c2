//! Error types for the exprtree-jit crate.
//!
//! One error enum per failure domain:
//!
//! - `EvalError`: Errors while evaluating a tree to a concrete value
//! - `DiffError`: Errors during symbolic differentiation
//! - `BindError`: Errors while binding placeholders to arguments
//! - `JitError`: Errors during JIT compilation with Cranelift
//! - `FormulaError`: High-level errors when working with compiled formulas
//!
//! Every failure aborts the enclosing call; there are no partial results.

use cranelift_codegen::CodegenError;
use cranelift_module::ModuleError;
use thiserror::Error;

use crate::ops::Op;
use crate::value::ValueKind;

/// Errors that can occur while evaluating an expression tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The operator has no semantics for operands of this kind
    #[error("operator `{op}` is not supported for {kind} operands")]
    UnsupportedOperand { op: Op, kind: ValueKind },
    /// A placeholder was evaluated before being substituted
    #[error("placeholder {0} is unbound")]
    UnboundPlaceholder(usize),
    /// Integer division or modulus with a zero divisor
    #[error("integer division by zero")]
    IntegerDivisionByZero,
}

/// Errors that can occur during symbolic differentiation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiffError {
    /// The tree contains an operator without a derivative rule
    #[error("cannot differentiate unknown function `{op}`")]
    UnknownFunction { op: Op },
    /// The exponent of an integer power has no representable predecessor
    #[error("exponent of `{op}` is too small to differentiate")]
    ExponentOverflow { op: Op },
}

/// Errors that can occur while binding placeholders to arguments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    /// A placeholder index has no corresponding argument
    #[error("no argument for placeholder {index}: only {supplied} supplied")]
    MissingArgument { index: usize, supplied: usize },
    /// Evaluation of the bound tree failed
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Errors that can occur during JIT compilation of expressions.
///
/// This enum represents various failure modes in the process of lowering an
/// expression tree into machine code using Cranelift as the JIT backend.
#[derive(Error, Debug)]
pub enum JitError {
    /// Error when the target machine architecture is not supported
    #[error("host machine is not supported: {0}")]
    HostMachineNotSupported(String),
    /// Error during Cranelift code generation
    #[error("codegen error: {0}")]
    CodegenError(CodegenError),
    /// Error when a code generation setting is rejected
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    /// Error in the Cranelift JIT module
    #[error("module error: {0}")]
    ModuleError(ModuleError),
    /// Error when defining the JIT function
    #[error("function error: {0}")]
    FunctionError(String),
    /// Error when declaring the JIT function or a linked math routine
    #[error("declaration error: {0}")]
    DeclarationError(String),
    /// The tree contains a node that has no floating-point lowering
    #[error("cannot compile {0}")]
    Unsupported(String),
}

/// High-level errors that can occur when working with compiled formulas.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Error when differentiating the formula
    #[error("Failed to differentiate formula")]
    Differentiate(#[from] DiffError),
    /// Error when JIT compiling the formula or one of its derivatives
    #[error("Failed to build JIT function")]
    BuildFunctionError(#[from] JitError),
    /// Error when trying to get a derivative for a slot the formula does not contain
    #[error("Derivative not found for slot: {0}")]
    DerivativeNotFound(u32),
    /// Error when the input length does not cover every variable slot
    #[error("Invalid input length: expected {expected}, got {got}")]
    InvalidInputLength { expected: usize, got: usize },
}
