//! Functions for linking and calling native math routines in JIT-compiled code.
//!
//! This module provides functionality to:
//! - Declare an imported `f64` routine of any arity to the Cranelift module
//! - Generate IR instructions to call it within a function being built
//!
//! The routines themselves live in [`super::shims`] and are registered with the
//! `JITBuilder` under the same symbol names.

use cranelift::prelude::FunctionBuilder;
use cranelift_codegen::ir::types::F64;
use cranelift_codegen::ir::{AbiParam, FuncRef, InstBuilder, Value};
use cranelift_module::{FuncId, Linkage, Module};

use crate::errors::JitError;

/// Declares the routine `name` taking `arity` doubles and returning a double.
///
/// # Returns
/// * `Ok(FuncId)` - The function ID that can be used to call the routine
/// * `Err(JitError::DeclarationError)` - If the module rejects the declaration
pub(crate) fn link(module: &mut dyn Module, name: &str, arity: usize) -> Result<FuncId, JitError> {
    let mut sig = module.make_signature();
    sig.params.extend(std::iter::repeat_n(AbiParam::new(F64), arity));
    sig.returns.push(AbiParam::new(F64));

    module
        .declare_function(name, Linkage::Import, &sig)
        .map_err(|e| JitError::DeclarationError(format!("{name}: {e}")))
}

/// Makes a linked routine referable from the function being built.
pub(crate) fn import(
    builder: &mut FunctionBuilder,
    module: &mut dyn Module,
    func_id: FuncId,
) -> FuncRef {
    module.declare_func_in_func(func_id, builder.func)
}

/// Generates the call instruction and returns its result.
pub(crate) fn call(builder: &mut FunctionBuilder, func: FuncRef, args: &[Value]) -> Value {
    let call = builder.ins().call(func, args);
    builder.inst_results(call)[0]
}
