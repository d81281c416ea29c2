//! This module provides functionality for JIT compilation of expression trees.
//! It uses Cranelift as the backend compiler to generate native machine code.
//!
//! The entry point is [`build_function`], which compiles a tree into a function over
//! an `&[f64]` input indexed by variable slot. Compiled code computes in `f64`
//! throughout:
//! - Literals, variables and sentinels become doubles (`true` is `1.0`)
//! - Comparisons and logical operators produce `0.0` or `1.0`
//! - `select` is branchless; both branches are computed
//! - `ipow` is unrolled into multiplications
//! - Other math functions call native routines linked into the module
//!
//! Placeholders and the integer-only operators (`%`, bitwise) have no lowering.

use std::collections::HashMap;
use std::sync::Arc;

use cranelift::prelude::*;
use cranelift_codegen::ir::{immediates::Offset32, FuncRef};
use cranelift_codegen::Context;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use isa::TargetIsa;
use tracing::debug;

use crate::errors::JitError;
use crate::expr::{Node, Terminal};
use crate::operators::{libcall, shims};
use crate::ops::Op;
use crate::transform::try_fold;
use crate::types::JITFunction;

/// Builds a JIT-compiled function from an expression tree.
///
/// The resulting function reads variable `slot` from `input[slot]`. It is wrapped in
/// an `Arc` so it can be shared between threads.
///
/// Compiled code computes in `f64` whatever the kinds of the tree's values, so it can
/// differ from [`evaluate`](crate::eval::evaluate) on `Int` trees: integer `/` does not
/// truncate (`7 / 2` is `3.5`) and integer overflow does not wrap.
///
/// # Errors
/// Returns a [`JitError`] if the tree contains a node without a lowering or if
/// compilation fails.
///
/// # Panics
/// The returned function panics if the input is too short for the highest slot.
pub fn build_function(node: &Node) -> Result<JITFunction, JitError> {
    let isa = create_isa()?;
    let (mut module, mut ctx) = create_module_and_context(isa);
    build_function_body(&mut ctx, node, &mut module)?;
    let raw_fn = compile_and_finalize(&mut module, &mut ctx)?;

    let required = node.slots().last().map_or(0, |slot| *slot as usize + 1);
    debug!(nodes = node.node_count(), required, "compiled function");

    Ok(Arc::new(move |input: &[f64]| {
        assert!(
            input.len() >= required,
            "input has {} values, the function reads {required}",
            input.len()
        );
        raw_fn(input.as_ptr())
    }))
}

/// Creates an Instruction Set Architecture (ISA) target for code generation.
///
/// This function detects the host machine architecture and configures appropriate
/// compilation flags for optimal code generation. `cranelift-jit` links code at fixed
/// addresses, so position-independent code is always off.
///
/// # Errors
/// Returns a JitError if:
/// - The host machine architecture is not supported
/// - A setting is rejected or code generation configuration fails
pub(crate) fn create_isa() -> Result<Arc<dyn TargetIsa>, JitError> {
    let mut flag_builder = settings::builder();

    set_flag(&mut flag_builder, "use_colocated_libcalls", "false")?;
    set_flag(&mut flag_builder, "is_pic", "false")?;
    set_flag(&mut flag_builder, "opt_level", "speed")?;

    let checks = if cfg!(debug_assertions) { "true" } else { "false" };
    set_flag(&mut flag_builder, "enable_verifier", checks)?;
    set_flag(&mut flag_builder, "enable_alias_analysis", checks)?;

    let isa_builder = cranelift_native::builder()
        .map_err(|msg| JitError::HostMachineNotSupported(msg.to_string()))?;

    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(JitError::CodegenError)
}

fn set_flag(builder: &mut settings::Builder, name: &str, value: &str) -> Result<(), JitError> {
    builder
        .set(name, value)
        .map_err(|e| JitError::InvalidSetting(format!("{name}={value}: {e}")))
}

/// Creates a new JIT module and function context.
///
/// The module has every native math routine registered, and the context carries the
/// signature `extern "C" fn(*const f64) -> f64`.
pub(crate) fn create_module_and_context(isa: Arc<dyn TargetIsa>) -> (JITModule, Context) {
    let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
    builder.symbols(shims::symbols());

    let module = JITModule::new(builder);
    let mut ctx = module.make_context();

    let mut sig = module.make_signature();
    sig.params
        .push(AbiParam::new(module.target_config().pointer_type()));
    sig.returns.push(AbiParam::new(types::F64));
    ctx.func.signature = sig;

    (module, ctx)
}

/// Builds the function body by lowering the tree bottom-up.
fn build_function_body(
    ctx: &mut Context,
    node: &Node,
    module: &mut JITModule,
) -> Result<(), JitError> {
    let mut builder_ctx = FunctionBuilderContext::new();
    let mut func_builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);

    let entry_block = func_builder.create_block();
    func_builder.append_block_params_for_function_params(entry_block);
    func_builder.switch_to_block(entry_block);
    let input_ptr = func_builder.block_params(entry_block)[0];

    let mut lowering = Lowering {
        builder: &mut func_builder,
        module,
        input_ptr,
        imports: HashMap::new(),
        loads: HashMap::new(),
    };
    let result = try_fold(node, &mut |node, operands: Vec<Value>| {
        lowering.lower(node, &operands)
    })?;
    lowering.builder.ins().return_(&[result]);

    func_builder.seal_block(entry_block);
    func_builder.finalize();

    Ok(())
}

/// Compiles and finalizes the function, returning a callable function pointer.
///
/// # Errors
/// Returns a JitError if declaration, definition or finalization fails.
fn compile_and_finalize(
    module: &mut JITModule,
    ctx: &mut Context,
) -> Result<extern "C" fn(*const f64) -> f64, JitError> {
    let func_id = module
        .declare_function("exprtree_fn", Linkage::Local, &ctx.func.signature)
        .map_err(|msg| JitError::DeclarationError(msg.to_string()))?;

    module
        .define_function(func_id, ctx)
        .map_err(|msg| JitError::FunctionError(msg.to_string()))?;

    module.clear_context(ctx);
    module
        .finalize_definitions()
        .map_err(JitError::ModuleError)?;

    // SAFETY: The function was compiled with the signature
    // extern "C" fn(*const f64) -> f64, and the JIT module never frees its code.
    let func = unsafe {
        std::mem::transmute::<*const u8, extern "C" fn(*const f64) -> f64>(
            module.get_finalized_function(func_id),
        )
    };
    Ok(func)
}

/// Lowering state for one function.
struct Lowering<'a, 'f> {
    builder: &'a mut FunctionBuilder<'f>,
    module: &'a mut JITModule,
    input_ptr: Value,
    /// Routines already imported into the function
    imports: HashMap<&'static str, FuncRef>,
    /// Variables already loaded, by slot
    loads: HashMap<u32, Value>,
}

impl Lowering<'_, '_> {
    fn lower(&mut self, node: &Node, operands: &[Value]) -> Result<Value, JitError> {
        match (node, operands) {
            (Node::Terminal(terminal), _) => self.terminal(terminal),
            (Node::Unary(op, ..), &[x]) => self.unary(*op, x),
            (Node::Binary(op, ..), &[a, b]) => self.binary(*op, a, b),
            (Node::Ternary(op, ..), &[a, b, c]) => self.ternary(*op, a, b, c),
            _ => Err(JitError::FunctionError(format!(
                "operand count mismatch at `{node}`"
            ))),
        }
    }

    fn terminal(&mut self, terminal: &Terminal) -> Result<Value, JitError> {
        match terminal {
            Terminal::Var { slot, .. } => self.load(*slot),
            Terminal::Placeholder(k) => Err(JitError::Unsupported(format!("placeholder {k}"))),
            _ => {
                let value = terminal.value().map_or(0.0, |v| v.as_f64());
                Ok(self.builder.ins().f64const(value))
            }
        }
    }

    fn load(&mut self, slot: u32) -> Result<Value, JitError> {
        if let Some(value) = self.loads.get(&slot) {
            return Ok(*value);
        }
        let offset = i32::try_from(u64::from(slot) * 8)
            .map_err(|_| JitError::Unsupported(format!("variable slot {slot}")))?;
        let mem = MemFlags::new().with_aligned().with_readonly().with_notrap();
        let value = self
            .builder
            .ins()
            .load(types::F64, mem, self.input_ptr, Offset32::new(offset));
        self.loads.insert(slot, value);
        Ok(value)
    }

    fn unary(&mut self, op: Op, x: Value) -> Result<Value, JitError> {
        Ok(match op {
            Op::Identity => x,
            Op::Negate => self.builder.ins().fneg(x),
            Op::Abs => self.builder.ins().fabs(x),
            Op::Sqrt => self.builder.ins().sqrt(x),
            Op::Ceil => self.builder.ins().ceil(x),
            Op::Floor => self.builder.ins().floor(x),
            Op::Trunc => self.builder.ins().trunc(x),
            Op::IPow(n) => generate_optimized_power(self.builder, x, i64::from(n)),
            Op::LogicalNot => {
                let zero = self.builder.ins().f64const(0.0);
                let is_zero = self.builder.ins().fcmp(FloatCC::Equal, x, zero);
                self.to_float(is_zero)
            }
            Op::BitNot => return Err(unsupported(op)),
            _ => return self.call(op, &[x]),
        })
    }

    fn binary(&mut self, op: Op, a: Value, b: Value) -> Result<Value, JitError> {
        Ok(match op {
            Op::Plus => self.builder.ins().fadd(a, b),
            Op::Minus => self.builder.ins().fsub(a, b),
            Op::Multiplies => self.builder.ins().fmul(a, b),
            Op::Divides => self.builder.ins().fdiv(a, b),
            Op::Copysign => self.builder.ins().fcopysign(a, b),
            Op::EqualTo => self.compare(FloatCC::Equal, a, b),
            Op::NotEqualTo => self.compare(FloatCC::NotEqual, a, b),
            Op::Less => self.compare(FloatCC::LessThan, a, b),
            Op::Greater => self.compare(FloatCC::GreaterThan, a, b),
            Op::LessEqual => self.compare(FloatCC::LessThanOrEqual, a, b),
            Op::GreaterEqual => self.compare(FloatCC::GreaterThanOrEqual, a, b),
            Op::LogicalAnd | Op::LogicalOr => {
                let (a, b) = (self.truthy(a), self.truthy(b));
                let both = match op {
                    Op::LogicalAnd => self.builder.ins().band(a, b),
                    _ => self.builder.ins().bor(a, b),
                };
                self.to_float(both)
            }
            Op::Modulus | Op::BitAnd | Op::BitOr | Op::BitXor => return Err(unsupported(op)),
            _ => return self.call(op, &[a, b]),
        })
    }

    fn ternary(&mut self, op: Op, a: Value, b: Value, c: Value) -> Result<Value, JitError> {
        match op {
            Op::Select => {
                let pred = self.truthy(a);
                Ok(self.builder.ins().select(pred, b, c))
            }
            _ => self.call(op, &[a, b, c]),
        }
    }

    fn truthy(&mut self, x: Value) -> Value {
        let zero = self.builder.ins().f64const(0.0);
        self.builder.ins().fcmp(FloatCC::NotEqual, x, zero)
    }

    fn compare(&mut self, cc: FloatCC, a: Value, b: Value) -> Value {
        let cond = self.builder.ins().fcmp(cc, a, b);
        self.to_float(cond)
    }

    fn to_float(&mut self, cond: Value) -> Value {
        let one = self.builder.ins().f64const(1.0);
        let zero = self.builder.ins().f64const(0.0);
        self.builder.ins().select(cond, one, zero)
    }

    /// Calls the native routine for `op`, importing it on first use.
    fn call(&mut self, op: Op, args: &[Value]) -> Result<Value, JitError> {
        let (name, arity) = shims::lookup(op).ok_or_else(|| unsupported(op))?;
        debug_assert_eq!(arity, args.len());
        let func = match self.imports.get(name) {
            Some(func) => *func,
            None => {
                let func_id = libcall::link(self.module, name, arity)?;
                let func = libcall::import(self.builder, self.module, func_id);
                self.imports.insert(name, func);
                func
            }
        };
        Ok(libcall::call(self.builder, func, args))
    }
}

fn unsupported(op: Op) -> JitError {
    JitError::Unsupported(format!("operator `{op}`"))
}

/// Raises `base` to an integer power by repeated squaring.
fn generate_optimized_power(builder: &mut FunctionBuilder, base: Value, exp: i64) -> Value {
    match exp {
        0 => return builder.ins().f64const(1.0),
        1 => return base,
        2 => return builder.ins().fmul(base, base),
        _ => {}
    }

    let mut result: Option<Value> = None;
    let mut square = base;
    let mut remaining = exp.unsigned_abs();
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = Some(match result {
                Some(acc) => builder.ins().fmul(acc, square),
                None => square,
            });
        }
        remaining >>= 1;
        if remaining > 0 {
            square = builder.ins().fmul(square, square);
        }
    }

    let magnitude = match result {
        Some(value) => value,
        None => builder.ins().f64const(1.0),
    };
    if exp < 0 {
        let one = builder.ins().f64const(1.0);
        builder.ins().fdiv(one, magnitude)
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluate;
    use crate::math::*;
    use crate::value::ValueKind;
    use approx::assert_relative_eq;

    fn x() -> Node {
        Node::var(0, 0.7)
    }

    fn y() -> Node {
        Node::var(1, -1.3)
    }

    fn assert_matches_tree(node: &Node) {
        let f = build_function(node).expect("compiles");
        let input: Vec<f64> = (0..=node.slots().last().copied().unwrap_or(0))
            .map(|slot| match slot {
                0 => 0.7,
                1 => -1.3,
                _ => 2.0,
            })
            .collect();
        let expected = evaluate(node).unwrap().as_f64();
        assert_relative_eq!(f(&input), expected, epsilon = 1e-12, max_relative = 1e-12);
    }

    #[test]
    fn test_arithmetic() {
        assert_matches_tree(&(x() * y() + 2.0));
        assert_matches_tree(&(x() / y() - x()));
        assert_matches_tree(&-(x() + Node::one(ValueKind::Float)));
        assert_matches_tree(&Node::terminal(3.5));
    }

    #[test]
    fn test_integer_powers() {
        for n in [-7, -2, -1, 0, 1, 2, 3, 5, 8, 13] {
            assert_matches_tree(&ipow(n, y()));
        }
    }

    #[test]
    fn test_math_functions() {
        assert_matches_tree(&(sin(x()) * cos(y()) + exp(x()) - ln(x())));
        assert_matches_tree(&(tanh(y()) + atan2(y(), x()) + hypot(x(), y())));
        assert_matches_tree(&(sqrt(x()) + cbrt(y()) + round(y()) + floor(y()) + ceil(x())));
        assert_matches_tree(&(pow(x(), y()) + fmin(x(), y()) + copysign(x(), y())));
        assert_matches_tree(&fma(x(), y(), 1.0));
        assert_matches_tree(&(is_nan(x()) + is_finite(y())));
    }

    #[test]
    fn test_comparisons_and_select() {
        assert_matches_tree(&(less(x(), y()) + greater_equal(x(), y()) + not_equal_to(x(), x())));
        assert_matches_tree(&select(less(x(), y()), x(), y() * 2.0));
        assert_matches_tree(&select(greater(x(), y()), x(), y() * 2.0));
        assert_matches_tree(&(logical_and(x(), y()) + logical_or(0.0, y()) + logical_not(x())));
        assert_matches_tree(&select(true, 1.0, 2.0));
    }

    #[test]
    fn test_repeated_variables_and_routines() {
        let f = sin(x()) + sin(x() * x()) + sin(y());
        assert_matches_tree(&f);
    }

    #[test]
    fn test_unsupported_nodes() {
        let err = build_function(&(Node::placeholder(0) + 1.0)).err().unwrap();
        assert!(matches!(err, JitError::Unsupported(_)));

        let err = build_function(&(Node::var(0, 3) % 2_i64)).err().unwrap();
        assert_eq!(err.to_string(), "cannot compile operator `%`");
    }

    #[test]
    fn test_isa_links_at_fixed_addresses() {
        let isa = create_isa().unwrap();
        assert!(!isa.flags().is_pic());
        assert!(!isa.flags().use_colocated_libcalls());

        let f = build_function(&(x() + 1.0)).unwrap();
        assert_eq!(f(&[2.0]), 3.0);
    }

    #[test]
    fn test_integer_division_is_not_truncated() {
        let node = Node::var(0, 7) / 2_i64;
        assert_eq!(evaluate(&node).unwrap(), crate::value::Value::Int(3));
        let f = build_function(&node).unwrap();
        assert_eq!(f(&[7.0]), 3.5);
    }

    #[test]
    #[should_panic(expected = "the function reads 2")]
    fn test_short_input_panics() {
        let f = build_function(&(x() + y())).unwrap();
        f(&[1.0]);
    }
}
