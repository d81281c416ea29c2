//! Expression Benchmarks
//!
//! This benchmark suite compares evaluating expression trees by structural recursion
//! against evaluating their JIT-compiled form, and measures the symbolic pipeline.
//!
//! ## Benchmark Structure
//!
//! ### 1. Expression Evaluation (`benchmark_expressions`)
//! - **Tree Evaluation**: `evaluate` walks the tree using the values stored in its variables
//! - **JIT Evaluation**: the same tree compiled with Cranelift, called with the same values
//!
//! Compilation is excluded; functions are compiled during setup.
//!
//! ### 2. Differentiation (`benchmark_differentiation`)
//! Differentiates every expression with respect to its first variable and simplifies the
//! result to a fixpoint.
//!
//! ### 3. Compilation Time (`benchmark_compilation_time`)
//! Measures `build_function` and `Formula::new`, which also compiles one derivative per
//! variable.
//!
//! ## Usage
//!
//! Run with: `cargo bench --bench expressions`

use std::{f64::consts::PI, hint::black_box};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use exprtree_jit::prelude::*;

const PARAMS: [f64; 3] = [2.5, 1.8, 0.7];

/// The benchmarked expressions, built over variables holding `PARAMS`.
fn expressions() -> Vec<(&'static str, Node)> {
    let a = Node::var(0, PARAMS[0]);
    let b = Node::var(1, PARAMS[1]);
    let c = Node::var(2, PARAMS[2]);

    vec![
        ("simple_add", a.clone() + 1.1),
        ("linear", 2.2 * a.clone() + 1.1),
        (
            "polynomial",
            ipow(2, a.clone()) / (2.0 * PI / b.clone()) - a.clone() / 2.2,
        ),
        (
            "complex_poly",
            (ipow(3, a.clone()) + 2.0 * ipow(2, a.clone()) - 5.0 * a.clone() + 1.0)
                / (ipow(2, b.clone()) + 3.0 * b.clone() + 2.0),
        ),
        (
            "nested_expr",
            ((a.clone() + b.clone()) * (a.clone() - b.clone()))
                / ((c.clone() + 1.0) * (c.clone() - 1.0)),
        ),
        (
            "transcendental",
            sin(a.clone()) * exp(-b.clone()) + ln(1.0 + ipow(2, c.clone())),
        ),
        (
            "flux",
            a.clone() * b.clone() * sqrt(ipow(2, a.clone()) + ipow(2, c.clone()))
                + select(greater(c.clone(), 0.0), c.clone(), -c.clone()),
        ),
        (
            "very_complex",
            (ipow(3, a.clone()) + ipow(2, b.clone()) * c.clone() - 2.0 * a.clone() * b.clone()
                + c.clone())
                / ((a.clone() + b.clone()) * (b.clone() + c.clone()) * (a.clone() + c.clone())
                    + 1.0)
                + sqrt(a.clone() * b.clone() * c.clone())
                - sqrt(ipow(3, a + b + c)),
        ),
    ]
}

/// Benchmarks tree evaluation against JIT evaluation
fn benchmark_expressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("Expression Evaluation");

    for (name, node) in expressions() {
        group.bench_with_input(BenchmarkId::new("Tree", name), &node, |b, node| {
            b.iter(|| black_box(evaluate(black_box(node))))
        });

        let fun = build_function(&node).expect("expression compiles");
        group.bench_with_input(BenchmarkId::new("JIT", name), &PARAMS, |b, params| {
            b.iter(|| black_box(fun(black_box(params))))
        });
    }

    group.finish();
}

/// Benchmarks differentiation followed by simplification
fn benchmark_differentiation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Differentiation");

    for (name, node) in expressions() {
        group.bench_with_input(BenchmarkId::new("Derive", name), &node, |b, node| {
            b.iter(|| {
                let derivative = derivative(black_box(node), 0).expect("differentiable");
                black_box(derivative.as_node().map(simplify))
            })
        });
    }

    group.finish();
}

/// Benchmarks JIT compilation time
fn benchmark_compilation_time(c: &mut Criterion) {
    let mut group = c.benchmark_group("Compilation Time");

    for (name, node) in expressions() {
        group.bench_with_input(BenchmarkId::new("Function", name), &node, |b, node| {
            b.iter(|| black_box(build_function(node).is_ok()))
        });
        group.bench_with_input(BenchmarkId::new("Formula", name), &node, |b, node| {
            b.iter(|| black_box(Formula::new(node.clone()).is_ok()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_expressions,
    benchmark_differentiation,
    benchmark_compilation_time
);
criterion_main!(benches);
