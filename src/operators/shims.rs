//! Native math routines callable from JIT-compiled code.
//!
//! Each routine is an `extern "C"` wrapper around the `f64` method of the same name,
//! so compiled code and tree evaluation agree bit for bit. The JIT module resolves
//! imported symbols against [`symbols`].

use crate::ops::Op;

macro_rules! shims {
    (
        unary { $($u_op:ident => $u_name:ident,)* }
        binary { $($b_op:ident => $b_name:ident,)* }
        ternary { $($t_op:ident => $t_name:ident($t_method:ident),)* }
    ) => {
        mod native {
            $(pub(super) extern "C" fn $u_name(x: f64) -> f64 {
                f64::$u_name(x)
            })*
            $(pub(super) extern "C" fn $b_name(x: f64, y: f64) -> f64 {
                f64::$b_name(x, y)
            })*
            $(pub(super) extern "C" fn $t_name(x: f64, y: f64, z: f64) -> f64 {
                f64::$t_method(x, y, z)
            })*
        }

        /// The symbol name and arity of the native routine implementing `op`, if any.
        pub(crate) fn routine(op: Op) -> Option<(&'static str, usize)> {
            match op {
                $(Op::$u_op => Some((stringify!($u_name), 1)),)*
                $(Op::$b_op => Some((stringify!($b_name), 2)),)*
                $(Op::$t_op => Some((stringify!($t_name), 3)),)*
                _ => None,
            }
        }

        /// Every routine as a `(symbol, address)` pair for the JIT linker.
        pub(crate) fn symbols() -> Vec<(&'static str, *const u8)> {
            vec![
                $((stringify!($u_name), native::$u_name as *const u8),)*
                $((stringify!($b_name), native::$b_name as *const u8),)*
                $((stringify!($t_name), native::$t_name as *const u8),)*
                ("is_finite", classify::is_finite as *const u8),
                ("is_nan", classify::is_nan as *const u8),
                ("is_infinite", classify::is_infinite as *const u8),
            ]
        }
    };
}

shims! {
    unary {
        Exp => exp,
        Exp2 => exp2,
        ExpM1 => exp_m1,
        Ln => ln,
        Log10 => log10,
        Log2 => log2,
        Ln1p => ln_1p,
        Cbrt => cbrt,
        Sin => sin,
        Cos => cos,
        Tan => tan,
        Asin => asin,
        Acos => acos,
        Atan => atan,
        Sinh => sinh,
        Cosh => cosh,
        Tanh => tanh,
        Asinh => asinh,
        Acosh => acosh,
        Atanh => atanh,
        Round => round,
        Signum => signum,
    }
    binary {
        Pow => powf,
        Atan2 => atan2,
        Hypot => hypot,
        Fmin => min,
        Fmax => max,
    }
    ternary {
        Fma => fma(mul_add),
    }
}

/// Classification routines return `0.0` or `1.0`.
mod classify {
    pub(super) extern "C" fn is_finite(x: f64) -> f64 {
        f64::from(u8::from(x.is_finite()))
    }

    pub(super) extern "C" fn is_nan(x: f64) -> f64 {
        f64::from(u8::from(x.is_nan()))
    }

    pub(super) extern "C" fn is_infinite(x: f64) -> f64 {
        f64::from(u8::from(x.is_infinite()))
    }
}

/// Like [`routine`], including the classification functions.
pub(crate) fn lookup(op: Op) -> Option<(&'static str, usize)> {
    match op {
        Op::IsFinite => Some(("is_finite", 1)),
        Op::IsNan => Some(("is_nan", 1)),
        Op::IsInfinite => Some(("is_infinite", 1)),
        _ => routine(op),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_routine_has_a_symbol() {
        let symbols: Vec<&str> = symbols().into_iter().map(|(name, _)| name).collect();
        for op in [Op::Sin, Op::Pow, Op::Fma, Op::IsNan, Op::Round, Op::Fmax] {
            let (name, _) = lookup(op).unwrap();
            assert!(symbols.contains(&name), "missing symbol for {op}");
        }
        assert_eq!(lookup(Op::Fma), Some(("fma", 3)));
        assert_eq!(lookup(Op::Plus), None);
    }

    #[test]
    fn test_routines_match_std() {
        assert_eq!(native::exp_m1(0.25), 0.25_f64.exp_m1());
        assert_eq!(native::min(f64::NAN, 1.0), 1.0);
        assert_eq!(native::fma(2.0, 3.0, 1.0), 7.0);
        assert_eq!(classify::is_nan(f64::NAN), 1.0);
        assert_eq!(classify::is_finite(f64::INFINITY), 0.0);
    }
}
