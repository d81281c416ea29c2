//! Positional placeholders.
//!
//! A tree built with [`Node::placeholder`] leaves is a template: its placeholders
//! are bound to arguments by position, after which the tree can be evaluated. This
//! is how one formula is reused with different inputs without rebuilding it.
//!
//! ```rust
//! use exprtree_jit::prelude::*;
//! use exprtree_jit::placeholders::apply;
//!
//! let f = Node::placeholder(0) * Node::placeholder(1) + 1.0;
//! assert_eq!(apply(&f, (2.0, 3)).unwrap(), Value::Float(7.0));
//! ```

use crate::errors::BindError;
use crate::eval::evaluate;
use crate::expr::{Node, Terminal};
use crate::transform::transform_terminals;
use crate::value::Value;

/// Replaces every `Placeholder(k)` with `args[k]`.
pub fn substitute(node: &Node, args: &[Node]) -> Result<Node, BindError> {
    transform_terminals(node, |terminal| match terminal {
        Terminal::Placeholder(index) => {
            args.get(*index)
                .cloned()
                .ok_or(BindError::MissingArgument {
                    index: *index,
                    supplied: args.len(),
                })
        }
        other => Ok(Node::from(other.clone())),
    })
}

/// Replaces every `Placeholder(k)` with a literal holding `args[k]`.
pub fn replace_placeholders(node: &Node, args: &[Value]) -> Result<Node, BindError> {
    let args: Vec<Node> = args.iter().copied().map(Node::terminal).collect();
    substitute(node, &args)
}

/// Binds the placeholders to `args` and evaluates the result.
pub fn invoke(node: &Node, args: &[Value]) -> Result<Value, BindError> {
    let bound = replace_placeholders(node, args)?;
    Ok(evaluate(&bound)?)
}

/// Like [`invoke`], taking the arguments as a tuple, array or vector.
pub fn apply(node: &Node, args: impl ArgBundle) -> Result<Value, BindError> {
    invoke(node, &args.into_values())
}

/// A bundle of positional arguments.
pub trait ArgBundle {
    fn into_values(self) -> Vec<Value>;
}

impl ArgBundle for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! tuple_bundle {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> ArgBundle for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_bundle!(A);
tuple_bundle!(A, B);
tuple_bundle!(A, B, C);
tuple_bundle!(A, B, C, D);
tuple_bundle!(A, B, C, D, E);
tuple_bundle!(A, B, C, D, E, F);

impl<T: Into<Value>, const N: usize> ArgBundle for [T; N] {
    fn into_values(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Value>> ArgBundle for Vec<T> {
    fn into_values(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Value> + Copy> ArgBundle for &[T] {
    fn into_values(self) -> Vec<Value> {
        self.iter().copied().map(Into::into).collect()
    }
}

impl Node {
    /// Shorthand for [`substitute`].
    pub fn substitute(&self, args: &[Node]) -> Result<Node, BindError> {
        substitute(self, args)
    }
}
