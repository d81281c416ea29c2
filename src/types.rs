use std::sync::Arc;

/// Type alias for a JIT-compiled expression tree.
///
/// This represents a function that:
/// - Takes a slice of input values indexed by variable slot
/// - Returns the f64 value of the tree
/// - Is both Send and Sync for thread safety
pub type JITFunction = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;
