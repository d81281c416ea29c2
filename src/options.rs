//! Configuration for the simplifier.

/// Default cap on the number of simplification passes.
pub const DEFAULT_MAX_PASSES: usize = 64;

/// Options controlling [`crate::simplify::Simplifier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimplifyOptions {
    /// Upper bound on engine passes before the driver gives up on reaching a fixpoint
    pub max_passes: usize,
    /// Collapse operator nodes whose operands are all literals into a literal
    pub fold_constants: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            fold_constants: false,
        }
    }
}

impl SimplifyOptions {
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn with_fold_constants(mut self, fold_constants: bool) -> Self {
        self.fold_constants = fold_constants;
        self
    }
}
