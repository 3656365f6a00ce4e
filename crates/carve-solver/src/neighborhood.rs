//! The neighborhood record: a reduced model plus metadata about how it was
//! produced.

use carve_core::{ModelDocument, VarId};

/// A reduced copy of the full model, meant to be solved as a sub-problem.
///
/// Created fresh by a generator call, consumed exactly once by a solve, then
/// discarded.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    /// The reduced model to hand to the sub-solver.
    pub delta: ModelDocument,
    /// False when generation failed; the caller should retry with a
    /// different strategy or difficulty.
    pub is_generated: bool,
    /// False when solving the delta to optimality also solves the original.
    pub is_reduced: bool,
    /// True when the delta was produced purely by fixing variables, which
    /// enables the fast local-optimum-fixing shortcut.
    pub is_simple: bool,
    /// Variables provably fixable to the sub-optimum once solved.
    pub variables_that_can_be_fixed_to_local_optimum: Vec<VarId>,
    /// Human-readable provenance tag.
    pub source_info: String,
}

impl Neighborhood {
    /// The degenerate "generation failed" result.
    pub fn failed(source_info: impl Into<String>) -> Self {
        Self {
            delta: ModelDocument::default(),
            is_generated: false,
            is_reduced: true,
            is_simple: false,
            variables_that_can_be_fixed_to_local_optimum: Vec::new(),
            source_info: source_info.into(),
        }
    }

    /// The degenerate "solve everything" result.
    pub fn full(model: ModelDocument, source_info: impl Into<String>) -> Self {
        Self {
            delta: model,
            is_generated: true,
            is_reduced: false,
            is_simple: false,
            variables_that_can_be_fixed_to_local_optimum: Vec::new(),
            source_info: source_info.into(),
        }
    }
}
