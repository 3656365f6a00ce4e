//! The solve boundary: status, limits, response, and the external solver
//! trait.
//!
//! The actual constraint-propagation/SAT engine is an external collaborator.
//! The carve core only hands it a (sub-)model plus limits and a hint, and
//! consumes its [`SubResponse`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{Assignment, ModelDocument};

/// Outcome status of a (sub-)solve or of the overall search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveStatus {
    Unknown,
    Feasible,
    Optimal,
    Infeasible,
    ModelInvalid,
}

impl SolveStatus {
    /// True once no strictly better solution can exist.
    pub fn is_closed(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Infeasible)
    }
}

/// Limits passed to the external solver for one sub-solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveLimits {
    pub wall_time: Option<Duration>,
    /// Deterministic-time budget, in the solver's own reproducible unit.
    pub deterministic_time: Option<f64>,
}

/// Response of the external solver for one sub-solve.
#[derive(Debug, Clone)]
pub struct SubResponse {
    pub status: SolveStatus,
    pub solution: Option<Assignment>,
    /// Inner objective value of `solution`, meaningful only when present.
    pub objective_value: i64,
    /// Best proven inner objective lower bound for the solved model.
    pub inner_objective_bound: i64,
    /// Deterministic time spent, as reported by the solver.
    pub deterministic_time: f64,
}

impl SubResponse {
    /// An `UNKNOWN` response carrying no information.
    pub fn unknown() -> Self {
        Self {
            status: SolveStatus::Unknown,
            solution: None,
            objective_value: i64::MAX,
            inner_objective_bound: i64::MIN,
            deterministic_time: 0.0,
        }
    }
}

/// The external solving collaborator.
///
/// Implementations must be callable concurrently from many worker threads.
pub trait SubSolver: Send + Sync {
    /// Solves `model` within `limits`, optionally biased by a solution hint
    /// (the incumbent's values for all non-fixed variables).
    fn solve(
        &self,
        model: &ModelDocument,
        limits: &SolveLimits,
        hint: Option<&Assignment>,
    ) -> SubResponse;
}
