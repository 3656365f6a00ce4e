//! Shared helpers for carve-solver tests.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use carve_core::{
    Assignment, Constraint, Domain, LinearExpr, Literal, ModelDocument, Objective, SolveLimits,
    SolveStatus, SubResponse, SubSolver, VarId, Variable,
};

use crate::helper::NeighborhoodHelper;

/// A model with `n` variables in `[lo, hi]` and objective `min sum(x_i)`.
pub fn sum_model(n: usize, lo: i64, hi: i64) -> ModelDocument {
    let mut m = ModelDocument::default();
    let mut terms = Vec::new();
    for i in 0..n {
        let v = m.add_variable(Variable::new(format!("x{i}"), Domain::new(lo, hi)));
        terms.push((v, 1));
    }
    m.set_objective(Some(Objective::new(terms)));
    m
}

/// A model whose constraints form two components: {0,1} and {2,3}.
pub fn two_component_model() -> ModelDocument {
    let mut m = sum_model(4, 0, 10);
    m.add_constraint(Constraint::Linear {
        expr: LinearExpr::term(VarId(0), 1).plus_term(VarId(1), 1),
        domain: Domain::new(2, 20),
    });
    m.add_constraint(Constraint::BoolOr {
        literals: vec![Literal::pos(VarId(2)), Literal::pos(VarId(3))],
    });
    m
}

pub fn helper_for(model: ModelDocument) -> NeighborhoodHelper {
    NeighborhoodHelper::new(model, Arc::new(AtomicBool::new(false)))
}

pub fn assignment(values: &[i64]) -> Assignment {
    Assignment::from_values(values.to_vec())
}

/// A sub-solver double that reports the hint back as an optimal solution,
/// falling back to every variable's domain lower bound without a hint.
pub struct EchoSolver;

impl SubSolver for EchoSolver {
    fn solve(
        &self,
        model: &ModelDocument,
        _limits: &SolveLimits,
        hint: Option<&Assignment>,
    ) -> SubResponse {
        let solution = hint.cloned().or_else(|| {
            // Fall back to every variable's domain lower bound.
            let values = model
                .variables()
                .iter()
                .map(|v| v.domain().lb().unwrap_or(0))
                .collect();
            Some(Assignment::from_values(values))
        });
        let objective_value = match (&solution, model.objective()) {
            (Some(s), Some(o)) => o.inner_value(s),
            _ => 0,
        };
        SubResponse {
            status: SolveStatus::Optimal,
            solution,
            objective_value,
            inner_objective_bound: objective_value,
            deterministic_time: 0.01,
        }
    }
}

/// A sub-solver double that lowers every free variable to its domain lower
/// bound, producing a genuine improvement for `min sum` objectives.
pub struct LowerBoundSolver;

impl SubSolver for LowerBoundSolver {
    fn solve(
        &self,
        model: &ModelDocument,
        _limits: &SolveLimits,
        _hint: Option<&Assignment>,
    ) -> SubResponse {
        let values: Vec<i64> = model
            .variables()
            .iter()
            .map(|v| v.domain().lb().unwrap_or(0))
            .collect();
        let solution = Assignment::from_values(values);
        let objective_value = model
            .objective()
            .map(|o| o.inner_value(&solution))
            .unwrap_or(0);
        SubResponse {
            status: SolveStatus::Optimal,
            solution: Some(solution),
            objective_value,
            inner_objective_bound: objective_value,
            deterministic_time: 0.02,
        }
    }
}
