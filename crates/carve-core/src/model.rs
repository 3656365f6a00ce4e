//! The model document: variables, typed constraints, intervals, objective.
//!
//! A [`ModelDocument`] is an ordered sequence of variables with integer
//! domains, an ordered sequence of typed constraints, interval sub-objects
//! referenced by the scheduling constraints, and an optional linear
//! objective always expressed in "minimize, unscaled" (inner) terms.
//!
//! Documents are cheap to clone by design: neighborhood generation works on
//! a reduced copy ("delta") of the full document.

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::error::{CoreError, Result};
use crate::linear::LinearExpr;

/// Stable index of a variable in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub usize);

/// Stable index of a constraint in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstraintId(pub usize);

/// Stable index of an interval in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntervalId(pub usize);

/// A boolean literal over a 0/1 variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub var: VarId,
    pub positive: bool,
}

impl Literal {
    pub fn pos(var: VarId) -> Self {
        Self {
            var,
            positive: true,
        }
    }

    pub fn neg(var: VarId) -> Self {
        Self {
            var,
            positive: false,
        }
    }

    pub fn negated(self) -> Self {
        Self {
            var: self.var,
            positive: !self.positive,
        }
    }

    /// Evaluates the literal under a full assignment.
    pub fn is_true_in(self, assignment: &Assignment) -> bool {
        (assignment.value(self.var) != 0) == self.positive
    }
}

/// A decision variable with its current integer domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    domain: Domain,
}

impl Variable {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }
}

/// A scheduling interval: start/size/end expressions and an optional
/// enforcement literal making the interval active or inactive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interval {
    pub start: LinearExpr,
    pub size: LinearExpr,
    pub end: LinearExpr,
    pub enforcement: Option<Literal>,
}

impl Interval {
    /// True if the interval is present under the assignment (always true
    /// when there is no enforcement literal).
    pub fn is_active(&self, assignment: &Assignment) -> bool {
        self.enforcement.map_or(true, |l| l.is_true_in(assignment))
    }

    /// Variables referenced by any of the three expressions or the literal.
    pub fn variables(&self) -> Vec<VarId> {
        let mut vars: Vec<VarId> = self
            .start
            .variables()
            .chain(self.size.variables())
            .chain(self.end.variables())
            .collect();
        if let Some(l) = self.enforcement {
            vars.push(l.var);
        }
        vars.sort_unstable();
        vars.dedup();
        vars
    }
}

/// A directed arc of a circuit/routes constraint, selected by a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arc {
    pub tail: i64,
    pub head: i64,
    pub literal: Literal,
}

/// Constraint kind tag, used for `type_to_constraints` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    Linear,
    BoolOr,
    NoOverlap,
    Cumulative,
    NoOverlap2d,
    Circuit,
    Routes,
}

/// A typed constraint over variables and intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Constraint {
    /// `expr ∈ domain`.
    Linear { expr: LinearExpr, domain: Domain },
    /// At least one literal is true.
    BoolOr { literals: Vec<Literal> },
    /// Active intervals must not overlap in time.
    NoOverlap { intervals: Vec<IntervalId> },
    /// Active intervals consume `demands`; total demand at any time point
    /// must stay within `capacity`.
    Cumulative {
        intervals: Vec<IntervalId>,
        demands: Vec<LinearExpr>,
        capacity: LinearExpr,
    },
    /// Paired x/y intervals form rectangles that must not overlap.
    NoOverlap2d {
        x_intervals: Vec<IntervalId>,
        y_intervals: Vec<IntervalId>,
    },
    /// Selected arcs form a single circuit over the referenced nodes.
    Circuit { arcs: Vec<Arc> },
    /// Selected arcs form vehicle routes starting and ending at node 0.
    Routes { arcs: Vec<Arc> },
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::Linear { .. } => ConstraintKind::Linear,
            Constraint::BoolOr { .. } => ConstraintKind::BoolOr,
            Constraint::NoOverlap { .. } => ConstraintKind::NoOverlap,
            Constraint::Cumulative { .. } => ConstraintKind::Cumulative,
            Constraint::NoOverlap2d { .. } => ConstraintKind::NoOverlap2d,
            Constraint::Circuit { .. } => ConstraintKind::Circuit,
            Constraint::Routes { .. } => ConstraintKind::Routes,
        }
    }

    /// Intervals referenced directly by this constraint.
    pub fn intervals(&self) -> Vec<IntervalId> {
        match self {
            Constraint::NoOverlap { intervals } | Constraint::Cumulative { intervals, .. } => {
                intervals.clone()
            }
            Constraint::NoOverlap2d {
                x_intervals,
                y_intervals,
            } => {
                let mut all = x_intervals.clone();
                all.extend_from_slice(y_intervals);
                all
            }
            _ => Vec::new(),
        }
    }
}

/// The linear objective, stored in "minimize, unscaled" (inner) form.
///
/// `scaling_factor` and `offset` translate an inner objective value back to
/// the user-visible one; they never influence search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub terms: Vec<(VarId, i64)>,
    /// Domain restricting the objective value itself, if the model carries
    /// one. A non-trivial domain here can make fixing whole components at a
    /// local optimum unsound.
    pub domain: Domain,
    pub scaling_factor: f64,
    pub offset: f64,
}

impl Objective {
    pub fn new(terms: Vec<(VarId, i64)>) -> Self {
        Self {
            terms,
            domain: Domain::new(i64::MIN / 4, i64::MAX / 4),
            scaling_factor: 1.0,
            offset: 0.0,
        }
    }

    /// Inner (minimize, unscaled) objective value of an assignment.
    pub fn inner_value(&self, assignment: &Assignment) -> i64 {
        self.terms.iter().fold(0i64, |acc, (v, c)| {
            acc.saturating_add(c.saturating_mul(assignment.value(*v)))
        })
    }

    /// User-visible objective value for an inner value.
    pub fn scaled_value(&self, inner: i64) -> f64 {
        self.scaling_factor * (inner as f64 + self.offset)
    }

    /// True when the objective domain excludes some values the terms could
    /// reach, i.e. the domain itself is a constraint.
    pub fn has_binding_domain(&self, model: &ModelDocument) -> bool {
        let expr = self
            .terms
            .iter()
            .fold(LinearExpr::constant(0), |e, (v, c)| e.plus_term(*v, *c));
        match (expr.min_value(model), expr.max_value(model)) {
            (Some(lo), Some(hi)) => {
                self.domain.lb().is_some_and(|dlb| dlb > lo)
                    || self.domain.ub().is_some_and(|dub| dub < hi)
            }
            _ => false,
        }
    }
}

/// A full vector of variable values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    values: Vec<i64>,
}

impl Assignment {
    pub fn from_values(values: Vec<i64>) -> Self {
        Self { values }
    }

    pub fn value(&self, var: VarId) -> i64 {
        self.values[var.0]
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set(&mut self, var: VarId, value: i64) {
        self.values[var.0] = value;
    }
}

/// The optimization problem document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDocument {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    intervals: Vec<Interval>,
    objective: Option<Objective>,
}

impl ModelDocument {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_intervals(&self) -> usize {
        self.intervals.len()
    }

    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        self.variables.push(variable);
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        self.constraints.push(constraint);
        ConstraintId(self.constraints.len() - 1)
    }

    pub fn add_interval(&mut self, interval: Interval) -> IntervalId {
        self.intervals.push(interval);
        IntervalId(self.intervals.len() - 1)
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn variable_checked(&self, id: VarId) -> Result<&Variable> {
        self.variables
            .get(id.0)
            .ok_or(CoreError::VariableIndex(id.0))
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn interval(&self, id: IntervalId) -> &Interval {
        &self.intervals[id.0]
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    pub fn set_objective(&mut self, objective: Option<Objective>) {
        self.objective = objective;
    }

    /// Replaces a variable's domain.
    pub fn set_domain(&mut self, id: VarId, domain: Domain) {
        self.variables[id.0].domain = domain;
    }

    /// Collapses a variable's domain to a single value.
    pub fn fix_variable(&mut self, id: VarId, value: i64) {
        self.variables[id.0].domain = Domain::singleton(value);
    }

    /// Variables referenced by a constraint, including those reached through
    /// its intervals' expressions and enforcement literals. Sorted, deduped.
    pub fn constraint_variables(&self, id: ConstraintId) -> Vec<VarId> {
        let c = self.constraint(id);
        let mut vars: Vec<VarId> = match c {
            Constraint::Linear { expr, .. } => expr.variables().collect(),
            Constraint::BoolOr { literals } => literals.iter().map(|l| l.var).collect(),
            Constraint::Cumulative {
                demands, capacity, ..
            } => {
                let mut v: Vec<VarId> = capacity.variables().collect();
                for d in demands {
                    v.extend(d.variables());
                }
                v
            }
            Constraint::Circuit { arcs } | Constraint::Routes { arcs } => {
                arcs.iter().map(|a| a.literal.var).collect()
            }
            _ => Vec::new(),
        };
        for iid in c.intervals() {
            vars.extend(self.interval(iid).variables());
        }
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    /// True if the constraint is satisfied by every point of the current
    /// domains, so it can be dropped from a simplified copy.
    pub fn constraint_is_trivially_true(&self, id: ConstraintId) -> bool {
        match self.constraint(id) {
            Constraint::Linear { expr, domain } => {
                match (expr.min_value(self), expr.max_value(self)) {
                    (Some(lo), Some(hi)) => {
                        domain.lb().is_some_and(|dlb| dlb <= lo)
                            && domain.ub().is_some_and(|dub| dub >= hi)
                            && domain.intervals().len() == 1
                    }
                    _ => false,
                }
            }
            Constraint::BoolOr { literals } => literals.iter().any(|l| {
                self.variable(l.var)
                    .domain()
                    .fixed_value()
                    .is_some_and(|v| (v != 0) == l.positive)
            }),
            // Scheduling/routing constraints are kept; deciding their
            // triviality needs propagation, which lives in the sub-solver.
            _ => false,
        }
    }

    /// Checks structural consistency of all stored indices.
    pub fn validate(&self) -> Result<()> {
        let nv = self.variables.len();
        let ni = self.intervals.len();
        let check_var = |v: VarId| -> Result<()> {
            if v.0 < nv {
                Ok(())
            } else {
                Err(CoreError::VariableIndex(v.0))
            }
        };
        for (idx, c) in self.constraints.iter().enumerate() {
            for iid in c.intervals() {
                if iid.0 >= ni {
                    return Err(CoreError::IntervalIndex(iid.0));
                }
            }
            for v in self.constraint_variables(ConstraintId(idx)) {
                check_var(v)?;
            }
        }
        if let Some(obj) = &self.objective {
            for (v, _) in &obj.terms {
                check_var(*v)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(n: usize) -> ModelDocument {
        let mut m = ModelDocument::default();
        for i in 0..n {
            m.add_variable(Variable::new(format!("x{i}"), Domain::new(0, 10)));
        }
        m
    }

    #[test]
    fn constraint_variables_reach_through_intervals() {
        let mut m = doc_with(4);
        let iv = m.add_interval(Interval {
            start: LinearExpr::term(VarId(0), 1),
            size: LinearExpr::constant(2),
            end: LinearExpr::term(VarId(1), 1),
            enforcement: Some(Literal::pos(VarId(2))),
        });
        let c = m.add_constraint(Constraint::NoOverlap { intervals: vec![iv] });
        assert_eq!(m.constraint_variables(c), vec![VarId(0), VarId(1), VarId(2)]);
    }

    #[test]
    fn trivially_true_linear_constraint() {
        let mut m = doc_with(1);
        let c = m.add_constraint(Constraint::Linear {
            expr: LinearExpr::term(VarId(0), 1),
            domain: Domain::new(-100, 100),
        });
        assert!(m.constraint_is_trivially_true(c));
        let c2 = m.add_constraint(Constraint::Linear {
            expr: LinearExpr::term(VarId(0), 1),
            domain: Domain::new(5, 100),
        });
        assert!(!m.constraint_is_trivially_true(c2));
    }

    #[test]
    fn bool_or_with_fixed_true_literal_is_trivial() {
        let mut m = doc_with(2);
        m.fix_variable(VarId(1), 1);
        let c = m.add_constraint(Constraint::BoolOr {
            literals: vec![Literal::pos(VarId(0)), Literal::pos(VarId(1))],
        });
        assert!(m.constraint_is_trivially_true(c));
    }

    #[test]
    fn validate_catches_bad_index() {
        let mut m = doc_with(1);
        m.add_constraint(Constraint::BoolOr {
            literals: vec![Literal::pos(VarId(7))],
        });
        assert!(m.validate().is_err());
    }

    #[test]
    fn objective_binding_domain() {
        let mut m = doc_with(2);
        let mut obj = Objective::new(vec![(VarId(0), 1), (VarId(1), 1)]);
        assert!(!obj.has_binding_domain(&m));
        obj.domain = Domain::new(0, 5);
        m.set_objective(Some(obj.clone()));
        assert!(obj.has_binding_domain(&m));
    }
}
