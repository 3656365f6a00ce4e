//! Linear expressions over model variables.

use serde::{Deserialize, Serialize};

use crate::model::{Assignment, ModelDocument, VarId};

/// A linear expression `sum(coeff_i * var_i) + offset`.
///
/// # Example
///
/// ```
/// use carve_core::{LinearExpr, VarId};
///
/// let e = LinearExpr::term(VarId(0), 2).plus_term(VarId(1), -1).plus_constant(5);
/// assert_eq!(e.terms().len(), 2);
/// assert_eq!(e.offset(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LinearExpr {
    terms: Vec<(VarId, i64)>,
    offset: i64,
}

impl LinearExpr {
    /// The constant expression `value`.
    pub fn constant(value: i64) -> Self {
        Self {
            terms: Vec::new(),
            offset: value,
        }
    }

    /// The expression `coeff * var`.
    pub fn term(var: VarId, coeff: i64) -> Self {
        Self {
            terms: vec![(var, coeff)],
            offset: 0,
        }
    }

    /// Adds `coeff * var`.
    pub fn plus_term(mut self, var: VarId, coeff: i64) -> Self {
        self.terms.push((var, coeff));
        self
    }

    /// Adds a constant.
    pub fn plus_constant(mut self, value: i64) -> Self {
        self.offset += value;
        self
    }

    pub fn terms(&self) -> &[(VarId, i64)] {
        &self.terms
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Returns the variables referenced by this expression.
    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.iter().map(|(v, _)| *v)
    }

    /// Evaluates the expression under a full assignment.
    pub fn value_in(&self, assignment: &Assignment) -> i64 {
        self.terms.iter().fold(self.offset, |acc, (v, c)| {
            acc.saturating_add(c.saturating_mul(assignment.value(*v)))
        })
    }

    /// Lower bound of the expression over the current domains.
    ///
    /// Returns `None` if any referenced variable has an empty domain.
    pub fn min_value(&self, model: &ModelDocument) -> Option<i64> {
        self.bound(model, true)
    }

    /// Upper bound of the expression over the current domains.
    pub fn max_value(&self, model: &ModelDocument) -> Option<i64> {
        self.bound(model, false)
    }

    fn bound(&self, model: &ModelDocument, lower: bool) -> Option<i64> {
        let mut acc = self.offset;
        for (v, c) in &self.terms {
            let d = model.variable(*v).domain();
            let (lb, ub) = (d.lb()?, d.ub()?);
            // A negative coefficient swaps which end of the domain binds.
            let pick = if (*c >= 0) == lower { lb } else { ub };
            acc = acc.saturating_add(c.saturating_mul(pick));
        }
        Some(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::model::{ModelDocument, Variable};

    fn two_var_model() -> ModelDocument {
        let mut m = ModelDocument::default();
        m.add_variable(Variable::new("x", Domain::new(0, 10)));
        m.add_variable(Variable::new("y", Domain::new(-5, 5)));
        m
    }

    #[test]
    fn evaluates_under_assignment() {
        let e = LinearExpr::term(VarId(0), 2)
            .plus_term(VarId(1), 3)
            .plus_constant(1);
        let a = Assignment::from_values(vec![4, -2]);
        assert_eq!(e.value_in(&a), 2 * 4 + 3 * (-2) + 1);
    }

    #[test]
    fn bounds_respect_coefficient_sign() {
        let m = two_var_model();
        let e = LinearExpr::term(VarId(0), 1).plus_term(VarId(1), -2);
        assert_eq!(e.min_value(&m), Some(0 - 2 * 5));
        assert_eq!(e.max_value(&m), Some(10 + 2 * 5));
    }

    #[test]
    fn empty_domain_yields_no_bound() {
        let mut m = two_var_model();
        m.set_domain(VarId(1), Domain::empty());
        let e = LinearExpr::term(VarId(1), 1);
        assert_eq!(e.min_value(&m), None);
    }
}
