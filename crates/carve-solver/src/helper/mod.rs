//! The neighborhood helper: synchronized domains, constraint graph, and the
//! fix/relax primitives every generator builds on.
//!
//! The helper owns two independently locked cells:
//! - the *domain cell*: the model document with externally synchronized
//!   variable domains,
//! - the *graph cell*: the derived bipartite graph and connected components.
//!
//! The two locks are never held at the same time. Long computations (graph
//! recompute, precedence extraction) run on a snapshot cloned out under the
//! domain lock, so no lock spans an O(model) pass over anything but the
//! clone itself.

pub mod graph;
pub mod routing;
pub mod scheduling;

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use carve_core::{Assignment, ConstraintId, ConstraintKind, ModelDocument, VarId};

use crate::neighborhood::Neighborhood;
use graph::GraphState;
use routing::{ActiveRectangle, RoutingPath};
use scheduling::Precedence;

/// A proposed domain tightening for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundChange {
    pub var: VarId,
    pub new_lb: i64,
    pub new_ub: i64,
}

/// Shared helper over the model; safely callable from many generator
/// threads at once.
pub struct NeighborhoodHelper {
    domain_cell: Mutex<ModelDocument>,
    graph_cell: Mutex<GraphState>,
    cancel: Arc<AtomicBool>,
    /// A sole objective variable is never fixed by a neighborhood: fixing
    /// it would fix the objective itself.
    protected_objective_var: Option<VarId>,
}

impl NeighborhoodHelper {
    pub fn new(model: ModelDocument, cancel: Arc<AtomicBool>) -> Self {
        let protected_objective_var = model.objective().and_then(|o| {
            if o.terms.len() == 1 {
                Some(o.terms[0].0)
            } else {
                None
            }
        });
        let graph = GraphState::compute(&model, &cancel);
        Self {
            domain_cell: Mutex::new(model),
            graph_cell: Mutex::new(graph),
            cancel,
            protected_objective_var,
        }
    }

    /// Clones the current (synchronized) model.
    pub fn model_snapshot(&self) -> ModelDocument {
        self.domain_cell.lock().unwrap().clone()
    }

    pub fn num_variables(&self) -> usize {
        self.domain_cell.lock().unwrap().num_variables()
    }

    pub fn protected_objective_variable(&self) -> Option<VarId> {
        self.protected_objective_var
    }

    /// Non-fixed variables referenced by a kept constraint or the
    /// objective, per the last graph recompute.
    pub fn active_variables(&self) -> Vec<VarId> {
        self.graph_cell.lock().unwrap().active_variables.clone()
    }

    /// Whether the variable is active (free and referenced) per the last
    /// graph recompute.
    pub fn is_active(&self, id: VarId) -> bool {
        self.graph_cell
            .lock()
            .unwrap()
            .active_variables
            .binary_search(&id)
            .is_ok()
    }

    /// Kept constraints of the given kind.
    pub fn type_to_constraints(&self, kind: ConstraintKind) -> Vec<ConstraintId> {
        self.graph_cell
            .lock()
            .unwrap()
            .constraints_of_kind(kind)
            .to_vec()
    }

    /// Variables of a kept constraint (empty for dropped constraints).
    pub fn constraint_variables(&self, id: ConstraintId) -> Vec<VarId> {
        let g = self.graph_cell.lock().unwrap();
        g.constraint_to_vars
            .get(id.0)
            .cloned()
            .unwrap_or_default()
    }

    /// Kept constraints referencing a variable.
    pub fn variable_constraints(&self, id: VarId) -> Vec<ConstraintId> {
        let g = self.graph_cell.lock().unwrap();
        g.var_to_constraints.get(id.0).cloned().unwrap_or_default()
    }

    /// Objective variables whose value in `assignment` can still move in
    /// the improving (downward, for a positive coefficient) direction.
    pub fn improvable_objective_variables(&self, assignment: &Assignment) -> Vec<VarId> {
        let model = self.domain_cell.lock().unwrap();
        let Some(obj) = model.objective() else {
            return Vec::new();
        };
        obj.terms
            .iter()
            .filter(|(v, c)| {
                let d = model.variable(*v).domain();
                let value = assignment.value(*v);
                if *c > 0 {
                    d.lb().is_some_and(|lb| value > lb)
                } else if *c < 0 {
                    d.ub().is_some_and(|ub| value < ub)
                } else {
                    false
                }
            })
            .map(|(v, _)| *v)
            .collect()
    }

    /// Returns a delta equal to the full model with every variable of
    /// `fixed` collapsed to its (closest in-domain) value in `initial`.
    ///
    /// Fixed variables covering every free variable of their connected
    /// component are reported as fixable to the local optimum, unless the
    /// objective carries a binding domain that could still be tightened.
    pub fn fix_given_variables(&self, initial: &Assignment, fixed: &BTreeSet<VarId>) -> Neighborhood {
        let model = self.model_snapshot();
        let mut delta = model.clone();
        let mut actually_fixed: Vec<VarId> = Vec::new();
        for &v in fixed {
            if Some(v) == self.protected_objective_var {
                continue;
            }
            let domain = model.variable(v).domain();
            if domain.is_fixed() {
                continue;
            }
            match domain.closest_value(initial.value(v)) {
                Some(value) => {
                    delta.fix_variable(v, value);
                    actually_fixed.push(v);
                }
                None => {
                    // Empty synchronized domain; the neighborhood cannot be
                    // built. Valid information, not an error.
                    tracing::debug!(var = v.0, "fix_given_variables hit an empty domain");
                    return Neighborhood::failed("fix_given_variables:empty_domain");
                }
            }
        }

        let fixable = if model
            .objective()
            .is_some_and(|o| o.has_binding_domain(&model))
        {
            // The objective domain could still prune these components.
            Vec::new()
        } else {
            self.component_complete_fixed(&model, &actually_fixed)
        };

        Neighborhood {
            delta,
            is_generated: true,
            is_reduced: !actually_fixed.is_empty(),
            is_simple: true,
            variables_that_can_be_fixed_to_local_optimum: fixable,
            source_info: String::new(),
        }
    }

    /// `fix_given_variables` over the complement of `relaxed`.
    pub fn relax_given_variables(
        &self,
        initial: &Assignment,
        relaxed: &BTreeSet<VarId>,
    ) -> Neighborhood {
        let n = self.num_variables();
        let fixed: BTreeSet<VarId> = (0..n)
            .map(VarId)
            .filter(|v| !relaxed.contains(v))
            .collect();
        self.fix_given_variables(initial, &fixed)
    }

    /// The degenerate "solve everything" neighborhood.
    pub fn full_neighborhood(&self) -> Neighborhood {
        Neighborhood::full(self.model_snapshot(), "full")
    }

    /// The degenerate "generation failed" neighborhood.
    pub fn no_neighborhood(&self) -> Neighborhood {
        Neighborhood::failed("")
    }

    /// Applies externally discovered bounds under the domain lock.
    ///
    /// Tightenings that would empty a domain are dropped: optionality
    /// semantics are not local to this helper, so the full solve decides.
    /// Returns true when a previously free variable became fixed; only then
    /// is a graph recompute warranted.
    pub fn update_domains(&self, changes: &[BoundChange]) -> bool {
        let mut model = self.domain_cell.lock().unwrap();
        let mut newly_fixed = false;
        for change in changes {
            let old = model.variable(change.var).domain().clone();
            let new = old.intersect_bounds(change.new_lb, change.new_ub);
            if new.is_empty() {
                tracing::debug!(
                    var = change.var.0,
                    new_lb = change.new_lb,
                    new_ub = change.new_ub,
                    "dropping bound update that empties a domain"
                );
                continue;
            }
            if new != old {
                if new.is_fixed() && !old.is_fixed() {
                    newly_fixed = true;
                }
                model.set_domain(change.var, new);
            }
        }
        newly_fixed
    }

    /// Recomputes the graph cell from a fresh domain snapshot.
    ///
    /// O(model size): callers gate this on `update_domains` returning true.
    pub fn recompute_graph(&self) {
        let snapshot = self.model_snapshot();
        let graph = GraphState::compute(&snapshot, &self.cancel);
        *self.graph_cell.lock().unwrap() = graph;
    }

    /// Strict interval orderings implied by the scheduling constraints at
    /// `assignment`. See [`scheduling::scheduling_precedences`].
    pub fn scheduling_precedences(
        &self,
        assignment: &Assignment,
        max_pairs: usize,
    ) -> Vec<Precedence> {
        let snapshot = self.model_snapshot();
        scheduling::scheduling_precedences(&snapshot, assignment, max_pairs)
    }

    /// Ordered arc lists of every circuit/route at `assignment`.
    pub fn routing_paths(&self, assignment: &Assignment) -> Vec<RoutingPath> {
        let snapshot = self.model_snapshot();
        routing::routing_paths(&snapshot, assignment)
    }

    /// Active rectangles of every 2-D no-overlap constraint at
    /// `assignment`.
    pub fn active_rectangles(&self, assignment: &Assignment) -> Vec<ActiveRectangle> {
        let snapshot = self.model_snapshot();
        routing::active_rectangles(&snapshot, assignment)
    }

    /// Fixed variables covering every free variable of their component.
    fn component_complete_fixed(&self, model: &ModelDocument, fixed: &[VarId]) -> Vec<VarId> {
        let g = self.graph_cell.lock().unwrap();
        if g.component.len() != model.num_variables() {
            // Graph lags behind a model resize; skip the optimization.
            return Vec::new();
        }
        let mut fixed_per_component = vec![0usize; g.component_free_count.len()];
        for v in fixed {
            fixed_per_component[g.component[v.0]] += 1;
        }
        fixed
            .iter()
            .copied()
            .filter(|v| {
                let comp = g.component[v.0];
                fixed_per_component[comp] == g.component_free_count[comp]
            })
            .collect()
    }
}
