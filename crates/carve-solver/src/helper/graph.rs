//! Constraint↔variable bipartite graph and connected components.
//!
//! Recomputed from a model snapshot by [`GraphState::compute`]; the
//! computation drops trivially satisfied constraints first (presolve-lite),
//! so the graph reflects the constraints that can still bite. This is an
//! O(model size) pass and must only run when a domain update actually fixed
//! a new variable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use carve_core::{ConstraintId, ConstraintKind, ModelDocument, VarId};

/// Plain union-find over variable indices.
#[derive(Debug)]
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// The derived structural view of a model snapshot.
#[derive(Debug, Default)]
pub struct GraphState {
    /// Constraints referencing each variable (dropped constraints excluded).
    pub var_to_constraints: Vec<Vec<ConstraintId>>,
    /// Variables referenced by each constraint; empty for dropped ones.
    pub constraint_to_vars: Vec<Vec<VarId>>,
    /// Constraints found trivially satisfied over the current domains.
    pub dropped: Vec<bool>,
    /// Connected-component id per variable.
    pub component: Vec<usize>,
    /// Number of non-fixed variables per component id.
    pub component_free_count: Vec<usize>,
    /// Non-fixed variables referenced by at least one kept constraint or
    /// the objective.
    pub active_variables: Vec<VarId>,
    /// Constraint ids grouped by kind (kept constraints only).
    pub type_to_constraints: HashMap<ConstraintKind, Vec<ConstraintId>>,
}

impl GraphState {
    /// Builds the graph from a model snapshot.
    ///
    /// Polls `cancel` between constraints; on cancellation the state built
    /// so far is returned (a partial graph is still a valid, if coarser,
    /// view).
    pub fn compute(model: &ModelDocument, cancel: &AtomicBool) -> Self {
        let nv = model.num_variables();
        let nc = model.num_constraints();
        let mut state = GraphState {
            var_to_constraints: vec![Vec::new(); nv],
            constraint_to_vars: vec![Vec::new(); nc],
            dropped: vec![false; nc],
            component: Vec::new(),
            component_free_count: Vec::new(),
            active_variables: Vec::new(),
            type_to_constraints: HashMap::new(),
        };
        let mut uf = UnionFind::new(nv);
        let mut in_constraint = vec![false; nv];

        for c in 0..nc {
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!(constraint = c, "graph recompute cancelled");
                break;
            }
            let cid = ConstraintId(c);
            if model.constraint_is_trivially_true(cid) {
                state.dropped[c] = true;
                continue;
            }
            let vars = model.constraint_variables(cid);
            for &v in &vars {
                state.var_to_constraints[v.0].push(cid);
                in_constraint[v.0] = true;
            }
            for w in vars.windows(2) {
                uf.union(w[0].0, w[1].0);
            }
            state
                .type_to_constraints
                .entry(model.constraint(cid).kind())
                .or_default()
                .push(cid);
            state.constraint_to_vars[c] = vars;
        }

        // Stable component numbering: first variable of a component wins.
        let mut root_to_id: HashMap<usize, usize> = HashMap::new();
        state.component = (0..nv)
            .map(|v| {
                let root = uf.find(v);
                let next = root_to_id.len();
                *root_to_id.entry(root).or_insert(next)
            })
            .collect();
        state.component_free_count = vec![0; root_to_id.len()];

        let objective_vars: Vec<VarId> = model
            .objective()
            .map(|o| o.terms.iter().map(|(v, _)| *v).collect())
            .unwrap_or_default();
        let mut in_objective = vec![false; nv];
        for v in &objective_vars {
            in_objective[v.0] = true;
        }

        for v in 0..nv {
            let free = !model.variable(VarId(v)).domain().is_fixed();
            if free {
                state.component_free_count[state.component[v]] += 1;
                if in_constraint[v] || in_objective[v] {
                    state.active_variables.push(VarId(v));
                }
            }
        }
        state
    }

    /// Constraints of the given kind that survived the drop pass.
    pub fn constraints_of_kind(&self, kind: ConstraintKind) -> &[ConstraintId] {
        self.type_to_constraints
            .get(&kind)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
