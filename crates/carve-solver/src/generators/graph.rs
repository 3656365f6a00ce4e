//! Strategies that grow the relaxed set along the variable ↔ constraint
//! bipartite graph.

use std::collections::{BTreeSet, BinaryHeap, VecDeque};
use std::cmp::Reverse;
use std::sync::Arc;

use carve_core::{Assignment, ConstraintId, VarId};
use carve_config::LnsConfig;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

use crate::helper::NeighborhoodHelper;
use crate::neighborhood::Neighborhood;

use super::{full_if_saturated, tag, target_relaxed_count, GeneratorStats, NeighborhoodGenerator};

/// Picks a BFS seed: an objective variable that can still improve when one
/// exists, otherwise a uniformly random active variable.
fn seed_variable(
    helper: &NeighborhoodHelper,
    initial: &Assignment,
    active: &[VarId],
    rng: &mut dyn RngCore,
) -> Option<VarId> {
    let active_set: BTreeSet<_> = active.iter().copied().collect();
    let improvable: Vec<VarId> = helper
        .improvable_objective_variables(initial)
        .into_iter()
        .filter(|v| active_set.contains(v))
        .collect();
    improvable
        .choose(rng)
        .copied()
        .or_else(|| active.choose(rng).copied())
}

/// Breadth-first expansion over variables: relax the seed, then every
/// variable sharing a constraint with an already relaxed one, until the
/// difficulty budget is met.
pub struct VariableGraphGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl VariableGraphGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for VariableGraphGenerator {
    fn name(&self) -> &str {
        "graph_var_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let active = self.helper.active_variables();
        let target = target_relaxed_count(active.len(), difficulty);
        if let Some(n) = full_if_saturated(&self.helper, active.len(), target) {
            return tag(n, self.name());
        }
        let Some(seed) = seed_variable(&self.helper, initial, &active, rng) else {
            return self.helper.no_neighborhood();
        };

        let mut relaxed = BTreeSet::from([seed]);
        let mut queue = VecDeque::from([seed]);
        let mut visited_constraints: BTreeSet<ConstraintId> = BTreeSet::new();
        while relaxed.len() < target {
            let Some(var) = queue.pop_front() else { break };
            for cid in self.helper.variable_constraints(var) {
                if !visited_constraints.insert(cid) {
                    continue;
                }
                for next in self.helper.constraint_variables(cid) {
                    if relaxed.len() >= target {
                        break;
                    }
                    if relaxed.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}

/// Expansion one arc at a time: repeatedly pick a random frontier arc
/// (variable, constraint) and relax one more variable of that constraint.
/// Compared to the variable BFS this wanders instead of flooding, so the
/// relaxed set hugs a random path through the structure.
pub struct ArcGraphGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl ArcGraphGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for ArcGraphGenerator {
    fn name(&self) -> &str {
        "graph_arc_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let active = self.helper.active_variables();
        let target = target_relaxed_count(active.len(), difficulty);
        if let Some(n) = full_if_saturated(&self.helper, active.len(), target) {
            return tag(n, self.name());
        }
        let Some(seed) = seed_variable(&self.helper, initial, &active, rng) else {
            return self.helper.no_neighborhood();
        };

        let mut relaxed = BTreeSet::from([seed]);
        // One frontier entry per incident arc, so dense constraints are
        // proportionally more likely to be extended.
        let mut frontier: Vec<ConstraintId> = self.helper.variable_constraints(seed);
        while relaxed.len() < target && !frontier.is_empty() {
            let idx = rng.random_range(0..frontier.len());
            let cid = frontier.swap_remove(idx);
            let unrelaxed: Vec<VarId> = self
                .helper
                .constraint_variables(cid)
                .into_iter()
                .filter(|v| !relaxed.contains(v))
                .collect();
            let Some(&next) = unrelaxed.choose(rng) else {
                continue;
            };
            relaxed.insert(next);
            frontier.extend(self.helper.variable_constraints(next));
            if unrelaxed.len() > 1 {
                // The constraint still has unrelaxed variables; keep it.
                frontier.push(cid);
            }
        }
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}

/// Breadth-first expansion over constraints: visit a constraint, relax all
/// of its variables at once, then enqueue the constraints of the newly
/// relaxed variables.
pub struct ConstraintGraphGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl ConstraintGraphGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for ConstraintGraphGenerator {
    fn name(&self) -> &str {
        "graph_cst_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let active = self.helper.active_variables();
        let target = target_relaxed_count(active.len(), difficulty);
        if let Some(n) = full_if_saturated(&self.helper, active.len(), target) {
            return tag(n, self.name());
        }
        let seed_constraint = seed_variable(&self.helper, initial, &active, rng)
            .map(|v| self.helper.variable_constraints(v))
            .and_then(|cs| cs.choose(rng).copied());
        let Some(seed) = seed_constraint else {
            return self.helper.no_neighborhood();
        };

        let mut relaxed: BTreeSet<VarId> = BTreeSet::new();
        let mut visited = BTreeSet::from([seed]);
        let mut queue = VecDeque::from([seed]);
        while relaxed.len() < target {
            let Some(cid) = queue.pop_front() else { break };
            for v in self.helper.constraint_variables(cid) {
                if relaxed.insert(v) {
                    for next in self.helper.variable_constraints(v) {
                        if visited.insert(next) {
                            queue.push_back(next);
                        }
                    }
                }
            }
        }
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}

/// Relaxes a window of a min-degree elimination order.
///
/// Variables eliminated together sit in a low-connectivity region of the
/// graph, so a contiguous window of the order makes a neighborhood whose
/// frontier to the fixed remainder is small.
pub struct DecompositionGraphGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl DecompositionGraphGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }

    /// Min-degree elimination order over the active variables, with lazy
    /// degree updates through a priority queue.
    fn elimination_order(&self, active: &[VarId]) -> Vec<VarId> {
        let active_set: BTreeSet<_> = active.iter().copied().collect();
        let mut neighbors: std::collections::BTreeMap<VarId, BTreeSet<VarId>> =
            active.iter().map(|&v| (v, BTreeSet::new())).collect();
        for (&v, adjacent) in neighbors.iter_mut() {
            for cid in self.helper.variable_constraints(v) {
                for w in self.helper.constraint_variables(cid) {
                    if w != v && active_set.contains(&w) {
                        adjacent.insert(w);
                    }
                }
            }
        }

        let mut heap: BinaryHeap<Reverse<(usize, VarId)>> = neighbors
            .iter()
            .map(|(&v, n)| Reverse((n.len(), v)))
            .collect();
        let mut eliminated: BTreeSet<VarId> = BTreeSet::new();
        let mut order = Vec::with_capacity(active.len());
        while let Some(Reverse((degree, v))) = heap.pop() {
            if eliminated.contains(&v) {
                continue;
            }
            let current = neighbors[&v].len();
            if current != degree {
                // Stale entry; re-queue with the up-to-date degree.
                heap.push(Reverse((current, v)));
                continue;
            }
            eliminated.insert(v);
            order.push(v);
            let adj: Vec<VarId> = neighbors[&v].iter().copied().collect();
            for w in adj {
                if let Some(set) = neighbors.get_mut(&w) {
                    set.remove(&v);
                    heap.push(Reverse((set.len(), w)));
                }
            }
        }
        order
    }
}

impl NeighborhoodGenerator for DecompositionGraphGenerator {
    fn name(&self) -> &str {
        "graph_dec_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let active = self.helper.active_variables();
        let target = target_relaxed_count(active.len(), difficulty);
        if let Some(n) = full_if_saturated(&self.helper, active.len(), target) {
            return tag(n, self.name());
        }
        let order = self.elimination_order(&active);
        if order.is_empty() {
            return self.helper.no_neighborhood();
        }
        let start = rng.random_range(0..order.len());
        let relaxed: BTreeSet<VarId> = (0..target)
            .map(|i| order[(start + i) % order.len()])
            .collect();
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}
