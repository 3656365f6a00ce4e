//! Relaxation-guided strategies: RINS-style domain reduction from a pool of
//! linear-relaxation (fractional) and incomplete solutions, plus a
//! local-branching variant that relaxes where the relaxation disagrees most
//! with the incumbent.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use carve_core::{Assignment, VarId};
use carve_config::LnsConfig;
use rand::seq::IndexedRandom;
use rand::RngCore;

use crate::helper::NeighborhoodHelper;
use crate::neighborhood::Neighborhood;

use super::{tag, target_relaxed_count, GeneratorStats, NeighborhoodGenerator};

const POOL_CAPACITY: usize = 100;
const FRACTIONAL_EPS: f64 = 1e-6;

/// Bounded pool of relaxation solutions fed by outside components (an LP
/// worker, a first-solution phase). Oldest entries are evicted first.
#[derive(Debug, Default)]
pub struct RelaxationSolutionPool {
    lp: Mutex<Vec<Arc<Vec<f64>>>>,
    incomplete: Mutex<Vec<Arc<Vec<Option<i64>>>>>,
}

impl RelaxationSolutionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a (possibly fractional) linear-relaxation solution.
    pub fn add_lp_solution(&self, values: Vec<f64>) {
        let mut lp = self.lp.lock().unwrap();
        if lp.len() >= POOL_CAPACITY {
            lp.remove(0);
        }
        lp.push(Arc::new(values));
    }

    /// Adds a partial assignment; `None` marks undecided variables.
    pub fn add_incomplete_solution(&self, values: Vec<Option<i64>>) {
        let mut incomplete = self.incomplete.lock().unwrap();
        if incomplete.len() >= POOL_CAPACITY {
            incomplete.remove(0);
        }
        incomplete.push(Arc::new(values));
    }

    pub fn has_lp_solution(&self) -> bool {
        !self.lp.lock().unwrap().is_empty()
    }

    pub fn has_incomplete_solution(&self) -> bool {
        !self.incomplete.lock().unwrap().is_empty()
    }

    pub fn random_lp_solution(&self, rng: &mut dyn RngCore) -> Option<Arc<Vec<f64>>> {
        self.lp.lock().unwrap().choose(rng).cloned()
    }

    pub fn random_incomplete_solution(
        &self,
        rng: &mut dyn RngCore,
    ) -> Option<Arc<Vec<Option<i64>>>> {
        self.incomplete.lock().unwrap().choose(rng).cloned()
    }
}

/// Relaxation-induced neighborhood: integral relaxation values pin the
/// variable, fractional values squeeze its domain to the two neighboring
/// integers.
pub struct RelaxationInducedGenerator {
    helper: Arc<NeighborhoodHelper>,
    pool: Arc<RelaxationSolutionPool>,
    stats: GeneratorStats,
}

impl RelaxationInducedGenerator {
    pub fn new(
        helper: Arc<NeighborhoodHelper>,
        pool: Arc<RelaxationSolutionPool>,
        config: &LnsConfig,
    ) -> Self {
        Self {
            helper,
            pool,
            stats: GeneratorStats::new(config),
        }
    }

    fn from_lp(&self, lp: &[f64]) -> Neighborhood {
        let protected = self.helper.protected_objective_variable();
        let mut delta = self.helper.model_snapshot();
        let mut touched = false;
        for (idx, &value) in lp.iter().enumerate().take(delta.num_variables()) {
            let var = VarId(idx);
            if Some(var) == protected {
                continue;
            }
            let old = delta.variable(var).domain().clone();
            if old.is_fixed() {
                continue;
            }
            let rounded = value.round();
            let new = if (value - rounded).abs() > FRACTIONAL_EPS {
                old.intersect_bounds(value.floor() as i64, value.ceil() as i64)
            } else {
                match old.closest_value(rounded as i64) {
                    Some(v) => carve_core::Domain::singleton(v),
                    None => continue,
                }
            };
            // An emptying reduction is skipped, never an infeasibility.
            if !new.is_empty() && new != old {
                delta.set_domain(var, new);
                touched = true;
            }
        }
        Neighborhood {
            delta,
            is_generated: true,
            is_reduced: touched,
            is_simple: false,
            variables_that_can_be_fixed_to_local_optimum: Vec::new(),
            source_info: String::new(),
        }
    }

    fn from_incomplete(&self, initial: &Assignment, partial: &[Option<i64>]) -> Neighborhood {
        let n = self.helper.num_variables();
        let fixed: BTreeSet<VarId> = partial
            .iter()
            .enumerate()
            .take(n)
            .filter_map(|(idx, v)| v.map(|_| VarId(idx)))
            .collect();
        // Fix the decided variables at the incumbent's values; the rest are
        // left for the sub-solver.
        self.helper.fix_given_variables(initial, &fixed)
    }
}

impl NeighborhoodGenerator for RelaxationInducedGenerator {
    fn name(&self) -> &str {
        "rins_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        self.pool.has_lp_solution() || self.pool.has_incomplete_solution()
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        if difficulty >= 1.0 {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        if let Some(lp) = self.pool.random_lp_solution(rng) {
            return tag(self.from_lp(&lp), self.name());
        }
        if let Some(partial) = self.pool.random_incomplete_solution(rng) {
            return tag(self.from_incomplete(initial, &partial), self.name());
        }
        self.helper.no_neighborhood()
    }
}

/// Local branching guided by the linear relaxation: relaxes the variables
/// whose relaxation value strays farthest from the incumbent, fixing the
/// rest.
pub struct LocalBranchingLpGenerator {
    helper: Arc<NeighborhoodHelper>,
    pool: Arc<RelaxationSolutionPool>,
    stats: GeneratorStats,
}

impl LocalBranchingLpGenerator {
    pub fn new(
        helper: Arc<NeighborhoodHelper>,
        pool: Arc<RelaxationSolutionPool>,
        config: &LnsConfig,
    ) -> Self {
        Self {
            helper,
            pool,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for LocalBranchingLpGenerator {
    fn name(&self) -> &str {
        "lb_relax_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        self.pool.has_lp_solution()
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let Some(lp) = self.pool.random_lp_solution(rng) else {
            return self.helper.no_neighborhood();
        };
        let active = self.helper.active_variables();
        let target = target_relaxed_count(active.len(), difficulty);
        if let Some(n) = super::full_if_saturated(&self.helper, active.len(), target) {
            return tag(n, self.name());
        }
        let mut by_distance: Vec<(f64, VarId)> = active
            .iter()
            .filter(|v| v.0 < lp.len())
            .map(|&v| ((lp[v.0] - initial.value(v) as f64).abs(), v))
            .collect();
        // Largest disagreement first; the var id breaks exact ties.
        by_distance
            .sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
        let relaxed: BTreeSet<VarId> = by_distance.iter().take(target).map(|&(_, v)| v).collect();
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}
