//! Structure-free strategies: uniform variable/constraint sampling and the
//! degenerate full-problem generator.

use std::collections::BTreeSet;
use std::sync::Arc;

use carve_core::{Assignment, ConstraintKind};
use carve_config::LnsConfig;
use rand::seq::{index, SliceRandom};
use rand::RngCore;

use crate::helper::NeighborhoodHelper;
use crate::neighborhood::Neighborhood;

use super::{full_if_saturated, tag, target_relaxed_count, GeneratorStats, NeighborhoodGenerator};

const ALL_KINDS: [ConstraintKind; 7] = [
    ConstraintKind::Linear,
    ConstraintKind::BoolOr,
    ConstraintKind::NoOverlap,
    ConstraintKind::Cumulative,
    ConstraintKind::NoOverlap2d,
    ConstraintKind::Circuit,
    ConstraintKind::Routes,
];

/// Relaxes a uniformly random subset of the active variables.
pub struct RelaxRandomVariablesGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RelaxRandomVariablesGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for RelaxRandomVariablesGenerator {
    fn name(&self) -> &str {
        "rnd_var_lns"
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
        let relaxed: BTreeSet<_> = index::sample(rng, active.len(), target)
            .iter()
            .map(|i| active[i])
            .collect();
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}

/// Relaxes the variables of a uniformly random subset of the constraints.
pub struct RelaxRandomConstraintsGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RelaxRandomConstraintsGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for RelaxRandomConstraintsGenerator {
    fn name(&self) -> &str {
        "rnd_cst_lns"
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
        let mut constraints: Vec<_> = ALL_KINDS
            .iter()
            .flat_map(|&k| self.helper.type_to_constraints(k))
            .collect();
        if constraints.is_empty() {
            return self.helper.no_neighborhood();
        }
        constraints.shuffle(rng);

        let active_set: BTreeSet<_> = active.iter().copied().collect();
        let mut relaxed = BTreeSet::new();
        for cid in constraints {
            for v in self.helper.constraint_variables(cid) {
                if active_set.contains(&v) {
                    relaxed.insert(v);
                }
            }
            if relaxed.len() >= target {
                break;
            }
        }
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}

/// Hands back the unreduced model; useful as a portfolio baseline and as
/// the degenerate end of the difficulty range.
pub struct FullProblemGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl FullProblemGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for FullProblemGenerator {
    fn name(&self) -> &str {
        "full_problem"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn generate(
        &self,
        _initial: &Assignment,
        _difficulty: f64,
        _rng: &mut dyn RngCore,
    ) -> Neighborhood {
        tag(self.helper.full_neighborhood(), self.name())
    }
}
