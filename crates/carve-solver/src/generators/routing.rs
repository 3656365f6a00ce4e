//! Routing strategies over circuit and routes constraints.

use std::collections::BTreeSet;
use std::sync::Arc;

use carve_core::{Assignment, Constraint, ConstraintKind, VarId};
use carve_config::LnsConfig;
use rand::seq::{index, SliceRandom};
use rand::{Rng, RngCore};

use crate::helper::NeighborhoodHelper;
use crate::neighborhood::Neighborhood;

use super::{tag, target_relaxed_count, GeneratorStats, NeighborhoodGenerator};

fn has_routing(helper: &NeighborhoodHelper) -> bool {
    !helper.type_to_constraints(ConstraintKind::Circuit).is_empty()
        || !helper.type_to_constraints(ConstraintKind::Routes).is_empty()
}

/// All arc literal variables of the routing constraints, sorted and
/// deduped.
fn arc_variables(helper: &NeighborhoodHelper) -> Vec<VarId> {
    let model = helper.model_snapshot();
    let mut vars: Vec<VarId> = model
        .constraints()
        .iter()
        .filter_map(|c| match c {
            Constraint::Circuit { arcs } | Constraint::Routes { arcs } => Some(arcs),
            _ => None,
        })
        .flatten()
        .map(|a| a.literal.var)
        .collect();
    vars.sort_unstable();
    vars.dedup();
    vars
}

/// Relaxes a uniformly random subset of the arc literals.
pub struct RoutingRandomGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RoutingRandomGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for RoutingRandomGenerator {
    fn name(&self) -> &str {
        "routing_random_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_routing(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let vars = arc_variables(&self.helper);
        if vars.is_empty() {
            return self.helper.no_neighborhood();
        }
        let target = target_relaxed_count(vars.len(), difficulty);
        if target >= vars.len() {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        let relaxed: BTreeSet<VarId> = index::sample(rng, vars.len(), target)
            .iter()
            .map(|i| vars[i])
            .collect();
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}

/// Relaxes contiguous segments of the reconstructed routes, so repairs stay
/// local to a stretch of consecutive visits.
pub struct RoutingPathGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RoutingPathGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for RoutingPathGenerator {
    fn name(&self) -> &str {
        "routing_path_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_routing(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let total = arc_variables(&self.helper).len();
        if total == 0 {
            return self.helper.no_neighborhood();
        }
        let target = target_relaxed_count(total, difficulty);
        if target >= total {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        let mut paths = self.helper.routing_paths(initial);
        if paths.is_empty() {
            return self.helper.no_neighborhood();
        }
        paths.shuffle(rng);

        let mut relaxed: BTreeSet<VarId> = BTreeSet::new();
        for path in &paths {
            if relaxed.len() >= target {
                break;
            }
            if path.arcs.is_empty() {
                continue;
            }
            let want = (target - relaxed.len()).min(path.arcs.len());
            let start = rng.random_range(0..=(path.arcs.len() - want));
            for arc in &path.arcs[start..start + want] {
                relaxed.insert(arc.literal.var);
            }
        }
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}

/// Relaxes whole routes at a time, in random order, until the budget is
/// met. The sub-solver can then re-plan entire vehicles against each other.
pub struct RoutingFullPathGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RoutingFullPathGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for RoutingFullPathGenerator {
    fn name(&self) -> &str {
        "routing_full_path_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_routing(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let total = arc_variables(&self.helper).len();
        if total == 0 {
            return self.helper.no_neighborhood();
        }
        let target = target_relaxed_count(total, difficulty);
        if target >= total {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        let mut paths = self.helper.routing_paths(initial);
        if paths.is_empty() {
            return self.helper.no_neighborhood();
        }
        paths.shuffle(rng);

        let mut relaxed: BTreeSet<VarId> = BTreeSet::new();
        for path in &paths {
            // Whole paths only; stop once at least one path is in and the
            // budget is reached.
            if !relaxed.is_empty() && relaxed.len() >= target {
                break;
            }
            for arc in &path.arcs {
                relaxed.insert(arc.literal.var);
            }
        }
        tag(
            self.helper.relax_given_variables(initial, &relaxed),
            self.name(),
        )
    }
}
