//! Scheduling strategies: relax intervals, keep the rest loosely ordered.
//!
//! Instead of freezing non-relaxed intervals at their solution times, these
//! strategies keep their time variables free and add explicit precedence
//! constraints reproducing the solution's relative order. The sub-solver
//! can then shift the whole schedule while re-placing the relaxed
//! intervals.

use std::collections::BTreeSet;
use std::sync::Arc;

use carve_core::{Assignment, Constraint, ConstraintKind, Domain, IntervalId, ModelDocument, VarId};
use carve_config::LnsConfig;
use rand::seq::{index, IndexedRandom};
use rand::{Rng, RngCore};

use crate::helper::NeighborhoodHelper;
use crate::neighborhood::Neighborhood;

use super::{tag, target_relaxed_count, GeneratorStats, NeighborhoodGenerator};

pub(crate) const MAX_PRECEDENCE_PAIRS: usize = 10_000;

pub(crate) fn has_scheduling_constraints(helper: &NeighborhoodHelper) -> bool {
    [
        ConstraintKind::NoOverlap,
        ConstraintKind::Cumulative,
        ConstraintKind::NoOverlap2d,
    ]
    .iter()
    .any(|&k| !helper.type_to_constraints(k).is_empty())
}

pub(crate) fn active_interval_ids(model: &ModelDocument, initial: &Assignment) -> Vec<IntervalId> {
    (0..model.num_intervals())
        .map(IntervalId)
        .filter(|&id| model.interval(id).is_active(initial))
        .collect()
}

/// Builds a scheduling neighborhood from a set of relaxed intervals.
///
/// Relaxed intervals are fully freed (presence included). Non-relaxed
/// active intervals keep their time variables free but receive precedence
/// constraints matching the base solution's order. Everything else is
/// fixed.
pub(crate) fn scheduling_neighborhood(
    helper: &Arc<NeighborhoodHelper>,
    initial: &Assignment,
    relaxed: &BTreeSet<IntervalId>,
) -> Neighborhood {
    let model = helper.model_snapshot();
    let mut free: BTreeSet<VarId> = BTreeSet::new();
    for (idx, interval) in model.intervals().iter().enumerate() {
        if relaxed.contains(&IntervalId(idx)) {
            free.extend(interval.variables());
        } else if interval.is_active(initial) {
            free.extend(interval.start.variables());
            free.extend(interval.size.variables());
            free.extend(interval.end.variables());
        }
    }
    let fixed: BTreeSet<VarId> = (0..model.num_variables())
        .map(VarId)
        .filter(|v| !free.contains(v))
        .collect();
    let mut n = helper.fix_given_variables(initial, &fixed);
    if !n.is_generated {
        return n;
    }

    for p in helper.scheduling_precedences(initial, MAX_PRECEDENCE_PAIRS) {
        if relaxed.contains(&p.before) || relaxed.contains(&p.after) {
            continue;
        }
        // end(before) <= start(after), as a linear constraint.
        let before_end = &model.interval(p.before).end;
        let mut expr = model.interval(p.after).start.clone();
        for (v, c) in before_end.terms() {
            expr = expr.plus_term(*v, -c);
        }
        expr = expr.plus_constant(-before_end.offset());
        n.delta.add_constraint(Constraint::Linear {
            expr,
            domain: Domain::new(0, i64::MAX / 4),
        });
    }
    // Added constraints invalidate the pure-fixing shortcut.
    n.is_simple = false;
    n.variables_that_can_be_fixed_to_local_optimum.clear();
    n
}

/// Relaxes a uniformly random subset of the active intervals.
pub struct RandomIntervalsGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RandomIntervalsGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for RandomIntervalsGenerator {
    fn name(&self) -> &str {
        "scheduling_random_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_scheduling_constraints(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let model = self.helper.model_snapshot();
        let active = active_interval_ids(&model, initial);
        if active.is_empty() {
            return self.helper.no_neighborhood();
        }
        let target = target_relaxed_count(active.len(), difficulty);
        if target >= active.len() {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        let relaxed: BTreeSet<IntervalId> = index::sample(rng, active.len(), target)
            .iter()
            .map(|i| active[i])
            .collect();
        tag(
            scheduling_neighborhood(&self.helper, initial, &relaxed),
            self.name(),
        )
    }
}

/// Keeps all intervals but drops a random fraction of the derived
/// precedences, leaving the schedule free to reorder exactly there.
pub struct RandomPrecedencesGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RandomPrecedencesGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for RandomPrecedencesGenerator {
    fn name(&self) -> &str {
        "scheduling_precedences_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_scheduling_constraints(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let model = self.helper.model_snapshot();
        let active = active_interval_ids(&model, initial);
        if active.is_empty() {
            return self.helper.no_neighborhood();
        }
        if difficulty >= 1.0 {
            return tag(self.helper.full_neighborhood(), self.name());
        }

        // Free the time variables of every active interval; presence stays
        // as in the base solution.
        let mut free: BTreeSet<VarId> = BTreeSet::new();
        for &id in &active {
            let interval = model.interval(id);
            free.extend(interval.start.variables());
            free.extend(interval.size.variables());
            free.extend(interval.end.variables());
        }
        let fixed: BTreeSet<VarId> = (0..model.num_variables())
            .map(VarId)
            .filter(|v| !free.contains(v))
            .collect();
        let mut n = self.helper.fix_given_variables(initial, &fixed);
        if !n.is_generated {
            return n;
        }

        let precedences = self
            .helper
            .scheduling_precedences(initial, MAX_PRECEDENCE_PAIRS);
        for p in precedences {
            // Each precedence is independently dropped with probability
            // `difficulty`; what remains pins the rest of the order.
            if rng.random_range(0.0..1.0) < difficulty {
                continue;
            }
            let before_end = &model.interval(p.before).end;
            let mut expr = model.interval(p.after).start.clone();
            for (v, c) in before_end.terms() {
                expr = expr.plus_term(*v, -c);
            }
            expr = expr.plus_constant(-before_end.offset());
            n.delta.add_constraint(Constraint::Linear {
                expr,
                domain: Domain::new(0, i64::MAX / 4),
            });
        }
        n.is_simple = false;
        n.variables_that_can_be_fixed_to_local_optimum.clear();
        tag(n, self.name())
    }
}

/// Relaxes a contiguous time window of the schedule.
pub struct SchedulingTimeWindowGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl SchedulingTimeWindowGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

/// Sorts intervals by solution start time with a random tie-break, so equal
/// starts do not always land in the same window.
pub(crate) fn sort_by_start_with_noise(
    model: &ModelDocument,
    initial: &Assignment,
    ids: &[IntervalId],
    rng: &mut dyn RngCore,
) -> Vec<IntervalId> {
    let mut keyed: Vec<(i64, u64, IntervalId)> = ids
        .iter()
        .map(|&id| {
            (
                model.interval(id).start.value_in(initial),
                rng.next_u64(),
                id,
            )
        })
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, _, id)| id).collect()
}

pub(crate) fn window_of(
    sorted: &[IntervalId],
    target: usize,
    rng: &mut dyn RngCore,
) -> BTreeSet<IntervalId> {
    let start = rng.random_range(0..=(sorted.len() - target));
    sorted[start..start + target].iter().copied().collect()
}

impl NeighborhoodGenerator for SchedulingTimeWindowGenerator {
    fn name(&self) -> &str {
        "scheduling_time_window_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_scheduling_constraints(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let model = self.helper.model_snapshot();
        let active = active_interval_ids(&model, initial);
        if active.is_empty() {
            return self.helper.no_neighborhood();
        }
        let target = target_relaxed_count(active.len(), difficulty);
        if target >= active.len() {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        let sorted = sort_by_start_with_noise(&model, initial, &active, rng);
        let relaxed = window_of(&sorted, target, rng);
        tag(
            scheduling_neighborhood(&self.helper, initial, &relaxed),
            self.name(),
        )
    }
}

/// Relaxes a time window restricted to one resource (one no-overlap or
/// cumulative constraint).
pub struct SchedulingResourceWindowGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl SchedulingResourceWindowGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for SchedulingResourceWindowGenerator {
    fn name(&self) -> &str {
        "scheduling_resource_window_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_scheduling_constraints(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let mut resources = self.helper.type_to_constraints(ConstraintKind::NoOverlap);
        resources.extend(self.helper.type_to_constraints(ConstraintKind::Cumulative));
        let Some(&resource) = resources.choose(rng) else {
            return self.helper.no_neighborhood();
        };
        let model = self.helper.model_snapshot();
        let on_resource: Vec<IntervalId> = model
            .constraint(resource)
            .intervals()
            .into_iter()
            .filter(|&id| model.interval(id).is_active(initial))
            .collect();
        if on_resource.is_empty() {
            return self.helper.no_neighborhood();
        }
        let target = target_relaxed_count(on_resource.len(), difficulty);
        if target >= on_resource.len() && on_resource.len() == model.num_intervals() {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        let sorted = sort_by_start_with_noise(&model, initial, &on_resource, rng);
        let relaxed = window_of(&sorted, target.min(sorted.len()), rng);
        tag(
            scheduling_neighborhood(&self.helper, initial, &relaxed),
            self.name(),
        )
    }
}
