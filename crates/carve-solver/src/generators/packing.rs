//! Packing strategies over 2-D no-overlap constraints.

use std::collections::BTreeSet;
use std::sync::Arc;

use carve_core::{Assignment, ConstraintKind, IntervalId, LinearExpr};
use carve_config::LnsConfig;
use rand::seq::{index, IndexedRandom};
use rand::RngCore;

use crate::helper::routing::ActiveRectangle;
use crate::helper::NeighborhoodHelper;
use crate::neighborhood::Neighborhood;

use super::scheduling::scheduling_neighborhood;
use super::{tag, target_relaxed_count, GeneratorStats, NeighborhoodGenerator};

fn has_rectangles(helper: &NeighborhoodHelper) -> bool {
    !helper
        .type_to_constraints(ConstraintKind::NoOverlap2d)
        .is_empty()
}

fn rectangle_intervals(rects: &[&ActiveRectangle]) -> BTreeSet<IntervalId> {
    rects
        .iter()
        .flat_map(|r| [r.x_interval, r.y_interval])
        .collect()
}

/// Relaxes a uniformly random subset of the active rectangles (both
/// coordinate intervals of each).
pub struct RandomRectanglesGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RandomRectanglesGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

impl NeighborhoodGenerator for RandomRectanglesGenerator {
    fn name(&self) -> &str {
        "packing_random_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_rectangles(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let rects = self.helper.active_rectangles(initial);
        if rects.is_empty() {
            return self.helper.no_neighborhood();
        }
        let target = target_relaxed_count(rects.len(), difficulty);
        if target >= rects.len() {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        let chosen: Vec<&ActiveRectangle> = index::sample(rng, rects.len(), target)
            .iter()
            .map(|i| &rects[i])
            .collect();
        let relaxed = rectangle_intervals(&chosen);
        tag(
            scheduling_neighborhood(&self.helper, initial, &relaxed),
            self.name(),
        )
    }
}

/// Relaxes a spatial cluster: a random seed rectangle plus its nearest
/// neighbors by center distance, with the relaxed coordinates confined to a
/// padded bounding box of the cluster.
pub struct RectanglesWindowGenerator {
    helper: Arc<NeighborhoodHelper>,
    stats: GeneratorStats,
}

impl RectanglesWindowGenerator {
    pub fn new(helper: Arc<NeighborhoodHelper>, config: &LnsConfig) -> Self {
        Self {
            helper,
            stats: GeneratorStats::new(config),
        }
    }
}

/// Intersects the domain of every single-variable unit-coefficient
/// expression among `exprs` with `[lo, hi]`; composite expressions are left
/// alone. Intersections that would empty a domain are skipped.
fn confine_exprs(
    neighborhood: &mut Neighborhood,
    exprs: impl Iterator<Item = LinearExpr>,
    lo: i64,
    hi: i64,
) {
    for expr in exprs {
        let [(var, 1)] = expr.terms() else { continue };
        let var = *var;
        let old = neighborhood.delta.variable(var).domain().clone();
        let new = old.intersect_bounds(lo - expr.offset(), hi - expr.offset());
        if !new.is_empty() && new != old {
            neighborhood.delta.set_domain(var, new);
        }
    }
}

impl NeighborhoodGenerator for RectanglesWindowGenerator {
    fn name(&self) -> &str {
        "packing_window_lns"
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    fn ready_to_generate(&self) -> bool {
        has_rectangles(&self.helper)
    }

    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood {
        let rects = self.helper.active_rectangles(initial);
        if rects.is_empty() {
            return self.helper.no_neighborhood();
        }
        let target = target_relaxed_count(rects.len(), difficulty);
        if target >= rects.len() {
            return tag(self.helper.full_neighborhood(), self.name());
        }
        let seed = rects.choose(rng).copied().unwrap_or(rects[0]);
        // Same constraint only: clusters never span independent packings.
        let mut cluster: Vec<&ActiveRectangle> = rects
            .iter()
            .filter(|r| r.constraint == seed.constraint)
            .collect();
        cluster.sort_by_key(|r| {
            (
                seed.center_distance(r),
                r.x_interval,
            )
        });
        cluster.truncate(target.max(1));

        let x_lo = cluster.iter().map(|r| r.x_min).min().unwrap_or(seed.x_min);
        let x_hi = cluster.iter().map(|r| r.x_max).max().unwrap_or(seed.x_max);
        let y_lo = cluster.iter().map(|r| r.y_min).min().unwrap_or(seed.y_min);
        let y_hi = cluster.iter().map(|r| r.y_max).max().unwrap_or(seed.y_max);
        // Pad by half the cluster extent so rectangles can still slide.
        let x_pad = (x_hi - x_lo) / 2 + 1;
        let y_pad = (y_hi - y_lo) / 2 + 1;

        let relaxed = rectangle_intervals(&cluster);
        let mut n = scheduling_neighborhood(&self.helper, initial, &relaxed);
        if !n.is_generated {
            return n;
        }
        let model = self.helper.model_snapshot();
        for r in &cluster {
            let x = model.interval(r.x_interval);
            let y = model.interval(r.y_interval);
            confine_exprs(
                &mut n,
                [x.start.clone(), x.end.clone()].into_iter(),
                x_lo - x_pad,
                x_hi + x_pad,
            );
            confine_exprs(
                &mut n,
                [y.start.clone(), y.end.clone()].into_iter(),
                y_lo - y_pad,
                y_hi + y_pad,
            );
        }
        tag(n, self.name())
    }
}
