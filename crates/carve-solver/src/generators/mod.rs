//! The neighborhood generator portfolio.
//!
//! Every generator implements the same contract: given a base solution and
//! a difficulty in `[0, 1]` (the target fraction of variables to relax),
//! produce a [`Neighborhood`]. Generators are stateless with respect to
//! generation and safely callable from many threads; their per-generator
//! statistics live behind a dedicated mutex and are folded in on
//! `synchronize`.

pub mod graph;
pub mod packing;
pub mod random;
pub mod rins;
pub mod routing;
pub mod scheduling;

use std::sync::{Arc, Mutex};

use carve_core::{Assignment, SolveStatus};
use carve_config::LnsConfig;
use rand::RngCore;

use crate::adaptive::AdaptiveParameter;
use crate::helper::NeighborhoodHelper;
use crate::neighborhood::Neighborhood;

pub use graph::{
    ArcGraphGenerator, ConstraintGraphGenerator, DecompositionGraphGenerator,
    VariableGraphGenerator,
};
pub use packing::{RandomRectanglesGenerator, RectanglesWindowGenerator};
pub use random::{FullProblemGenerator, RelaxRandomConstraintsGenerator, RelaxRandomVariablesGenerator};
pub use rins::{LocalBranchingLpGenerator, RelaxationInducedGenerator, RelaxationSolutionPool};
pub use routing::{RoutingFullPathGenerator, RoutingPathGenerator, RoutingRandomGenerator};
pub use scheduling::{
    RandomIntervalsGenerator, RandomPrecedencesGenerator, SchedulingResourceWindowGenerator,
    SchedulingTimeWindowGenerator,
};

/// Per-call outcome record, reported back by the worker that consumed the
/// neighborhood and folded into the generator's statistics on
/// `synchronize`.
#[derive(Debug, Clone)]
pub struct SolveData {
    pub status: SolveStatus,
    pub difficulty: f64,
    pub deterministic_limit: f64,
    pub deterministic_time: f64,
    /// Inner objective of the base solution the neighborhood grew from.
    pub base_objective: i64,
    /// Inner objective of the best solution of the sub-solve.
    pub new_objective: i64,
}

impl SolveData {
    fn fully_solved(&self) -> bool {
        matches!(self.status, SolveStatus::Optimal | SolveStatus::Infeasible)
    }

    fn improving(&self) -> bool {
        self.new_objective < self.base_objective
    }
}

#[derive(Debug)]
struct StatsInner {
    num_calls: u64,
    num_fully_solved: u64,
    num_improving: u64,
    num_consecutive_non_improving: u64,
    /// Exponentially weighted average gain per deterministic second.
    average_gain: f64,
    difficulty: AdaptiveParameter,
    deterministic_limit: f64,
    pending: Vec<SolveData>,
}

/// Running statistics shared by all generators; mutated only inside the
/// owning generator's `synchronize`.
#[derive(Debug)]
pub struct GeneratorStats {
    config: LnsConfig,
    inner: Mutex<StatsInner>,
}

const EWMA_WEIGHT: f64 = 0.1;

impl GeneratorStats {
    pub fn new(config: &LnsConfig) -> Self {
        Self {
            config: config.clone(),
            inner: Mutex::new(StatsInner {
                num_calls: 0,
                num_fully_solved: 0,
                num_improving: 0,
                num_consecutive_non_improving: 0,
                average_gain: 0.0,
                difficulty: AdaptiveParameter::new(config.initial_difficulty),
                deterministic_limit: config.initial_deterministic_time,
                pending: Vec::new(),
            }),
        }
    }

    pub fn difficulty(&self) -> f64 {
        self.inner.lock().unwrap().difficulty.value()
    }

    pub fn deterministic_limit(&self) -> f64 {
        self.inner.lock().unwrap().deterministic_limit
    }

    pub fn num_calls(&self) -> u64 {
        self.inner.lock().unwrap().num_calls
    }

    pub fn num_improving_calls(&self) -> u64 {
        self.inner.lock().unwrap().num_improving
    }

    pub fn num_fully_solved_calls(&self) -> u64 {
        self.inner.lock().unwrap().num_fully_solved
    }

    /// Queues one call outcome. O(1), called by workers.
    pub fn add_solve_data(&self, data: SolveData) {
        self.inner.lock().unwrap().pending.push(data);
    }

    /// Folds queued outcomes into the running statistics.
    ///
    /// Difficulty moves through the order-independent batched update:
    /// a fully solved call votes to increase (the neighborhood was too
    /// easy), anything else votes to decrease.
    pub fn synchronize(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut inner.pending);
        let mut increases = 0u64;
        let mut decreases = 0u64;
        for data in &pending {
            inner.num_calls += 1;
            if data.fully_solved() {
                inner.num_fully_solved += 1;
                increases += 1;
            } else {
                decreases += 1;
            }
            if data.improving() {
                inner.num_improving += 1;
                inner.num_consecutive_non_improving = 0;
            } else {
                inner.num_consecutive_non_improving += 1;
            }
            let gain = data.base_objective.saturating_sub(data.new_objective).max(0) as f64;
            let rate = gain / data.deterministic_time.max(1e-6);
            inner.average_gain = (1.0 - EWMA_WEIGHT) * inner.average_gain + EWMA_WEIGHT * rate;
        }
        inner.difficulty.update(decreases, increases);
        if inner.num_consecutive_non_improving > self.config.stall_threshold {
            inner.deterministic_limit = (inner.deterministic_limit
                * self.config.deterministic_time_growth)
                .min(self.config.max_deterministic_time);
        }
    }

    /// UCB1 selection score: observed average gain plus an exploration
    /// bonus. Rarely-tried generators score infinite to force exploration.
    pub fn score(&self, total_calls: u64) -> f64 {
        let inner = self.inner.lock().unwrap();
        if inner.num_calls <= self.config.min_calls_before_scoring {
            return f64::INFINITY;
        }
        let bonus = (2.0 * (total_calls.max(1) as f64).ln() / inner.num_calls as f64).sqrt();
        inner.average_gain + bonus
    }
}

/// Common contract of every neighborhood strategy.
pub trait NeighborhoodGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Produces a neighborhood from `initial` at the given difficulty.
    ///
    /// Must be safe to call concurrently; `difficulty = 1.0` degenerates to
    /// the full neighborhood. A failed generation returns the
    /// `no_neighborhood` sentinel, never an error.
    fn generate(
        &self,
        initial: &Assignment,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Neighborhood;

    /// Whether the generator currently has the inputs it needs.
    fn ready_to_generate(&self) -> bool {
        true
    }

    fn stats(&self) -> &GeneratorStats;

    fn difficulty(&self) -> f64 {
        self.stats().difficulty()
    }

    fn deterministic_limit(&self) -> f64 {
        self.stats().deterministic_limit()
    }

    fn add_solve_data(&self, data: SolveData) {
        self.stats().add_solve_data(data);
    }

    fn synchronize(&self) {
        self.stats().synchronize();
    }

    fn score(&self, total_calls: u64) -> f64 {
        self.stats().score(total_calls)
    }
}

/// Stamps a neighborhood with the producing generator's name.
pub(crate) fn tag(mut neighborhood: Neighborhood, name: &str) -> Neighborhood {
    if neighborhood.is_generated {
        neighborhood.source_info = name.to_string();
    }
    neighborhood
}

/// Number of variables to relax for a given difficulty.
pub(crate) fn target_relaxed_count(num_active: usize, difficulty: f64) -> usize {
    ((num_active as f64) * difficulty.clamp(0.0, 1.0)).ceil() as usize
}

/// Shared short-circuit: difficulty 1 (or a budget covering everything)
/// degenerates to the full neighborhood.
pub(crate) fn full_if_saturated(
    helper: &Arc<NeighborhoodHelper>,
    num_active: usize,
    target: usize,
) -> Option<Neighborhood> {
    if num_active == 0 {
        return Some(helper.no_neighborhood());
    }
    if target >= num_active {
        return Some(helper.full_neighborhood());
    }
    None
}

#[cfg(test)]
mod tests;
