//! Single source of truth for the best known bounds and feasible solution.
//!
//! Bounds live in "minimize, unscaled" (inner) terms: the lower bound only
//! moves up, the upper bound (set by solutions) only moves down. A
//! violation of that invariant is a synchronization bug: fatal in debug
//! builds, ignored in release so a long-running portfolio degrades
//! gracefully instead of crashing.
//!
//! Callbacks run synchronously under the manager's lock, so user-visible
//! ordering matches update ordering; callbacks must therefore not call back
//! into the manager.

use std::sync::{Arc, Mutex};

use carve_core::SolveStatus;

use crate::shared::solutions::Solution;

type SolutionCallback = Box<dyn Fn(&Solution<i64>) + Send>;
type BestBoundCallback = Box<dyn Fn(i64) + Send>;
type LogCallback = Box<dyn Fn(&str) + Send>;

struct ResponseState {
    status: SolveStatus,
    inner_lb: i64,
    inner_ub: i64,
    best_solution: Option<Arc<Solution<i64>>>,
    gap_integral: f64,
    /// Deterministic time of the last gap observation; `None` until the
    /// first one, which seeds the clock without contributing area.
    last_gap_dtime: Option<f64>,
    current_dtime: f64,
    integrate_on_bound_change: bool,
    solution_callbacks: Vec<SolutionCallback>,
    best_bound_callbacks: Vec<BestBoundCallback>,
    log_callbacks: Vec<LogCallback>,
}

/// Shared response manager; one per search.
pub struct SharedResponseManager {
    has_objective: bool,
    state: Mutex<ResponseState>,
}

impl SharedResponseManager {
    pub fn new(has_objective: bool) -> Self {
        Self {
            has_objective,
            state: Mutex::new(ResponseState {
                status: SolveStatus::Unknown,
                inner_lb: i64::MIN,
                inner_ub: i64::MAX,
                best_solution: None,
                gap_integral: 0.0,
                last_gap_dtime: None,
                current_dtime: 0.0,
                integrate_on_bound_change: false,
                solution_callbacks: Vec::new(),
                best_bound_callbacks: Vec::new(),
                log_callbacks: Vec::new(),
            }),
        }
    }

    pub fn status(&self) -> SolveStatus {
        self.state.lock().unwrap().status
    }

    pub fn has_objective(&self) -> bool {
        self.has_objective
    }

    pub fn inner_objective_lower_bound(&self) -> i64 {
        self.state.lock().unwrap().inner_lb
    }

    pub fn inner_objective_upper_bound(&self) -> i64 {
        self.state.lock().unwrap().inner_ub
    }

    pub fn best_solution(&self) -> Option<Arc<Solution<i64>>> {
        self.state.lock().unwrap().best_solution.clone()
    }

    pub fn gap_integral(&self) -> f64 {
        self.state.lock().unwrap().gap_integral
    }

    pub fn add_solution_callback(&self, cb: SolutionCallback) {
        self.state.lock().unwrap().solution_callbacks.push(cb);
    }

    pub fn add_best_bound_callback(&self, cb: BestBoundCallback) {
        self.state.lock().unwrap().best_bound_callbacks.push(cb);
    }

    pub fn add_log_callback(&self, cb: LogCallback) {
        self.state.lock().unwrap().log_callbacks.push(cb);
    }

    /// Switches between integrating the gap on every bound change and on
    /// the synchronization cadence. Re-seeds the gap clock either way.
    pub fn set_integrate_gap_on_bound_change(&self, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        state.integrate_on_bound_change = enabled;
        state.last_gap_dtime = None;
    }

    /// Advances the shared deterministic clock by `delta`.
    pub fn advance_deterministic_time(&self, delta: f64) {
        let mut state = self.state.lock().unwrap();
        state.current_dtime += delta.max(0.0);
    }

    /// Adds `Δdtime × ln(1 + |gap|)` to the running integral.
    ///
    /// The first call after construction or after a mode switch only seeds
    /// the timestamp: time elapsed before the first observation never
    /// contributes area.
    pub fn update_gap_integral(&self) {
        let mut state = self.state.lock().unwrap();
        Self::integrate_locked(&mut state);
    }

    fn integrate_locked(state: &mut ResponseState) {
        let now = state.current_dtime;
        if let Some(last) = state.last_gap_dtime {
            let delta = (now - last).max(0.0);
            let gap = if state.inner_lb == i64::MIN || state.inner_ub == i64::MAX {
                f64::MAX.sqrt() // unbounded gap; keep the area finite
            } else {
                (state.inner_ub.saturating_sub(state.inner_lb)).unsigned_abs() as f64
            };
            state.gap_integral += delta * (1.0 + gap).ln();
        }
        state.last_gap_dtime = Some(now);
    }

    /// Reports new proven bounds from `worker`.
    ///
    /// Non-improving components are ignored (debug-fatal). Crossing bounds
    /// prove the problem solved: optimal when a solution exists, infeasible
    /// otherwise.
    pub fn update_inner_objective_bounds(&self, worker: &str, new_lb: i64, new_ub: i64) {
        let mut state = self.state.lock().unwrap();
        if state.status.is_closed() {
            return;
        }
        let lb_improved = new_lb > state.inner_lb;
        let ub_improved = new_ub < state.inner_ub;
        debug_assert!(
            new_lb >= state.inner_lb || new_ub <= state.inner_ub,
            "bounds from {worker} move backwards: [{new_lb}, {new_ub}] vs [{}, {}]",
            state.inner_lb,
            state.inner_ub
        );
        if lb_improved {
            state.inner_lb = new_lb;
        }
        if ub_improved {
            state.inner_ub = new_ub;
        }
        if !lb_improved && !ub_improved {
            return;
        }
        tracing::debug!(
            worker,
            lb = state.inner_lb,
            ub = state.inner_ub,
            "inner objective bounds updated"
        );
        let crossed = state.inner_lb > state.inner_ub;
        let matched = state.inner_lb == state.inner_ub && state.best_solution.is_some();
        if crossed || matched {
            state.status = if state.best_solution.is_some() {
                SolveStatus::Optimal
            } else {
                SolveStatus::Infeasible
            };
            let status = state.status;
            for cb in &state.log_callbacks {
                cb(&format!("bound update closed the search as {status:?}"));
            }
        }
        if lb_improved {
            let lb = state.inner_lb;
            for cb in &state.best_bound_callbacks {
                cb(lb);
            }
        }
        if state.integrate_on_bound_change {
            Self::integrate_locked(&mut state);
        }
    }

    /// Reports a new feasible solution with inner objective `rank`.
    ///
    /// A solution that is not strictly improving once the problem is closed
    /// indicates a synchronization bug (debug-fatal, ignored in release).
    /// Returns true when the solution became the new best.
    pub fn new_solution(&self, solution: Arc<Solution<i64>>, worker: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let rank = solution.rank;
        if state.status.is_closed() {
            debug_assert!(
                rank < state.inner_ub,
                "non-improving solution from {worker} reported after the search was closed"
            );
            return false;
        }
        let improving = state.best_solution.is_none() || (self.has_objective && rank < state.inner_ub);
        if !improving {
            return false;
        }
        state.best_solution = Some(solution.clone());
        if self.has_objective {
            // The solution-side bound only moves down: a bound another
            // worker already proved may be tighter than this rank.
            state.inner_ub = state.inner_ub.min(rank);
            if state.inner_lb >= state.inner_ub {
                // Matching bounds: this solution is optimal.
                state.inner_lb = state.inner_ub;
                state.status = SolveStatus::Optimal;
            } else {
                state.status = SolveStatus::Feasible;
            }
        } else {
            state.status = SolveStatus::Feasible;
        }
        tracing::info!(worker, rank, source = %solution.source_info, "new best solution");
        for cb in &state.solution_callbacks {
            cb(&solution);
        }
        if state.integrate_on_bound_change {
            Self::integrate_locked(&mut state);
        }
        true
    }
}
