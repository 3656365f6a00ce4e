//! Generator selection and the worker improvement loop.
//!
//! The portfolio scores its generators with UCB1 over the statistics they
//! accumulate; a worker iteration draws a base solution, asks the selected
//! generator for a neighborhood, hands the reduced model to the external
//! sub-solver and publishes whatever came back.

use std::sync::Arc;

use carve_core::{Assignment, SolveLimits, SolveStatus, SubSolver};
use carve_config::SearchConfig;
use rand::RngCore;

use crate::combiner::SolutionCombiner;
use crate::generators::{
    ArcGraphGenerator, ConstraintGraphGenerator, DecompositionGraphGenerator,
    FullProblemGenerator, LocalBranchingLpGenerator, NeighborhoodGenerator,
    RandomIntervalsGenerator, RandomPrecedencesGenerator, RandomRectanglesGenerator,
    RectanglesWindowGenerator, RelaxRandomConstraintsGenerator, RelaxRandomVariablesGenerator,
    RelaxationInducedGenerator, RelaxationSolutionPool, RoutingFullPathGenerator,
    RoutingPathGenerator, RoutingRandomGenerator, SchedulingResourceWindowGenerator,
    SchedulingTimeWindowGenerator, SolveData, VariableGraphGenerator,
};
use crate::helper::{BoundChange, NeighborhoodHelper};
use crate::shared::{SharedBoundsManager, SharedResponseManager, SharedSolutionRepository, Solution};

/// The registered generators and their UCB1 selection.
pub struct GeneratorPortfolio {
    generators: Vec<Arc<dyn NeighborhoodGenerator>>,
}

impl GeneratorPortfolio {
    pub fn new() -> Self {
        Self {
            generators: Vec::new(),
        }
    }

    pub fn register(&mut self, generator: Arc<dyn NeighborhoodGenerator>) {
        self.generators.push(generator);
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn NeighborhoodGenerator>> {
        self.generators.iter().find(|g| g.name() == name)
    }

    fn total_calls(&self) -> u64 {
        self.generators.iter().map(|g| g.stats().num_calls()).sum()
    }

    /// Picks the ready generator with the best UCB1 score.
    ///
    /// While several generators are still under-explored (infinite score),
    /// the least-called one goes first, which cycles through the portfolio
    /// before scores start to matter.
    pub fn select(&self) -> Option<Arc<dyn NeighborhoodGenerator>> {
        let total = self.total_calls();
        let ready: Vec<&Arc<dyn NeighborhoodGenerator>> = self
            .generators
            .iter()
            .filter(|g| g.ready_to_generate())
            .collect();
        if ready.is_empty() {
            return None;
        }
        let unexplored = ready
            .iter()
            .filter(|g| g.score(total).is_infinite())
            .min_by_key(|g| g.stats().num_calls());
        if let Some(g) = unexplored {
            return Some(Arc::clone(g));
        }
        ready
            .into_iter()
            .max_by(|a, b| {
                a.score(total)
                    .partial_cmp(&b.score(total))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    /// Folds every generator's pending outcomes into its statistics.
    pub fn synchronize_all(&self) {
        for g in &self.generators {
            g.synchronize();
        }
    }
}

impl Default for GeneratorPortfolio {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the standard portfolio, honoring `disabled_generators`.
pub fn default_portfolio(
    helper: Arc<NeighborhoodHelper>,
    relaxations: Arc<RelaxationSolutionPool>,
    config: &SearchConfig,
) -> GeneratorPortfolio {
    let lns = &config.lns;
    let mut portfolio = GeneratorPortfolio::new();
    let all: Vec<Arc<dyn NeighborhoodGenerator>> = vec![
        Arc::new(RelaxRandomVariablesGenerator::new(helper.clone(), lns)),
        Arc::new(RelaxRandomConstraintsGenerator::new(helper.clone(), lns)),
        Arc::new(VariableGraphGenerator::new(helper.clone(), lns)),
        Arc::new(ArcGraphGenerator::new(helper.clone(), lns)),
        Arc::new(ConstraintGraphGenerator::new(helper.clone(), lns)),
        Arc::new(DecompositionGraphGenerator::new(helper.clone(), lns)),
        Arc::new(RandomIntervalsGenerator::new(helper.clone(), lns)),
        Arc::new(RandomPrecedencesGenerator::new(helper.clone(), lns)),
        Arc::new(SchedulingTimeWindowGenerator::new(helper.clone(), lns)),
        Arc::new(SchedulingResourceWindowGenerator::new(helper.clone(), lns)),
        Arc::new(RandomRectanglesGenerator::new(helper.clone(), lns)),
        Arc::new(RectanglesWindowGenerator::new(helper.clone(), lns)),
        Arc::new(RoutingRandomGenerator::new(helper.clone(), lns)),
        Arc::new(RoutingPathGenerator::new(helper.clone(), lns)),
        Arc::new(RoutingFullPathGenerator::new(helper.clone(), lns)),
        Arc::new(RelaxationInducedGenerator::new(
            helper.clone(),
            relaxations.clone(),
            lns,
        )),
        Arc::new(LocalBranchingLpGenerator::new(
            helper.clone(),
            relaxations,
            lns,
        )),
        Arc::new(FullProblemGenerator::new(helper, lns)),
    ];
    for g in all {
        if !config.disabled_generators.iter().any(|n| n == g.name()) {
            portfolio.register(g);
        }
    }
    portfolio
}

/// One improvement worker: draws bases from the shared pool, carves
/// neighborhoods and publishes results.
pub struct LnsWorker {
    name: String,
    helper: Arc<NeighborhoodHelper>,
    portfolio: Arc<GeneratorPortfolio>,
    repository: Arc<SharedSolutionRepository<i64>>,
    response: Arc<SharedResponseManager>,
    bounds: Arc<SharedBoundsManager>,
    bounds_reader: usize,
    solver: Arc<dyn SubSolver>,
    combiner: SolutionCombiner,
}

impl LnsWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        helper: Arc<NeighborhoodHelper>,
        portfolio: Arc<GeneratorPortfolio>,
        repository: Arc<SharedSolutionRepository<i64>>,
        response: Arc<SharedResponseManager>,
        bounds: Arc<SharedBoundsManager>,
        solver: Arc<dyn SubSolver>,
    ) -> Self {
        let bounds_reader = bounds.register_new_id();
        let combiner = SolutionCombiner::new(helper.clone(), repository.clone(), response.clone());
        Self {
            name: name.into(),
            helper,
            portfolio,
            repository,
            response,
            bounds,
            bounds_reader,
            solver,
            combiner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// One worker iteration. Returns false when there was nothing to do:
    /// the search is closed, no base solution exists yet, or no generator
    /// is ready.
    pub fn run_once(&self, rng: &mut dyn RngCore) -> bool {
        if self.response.status().is_closed() {
            return false;
        }
        self.import_shared_bounds();

        let Some(base) = self
            .repository
            .get_random_biased_solution(rng)
            .or_else(|| self.response.best_solution())
        else {
            return false;
        };
        let Some(generator) = self.portfolio.select() else {
            return false;
        };

        let initial = Assignment::from_values(base.variables.clone());
        let difficulty = generator.difficulty();
        let deterministic_limit = generator.deterministic_limit();
        let neighborhood = generator.generate(&initial, difficulty, rng);
        if !neighborhood.is_generated {
            return false;
        }

        let limits = SolveLimits {
            wall_time: None,
            deterministic_time: Some(deterministic_limit),
        };
        let sub = self.solver.solve(&neighborhood.delta, &limits, Some(&initial));
        self.response.advance_deterministic_time(sub.deterministic_time);

        let has_solution = sub.solution.is_some()
            && matches!(sub.status, SolveStatus::Feasible | SolveStatus::Optimal);
        let new_objective = if has_solution {
            sub.objective_value
        } else {
            base.rank
        };
        generator.add_solve_data(SolveData {
            status: sub.status,
            difficulty,
            deterministic_limit,
            deterministic_time: sub.deterministic_time,
            base_objective: base.rank,
            new_objective,
        });

        if neighborhood.is_simple && sub.status == SolveStatus::Optimal {
            self.fix_local_optimum(&neighborhood.variables_that_can_be_fixed_to_local_optimum, &sub.solution);
        }

        if has_solution {
            if let Some(values) = sub.solution {
                let solution = self.repository.add(Solution {
                    rank: sub.objective_value,
                    variables: values.values().to_vec(),
                    source_info: neighborhood.source_info.clone(),
                });
                if self.response.new_solution(solution.clone(), &self.name) {
                    // Replay the improving diff onto the other pool members.
                    self.combiner.combine(&base, &solution, &self.name);
                }
            }
        }

        if !neighborhood.is_reduced {
            // The delta was the whole model, so this solve's verdict holds
            // for the original problem, not just the neighborhood.
            match sub.status {
                SolveStatus::Optimal if self.response.has_objective() => {
                    self.response.update_inner_objective_bounds(
                        &self.name,
                        sub.inner_objective_bound,
                        i64::MAX,
                    );
                }
                SolveStatus::Infeasible => {
                    self.response
                        .update_inner_objective_bounds(&self.name, i64::MAX, i64::MIN);
                }
                _ => {}
            }
        }
        true
    }

    /// Periodic sweep: folds generator statistics, publishes pending shared
    /// state and integrates the gap.
    pub fn synchronize(&self) {
        self.portfolio.synchronize_all();
        self.repository.synchronize(None);
        self.bounds.synchronize();
        self.response.update_gap_integral();
    }

    fn import_shared_bounds(&self) {
        let changes = self.bounds.get_changed_bounds(self.bounds_reader);
        if !changes.is_empty() && self.helper.update_domains(&changes) {
            // Some variable became fixed; the graph must follow.
            self.helper.recompute_graph();
        }
    }

    /// A purely-fixing neighborhood solved to optimality pins its
    /// component-covering variables at the sub-solution's values.
    fn fix_local_optimum(&self, fixable: &[carve_core::VarId], solution: &Option<Assignment>) {
        let Some(solution) = solution else { return };
        if fixable.is_empty() {
            return;
        }
        let changes: Vec<BoundChange> = fixable
            .iter()
            .map(|&v| BoundChange {
                var: v,
                new_lb: solution.value(v),
                new_ub: solution.value(v),
            })
            .collect();
        self.bounds.report_potential_new_bounds(&self.name, &changes);
    }
}
