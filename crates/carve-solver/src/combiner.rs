//! The solution combiner: replays an improvement's diff onto the other
//! pooled solutions.
//!
//! When a neighborhood solve turns `base` into `improved`, the changed
//! variables often encode a reusable move (a swapped pair, a re-timed
//! interval). Applying the same diff to the other pool members sometimes
//! yields further feasible improvements for the price of one cheap
//! feasibility evaluation, with no sub-solve at all.

use std::sync::Arc;

use carve_core::{is_feasible, Assignment};

use crate::helper::NeighborhoodHelper;
use crate::shared::{SharedResponseManager, SharedSolutionRepository, Solution};

pub struct SolutionCombiner {
    helper: Arc<NeighborhoodHelper>,
    repository: Arc<SharedSolutionRepository<i64>>,
    response: Arc<SharedResponseManager>,
}

impl SolutionCombiner {
    pub fn new(
        helper: Arc<NeighborhoodHelper>,
        repository: Arc<SharedSolutionRepository<i64>>,
        response: Arc<SharedResponseManager>,
    ) -> Self {
        Self {
            helper,
            repository,
            response,
        }
    }

    /// Applies the `base -> improved` diff to every other pooled solution
    /// and feeds feasible, improving results back into the pool and the
    /// response manager. Returns the number of accepted combinations.
    ///
    /// Runs on a model snapshot: the repository lock is never held while
    /// evaluating feasibility.
    pub fn combine(
        &self,
        base: &Solution<i64>,
        improved: &Solution<i64>,
        worker: &str,
    ) -> usize {
        let diff: Vec<(usize, i64)> = base
            .variables
            .iter()
            .zip(&improved.variables)
            .enumerate()
            .filter(|(_, (b, i))| b != i)
            .map(|(idx, (_, i))| (idx, *i))
            .collect();
        if diff.is_empty() {
            return 0;
        }

        let model = self.helper.model_snapshot();
        let mut accepted = 0;
        for other in self.repository.solutions() {
            if other.variables == base.variables || other.variables == improved.variables {
                continue;
            }
            let mut patched = other.variables.clone();
            for &(idx, value) in &diff {
                if idx < patched.len() {
                    patched[idx] = value;
                }
            }
            if patched == improved.variables {
                continue;
            }
            let candidate = Assignment::from_values(patched);
            if !is_feasible(&model, &candidate) {
                continue;
            }
            let rank = match model.objective() {
                Some(obj) => obj.inner_value(&candidate),
                None => improved.rank,
            };
            if model.objective().is_some() && rank >= self.response.inner_objective_upper_bound() {
                continue;
            }
            tracing::debug!(worker, rank, "combined solution accepted");
            let solution = self.repository.add(Solution {
                rank,
                variables: candidate.values().to_vec(),
                source_info: format!("combined:{}", improved.source_info),
            });
            self.response.new_solution(solution, worker);
            accepted += 1;
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carve_core::{Constraint, Domain, LinearExpr, VarId};
    use crate::test_utils::{helper_for, sum_model};

    fn solution(rank: i64, values: &[i64]) -> Solution<i64> {
        Solution {
            rank,
            variables: values.to_vec(),
            source_info: "test".to_string(),
        }
    }

    fn setup(model: carve_core::ModelDocument) -> SolutionCombiner {
        SolutionCombiner::new(
            Arc::new(helper_for(model)),
            Arc::new(SharedSolutionRepository::new(10)),
            Arc::new(SharedResponseManager::new(true)),
        )
    }

    #[test]
    fn diff_replays_onto_other_pool_members() {
        let combiner = setup(sum_model(3, 0, 10));
        let other = solution(12, &[5, 5, 2]);
        combiner.repository.add(other.clone());
        combiner.repository.synchronize(None);
        combiner
            .response
            .new_solution(Arc::new(other), "setup");

        let base = solution(15, &[5, 5, 5]);
        let improved = solution(10, &[0, 5, 5]);
        // Diff fixes variable 0 to 0; applied to [5, 5, 2] it yields
        // [0, 5, 2] with objective 7, beating the incumbent's 12.
        assert_eq!(combiner.combine(&base, &improved, "w0"), 1);
        assert_eq!(combiner.response.inner_objective_upper_bound(), 7);
    }

    #[test]
    fn infeasible_patches_are_rejected() {
        let mut model = sum_model(3, 0, 10);
        model.add_constraint(Constraint::Linear {
            expr: LinearExpr::term(VarId(0), 1).plus_term(VarId(2), 1),
            domain: Domain::new(5, 100),
        });
        let combiner = setup(model);
        combiner.repository.add(solution(12, &[5, 5, 2]));
        combiner.repository.synchronize(None);

        let base = solution(15, &[5, 5, 5]);
        let improved = solution(10, &[0, 5, 5]);
        // Patched candidate [0, 5, 2] violates x0 + x2 >= 5.
        assert_eq!(combiner.combine(&base, &improved, "w0"), 0);
    }

    #[test]
    fn identical_solutions_produce_no_diff() {
        let combiner = setup(sum_model(3, 0, 10));
        let base = solution(15, &[5, 5, 5]);
        assert_eq!(combiner.combine(&base, &base, "w0"), 0);
    }

    #[test]
    fn non_improving_combinations_are_dropped() {
        let combiner = setup(sum_model(3, 0, 10));
        let other = solution(3, &[1, 1, 1]);
        combiner.repository.add(other.clone());
        combiner.repository.synchronize(None);
        combiner.response.new_solution(Arc::new(other), "setup");

        let base = solution(15, &[5, 5, 5]);
        let improved = solution(14, &[4, 5, 5]);
        // Patching [1, 1, 1] to [4, 1, 1] scores 6 > incumbent 3.
        assert_eq!(combiner.combine(&base, &improved, "w0"), 0);
    }
}
