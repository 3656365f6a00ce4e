//! Tests for the generator portfolio strategies.

use std::sync::Arc;

use carve_config::LnsConfig;
use carve_core::{
    Assignment, Constraint, Domain, Interval, LinearExpr, Literal, ModelDocument, Objective,
    SolveStatus, Variable,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::*;
use crate::helper::NeighborhoodHelper;
use crate::test_utils::{assignment, helper_for, sum_model, two_component_model};

fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

fn config() -> LnsConfig {
    LnsConfig::default()
}

fn shared(model: ModelDocument) -> Arc<NeighborhoodHelper> {
    Arc::new(helper_for(model))
}

fn free_vars(n: &Neighborhood) -> Vec<usize> {
    n.delta
        .variables()
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.domain().is_fixed())
        .map(|(i, _)| i)
        .collect()
}

fn data(status: SolveStatus, base: i64, new: i64) -> SolveData {
    SolveData {
        status,
        difficulty: 0.5,
        deterministic_limit: 1.0,
        deterministic_time: 0.1,
        base_objective: base,
        new_objective: new,
    }
}

#[test]
fn random_variables_respect_the_difficulty() {
    let gen = RelaxRandomVariablesGenerator::new(shared(sum_model(10, 0, 10)), &config());
    let n = gen.generate(&assignment(&[5; 10]), 0.5, &mut rng(1));
    assert!(n.is_generated && n.is_reduced && n.is_simple);
    assert_eq!(free_vars(&n).len(), 5);
    assert_eq!(n.source_info, "rnd_var_lns");
}

#[test]
fn difficulty_one_is_the_full_problem() {
    let gen = RelaxRandomVariablesGenerator::new(shared(sum_model(4, 0, 10)), &config());
    let n = gen.generate(&assignment(&[5; 4]), 1.0, &mut rng(2));
    assert!(n.is_generated && !n.is_reduced);
}

#[test]
fn full_problem_generator_never_reduces() {
    let gen = FullProblemGenerator::new(shared(sum_model(4, 0, 10)), &config());
    let n = gen.generate(&assignment(&[5; 4]), 0.1, &mut rng(3));
    assert!(n.is_generated && !n.is_reduced);
}

#[test]
fn random_constraints_relax_whole_constraints() {
    let gen = RelaxRandomConstraintsGenerator::new(shared(two_component_model()), &config());
    let n = gen.generate(&assignment(&[5, 5, 1, 1]), 0.5, &mut rng(4));
    let free = free_vars(&n);
    assert!(free == vec![0, 1] || free == vec![2, 3], "free = {free:?}");
}

#[test]
fn variable_graph_stays_in_one_component() {
    let gen = VariableGraphGenerator::new(shared(two_component_model()), &config());
    for seed in 0..8 {
        let n = gen.generate(&assignment(&[5, 5, 1, 1]), 0.5, &mut rng(seed));
        let free = free_vars(&n);
        assert!(free == vec![0, 1] || free == vec![2, 3], "free = {free:?}");
    }
}

#[test]
fn arc_graph_walks_the_structure() {
    let gen = ArcGraphGenerator::new(shared(two_component_model()), &config());
    for seed in 0..8 {
        let n = gen.generate(&assignment(&[5, 5, 1, 1]), 0.5, &mut rng(seed));
        let free = free_vars(&n);
        assert!(free == vec![0, 1] || free == vec![2, 3], "free = {free:?}");
    }
}

#[test]
fn constraint_graph_relaxes_constraint_by_constraint() {
    let gen = ConstraintGraphGenerator::new(shared(two_component_model()), &config());
    let n = gen.generate(&assignment(&[5, 5, 1, 1]), 0.5, &mut rng(5));
    let free = free_vars(&n);
    assert!(free == vec![0, 1] || free == vec![2, 3], "free = {free:?}");
}

#[test]
fn decomposition_window_meets_the_budget() {
    let gen = DecompositionGraphGenerator::new(shared(two_component_model()), &config());
    let n = gen.generate(&assignment(&[5, 5, 1, 1]), 0.5, &mut rng(6));
    assert_eq!(free_vars(&n).len(), 2);
}

// ---- relaxation-guided strategies ----

#[test]
fn rins_squeezes_fractional_and_pins_integral_values() {
    let pool = Arc::new(RelaxationSolutionPool::new());
    pool.add_lp_solution(vec![3.5, 5.0]);
    let gen = RelaxationInducedGenerator::new(shared(sum_model(2, 0, 10)), pool, &config());
    let n = gen.generate(&assignment(&[7, 7]), 0.5, &mut rng(7));
    assert!(n.is_generated && n.is_reduced);
    let x = n.delta.variable(carve_core::VarId(0)).domain();
    let y = n.delta.variable(carve_core::VarId(1)).domain();
    assert_eq!((x.lb(), x.ub()), (Some(3), Some(4)));
    assert_eq!(y.fixed_value(), Some(5));
}

#[test]
fn rins_is_not_ready_without_a_pool() {
    let pool = Arc::new(RelaxationSolutionPool::new());
    let gen =
        RelaxationInducedGenerator::new(shared(sum_model(2, 0, 10)), pool.clone(), &config());
    assert!(!gen.ready_to_generate());
    pool.add_incomplete_solution(vec![Some(3), None]);
    assert!(gen.ready_to_generate());
}

#[test]
fn rins_incomplete_solution_fixes_decided_variables() {
    let pool = Arc::new(RelaxationSolutionPool::new());
    pool.add_incomplete_solution(vec![Some(3), None]);
    let gen = RelaxationInducedGenerator::new(shared(sum_model(2, 0, 10)), pool, &config());
    let n = gen.generate(&assignment(&[3, 7]), 0.5, &mut rng(8));
    assert_eq!(free_vars(&n), vec![1]);
    assert_eq!(
        n.delta.variable(carve_core::VarId(0)).domain().fixed_value(),
        Some(3)
    );
}

#[test]
fn local_branching_relaxes_the_biggest_disagreements() {
    let pool = Arc::new(RelaxationSolutionPool::new());
    pool.add_lp_solution(vec![0.0, 5.0, 9.0]);
    let gen = LocalBranchingLpGenerator::new(shared(sum_model(3, 0, 10)), pool, &config());
    let n = gen.generate(&assignment(&[5, 5, 5]), 0.5, &mut rng(9));
    // Distances to the relaxation are 5, 0 and 4: variables 0 and 2 move.
    assert_eq!(free_vars(&n), vec![0, 2]);
}

// ---- scheduling strategies ----

fn interval_model() -> (Arc<NeighborhoodHelper>, Assignment) {
    let mut m = ModelDocument::default();
    let mut ids = Vec::new();
    let mut terms = Vec::new();
    for i in 0..3 {
        let v = m.add_variable(Variable::new(format!("s{i}"), Domain::new(0, 100)));
        terms.push((v, 1));
        ids.push(m.add_interval(Interval {
            start: LinearExpr::term(v, 1),
            size: LinearExpr::constant(2),
            end: LinearExpr::term(v, 1).plus_constant(2),
            enforcement: None,
        }));
    }
    m.add_constraint(Constraint::NoOverlap { intervals: ids });
    m.set_objective(Some(Objective::new(terms)));
    (shared(m), Assignment::from_values(vec![0, 10, 20]))
}

#[test]
fn random_intervals_keep_the_rest_ordered() {
    let (helper, initial) = interval_model();
    let base_constraints = helper.model_snapshot().num_constraints();
    let gen = RandomIntervalsGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.34, &mut rng(10));
    assert!(n.is_generated && !n.is_simple);
    // Time variables stay free; order is carried by added precedences.
    assert_eq!(free_vars(&n).len(), 3);
    assert!(n.delta.num_constraints() <= base_constraints + 1);
}

#[test]
fn dropping_no_precedence_keeps_the_full_order() {
    let (helper, initial) = interval_model();
    let base_constraints = helper.model_snapshot().num_constraints();
    let gen = RandomPrecedencesGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.0, &mut rng(11));
    // Chain of 3 intervals: both precedences kept.
    assert_eq!(n.delta.num_constraints(), base_constraints + 2);
    assert_eq!(free_vars(&n).len(), 3);
}

#[test]
fn time_window_relaxes_a_contiguous_stretch() {
    let (helper, initial) = interval_model();
    let gen = SchedulingTimeWindowGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.34, &mut rng(12));
    assert!(n.is_generated && !n.is_simple);
}

#[test]
fn resource_window_stays_on_one_resource() {
    let (helper, initial) = interval_model();
    let gen = SchedulingResourceWindowGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.34, &mut rng(13));
    assert!(n.is_generated);
}

#[test]
fn scheduling_generators_need_scheduling_constraints() {
    let gen = RandomIntervalsGenerator::new(shared(sum_model(3, 0, 10)), &config());
    assert!(!gen.ready_to_generate());
}

// ---- packing strategies ----

fn rectangle_model() -> (Arc<NeighborhoodHelper>, Assignment) {
    let mut m = ModelDocument::default();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..2 {
        let xv = m.add_variable(Variable::new(format!("x{i}"), Domain::new(0, 100)));
        let yv = m.add_variable(Variable::new(format!("y{i}"), Domain::new(0, 100)));
        xs.push(m.add_interval(Interval {
            start: LinearExpr::term(xv, 1),
            size: LinearExpr::constant(4),
            end: LinearExpr::term(xv, 1).plus_constant(4),
            enforcement: None,
        }));
        ys.push(m.add_interval(Interval {
            start: LinearExpr::term(yv, 1),
            size: LinearExpr::constant(2),
            end: LinearExpr::term(yv, 1).plus_constant(2),
            enforcement: None,
        }));
    }
    m.add_constraint(Constraint::NoOverlap2d {
        x_intervals: xs,
        y_intervals: ys,
    });
    (shared(m), Assignment::from_values(vec![0, 0, 50, 50]))
}

#[test]
fn random_rectangles_generate_from_2d_constraints() {
    let (helper, initial) = rectangle_model();
    let gen = RandomRectanglesGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.5, &mut rng(14));
    assert!(n.is_generated);
}

#[test]
fn rectangle_window_confines_the_cluster() {
    let (helper, initial) = rectangle_model();
    let gen = RectanglesWindowGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.5, &mut rng(15));
    assert!(n.is_generated);
    // The cluster's coordinates are boxed in: some domain shrank below the
    // original [0, 100].
    let shrunk = n
        .delta
        .variables()
        .iter()
        .any(|v| v.domain().ub().is_some_and(|ub| ub < 100));
    assert!(shrunk);
}

// ---- routing strategies ----

fn circuit_model() -> (Arc<NeighborhoodHelper>, Assignment) {
    let mut m = ModelDocument::default();
    let mut arcs = Vec::new();
    for (i, (tail, head)) in [(0, 1), (1, 2), (2, 0), (0, 2)].iter().enumerate() {
        let v = m.add_variable(Variable::new(format!("a{i}"), Domain::new(0, 1)));
        arcs.push(carve_core::Arc {
            tail: *tail,
            head: *head,
            literal: Literal::pos(v),
        });
    }
    m.add_constraint(Constraint::Circuit { arcs });
    (shared(m), Assignment::from_values(vec![1, 1, 1, 0]))
}

#[test]
fn routing_random_relaxes_arc_literals() {
    let (helper, initial) = circuit_model();
    let gen = RoutingRandomGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.5, &mut rng(16));
    assert_eq!(free_vars(&n).len(), 2);
}

#[test]
fn routing_path_relaxes_a_contiguous_segment() {
    let (helper, initial) = circuit_model();
    let gen = RoutingPathGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.5, &mut rng(17));
    let free = free_vars(&n);
    assert_eq!(free.len(), 2);
    // Segments come from the traveled path; the unselected arc stays fixed.
    assert!(!free.contains(&3));
}

#[test]
fn routing_full_path_relaxes_whole_routes() {
    let (helper, initial) = circuit_model();
    let gen = RoutingFullPathGenerator::new(helper, &config());
    let n = gen.generate(&initial, 0.25, &mut rng(18));
    // The single path has three arcs; it is relaxed in full.
    assert_eq!(free_vars(&n), vec![0, 1, 2]);
}

#[test]
fn routing_generators_need_routing_constraints() {
    let gen = RoutingRandomGenerator::new(shared(sum_model(3, 0, 10)), &config());
    assert!(!gen.ready_to_generate());
}

// ---- statistics ----

#[test]
fn difficulty_follows_solve_outcomes() {
    let stats = GeneratorStats::new(&config());
    stats.add_solve_data(data(SolveStatus::Optimal, 10, 5));
    stats.synchronize();
    let after_solved = stats.difficulty();
    assert!(after_solved > 0.5);

    stats.add_solve_data(data(SolveStatus::Unknown, 10, 10));
    stats.add_solve_data(data(SolveStatus::Unknown, 10, 10));
    stats.synchronize();
    assert!(stats.difficulty() < after_solved);
}

#[test]
fn deterministic_limit_grows_after_a_stall() {
    let mut cfg = config();
    cfg.stall_threshold = 2;
    let stats = GeneratorStats::new(&cfg);
    for _ in 0..4 {
        stats.add_solve_data(data(SolveStatus::Unknown, 10, 10));
    }
    stats.synchronize();
    assert!(stats.deterministic_limit() > cfg.initial_deterministic_time);
}

#[test]
fn deterministic_limit_is_capped() {
    let mut cfg = config();
    cfg.stall_threshold = 0;
    cfg.initial_deterministic_time = 9.99;
    cfg.max_deterministic_time = 10.0;
    let stats = GeneratorStats::new(&cfg);
    for _ in 0..50 {
        stats.add_solve_data(data(SolveStatus::Unknown, 10, 10));
        stats.synchronize();
    }
    assert!(stats.deterministic_limit() <= 10.0);
}

#[test]
fn rarely_tried_generators_score_infinite() {
    let stats = GeneratorStats::new(&config());
    assert!(stats.score(1000).is_infinite());
    for _ in 0..11 {
        stats.add_solve_data(data(SolveStatus::Optimal, 10, 5));
    }
    stats.synchronize();
    assert!(stats.score(1000).is_finite());
}

#[test]
fn statistics_folding_is_order_independent() {
    let run = |order: &[SolveData]| {
        let stats = GeneratorStats::new(&config());
        for d in order {
            stats.add_solve_data(d.clone());
        }
        stats.synchronize();
        stats.difficulty()
    };
    let a = data(SolveStatus::Optimal, 10, 5);
    let b = data(SolveStatus::Unknown, 10, 10);
    let c = data(SolveStatus::Infeasible, 10, 10);
    assert_eq!(
        run(&[a.clone(), b.clone(), c.clone()]),
        run(&[c, b, a])
    );
}
