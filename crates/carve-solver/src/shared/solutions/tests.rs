//! Tests for the shared solution repository.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::*;

fn sol(rank: i64, variables: Vec<i64>, tag: &str) -> Solution<i64> {
    Solution {
        rank,
        variables,
        source_info: tag.to_string(),
    }
}

#[test]
fn merge_is_order_independent() {
    // {3,"A"}, {5,"B"}, duplicate {3,"A"}, {1,"C"} in two different orders.
    let orders: Vec<Vec<Solution<i64>>> = vec![
        vec![
            sol(3, vec![1, 1], "A"),
            sol(5, vec![2, 2], "B"),
            sol(3, vec![1, 1], "A2"),
            sol(1, vec![3, 3], "C"),
        ],
        vec![
            sol(1, vec![3, 3], "C"),
            sol(3, vec![1, 1], "A2"),
            sol(5, vec![2, 2], "B"),
            sol(3, vec![1, 1], "A"),
        ],
    ];
    let mut results = Vec::new();
    for order in orders {
        let repo = SharedSolutionRepository::new(3);
        for s in order {
            repo.add(s);
        }
        repo.synchronize(None);
        let pool: Vec<(i64, Vec<i64>)> = repo
            .solutions()
            .iter()
            .map(|s| (s.rank, s.variables.clone()))
            .collect();
        results.push(pool);
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(
        results[0],
        vec![(1, vec![3, 3]), (3, vec![1, 1]), (5, vec![2, 2])]
    );
}

#[test]
fn small_capacity_overflow_keeps_best_rank_only() {
    let repo = SharedSolutionRepository::new(3);
    for (i, rank) in [3, 3, 3, 3, 3, 5, 6].iter().enumerate() {
        repo.add(sol(*rank, vec![i as i64; 4], "s"));
    }
    repo.synchronize(None);
    let pool = repo.solutions();
    assert_eq!(pool.len(), 3);
    assert!(pool.iter().all(|s| s.rank == 3));
}

#[test]
fn large_capacity_overflow_truncates() {
    let repo = SharedSolutionRepository::new(12);
    for i in 0..20 {
        repo.add(sol(i, vec![i], "s"));
    }
    repo.synchronize(None);
    let pool = repo.solutions();
    assert_eq!(pool.len(), 12);
    assert_eq!(pool[0].rank, 0);
    assert_eq!(pool.last().unwrap().rank, 11);
}

#[test]
fn duplicates_collapse() {
    let repo = SharedSolutionRepository::new(5);
    repo.add(sol(2, vec![7, 7], "first"));
    repo.add(sol(2, vec![7, 7], "second"));
    repo.synchronize(None);
    assert_eq!(repo.len(), 1);
}

#[test]
fn pending_is_invisible_until_synchronize() {
    let repo = SharedSolutionRepository::new(3);
    repo.add(sol(1, vec![0], "s"));
    assert!(repo.is_empty());
    repo.synchronize(None);
    assert_eq!(repo.len(), 1);
}

#[test]
fn visitor_sees_every_pending_solution() {
    let repo = SharedSolutionRepository::new(3);
    repo.add(sol(1, vec![0], "a"));
    repo.add(sol(2, vec![1], "b"));
    let mut seen = Vec::new();
    repo.synchronize(Some(&mut |s: &Solution<i64>| seen.push(s.rank)));
    assert_eq!(seen, vec![1, 2]);
}

#[test]
fn diversity_selection_spreads_values() {
    // Five rank-0 solutions; two are near-clones of the first. A diverse
    // capacity-3 subset must not keep all three near-identical vectors.
    let repo = SharedSolutionRepository::new(3);
    repo.add(sol(0, vec![0, 0, 0, 0], "base"));
    repo.add(sol(0, vec![0, 0, 0, 1], "near1"));
    repo.add(sol(0, vec![0, 0, 1, 0], "near2"));
    repo.add(sol(0, vec![9, 9, 9, 9], "far1"));
    repo.add(sol(0, vec![5, 5, 5, 5], "far2"));
    repo.synchronize(None);
    let pool = repo.solutions();
    assert_eq!(pool.len(), 3);
    let far_kept = pool
        .iter()
        .filter(|s| s.variables == vec![9, 9, 9, 9] || s.variables == vec![5, 5, 5, 5])
        .count();
    assert_eq!(far_kept, 2);
}

#[test]
fn biased_selection_is_uniform_before_exploration_threshold() {
    let repo = SharedSolutionRepository::new(5);
    repo.add(sol(1, vec![0], "best"));
    repo.add(sol(2, vec![1], "worse"));
    repo.synchronize(None);
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut saw_worse = false;
    for _ in 0..50 {
        let s = repo.get_random_biased_solution(&mut rng).unwrap();
        if s.rank == 2 {
            saw_worse = true;
        }
    }
    assert!(saw_worse);
}

#[test]
fn biased_selection_narrows_to_least_selected_best_rank() {
    let repo = SharedSolutionRepository::new(5);
    repo.add(sol(1, vec![0], "best_a"));
    repo.add(sol(1, vec![1], "best_b"));
    repo.add(sol(2, vec![2], "worse"));
    repo.synchronize(None);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    // Push some solution past the exploration threshold.
    for _ in 0..(EXPLORATION_THRESHOLD as usize * 4) {
        repo.get_random_biased_solution(&mut rng).unwrap();
    }
    for _ in 0..20 {
        let s = repo.get_random_biased_solution(&mut rng).unwrap();
        assert_eq!(s.rank, 1);
    }
}

#[test]
fn empty_repository_yields_none() {
    let repo: SharedSolutionRepository<i64> = SharedSolutionRepository::new(3);
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    assert!(repo.get_random_biased_solution(&mut rng).is_none());
}
