//! Tests for the clause stream and shared clauses manager.

use carve_core::{Literal, VarId};

use super::*;

fn lits(ids: &[i64]) -> Vec<Literal> {
    ids.iter()
        .map(|&i| {
            if i >= 0 {
                Literal::pos(VarId(i as usize))
            } else {
                Literal::neg(VarId((-i) as usize))
            }
        })
        .collect()
}

fn clause(ids: &[i64]) -> Clause {
    Clause::from_vec(lits(ids))
}

#[test]
fn fingerprint_is_order_independent() {
    assert_eq!(
        clause_fingerprint(&lits(&[1, -2, 3])),
        clause_fingerprint(&lits(&[3, 1, -2]))
    );
    assert_ne!(
        clause_fingerprint(&lits(&[1, 2])),
        clause_fingerprint(&lits(&[1, -2]))
    );
}

#[test]
fn repeated_literals_do_not_cancel_out() {
    // [a, a, b] denotes the set {a, b}: equal to it, distinct from [b].
    assert_eq!(
        clause_fingerprint(&lits(&[1, 1, 2])),
        clause_fingerprint(&lits(&[2, 1]))
    );
    assert_ne!(
        clause_fingerprint(&lits(&[1, 1, 2])),
        clause_fingerprint(&lits(&[2]))
    );
}

#[test]
fn stream_rejects_duplicates_and_long_clauses() {
    let mut stream = UniqueClauseStream::new(3, 16, 64);
    assert!(stream.add(&lits(&[1, 2])));
    assert!(!stream.add(&lits(&[2, 1]))); // permutation duplicate
    assert!(!stream.add(&lits(&[1, 2, 3, 4]))); // over threshold
}

#[test]
fn batches_are_shortest_first_within_budget() {
    let mut stream = UniqueClauseStream::new(8, 16, 5);
    stream.add(&lits(&[1, 2, 3]));
    stream.add(&lits(&[4, 5]));
    stream.add(&lits(&[6, 7]));
    let batch = stream.next_batch();
    // Budget 5: both binary clauses fit, the ternary does not.
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|c| c.len() == 2));
    // The ternary clause is still queued for the next batch.
    assert_eq!(stream.next_batch().len(), 1);
}

#[test]
fn underfull_batch_raises_the_threshold() {
    let mut stream = UniqueClauseStream::new(2, 16, 100);
    stream.add(&lits(&[1, 2]));
    let before = stream.max_accepted_length();
    stream.next_batch();
    assert!(stream.max_accepted_length() > before);
}

#[test]
fn heavy_dropping_lowers_the_threshold() {
    let mut stream = UniqueClauseStream::new(4, 16, 8);
    // Fill the budget with short clauses, then drop many long ones.
    stream.add(&lits(&[1, 2]));
    stream.add(&lits(&[3, 4]));
    stream.add(&lits(&[5, 6]));
    stream.add(&lits(&[7, 8]));
    for i in 0..40 {
        stream.add(&lits(&[i, i + 1, i + 2, i + 3, i + 4]));
    }
    let before = stream.max_accepted_length();
    stream.next_batch();
    assert!(stream.max_accepted_length() < before);
}

#[test]
fn manager_cursors_are_idempotent() {
    let mgr = SharedClausesManager::new();
    let a = mgr.register_new_id();
    let b = mgr.register_new_id();
    mgr.add_batch(b, vec![clause(&[1, 2])]);
    mgr.synchronize();
    assert_eq!(mgr.get_unseen_clauses(a).len(), 1);
    assert!(mgr.get_unseen_clauses(a).is_empty());
    // Exporters never see their own clauses.
    assert!(mgr.get_unseen_clauses(b).is_empty());
}

#[test]
fn unsynchronized_batches_are_invisible() {
    let mgr = SharedClausesManager::new();
    let a = mgr.register_new_id();
    mgr.add_batch(1, vec![clause(&[1, 2])]);
    assert!(mgr.get_unseen_clauses(a).is_empty());
    mgr.synchronize();
    assert_eq!(mgr.get_unseen_clauses(a).len(), 1);
}

#[test]
fn duplicate_clauses_across_workers_publish_once() {
    let mgr = SharedClausesManager::new();
    let a = mgr.register_new_id();
    mgr.add_batch(1, vec![clause(&[1, 2])]);
    mgr.add_batch(2, vec![clause(&[2, 1])]);
    mgr.synchronize();
    assert_eq!(mgr.get_unseen_clauses(a).len(), 1);
}

#[test]
fn publication_order_is_arrival_independent() {
    let run = |first: usize, second: usize| {
        let mgr = SharedClausesManager::new();
        let a = mgr.register_new_id();
        mgr.add_batch(first, vec![clause(&[first as i64 + 10])]);
        mgr.add_batch(second, vec![clause(&[second as i64 + 10])]);
        mgr.synchronize();
        mgr.get_unseen_clauses(a)
    };
    assert_eq!(run(1, 2), run(2, 1));
}

#[test]
fn fully_delivered_batches_are_compacted() {
    let mgr = SharedClausesManager::new();
    let a = mgr.register_new_id();
    mgr.add_batch(1, vec![clause(&[1, 2])]);
    mgr.synchronize();
    assert_eq!(mgr.get_unseen_clauses(a).len(), 1);
    mgr.synchronize();
    assert!(mgr.state.lock().unwrap().published.is_empty());
    // Later batches still reach the consumer.
    mgr.add_batch(1, vec![clause(&[3, 4])]);
    mgr.synchronize();
    assert_eq!(mgr.get_unseen_clauses(a).len(), 1);
}

#[test]
fn late_consumer_sees_history() {
    let mgr = SharedClausesManager::new();
    mgr.add_batch(1, vec![clause(&[1, 2]), clause(&[3, 4])]);
    mgr.synchronize();
    let late = mgr.register_new_id();
    assert_eq!(mgr.get_unseen_clauses(late).len(), 2);
}
