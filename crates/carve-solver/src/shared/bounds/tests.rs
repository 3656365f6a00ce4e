//! Tests for the shared bounds manager.

use carve_core::VarId;

use super::*;
use crate::test_utils::sum_model;

fn change(var: usize, lb: i64, ub: i64) -> BoundChange {
    BoundChange {
        var: VarId(var),
        new_lb: lb,
        new_ub: ub,
    }
}

#[test]
fn only_genuine_tightenings_are_kept() {
    let mgr = SharedBoundsManager::new(&sum_model(2, 0, 10));
    let id = mgr.register_new_id();
    mgr.report_potential_new_bounds("w0", &[change(0, 2, 8)]);
    // Looser than what is already known: ignored.
    mgr.report_potential_new_bounds("w1", &[change(0, 1, 9)]);
    mgr.synchronize();
    let delivered = mgr.get_changed_bounds(id);
    assert_eq!(delivered, vec![change(0, 2, 8)]);
}

#[test]
fn cursors_are_idempotent() {
    let mgr = SharedBoundsManager::new(&sum_model(2, 0, 10));
    let a = mgr.register_new_id();
    let b = mgr.register_new_id();
    mgr.report_potential_new_bounds("w0", &[change(0, 3, 7)]);
    mgr.synchronize();
    assert_eq!(mgr.get_changed_bounds(a).len(), 1);
    assert!(mgr.get_changed_bounds(a).is_empty());
    // Reader b still sees the tightening exactly once.
    assert_eq!(mgr.get_changed_bounds(b).len(), 1);
    assert!(mgr.get_changed_bounds(b).is_empty());
}

#[test]
fn late_registration_sees_the_full_history() {
    let mgr = SharedBoundsManager::new(&sum_model(1, 0, 10));
    mgr.report_potential_new_bounds("w0", &[change(0, 1, 9)]);
    mgr.synchronize();
    let late = mgr.register_new_id();
    assert_eq!(mgr.get_changed_bounds(late), vec![change(0, 1, 9)]);
}

#[test]
fn repeated_tightenings_collapse_to_final_bounds_per_batch() {
    let mgr = SharedBoundsManager::new(&sum_model(1, 0, 10));
    let id = mgr.register_new_id();
    mgr.report_potential_new_bounds("w0", &[change(0, 2, 9)]);
    mgr.report_potential_new_bounds("w1", &[change(0, 4, 8)]);
    mgr.synchronize();
    assert_eq!(mgr.get_changed_bounds(id), vec![change(0, 4, 8)]);
}

#[test]
fn emptying_tightening_is_dropped() {
    let mgr = SharedBoundsManager::new(&sum_model(1, 0, 10));
    let id = mgr.register_new_id();
    mgr.report_potential_new_bounds("w0", &[change(0, 8, 3)]);
    mgr.synchronize();
    assert!(mgr.get_changed_bounds(id).is_empty());
    assert_eq!(mgr.bounds(VarId(0)), (0, 10));
}

#[test]
fn unsynchronized_reports_are_not_delivered() {
    let mgr = SharedBoundsManager::new(&sum_model(1, 0, 10));
    let id = mgr.register_new_id();
    mgr.report_potential_new_bounds("w0", &[change(0, 1, 9)]);
    assert!(mgr.get_changed_bounds(id).is_empty());
    mgr.synchronize();
    assert_eq!(mgr.get_changed_bounds(id).len(), 1);
}

#[test]
fn fully_delivered_entries_are_compacted() {
    let mgr = SharedBoundsManager::new(&sum_model(2, 0, 10));
    let a = mgr.register_new_id();
    let b = mgr.register_new_id();
    mgr.report_potential_new_bounds("w0", &[change(0, 1, 9)]);
    mgr.synchronize();
    mgr.get_changed_bounds(a);
    mgr.get_changed_bounds(b);
    mgr.synchronize();
    assert!(mgr.state.lock().unwrap().log.is_empty());
    // Later tightenings still reach both readers exactly once.
    mgr.report_potential_new_bounds("w0", &[change(1, 2, 8)]);
    mgr.synchronize();
    assert_eq!(mgr.get_changed_bounds(a), vec![change(1, 2, 8)]);
    assert_eq!(mgr.get_changed_bounds(b), vec![change(1, 2, 8)]);
}

#[test]
fn slow_reader_keeps_undelivered_entries_alive() {
    let mgr = SharedBoundsManager::new(&sum_model(1, 0, 10));
    let fast = mgr.register_new_id();
    let slow = mgr.register_new_id();
    mgr.report_potential_new_bounds("w0", &[change(0, 1, 9)]);
    mgr.synchronize();
    mgr.get_changed_bounds(fast);
    mgr.synchronize();
    assert_eq!(mgr.get_changed_bounds(slow), vec![change(0, 1, 9)]);
}

#[test]
fn symmetry_orbit_propagates_tightenings() {
    let mgr = SharedBoundsManager::new(&sum_model(3, 0, 10));
    mgr.set_symmetry_orbits(vec![vec![VarId(0), VarId(1)]]);
    let id = mgr.register_new_id();
    mgr.report_potential_new_bounds("w0", &[change(0, 3, 6)]);
    mgr.synchronize();
    let delivered = mgr.get_changed_bounds(id);
    assert_eq!(delivered, vec![change(0, 3, 6), change(1, 3, 6)]);
    // The variable outside the orbit is untouched.
    assert_eq!(mgr.bounds(VarId(2)), (0, 10));
}
