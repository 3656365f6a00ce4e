//! Direct feasibility evaluation of a full assignment.
//!
//! Every constraint kind can be checked against concrete values without
//! propagation: linear and clause constraints by evaluation, scheduling by
//! interval arithmetic and an event sweep, routing by degree and
//! connectivity checks. This powers the solution combiner, which patches
//! candidate solutions and needs a cheap accept/reject answer.

use std::collections::{HashMap, HashSet};

use crate::linear::LinearExpr;
use crate::model::{Arc, Assignment, Constraint, IntervalId, ModelDocument};

/// Returns true when `assignment` satisfies every variable domain and every
/// constraint of the model.
pub fn is_feasible(model: &ModelDocument, assignment: &Assignment) -> bool {
    if assignment.len() < model.num_variables() {
        return false;
    }
    for (idx, v) in model.variables().iter().enumerate() {
        if !v
            .domain()
            .contains(assignment.value(crate::model::VarId(idx)))
        {
            return false;
        }
    }
    model
        .constraints()
        .iter()
        .all(|c| constraint_holds(model, assignment, c))
}

fn constraint_holds(model: &ModelDocument, assignment: &Assignment, c: &Constraint) -> bool {
    match c {
        Constraint::Linear { expr, domain } => domain.contains(expr.value_in(assignment)),
        Constraint::BoolOr { literals } => literals.iter().any(|l| l.is_true_in(assignment)),
        Constraint::NoOverlap { intervals } => {
            no_overlap_holds(model, assignment, intervals)
        }
        Constraint::Cumulative {
            intervals,
            demands,
            capacity,
        } => cumulative_holds(model, assignment, intervals, demands, capacity),
        Constraint::NoOverlap2d {
            x_intervals,
            y_intervals,
        } => no_overlap_2d_holds(model, assignment, x_intervals, y_intervals),
        Constraint::Circuit { arcs } => circuit_holds(assignment, arcs),
        Constraint::Routes { arcs } => routes_hold(assignment, arcs),
    }
}

/// An interval is consistent when `start + size == end` and `size >= 0` at
/// the assignment; active intervals additionally participate in their
/// constraint's condition.
fn interval_consistent(model: &ModelDocument, assignment: &Assignment, id: IntervalId) -> bool {
    let interval = model.interval(id);
    let (s, z, e) = (
        interval.start.value_in(assignment),
        interval.size.value_in(assignment),
        interval.end.value_in(assignment),
    );
    z >= 0 && s + z == e
}

fn active_spans(
    model: &ModelDocument,
    assignment: &Assignment,
    intervals: &[IntervalId],
) -> Option<Vec<(i64, i64, usize)>> {
    let mut spans = Vec::new();
    for (idx, &id) in intervals.iter().enumerate() {
        let interval = model.interval(id);
        if !interval.is_active(assignment) {
            continue;
        }
        if !interval_consistent(model, assignment, id) {
            return None;
        }
        spans.push((
            interval.start.value_in(assignment),
            interval.end.value_in(assignment),
            idx,
        ));
    }
    Some(spans)
}

fn no_overlap_holds(
    model: &ModelDocument,
    assignment: &Assignment,
    intervals: &[IntervalId],
) -> bool {
    let Some(mut spans) = active_spans(model, assignment, intervals) else {
        return false;
    };
    spans.sort_unstable();
    spans
        .windows(2)
        .all(|w| w[0].1 <= w[1].0 || w[0].0 == w[0].1 || w[1].0 == w[1].1)
}

fn cumulative_holds(
    model: &ModelDocument,
    assignment: &Assignment,
    intervals: &[IntervalId],
    demands: &[LinearExpr],
    capacity: &LinearExpr,
) -> bool {
    let Some(spans) = active_spans(model, assignment, intervals) else {
        return false;
    };
    let cap = capacity.value_in(assignment);
    // Event sweep: +demand at start, -demand at end.
    let mut events: Vec<(i64, i64)> = Vec::with_capacity(spans.len() * 2);
    for (start, end, idx) in spans {
        if start == end {
            continue;
        }
        let demand = demands.get(idx).map(|d| d.value_in(assignment)).unwrap_or(0);
        if demand < 0 {
            return false;
        }
        events.push((start, demand));
        events.push((end, -demand));
    }
    events.sort_unstable();
    let mut load = 0i64;
    for (_, delta) in events {
        load += delta;
        if load > cap {
            return false;
        }
    }
    true
}

fn no_overlap_2d_holds(
    model: &ModelDocument,
    assignment: &Assignment,
    x_intervals: &[IntervalId],
    y_intervals: &[IntervalId],
) -> bool {
    let n = x_intervals.len().min(y_intervals.len());
    let mut boxes = Vec::new();
    for i in 0..n {
        let (x, y) = (model.interval(x_intervals[i]), model.interval(y_intervals[i]));
        if !x.is_active(assignment) || !y.is_active(assignment) {
            continue;
        }
        if !interval_consistent(model, assignment, x_intervals[i])
            || !interval_consistent(model, assignment, y_intervals[i])
        {
            return false;
        }
        boxes.push((
            x.start.value_in(assignment),
            x.end.value_in(assignment),
            y.start.value_in(assignment),
            y.end.value_in(assignment),
        ));
    }
    for i in 0..boxes.len() {
        for j in (i + 1)..boxes.len() {
            let (ax0, ax1, ay0, ay1) = boxes[i];
            let (bx0, bx1, by0, by1) = boxes[j];
            if ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1 {
                return false;
            }
        }
    }
    true
}

/// Selected non-loop arcs must form one cycle covering every node that does
/// not carry a selected self-loop.
fn circuit_holds(assignment: &Assignment, arcs: &[Arc]) -> bool {
    let mut nodes: HashSet<i64> = HashSet::new();
    let mut skipped: HashSet<i64> = HashSet::new();
    let mut successor: HashMap<i64, i64> = HashMap::new();
    let mut indegree: HashMap<i64, usize> = HashMap::new();
    for arc in arcs {
        nodes.insert(arc.tail);
        nodes.insert(arc.head);
        if !arc.literal.is_true_in(assignment) {
            continue;
        }
        if arc.tail == arc.head {
            skipped.insert(arc.tail);
            continue;
        }
        if successor.insert(arc.tail, arc.head).is_some() {
            return false;
        }
        *indegree.entry(arc.head).or_insert(0) += 1;
    }
    if indegree.values().any(|&d| d > 1) {
        return false;
    }
    let visited: Vec<i64> = nodes
        .iter()
        .copied()
        .filter(|n| !skipped.contains(n))
        .collect();
    if visited.is_empty() {
        return successor.is_empty();
    }
    // Walk the cycle from the smallest visited node.
    let start = *visited.iter().min().unwrap();
    let mut seen = 1usize;
    let mut node = start;
    loop {
        let Some(&next) = successor.get(&node) else {
            return false;
        };
        if next == start {
            break;
        }
        node = next;
        seen += 1;
        if seen > visited.len() {
            return false;
        }
    }
    seen == visited.len()
}

/// Every selected route leaves node 0 and returns to it; non-depot nodes
/// have matching in/out degree of at most one.
fn routes_hold(assignment: &Assignment, arcs: &[Arc]) -> bool {
    let mut successor: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut indegree: HashMap<i64, usize> = HashMap::new();
    for arc in arcs {
        if !arc.literal.is_true_in(assignment) || arc.tail == arc.head {
            continue;
        }
        successor.entry(arc.tail).or_default().push(arc.head);
        *indegree.entry(arc.head).or_insert(0) += 1;
    }
    for (node, succs) in &successor {
        if *node != 0 && succs.len() > 1 {
            return false;
        }
    }
    if indegree.iter().any(|(n, &d)| *n != 0 && d > 1) {
        return false;
    }
    // Each departure from the depot must close back at the depot.
    let departures = successor.get(&0).cloned().unwrap_or_default();
    let total_arcs: usize = successor.values().map(Vec::len).sum();
    let mut walked = 0usize;
    for first in departures {
        let mut node = first;
        walked += 1;
        while node != 0 {
            let Some(succs) = successor.get(&node) else {
                return false;
            };
            node = succs[0];
            walked += 1;
            if walked > total_arcs {
                return false;
            }
        }
    }
    // No selected arc may sit outside a depot-rooted route.
    walked == total_arcs
}

/// Objective value of a feasible assignment, `None` when the model has no
/// objective or the value escapes the objective domain.
pub fn objective_value(model: &ModelDocument, assignment: &Assignment) -> Option<i64> {
    let obj = model.objective()?;
    let value = obj.inner_value(assignment);
    if obj.domain.contains(value) {
        Some(value)
    } else {
        None
    }
}
