//! Precedence extraction from scheduling constraints.
//!
//! Given a candidate solution, derives strict orderings between interval
//! pairs that provably cannot overlap: directly for no-overlap constraints,
//! per-axis for 2-D no-overlap, and through a demand-splitting
//! divide-and-conquer over the capacity for cumulative constraints.

use carve_core::{Assignment, Constraint, IntervalId, ModelDocument};

/// A derived strict ordering: `before` must end no later than `after`
/// starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Precedence {
    pub before: IntervalId,
    pub after: IntervalId,
}

#[derive(Debug, Clone, Copy)]
struct Task {
    id: IntervalId,
    start: i64,
    end: i64,
    demand: i64,
}

/// Extracts precedences from every scheduling constraint of the model,
/// evaluated at `assignment`.
///
/// `max_pairs` bounds the output; extraction stops early once reached
/// (resource-exhaustion policy: best partial result, never unbounded work).
pub fn scheduling_precedences(
    model: &ModelDocument,
    assignment: &Assignment,
    max_pairs: usize,
) -> Vec<Precedence> {
    let mut out = Vec::new();
    for c in model.constraints() {
        if out.len() >= max_pairs {
            break;
        }
        match c {
            Constraint::NoOverlap { intervals } => {
                let tasks = active_tasks(model, assignment, intervals, None);
                chain_precedences(&tasks, &mut out, max_pairs);
            }
            Constraint::Cumulative {
                intervals,
                demands,
                capacity,
            } => {
                let cap = capacity.value_in(assignment);
                let tasks = active_tasks(model, assignment, intervals, Some((demands, assignment)));
                split_by_demand(&tasks, cap, &mut out, max_pairs);
            }
            Constraint::NoOverlap2d {
                x_intervals,
                y_intervals,
            } => {
                two_dim_precedences(model, assignment, x_intervals, y_intervals, &mut out, max_pairs);
            }
            _ => {}
        }
    }
    out.sort_unstable_by_key(|p| (p.before, p.after));
    out.dedup();
    out
}

fn active_tasks(
    model: &ModelDocument,
    assignment: &Assignment,
    intervals: &[IntervalId],
    demands: Option<(&[carve_core::LinearExpr], &Assignment)>,
) -> Vec<Task> {
    intervals
        .iter()
        .enumerate()
        .filter_map(|(idx, &id)| {
            let interval = model.interval(id);
            if !interval.is_active(assignment) {
                return None;
            }
            let demand = match demands {
                Some((exprs, a)) => exprs.get(idx).map(|e| e.value_in(a)).unwrap_or(0),
                None => 1,
            };
            Some(Task {
                id,
                start: interval.start.value_in(assignment),
                end: interval.end.value_in(assignment),
                demand,
            })
        })
        .collect()
}

/// Emits the chain of precedences of a disjunctive group: sort by start and
/// link each task to its successor when they do not overlap in the
/// solution. Transitivity makes the chain equivalent to the full ordering.
fn chain_precedences(tasks: &[Task], out: &mut Vec<Precedence>, max_pairs: usize) {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_unstable_by_key(|t| (t.start, t.end, t.id));
    for w in sorted.windows(2) {
        if out.len() >= max_pairs {
            return;
        }
        if w[0].end <= w[1].start {
            out.push(Precedence {
                before: w[0].id,
                after: w[1].id,
            });
        }
    }
}

/// Demand-splitting divide-and-conquer over a cumulative capacity.
///
/// Two tasks whose demands together exceed the capacity can never overlap,
/// so tasks heavier than half the capacity form a disjunctive group. The
/// remaining tasks are recursed on with half the capacity, which surfaces
/// disjunctive groups at every demand scale.
fn split_by_demand(tasks: &[Task], capacity: i64, out: &mut Vec<Precedence>, max_pairs: usize) {
    if tasks.len() < 2 || capacity <= 0 || out.len() >= max_pairs {
        return;
    }
    let (heavy, light): (Vec<Task>, Vec<Task>) =
        tasks.iter().partition(|t| 2 * t.demand > capacity);
    chain_precedences(&heavy, out, max_pairs);
    split_by_demand(&light, capacity / 2, out, max_pairs);
}

/// For each active rectangle pair overlapping on one axis in the solution,
/// the other axis carries the separation; emit that ordering.
fn two_dim_precedences(
    model: &ModelDocument,
    assignment: &Assignment,
    x_intervals: &[IntervalId],
    y_intervals: &[IntervalId],
    out: &mut Vec<Precedence>,
    max_pairs: usize,
) {
    let n = x_intervals.len().min(y_intervals.len());
    let boxes: Vec<(IntervalId, IntervalId, i64, i64, i64, i64)> = (0..n)
        .filter_map(|i| {
            let (xi, yi) = (x_intervals[i], y_intervals[i]);
            let (x, y) = (model.interval(xi), model.interval(yi));
            if !x.is_active(assignment) || !y.is_active(assignment) {
                return None;
            }
            Some((
                xi,
                yi,
                x.start.value_in(assignment),
                x.end.value_in(assignment),
                y.start.value_in(assignment),
                y.end.value_in(assignment),
            ))
        })
        .collect();
    for i in 0..boxes.len() {
        for j in (i + 1)..boxes.len() {
            if out.len() >= max_pairs {
                return;
            }
            let (axi, ayi, ax0, ax1, ay0, ay1) = boxes[i];
            let (bxi, byi, bx0, bx1, by0, by1) = boxes[j];
            let x_overlap = ax0 < bx1 && bx0 < ax1;
            let y_overlap = ay0 < by1 && by0 < ay1;
            if x_overlap && !y_overlap {
                let (before, after) = if ay1 <= by0 { (ayi, byi) } else { (byi, ayi) };
                out.push(Precedence { before, after });
            } else if y_overlap && !x_overlap {
                let (before, after) = if ax1 <= bx0 { (axi, bxi) } else { (bxi, axi) };
                out.push(Precedence { before, after });
            }
        }
    }
}
