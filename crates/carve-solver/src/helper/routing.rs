//! Path and rectangle extraction from routing and packing constraints.

use std::collections::HashMap;

use carve_core::{Arc, Assignment, Constraint, ConstraintId, IntervalId, ModelDocument};

/// One reconstructed route: the ordered arcs actually taken in a solution.
#[derive(Debug, Clone)]
pub struct RoutingPath {
    pub constraint: ConstraintId,
    pub arcs: Vec<Arc>,
}

/// One active rectangle of a 2-D no-overlap constraint, with its solution
/// coordinates.
#[derive(Debug, Clone, Copy)]
pub struct ActiveRectangle {
    pub constraint: ConstraintId,
    pub x_interval: IntervalId,
    pub y_interval: IntervalId,
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

/// Reconstructs each circuit/route of the model as an ordered arc list,
/// evaluated at `assignment`.
///
/// Circuits yield one path; routes yield one path per vehicle leaving the
/// depot (node 0). Arcs whose literal is false, and self-loops (skipped
/// nodes), are excluded.
pub fn routing_paths(model: &ModelDocument, assignment: &Assignment) -> Vec<RoutingPath> {
    let mut out = Vec::new();
    for (idx, c) in model.constraints().iter().enumerate() {
        let cid = ConstraintId(idx);
        let (arcs, is_routes) = match c {
            Constraint::Circuit { arcs } => (arcs, false),
            Constraint::Routes { arcs } => (arcs, true),
            _ => continue,
        };
        let mut successors: HashMap<i64, Vec<Arc>> = HashMap::new();
        for arc in arcs {
            if arc.tail != arc.head && arc.literal.is_true_in(assignment) {
                successors.entry(arc.tail).or_default().push(*arc);
            }
        }
        if is_routes {
            let depot_outgoing = successors.remove(&0).unwrap_or_default();
            for first in depot_outgoing {
                out.push(RoutingPath {
                    constraint: cid,
                    arcs: walk(first, &mut successors, 0),
                });
            }
        } else if let Some(&start) = successors.keys().min() {
            let first = successors.get_mut(&start).and_then(|v| v.pop());
            if let Some(first) = first {
                out.push(RoutingPath {
                    constraint: cid,
                    arcs: walk(first, &mut successors, start),
                });
            }
        }
    }
    out
}

fn walk(first: Arc, successors: &mut HashMap<i64, Vec<Arc>>, stop_at: i64) -> Vec<Arc> {
    let mut path = vec![first];
    let mut node = first.head;
    while node != stop_at {
        let next = match successors.get_mut(&node).and_then(|v| v.pop()) {
            Some(a) => a,
            // Broken chain in the candidate; return what we have.
            None => break,
        };
        node = next.head;
        path.push(next);
    }
    path
}

/// Collects every active interval pair of the 2-D no-overlap constraints as
/// a rectangle with its solution coordinates.
pub fn active_rectangles(model: &ModelDocument, assignment: &Assignment) -> Vec<ActiveRectangle> {
    let mut out = Vec::new();
    for (idx, c) in model.constraints().iter().enumerate() {
        let Constraint::NoOverlap2d {
            x_intervals,
            y_intervals,
        } = c
        else {
            continue;
        };
        for i in 0..x_intervals.len().min(y_intervals.len()) {
            let (xi, yi) = (x_intervals[i], y_intervals[i]);
            let (x, y) = (model.interval(xi), model.interval(yi));
            if !x.is_active(assignment) || !y.is_active(assignment) {
                continue;
            }
            out.push(ActiveRectangle {
                constraint: ConstraintId(idx),
                x_interval: xi,
                y_interval: yi,
                x_min: x.start.value_in(assignment),
                x_max: x.end.value_in(assignment),
                y_min: y.start.value_in(assignment),
                y_max: y.end.value_in(assignment),
            });
        }
    }
    out
}

impl ActiveRectangle {
    /// Center-to-center L1 distance, the metric packing generators use to
    /// pick "nearby" rectangles.
    pub fn center_distance(&self, other: &ActiveRectangle) -> i64 {
        let cx = self.x_min + self.x_max - (other.x_min + other.x_max);
        let cy = self.y_min + self.y_max - (other.y_min + other.y_max);
        // Coordinates are doubled centers; halve at the end.
        (cx.abs() + cy.abs()) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carve_core::{Domain, Literal, Variable};

    fn arc_model(arcs: Vec<(i64, i64)>, selected: &[bool], routes: bool) -> (ModelDocument, Assignment) {
        let mut m = ModelDocument::default();
        let mut built = Vec::new();
        for (i, (tail, head)) in arcs.iter().enumerate() {
            let v = m.add_variable(Variable::new(format!("arc{i}"), Domain::new(0, 1)));
            built.push(Arc {
                tail: *tail,
                head: *head,
                literal: Literal::pos(v),
            });
        }
        m.add_constraint(if routes {
            Constraint::Routes { arcs: built }
        } else {
            Constraint::Circuit { arcs: built }
        });
        let values = selected.iter().map(|&b| i64::from(b)).collect();
        (m, Assignment::from_values(values))
    }

    #[test]
    fn circuit_reconstructs_in_order() {
        let (m, sol) = arc_model(
            vec![(0, 1), (1, 2), (2, 0), (0, 2)],
            &[true, true, true, false],
            false,
        );
        let paths = routing_paths(&m, &sol);
        assert_eq!(paths.len(), 1);
        let nodes: Vec<i64> = paths[0].arcs.iter().map(|a| a.head).collect();
        assert_eq!(nodes, vec![1, 2, 0]);
    }

    #[test]
    fn routes_split_per_vehicle() {
        let (m, sol) = arc_model(
            vec![(0, 1), (1, 0), (0, 2), (2, 0)],
            &[true, true, true, true],
            true,
        );
        let paths = routing_paths(&m, &sol);
        assert_eq!(paths.len(), 2);
        for p in &paths {
            assert_eq!(p.arcs.last().unwrap().head, 0);
        }
    }

    #[test]
    fn false_literals_are_ignored() {
        let (m, sol) = arc_model(vec![(0, 1), (1, 0)], &[false, false], false);
        assert!(routing_paths(&m, &sol).is_empty());
    }

    #[test]
    fn rectangle_centers() {
        let a = ActiveRectangle {
            constraint: ConstraintId(0),
            x_interval: IntervalId(0),
            y_interval: IntervalId(1),
            x_min: 0,
            x_max: 4,
            y_min: 0,
            y_max: 2,
        };
        let b = ActiveRectangle {
            x_min: 10,
            x_max: 14,
            ..a
        };
        assert_eq!(a.center_distance(&b), 10);
    }
}
