//! Cross-worker exchange of proven domain tightenings.
//!
//! Workers report potential new bounds; the manager keeps only genuine
//! tightenings against the synchronized state, publishes them in batches on
//! `synchronize`, and delivers each published tightening to each registered
//! reader exactly once through a private cursor.

use std::sync::Mutex;

use carve_core::{ModelDocument, VarId};

use crate::helper::BoundChange;

struct BoundsState {
    /// Best bounds published so far, per variable.
    synced_lb: Vec<i64>,
    synced_ub: Vec<i64>,
    /// Tightenings accepted but not yet published.
    pending: Vec<BoundChange>,
    /// Published tightenings, in publication order; reader cursors index
    /// into this log.
    log: Vec<BoundChange>,
    cursors: Vec<usize>,
    /// Variable orbits of a symmetry reduction, when the model has one.
    orbit_of: Option<Vec<usize>>,
    orbits: Vec<Vec<VarId>>,
}

/// The shared bounds manager.
pub struct SharedBoundsManager {
    state: Mutex<BoundsState>,
}

impl SharedBoundsManager {
    pub fn new(model: &ModelDocument) -> Self {
        let n = model.num_variables();
        let mut synced_lb = Vec::with_capacity(n);
        let mut synced_ub = Vec::with_capacity(n);
        for v in model.variables() {
            synced_lb.push(v.domain().lb().unwrap_or(i64::MAX));
            synced_ub.push(v.domain().ub().unwrap_or(i64::MIN));
        }
        Self {
            state: Mutex::new(BoundsState {
                synced_lb,
                synced_ub,
                pending: Vec::new(),
                log: Vec::new(),
                cursors: Vec::new(),
                orbit_of: None,
                orbits: Vec::new(),
            }),
        }
    }

    /// Installs symmetry orbits: a tightening of one member now propagates
    /// to every variable in the same orbit.
    pub fn set_symmetry_orbits(&self, orbits: Vec<Vec<VarId>>) {
        let mut state = self.state.lock().unwrap();
        let n = state.synced_lb.len();
        let mut orbit_of = vec![usize::MAX; n];
        for (i, orbit) in orbits.iter().enumerate() {
            for v in orbit {
                orbit_of[v.0] = i;
            }
        }
        state.orbit_of = Some(orbit_of);
        state.orbits = orbits;
    }

    /// Registers a reader; the returned id sees every tightening still in
    /// the log. Entries already delivered to every registered reader are
    /// compacted away on `synchronize`, so register before the first
    /// synchronize to see the full history.
    pub fn register_new_id(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.cursors.push(0);
        state.cursors.len() - 1
    }

    /// Intersects `changes` with the current knowledge, keeping genuine
    /// tightenings only. Tightenings that would empty a domain are dropped;
    /// optionality semantics are decided by the full solve, not here.
    pub fn report_potential_new_bounds(&self, worker: &str, changes: &[BoundChange]) {
        let mut state = self.state.lock().unwrap();
        for change in changes {
            Self::accept_locked(&mut state, worker, *change);
        }
    }

    fn accept_locked(state: &mut BoundsState, worker: &str, change: BoundChange) {
        let v = change.var.0;
        let lb = change.new_lb.max(state.synced_lb[v]);
        let ub = change.new_ub.min(state.synced_ub[v]);
        if lb > ub {
            tracing::debug!(
                worker,
                var = v,
                "dropping bound tightening that empties a domain"
            );
            return;
        }
        if lb == state.synced_lb[v] && ub == state.synced_ub[v] {
            return;
        }
        state.synced_lb[v] = lb;
        state.synced_ub[v] = ub;
        state.pending.push(BoundChange {
            var: change.var,
            new_lb: lb,
            new_ub: ub,
        });
        // Propagate through the symmetry orbit, if any.
        if let Some(orbit_of) = &state.orbit_of {
            let orbit_idx = orbit_of[v];
            if orbit_idx != usize::MAX {
                let members = state.orbits[orbit_idx].clone();
                for member in members {
                    if member.0 == v {
                        continue;
                    }
                    let mlb = lb.max(state.synced_lb[member.0]);
                    let mub = ub.min(state.synced_ub[member.0]);
                    if mlb > mub || (mlb == state.synced_lb[member.0] && mub == state.synced_ub[member.0])
                    {
                        continue;
                    }
                    state.synced_lb[member.0] = mlb;
                    state.synced_ub[member.0] = mub;
                    state.pending.push(BoundChange {
                        var: member,
                        new_lb: mlb,
                        new_ub: mub,
                    });
                }
            }
        }
    }

    /// Publishes accepted tightenings into the delivery log, then compacts
    /// the log's fully delivered prefix.
    ///
    /// Pending entries are sorted by variable before publication so the log
    /// order does not depend on report interleaving.
    pub fn synchronize(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.pending.is_empty() {
            let pending = std::mem::take(&mut state.pending);
            // Publish one entry per touched variable carrying its final
            // bounds; intersection is commutative, so this is
            // interleaving-independent.
            let mut vars: Vec<VarId> = pending.iter().map(|c| c.var).collect();
            vars.sort_unstable();
            vars.dedup();
            for var in vars {
                let entry = BoundChange {
                    var,
                    new_lb: state.synced_lb[var.0],
                    new_ub: state.synced_ub[var.0],
                };
                state.log.push(entry);
            }
        }
        // Drop entries every registered reader has already consumed; the
        // log stays bounded by the slowest reader's lag.
        if let Some(&min) = state.cursors.iter().min() {
            if min > 0 {
                state.log.drain(..min);
                for cursor in &mut state.cursors {
                    *cursor -= min;
                }
            }
        }
    }

    /// Returns the published tightenings not yet delivered to `reader_id`,
    /// then advances the cursor: an immediate second call yields nothing.
    pub fn get_changed_bounds(&self, reader_id: usize) -> Vec<BoundChange> {
        let mut state = self.state.lock().unwrap();
        let cursor = state.cursors[reader_id];
        let out: Vec<BoundChange> = state.log[cursor..].to_vec();
        state.cursors[reader_id] = state.log.len();
        out
    }

    /// Current synchronized bounds of a variable.
    pub fn bounds(&self, var: VarId) -> (i64, i64) {
        let state = self.state.lock().unwrap();
        (state.synced_lb[var.0], state.synced_ub[var.0])
    }
}

#[cfg(test)]
mod tests;
