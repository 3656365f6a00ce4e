//! Cross-worker exchange of short learned clauses.
//!
//! Each worker funnels its learned clauses through a [`UniqueClauseStream`]
//! that deduplicates them (order-independent hash of the literal set),
//! filters by an adaptive length threshold, and emits bounded batches
//! shortest-first. The [`SharedClausesManager`] tags batches with the
//! exporting worker and a monotone batch id, and delivers them per consumer
//! with the same read-since-last-call cursor discipline as the bounds
//! manager.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;

use smallvec::SmallVec;

use carve_core::Literal;

/// A learned clause: a disjunction of literals.
pub type Clause = SmallVec<[Literal; 8]>;

/// Order-independent hash of a literal set: per-literal hashes are sorted,
/// deduplicated and hashed again, so permutations and repetitions of the
/// same clause collide by construction while distinct sets do not cancel.
fn clause_fingerprint(literals: &[Literal]) -> u64 {
    let mut hashes: Vec<u64> = literals
        .iter()
        .map(|lit| {
            let mut h = DefaultHasher::new();
            lit.hash(&mut h);
            h.finish()
        })
        .collect();
    hashes.sort_unstable();
    hashes.dedup();
    let mut h = DefaultHasher::new();
    hashes.hash(&mut h);
    h.finish()
}

/// Worker-local clause buffer with adaptive length acceptance.
pub struct UniqueClauseStream {
    /// Clauses accepted and awaiting export, grouped by length.
    by_length: Vec<Vec<Clause>>,
    fingerprints: HashSet<u64>,
    max_accepted_length: usize,
    length_ceiling: usize,
    batch_literal_budget: usize,
    dropped_since_last_batch: usize,
}

impl UniqueClauseStream {
    pub fn new(
        initial_max_length: usize,
        length_ceiling: usize,
        batch_literal_budget: usize,
    ) -> Self {
        let ceiling = length_ceiling.max(2);
        Self {
            by_length: vec![Vec::new(); ceiling + 1],
            fingerprints: HashSet::new(),
            max_accepted_length: initial_max_length.clamp(2, ceiling),
            length_ceiling: ceiling,
            batch_literal_budget: batch_literal_budget.max(2),
            dropped_since_last_batch: 0,
        }
    }

    /// Current acceptance threshold (clause length).
    pub fn max_accepted_length(&self) -> usize {
        self.max_accepted_length
    }

    /// Offers a clause; returns true when accepted into the stream.
    pub fn add(&mut self, literals: &[Literal]) -> bool {
        if literals.is_empty() || literals.len() > self.max_accepted_length {
            self.dropped_since_last_batch += 1;
            return false;
        }
        if !self.fingerprints.insert(clause_fingerprint(literals)) {
            return false;
        }
        self.by_length[literals.len()].push(Clause::from_slice(literals));
        true
    }

    /// Drains the next batch, shortest clauses first, within the literal
    /// budget; then adapts the acceptance threshold: up when the batch
    /// underfills, down when too many clauses were dropped.
    pub fn next_batch(&mut self) -> Vec<Clause> {
        let mut batch = Vec::new();
        let mut used = 0usize;
        'outer: for len in 1..=self.length_ceiling {
            while let Some(clause) = self.by_length[len].last() {
                if used + clause.len() > self.batch_literal_budget {
                    break 'outer;
                }
                used += clause.len();
                let clause = self.by_length[len].pop().unwrap();
                batch.push(clause);
            }
        }

        if used * 2 < self.batch_literal_budget {
            // Room to spare: accept longer clauses next round.
            self.max_accepted_length = (self.max_accepted_length + 1).min(self.length_ceiling);
        } else if self.dropped_since_last_batch > batch.len().max(1) * 4 {
            // Far more dropped than exported: tighten quality.
            self.max_accepted_length = (self.max_accepted_length - 1).max(2);
        }
        self.dropped_since_last_batch = 0;
        batch
    }
}

struct ClauseBatch {
    worker_id: usize,
    batch_id: u64,
    clauses: Vec<Clause>,
}

struct ClausesState {
    /// Batches handed in since the last synchronize.
    pending: Vec<ClauseBatch>,
    /// Published batches, in batch-id order.
    published: Vec<ClauseBatch>,
    next_batch_id: u64,
    /// Per-consumer index into `published`.
    cursors: Vec<usize>,
    /// Global fingerprint set so the same clause is published once.
    fingerprints: HashSet<u64>,
}

/// The shared clauses manager.
pub struct SharedClausesManager {
    state: Mutex<ClausesState>,
}

impl SharedClausesManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClausesState {
                pending: Vec::new(),
                published: Vec::new(),
                next_batch_id: 0,
                cursors: Vec::new(),
                fingerprints: HashSet::new(),
            }),
        }
    }

    /// Registers a consumer; a new id sees every batch still retained.
    /// Batches already delivered to every registered consumer are compacted
    /// away on `synchronize`, so register before the first synchronize to
    /// see the full history.
    pub fn register_new_id(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.cursors.push(0);
        state.cursors.len() - 1
    }

    /// Hands in a worker's exported batch. Fire and forget.
    pub fn add_batch(&self, worker_id: usize, clauses: Vec<Clause>) {
        if clauses.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.pending.push(ClauseBatch {
            worker_id,
            batch_id: 0, // assigned at synchronize
            clauses,
        });
    }

    /// Publishes pending batches with monotone ids.
    ///
    /// Pending batches are ordered by (worker, clause content) before ids
    /// are assigned, so the published sequence does not depend on arrival
    /// interleaving; duplicate clauses across workers are dropped here.
    pub fn synchronize(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.pending.is_empty() {
            let mut pending = std::mem::take(&mut state.pending);
            pending.sort_by(|a, b| {
                (a.worker_id, &a.clauses)
                    .cmp(&(b.worker_id, &b.clauses))
            });
            for mut batch in pending {
                batch
                    .clauses
                    .retain(|c| state.fingerprints.insert(clause_fingerprint(c)));
                if batch.clauses.is_empty() {
                    continue;
                }
                batch.batch_id = state.next_batch_id;
                state.next_batch_id += 1;
                state.published.push(batch);
            }
        }
        // Drop batches every registered consumer has already consumed; the
        // retained list stays bounded by the slowest consumer's lag.
        if let Some(&min) = state.cursors.iter().min() {
            if min > 0 {
                state.published.drain(..min);
                for cursor in &mut state.cursors {
                    *cursor -= min;
                }
            }
        }
    }

    /// Returns the clauses published since this consumer's last call,
    /// excluding its own exports, then advances the cursor.
    pub fn get_unseen_clauses(&self, reader_id: usize) -> Vec<Clause> {
        let mut state = self.state.lock().unwrap();
        let cursor = state.cursors[reader_id];
        let out: Vec<Clause> = state.published[cursor..]
            .iter()
            .filter(|b| b.worker_id != reader_id)
            .flat_map(|b| b.clauses.iter().cloned())
            .collect();
        state.cursors[reader_id] = state.published.len();
        out
    }

    /// Number of published batches (diagnostics).
    pub fn num_batches(&self) -> u64 {
        self.state.lock().unwrap().next_batch_id
    }
}

impl Default for SharedClausesManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
