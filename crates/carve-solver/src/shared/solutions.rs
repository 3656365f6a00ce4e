//! Deduplicated, diversity-aware bounded pool of ranked solutions.
//!
//! Additions land in a pending buffer (O(1), never blocks on ranking) and
//! become visible only on [`SharedSolutionRepository::synchronize`], which
//! merges by sorting on (rank, value vector) so the outcome does not depend
//! on arrival order.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use rand::seq::IndexedRandom;
use rand::RngCore;

/// How often a solution may be drawn before selection narrows to the
/// least-selected best-rank candidates.
const EXPLORATION_THRESHOLD: u64 = 100;

/// Pool sizes below this use rank-restriction plus diversity selection
/// instead of plain truncation.
const SMALL_CAPACITY: usize = 10;

/// An immutable, shared, ranked candidate solution.
///
/// Lower rank is better; for satisfaction-only problems the rank is
/// constant. The "times selected" counter lives in the repository, not
/// here, so the record itself stays immutable and freely shareable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution<V> {
    pub rank: V,
    pub variables: Vec<i64>,
    pub source_info: String,
}

#[derive(Debug)]
struct PoolEntry<V> {
    solution: Arc<Solution<V>>,
    num_selected: u64,
}

#[derive(Debug)]
struct State<V> {
    pending: Vec<Arc<Solution<V>>>,
    pool: Vec<PoolEntry<V>>,
}

/// The shared pool. Generic over the rank scalar.
#[derive(Debug)]
pub struct SharedSolutionRepository<V> {
    capacity: usize,
    state: Mutex<State<V>>,
}

impl<V: Copy + Ord + Debug> SharedSolutionRepository<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State {
                pending: Vec::new(),
                pool: Vec::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends to the pending buffer. Visible only after `synchronize`.
    pub fn add(&self, solution: Solution<V>) -> Arc<Solution<V>> {
        let arc = Arc::new(solution);
        self.state.lock().unwrap().pending.push(arc.clone());
        arc
    }

    /// Number of visible solutions.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best visible rank, if any.
    pub fn best_rank(&self) -> Option<V> {
        let state = self.state.lock().unwrap();
        state.pool.first().map(|e| e.solution.rank)
    }

    /// Clones out the visible solutions (used by the combiner, which must
    /// not compute under the repository lock).
    pub fn solutions(&self) -> Vec<Arc<Solution<V>>> {
        let state = self.state.lock().unwrap();
        state.pool.iter().map(|e| e.solution.clone()).collect()
    }

    /// Merges pending solutions into the visible pool.
    ///
    /// The merge stable-sorts by (rank, value vector) and deduplicates, so
    /// the result is independent of arrival interleaving. When the merged
    /// pool overflows a small capacity, it is first restricted to the best
    /// rank and then a diversity-maximizing subset is kept; large pools are
    /// simply truncated.
    pub fn synchronize(&self, mut visitor: Option<&mut dyn FnMut(&Solution<V>)>) {
        let mut state = self.state.lock().unwrap();
        if state.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut state.pending);
        if let Some(v) = visitor.as_mut() {
            for s in &pending {
                v(s);
            }
        }

        let mut merged: Vec<PoolEntry<V>> = std::mem::take(&mut state.pool);
        merged.extend(pending.into_iter().map(|solution| PoolEntry {
            solution,
            num_selected: 0,
        }));
        merged.sort_by(|a, b| {
            (a.solution.rank, &a.solution.variables).cmp(&(b.solution.rank, &b.solution.variables))
        });
        merged.dedup_by(|a, b| {
            if a.solution.rank == b.solution.rank && a.solution.variables == b.solution.variables {
                // Keep the earlier entry's selection count.
                b.num_selected = b.num_selected.max(a.num_selected);
                true
            } else {
                false
            }
        });

        if merged.len() > self.capacity {
            if self.capacity < SMALL_CAPACITY {
                let best = merged[0].solution.rank;
                merged.retain(|e| e.solution.rank == best);
                if merged.len() > self.capacity {
                    merged = diverse_subset(merged, self.capacity);
                }
            }
            merged.truncate(self.capacity);
        }
        state.pool = merged;
    }

    /// Draws a solution for the next neighborhood base.
    ///
    /// Once some solution has been drawn beyond the exploration threshold,
    /// the draw narrows to the least-selected best-rank solutions;
    /// otherwise it is uniform over the whole pool.
    pub fn get_random_biased_solution(&self, rng: &mut dyn RngCore) -> Option<Arc<Solution<V>>> {
        let mut state = self.state.lock().unwrap();
        if state.pool.is_empty() {
            return None;
        }
        let explored = state
            .pool
            .iter()
            .any(|e| e.num_selected >= EXPLORATION_THRESHOLD);
        let index = if explored {
            let best = state.pool[0].solution.rank;
            let min_selected = state
                .pool
                .iter()
                .filter(|e| e.solution.rank == best)
                .map(|e| e.num_selected)
                .min()
                .unwrap_or(0);
            let candidates: Vec<usize> = state
                .pool
                .iter()
                .enumerate()
                .filter(|(_, e)| e.solution.rank == best && e.num_selected == min_selected)
                .map(|(i, _)| i)
                .collect();
            *candidates.choose(rng).unwrap()
        } else {
            let all: Vec<usize> = (0..state.pool.len()).collect();
            *all.choose(rng).unwrap()
        };
        state.pool[index].num_selected += 1;
        Some(state.pool[index].solution.clone())
    }
}

/// Greedy max-dispersion subset: repeatedly add the candidate with the
/// largest summed Hamming distance to the chosen set, starting from a
/// never-selected candidate when one exists. Input is already sorted, so
/// ties resolve deterministically to the earlier entry.
fn diverse_subset<V: Copy + Ord + Debug>(
    candidates: Vec<PoolEntry<V>>,
    capacity: usize,
) -> Vec<PoolEntry<V>> {
    let n = candidates.len();
    let mut chosen: Vec<usize> = Vec::with_capacity(capacity);
    // Seed: first never-selected candidate, else the first entry.
    let seed = candidates
        .iter()
        .position(|e| e.num_selected == 0)
        .unwrap_or(0);
    chosen.push(seed);

    while chosen.len() < capacity {
        let mut best: Option<(u64, usize)> = None;
        for i in 0..n {
            if chosen.contains(&i) {
                continue;
            }
            let total: u64 = chosen
                .iter()
                .map(|&j| hamming(&candidates[i].solution.variables, &candidates[j].solution.variables))
                .sum();
            match best {
                Some((b, _)) if total <= b => {}
                _ => best = Some((total, i)),
            }
        }
        match best {
            Some((_, i)) => chosen.push(i),
            None => break,
        }
    }
    chosen.sort_unstable();
    let mut out = Vec::with_capacity(chosen.len());
    let mut iter = candidates.into_iter().enumerate();
    for target in chosen {
        for (i, e) in iter.by_ref() {
            if i == target {
                out.push(e);
                break;
            }
        }
    }
    out
}

fn hamming(a: &[i64], b: &[i64]) -> u64 {
    a.iter().zip(b).filter(|(x, y)| x != y).count() as u64
}

#[cfg(test)]
mod tests;
