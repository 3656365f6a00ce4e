//! Integer domains as ordered sets of disjoint closed intervals.
//!
//! A [`Domain`] is the set of values a variable may still take. Domains are
//! normalized on construction: intervals are sorted, disjoint and
//! non-adjacent, so structural equality is value equality.
//!
//! # Example
//!
//! ```
//! use carve_core::Domain;
//!
//! let d = Domain::from_intervals(vec![(0, 3), (7, 9)]);
//! assert!(d.contains(2));
//! assert!(!d.contains(5));
//! assert_eq!(d.closest_value(5), Some(3));
//! assert_eq!(d.size(), 7);
//! ```

use serde::{Deserialize, Serialize};

/// A closed integer interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClosedInterval {
    pub lo: i64,
    pub hi: i64,
}

/// An integer domain: a normalized list of disjoint closed intervals.
///
/// The empty domain is representable; it signals infeasibility of whatever
/// produced it, which callers decide how to treat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    intervals: Vec<ClosedInterval>,
}

impl Domain {
    /// Creates the domain `[lo, hi]`. Empty if `lo > hi`.
    pub fn new(lo: i64, hi: i64) -> Self {
        if lo > hi {
            Self::empty()
        } else {
            Self {
                intervals: vec![ClosedInterval { lo, hi }],
            }
        }
    }

    /// Creates the empty domain.
    pub fn empty() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    /// Creates the domain spanning every representable value.
    pub fn all() -> Self {
        Self::new(i64::MIN, i64::MAX)
    }

    /// Creates the domain containing exactly `value`.
    pub fn singleton(value: i64) -> Self {
        Self::new(value, value)
    }

    /// Creates a domain from arbitrary `(lo, hi)` pairs, normalizing them.
    ///
    /// Pairs with `lo > hi` are ignored; overlapping or adjacent intervals
    /// are merged.
    pub fn from_intervals(pairs: Vec<(i64, i64)>) -> Self {
        let mut pairs: Vec<(i64, i64)> = pairs.into_iter().filter(|(lo, hi)| lo <= hi).collect();
        pairs.sort_unstable();
        let mut intervals: Vec<ClosedInterval> = Vec::with_capacity(pairs.len());
        for (lo, hi) in pairs {
            match intervals.last_mut() {
                Some(last) if lo <= last.hi.saturating_add(1) => {
                    last.hi = last.hi.max(hi);
                }
                _ => intervals.push(ClosedInterval { lo, hi }),
            }
        }
        Self { intervals }
    }

    /// Returns the normalized intervals.
    pub fn intervals(&self) -> &[ClosedInterval] {
        &self.intervals
    }

    /// Returns true if no value is left.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Returns true if exactly one value is left.
    pub fn is_fixed(&self) -> bool {
        self.intervals.len() == 1 && self.intervals[0].lo == self.intervals[0].hi
    }

    /// Returns the single value of a fixed domain.
    pub fn fixed_value(&self) -> Option<i64> {
        if self.is_fixed() {
            Some(self.intervals[0].lo)
        } else {
            None
        }
    }

    /// Returns the smallest value, if any.
    pub fn lb(&self) -> Option<i64> {
        self.intervals.first().map(|i| i.lo)
    }

    /// Returns the largest value, if any.
    pub fn ub(&self) -> Option<i64> {
        self.intervals.last().map(|i| i.hi)
    }

    /// Returns the number of values in the domain (saturating).
    pub fn size(&self) -> u64 {
        self.intervals
            .iter()
            .fold(0u64, |acc, i| {
                acc.saturating_add(i.hi.abs_diff(i.lo).saturating_add(1))
            })
    }

    /// Returns true if `value` is in the domain.
    pub fn contains(&self, value: i64) -> bool {
        self.intervals
            .binary_search_by(|i| {
                if value < i.lo {
                    std::cmp::Ordering::Greater
                } else if value > i.hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Returns the in-domain value closest to `value`.
    ///
    /// Ties (equidistant candidates on both sides) resolve to the lower
    /// value. Returns `None` on an empty domain.
    pub fn closest_value(&self, value: i64) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        if self.contains(value) {
            return Some(value);
        }
        let mut best: Option<i64> = None;
        for i in &self.intervals {
            for candidate in [i.lo, i.hi] {
                let dist = candidate.abs_diff(value);
                match best {
                    None => best = Some(candidate),
                    Some(b) => {
                        let best_dist = b.abs_diff(value);
                        if dist < best_dist || (dist == best_dist && candidate < b) {
                            best = Some(candidate);
                        }
                    }
                }
            }
        }
        best
    }

    /// Intersects with another domain.
    pub fn intersect(&self, other: &Domain) -> Domain {
        let mut out = Vec::new();
        let (mut a, mut b) = (0usize, 0usize);
        while a < self.intervals.len() && b < other.intervals.len() {
            let x = self.intervals[a];
            let y = other.intervals[b];
            let lo = x.lo.max(y.lo);
            let hi = x.hi.min(y.hi);
            if lo <= hi {
                out.push((lo, hi));
            }
            if x.hi < y.hi {
                a += 1;
            } else {
                b += 1;
            }
        }
        Domain::from_intervals(out)
    }

    /// Intersects with the bound interval `[lo, hi]`.
    pub fn intersect_bounds(&self, lo: i64, hi: i64) -> Domain {
        self.intersect(&Domain::new(lo, hi))
    }

    /// Unions with another domain.
    pub fn union_with(&self, other: &Domain) -> Domain {
        let mut pairs: Vec<(i64, i64)> = self.intervals.iter().map(|i| (i.lo, i.hi)).collect();
        pairs.extend(other.intervals.iter().map(|i| (i.lo, i.hi)));
        Domain::from_intervals(pairs)
    }

    /// Iterates over every value. Intended for small domains (tests, clause
    /// expansion); unbounded domains should never reach this.
    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        self.intervals.iter().flat_map(|i| i.lo..=i.hi)
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::new(0, 1)
    }
}
