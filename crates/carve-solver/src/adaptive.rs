//! Self-tuning scalar parameter in `[0, 1]`.
//!
//! An [`AdaptiveParameter`] nudges itself up on "increase" events and down
//! on "decrease" events with a step that shrinks as observations accumulate,
//! converging toward the value at which both events are equally likely. It
//! tunes neighborhood difficulty and clause-acceptance thresholds.

/// A scalar control loop in `[0, 1]` with a shrinking step.
///
/// # Example
///
/// ```
/// use carve_solver::AdaptiveParameter;
///
/// let mut p = AdaptiveParameter::new(0.5);
/// p.increase();
/// assert!(p.value() > 0.5);
/// p.decrease();
/// p.decrease();
/// assert!(p.value() < 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct AdaptiveParameter {
    value: f64,
    num_changes: u64,
}

impl AdaptiveParameter {
    pub fn new(initial_value: f64) -> Self {
        Self {
            value: initial_value.clamp(0.0, 1.0),
            num_changes: 0,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Forgets the observation count, restoring the initial step size.
    pub fn reset(&mut self) {
        self.num_changes = 0;
    }

    /// Moves the value up by the current (shrinking) step.
    pub fn increase(&mut self) {
        let factor = self.bump_and_factor();
        self.value = (1.0 - (1.0 - self.value) / factor).min(self.value * factor);
        self.value = self.value.clamp(0.0, 1.0);
    }

    /// Moves the value down by the current (shrinking) step.
    pub fn decrease(&mut self) {
        let factor = self.bump_and_factor();
        self.value = (self.value / factor).max(1.0 - (1.0 - self.value) * factor);
        self.value = self.value.clamp(0.0, 1.0);
    }

    /// Folds in a batch of observations at once.
    ///
    /// Matched increase/decrease pairs cancel; only the surplus moves the
    /// value, while every observation still shrinks the step. The result is
    /// independent of the order the observations were collected in.
    pub fn update(&mut self, num_decreases: u64, num_increases: u64) {
        let matched = num_decreases.min(num_increases);
        if num_increases > num_decreases {
            for _ in 0..(num_increases - num_decreases) {
                self.increase();
            }
        } else {
            for _ in 0..(num_decreases - num_increases) {
                self.decrease();
            }
        }
        self.num_changes += 2 * matched;
    }

    fn bump_and_factor(&mut self) -> f64 {
        self.num_changes += 1;
        1.0 + 1.0 / ((self.num_changes + 1) as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_unit_interval() {
        let mut p = AdaptiveParameter::new(0.9);
        for _ in 0..1000 {
            p.increase();
        }
        assert!(p.value() <= 1.0);
        for _ in 0..1000 {
            p.decrease();
        }
        assert!(p.value() >= 0.0);
    }

    #[test]
    fn step_shrinks_over_time() {
        let mut p = AdaptiveParameter::new(0.5);
        p.increase();
        let first_step = p.value() - 0.5;
        for _ in 0..100 {
            p.increase();
            p.decrease();
        }
        let before = p.value();
        p.increase();
        let late_step = p.value() - before;
        assert!(late_step < first_step);
    }

    #[test]
    fn batched_update_is_order_independent() {
        // 3 increases + 2 decreases in any order must equal update(2, 3).
        let mut batched = AdaptiveParameter::new(0.5);
        batched.update(2, 3);

        let mut sequential = AdaptiveParameter::new(0.5);
        sequential.update(0, 1);
        sequential.update(1, 1);
        sequential.update(1, 1);
        assert!((batched.value() - sequential.value()).abs() < 1e-12);
    }

    #[test]
    fn balanced_update_moves_nothing_but_shrinks_step() {
        let mut p = AdaptiveParameter::new(0.5);
        p.update(5, 5);
        assert_eq!(p.value(), 0.5);
        // The matched pairs were still counted as observations.
        let mut q = AdaptiveParameter::new(0.5);
        q.increase();
        p.increase();
        assert!(p.value() - 0.5 < q.value() - 0.5);
    }

    #[test]
    fn reset_restores_step_size() {
        let mut p = AdaptiveParameter::new(0.5);
        for _ in 0..50 {
            p.increase();
            p.decrease();
        }
        p.reset();
        let v = p.value();
        p.increase();
        let step_after_reset = p.value() - v;

        let mut fresh = AdaptiveParameter::new(v);
        fresh.increase();
        assert!((step_after_reset - (fresh.value() - v)).abs() < 1e-12);
    }
}
