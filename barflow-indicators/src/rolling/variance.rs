//! Trailing population variance.

use std::collections::VecDeque;

use rust_decimal::{Decimal, MathematicalOps};

use crate::core::{decimal_from_usize, Calculable, IndicatorError, IndicatorResult};
use crate::rolling::state::{BarTransition, RollingState};

/// Closed bars of the window. Sums are kept as deviations from `shift`, a
/// value taken from the window, so series far from zero keep small squares.
/// A bar flagged `false` did not fit in the sums and is left out of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct VarianceWindow {
    shift: Option<Decimal>,
    sum: Decimal,
    squares: Decimal,
    values: VecDeque<(Decimal, bool)>,
    overflowed: usize,
    last_variance: Option<Decimal>,
}

impl VarianceWindow {
    /// Deviation of `value` from `shift` and its square.
    fn term(shift: Decimal, value: Decimal) -> Option<(Decimal, Decimal)> {
        let deviation = value.checked_sub(shift)?;
        Some((deviation, deviation.checked_mul(deviation)?))
    }

    fn accumulate(&mut self, shift: Decimal, value: Decimal) -> bool {
        let Some((deviation, square)) = Self::term(shift, value) else {
            return false;
        };
        match (self.sum.checked_add(deviation), self.squares.checked_add(square)) {
            (Some(sum), Some(squares)) => {
                self.sum = sum;
                self.squares = squares;
                true
            }
            _ => false,
        }
    }

    fn push(&mut self, value: Decimal, variance: Decimal, capacity: usize) {
        self.last_variance = Some(variance);
        if capacity == 0 {
            return;
        }
        if self.values.len() == capacity {
            if let Some((oldest, counted)) = self.values.pop_front() {
                if counted {
                    self.remove(oldest);
                } else {
                    self.overflowed -= 1;
                }
            }
        }
        let shift = *self.shift.get_or_insert(value);
        if self.accumulate(shift, value) {
            self.values.push_back((value, true));
        } else {
            // Re-anchor on the newest value and fold the window in again.
            self.values.push_back((value, false));
            self.rebuild(value);
        }
    }

    fn remove(&mut self, value: Decimal) {
        let shift = self.shift.unwrap_or(value);
        let removed = Self::term(shift, value).and_then(|(deviation, square)| {
            Some((self.sum.checked_sub(deviation)?, self.squares.checked_sub(square)?))
        });
        match removed {
            Some((sum, squares)) => {
                self.sum = sum;
                self.squares = squares;
            }
            None => self.rebuild(shift),
        }
    }

    /// Recompute the running sums around `shift` from the stored values.
    fn rebuild(&mut self, shift: Decimal) {
        self.shift = Some(shift);
        self.sum = Decimal::ZERO;
        self.squares = Decimal::ZERO;
        self.overflowed = 0;
        let values = std::mem::take(&mut self.values);
        for (value, _) in values {
            let counted = self.accumulate(shift, value);
            if !counted {
                self.overflowed += 1;
            }
            self.values.push_back((value, counted));
        }
    }

    /// Variance of the committed bars plus `value`, or `None` when any part
    /// of it does not fit in a `Decimal`.
    fn with(&self, value: Decimal) -> Option<Decimal> {
        if self.overflowed > 0 {
            return None;
        }
        let (deviation, square) = Self::term(self.shift.unwrap_or(value), value)?;
        let sum = self.sum.checked_add(deviation)?;
        let squares = self.squares.checked_add(square)?;
        let count = decimal_from_usize(self.values.len() + 1);
        let mean = sum.checked_div(count)?;
        let variance = squares
            .checked_div(count)?
            .checked_sub(mean.checked_mul(mean)?)?;
        Some(variance.max(Decimal::ZERO))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Staged {
    value: Decimal,
    variance: Decimal,
}

/// Population variance over a trailing window.
///
/// Values are accumulated as deviations from a value inside the window,
/// which keeps the sum of squares small for series that sit far from zero.
/// When a square or a running sum still does not fit in a `Decimal` the
/// previous bar's final variance is reported instead (zero on the first
/// bar) until the offending bar leaves the window. Rounding can push the
/// variance slightly below zero; it is clamped.
#[derive(Debug, Clone)]
pub struct RollingVariance {
    period: usize,
    state: RollingState<VarianceWindow, Staged>,
}

impl RollingVariance {
    /// Create a rolling variance over `period` bars.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("RollingVariance", period));
        }
        Ok(Self {
            period,
            state: RollingState::new(VarianceWindow::default()),
        })
    }

    /// Configured window length.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Variance of the window ending at `bar`.
    pub fn step(&mut self, bar: usize, value: Decimal) -> IndicatorResult<Decimal> {
        if let BarTransition::Advance {
            closed: Some(closed),
        } = self.state.begin(bar)?
        {
            let capacity = self.period - 1;
            self.state
                .committed_mut()
                .push(closed.value, closed.variance, capacity);
        }
        let window = self.state.committed();
        let variance = window
            .with(value)
            .unwrap_or_else(|| window.last_variance.unwrap_or(Decimal::ZERO));
        self.state.stage(Staged { value, variance });
        Ok(variance)
    }

    /// Discard all history.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}

/// Square root with a zero fallback for values `sqrt` cannot handle.
pub fn std_dev(variance: Decimal) -> Decimal {
    variance.sqrt().unwrap_or(Decimal::ZERO)
}

impl Calculable for RollingVariance {
    type Input = Decimal;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        RollingVariance::step(self, bar, input)
    }

    fn reset(&mut self) {
        RollingVariance::reset(self);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn matches_population_variance() {
        let mut var = RollingVariance::new(3).unwrap();
        var.step(0, dec!(1)).unwrap();
        var.step(1, dec!(2)).unwrap();
        let v = var.step(2, dec!(3)).unwrap();
        assert_eq!(v.round_dp(20), (dec!(2) / dec!(3)).round_dp(20));
        assert_eq!(var.step(3, dec!(3)).unwrap().round_dp(20), (dec!(2) / dec!(9)).round_dp(20));
    }

    #[test]
    fn single_sample_has_zero_variance() {
        let mut var = RollingVariance::new(5).unwrap();
        assert_eq!(var.step(0, dec!(42)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn revisions_do_not_leak_into_history() {
        let mut revised = RollingVariance::new(3).unwrap();
        revised.step(0, dec!(7)).unwrap();
        revised.step(0, dec!(1)).unwrap();
        revised.step(1, dec!(50)).unwrap();
        revised.step(1, dec!(2)).unwrap();
        let mut plain = RollingVariance::new(3).unwrap();
        plain.step(0, dec!(1)).unwrap();
        plain.step(1, dec!(2)).unwrap();
        assert_eq!(revised.step(2, dec!(3)).unwrap(), plain.step(2, dec!(3)).unwrap());
    }

    #[test]
    fn large_values_far_from_zero_stay_exact() {
        let base = dec!(300000000000000);
        let mut var = RollingVariance::new(3).unwrap();
        var.step(0, base + dec!(1)).unwrap();
        var.step(1, base + dec!(2)).unwrap();
        let v = var.step(2, base + dec!(3)).unwrap();
        assert_eq!(v.round_dp(20), (dec!(2) / dec!(3)).round_dp(20));
    }

    #[test]
    fn unrepresentable_squares_fall_back_to_previous_variance() {
        let mut var = RollingVariance::new(3).unwrap();
        assert_eq!(var.step(0, dec!(1000000000000000)).unwrap(), Decimal::ZERO);
        // Deviation of 1e15 squares past Decimal::MAX.
        assert_eq!(var.step(1, Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_eq!(var.step(2, Decimal::ZERO).unwrap(), Decimal::ZERO);
        // The overflowed bar has left the window.
        let v = var.step(3, dec!(1)).unwrap();
        assert_eq!(v.round_dp(20), (dec!(2) / dec!(9)).round_dp(20));
    }

    #[test]
    fn extreme_inputs_do_not_panic() {
        let mut var = RollingVariance::new(4).unwrap();
        let inputs = [Decimal::MAX, Decimal::MIN, Decimal::MAX, Decimal::ZERO, Decimal::MIN];
        for (bar, value) in inputs.into_iter().enumerate() {
            let v = var.step(bar, value).unwrap();
            assert!(v >= Decimal::ZERO);
        }
    }

    #[test]
    fn std_dev_of_zero_is_zero() {
        assert_eq!(std_dev(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(std_dev(dec!(4)).round_dp(10), dec!(2));
    }
}
