//! Linearly weighted trailing sum.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::core::{decimal_from_usize, IndicatorError, IndicatorResult};
use crate::rolling::state::{BarTransition, RollingState};

/// Closed values of the window with linear weights `1..=len` (oldest = 1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct WeightedWindow {
    sum: Decimal,
    weighted: Decimal,
    values: VecDeque<Decimal>,
}

impl WeightedWindow {
    fn push(&mut self, value: Decimal, capacity: usize) {
        let weight = decimal_from_usize(self.values.len() + 1);
        self.weighted += weight * value;
        self.sum += value;
        self.values.push_back(value);
        if self.values.len() > capacity {
            // Dropping the oldest sample lowers every remaining weight by one.
            self.weighted -= self.sum;
            if let Some(oldest) = self.values.pop_front() {
                self.sum -= oldest;
            }
        }
    }
}

/// Linearly weighted trailing sum; the newest sample weighs the most.
///
/// With `n = min(bar + 1, period)` samples in the window, the newest has
/// weight `n` and the oldest weight `1`. Both the plain and the weighted
/// committed sums are kept so eviction is O(1) instead of a rescan.
#[derive(Debug, Clone)]
pub struct RollingWeightedSum {
    period: usize,
    state: RollingState<WeightedWindow, Decimal>,
}

impl RollingWeightedSum {
    /// Create a weighted sum over `period` bars.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("RollingWeightedSum", period));
        }
        Ok(Self {
            period,
            state: RollingState::new(WeightedWindow::default()),
        })
    }

    /// Configured window length.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Samples in the window after the last step.
    pub fn count(&self) -> usize {
        match self.state.last_bar() {
            Some(_) => self.state.committed().values.len() + 1,
            None => 0,
        }
    }

    /// Sum of linear weights for the current window, `n * (n + 1) / 2`.
    pub fn weight_total(&self) -> Decimal {
        let n = self.count();
        decimal_from_usize(n * (n + 1) / 2)
    }

    /// Weighted sum of the window ending at `bar`.
    pub fn step(&mut self, bar: usize, value: Decimal) -> IndicatorResult<Decimal> {
        if let BarTransition::Advance {
            closed: Some(closed),
        } = self.state.begin(bar)?
        {
            let capacity = self.period - 1;
            self.state.committed_mut().push(closed, capacity);
        }
        self.state.stage(value);
        let window = self.state.committed();
        let weight = decimal_from_usize(window.values.len() + 1);
        Ok(window.weighted + weight * value)
    }

    /// Discard all history.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
