//! Trailing sum.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::core::{Calculable, IndicatorError, IndicatorResult};
use crate::rolling::state::{BarTransition, RollingState};

/// Committed part of a trailing window: the last `period - 1` closed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SumWindow {
    sum: Decimal,
    values: VecDeque<Decimal>,
}

impl SumWindow {
    fn push(&mut self, value: Decimal, capacity: usize) {
        self.sum += value;
        self.values.push_back(value);
        if self.values.len() > capacity {
            if let Some(oldest) = self.values.pop_front() {
                self.sum -= oldest;
            }
        }
    }
}

/// Trailing sum over `period` bars, revision-safe.
///
/// Each call costs O(1): the committed sum only changes when the bar
/// advances, at which point the closed bar's final value is folded in and
/// the value that left the window is subtracted.
#[derive(Debug, Clone)]
pub struct RollingSum {
    period: usize,
    state: RollingState<SumWindow, Decimal>,
}

impl RollingSum {
    /// Create a rolling sum over `period` bars.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("RollingSum", period));
        }
        Ok(Self {
            period,
            state: RollingState::new(SumWindow::default()),
        })
    }

    /// Configured window length.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Number of bars in the window after the last step: `min(bar + 1, period)`.
    pub fn count(&self) -> usize {
        match self.state.last_bar() {
            Some(_) => self.state.committed().values.len() + 1,
            None => 0,
        }
    }

    /// Sum of the window ending at `bar`, with `value` as that bar's input.
    pub fn step(&mut self, bar: usize, value: Decimal) -> IndicatorResult<Decimal> {
        if let BarTransition::Advance {
            closed: Some(closed),
        } = self.state.begin(bar)?
        {
            let capacity = self.period - 1;
            self.state.committed_mut().push(closed, capacity);
        }
        self.state.stage(value);
        Ok(self.state.committed().sum + value)
    }

    /// Discard all history.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}

impl Calculable for RollingSum {
    type Input = Decimal;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        RollingSum::step(self, bar, input)
    }

    fn reset(&mut self) {
        RollingSum::reset(self);
    }
}
