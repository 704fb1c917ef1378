//! Trailing maximum and minimum.

use std::collections::VecDeque;
use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    period_param, Calculable, IndicatorError, IndicatorResult, ParamValue, Parameter,
    Parameterized,
};
use crate::rolling::state::{BarTransition, RollingState};

/// Ordering used by [`RollingExtremum`].
pub trait Extremum {
    /// Calculator name.
    const NAME: &'static str;

    /// Whether `candidate` is strictly more extreme than `incumbent`.
    fn beats(candidate: Decimal, incumbent: Decimal) -> bool;
}

/// Largest value wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

/// Smallest value wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

impl Extremum for Max {
    const NAME: &'static str = "Highest";

    fn beats(candidate: Decimal, incumbent: Decimal) -> bool {
        candidate > incumbent
    }
}

impl Extremum for Min {
    const NAME: &'static str = "Lowest";

    fn beats(candidate: Decimal, incumbent: Decimal) -> bool {
        candidate < incumbent
    }
}

/// Trailing maximum over `period` bars.
pub type Highest = RollingExtremum<Max>;
/// Trailing minimum over `period` bars.
pub type Lowest = RollingExtremum<Min>;

/// Trailing extremum using a monotonic deque of committed bars.
///
/// The deque holds `(bar, value)` pairs for closed bars only, ordered so the
/// front is the extremum of the committed part of the window. The value of
/// the bar being revised is compared against the front on every call without
/// entering the deque, so revisions cost O(1) and the deque is updated once
/// per bar (O(1) amortized).
///
/// Ties resolve to the most recent bar.
#[derive(Debug, Clone)]
pub struct RollingExtremum<E> {
    period: usize,
    state: RollingState<VecDeque<(usize, Decimal)>, Decimal>,
    last: Option<(usize, Decimal)>,
    marker: PhantomData<E>,
}

impl<E: Extremum> RollingExtremum<E> {
    /// Create a rolling extremum over `period` bars.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period(E::NAME, period));
        }
        Ok(Self {
            period,
            state: RollingState::new(VecDeque::new()),
            last: None,
            marker: PhantomData,
        })
    }

    /// Configured window length.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Bar index holding the extremum returned by the last step.
    pub fn extremum_bar(&self) -> Option<usize> {
        self.last.map(|(bar, _)| bar)
    }

    /// Extremum of the window ending at `bar`, with `value` as that bar's input.
    pub fn step(&mut self, bar: usize, value: Decimal) -> IndicatorResult<Decimal> {
        if let BarTransition::Advance { closed } = self.state.begin(bar)? {
            let period = self.period;
            let deque = self.state.committed_mut();
            if let Some(closed) = closed {
                while let Some(&(_, back)) = deque.back() {
                    if E::beats(back, closed) {
                        break;
                    }
                    deque.pop_back();
                }
                deque.push_back((bar - 1, closed));
            }
            while let Some(&(front_bar, _)) = deque.front() {
                if front_bar + period > bar {
                    break;
                }
                deque.pop_front();
            }
        }
        self.state.stage(value);

        let best = match self.state.committed().front() {
            Some(&(front_bar, front)) if E::beats(front, value) => (front_bar, front),
            _ => (bar, value),
        };
        self.last = Some(best);
        Ok(best.1)
    }

    /// Discard all history.
    pub fn reset(&mut self) {
        self.state.reset();
        self.last = None;
    }
}

impl<E: Extremum> Calculable for RollingExtremum<E> {
    type Input = Decimal;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        RollingExtremum::step(self, bar, input)
    }

    fn reset(&mut self) {
        RollingExtremum::reset(self);
    }
}

impl<E: Extremum> Parameterized for RollingExtremum<E> {
    fn name(&self) -> &'static str {
        E::NAME
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period)]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param(E::NAME, "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter(E::NAME, other)),
        }
    }
}
