//! Moving Average Convergence Divergence indicator implementation.

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    period_param, Calculable, IndicatorError, IndicatorResult, Input, ParamValue, Parameter,
    Parameterized,
};
use crate::indicators::ema::Ema;

/// MACD output (line, signal line, and histogram).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacdOutput {
    /// MACD line value (fast EMA minus slow EMA).
    pub macd: Decimal,
    /// Signal line value (EMA of the MACD line).
    pub signal: Decimal,
    /// Histogram representing the distance between MACD and signal lines.
    pub histogram: Decimal,
}

/// Moving Average Convergence Divergence indicator.
///
/// Owns its three EMAs and steps them fast, slow, then signal, so every
/// child has produced its value for the bar before the parent combines them.
#[derive(Debug, Clone)]
pub struct Macd<I = Decimal> {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    marker: PhantomData<I>,
}

impl<I> Macd<I>
where
    I: Input,
{
    /// Create a MACD indicator with custom fast/slow/signal periods.
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, IndicatorError> {
        for period in [fast_period, slow_period, signal_period] {
            if period == 0 {
                return Err(IndicatorError::invalid_period("MACD", period));
            }
        }
        Ok(Self {
            fast: Ema::new(fast_period)?,
            slow: Ema::new(slow_period)?,
            signal: Ema::new(signal_period)?,
            marker: PhantomData,
        })
    }

    /// Periods as `(fast, slow, signal)`.
    pub fn periods(&self) -> (usize, usize, usize) {
        (
            self.fast.period(),
            self.slow.period(),
            self.signal.period(),
        )
    }
}

impl<I> Calculable for Macd<I>
where
    I: Input,
{
    type Input = I;
    type Output = MacdOutput;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let value = input.value();
        let fast = self.fast.step(bar, value)?;
        let slow = self.slow.step(bar, value)?;
        let macd = fast - slow;
        let signal = self.signal.step(bar, macd)?;
        Ok(MacdOutput {
            macd,
            signal,
            histogram: macd - signal,
        })
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}

impl<I> Parameterized for Macd<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "MACD"
    }

    fn parameters(&self) -> Vec<Parameter> {
        let (fast, slow, signal) = self.periods();
        vec![
            Parameter::new("fast", fast),
            Parameter::new("slow", slow),
            Parameter::new("signal", signal),
        ]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        let (fast, slow, signal) = self.periods();
        let rebuilt = match name {
            "fast" => Self::new(period_param("MACD", "fast", &value)?, slow, signal)?,
            "slow" => Self::new(fast, period_param("MACD", "slow", &value)?, signal)?,
            "signal" => Self::new(fast, slow, period_param("MACD", "signal", &value)?)?,
            other => return Err(IndicatorError::unknown_parameter("MACD", other)),
        };
        *self = rebuilt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn flat_prices_give_zero_lines() {
        let mut macd = Macd::new(3, 6, 3).unwrap();
        for bar in 0..15 {
            let out = macd.step(bar, dec!(10)).unwrap();
            assert_eq!(out.macd, Decimal::ZERO);
            assert_eq!(out.histogram, Decimal::ZERO);
        }
    }

    #[test]
    fn rising_prices_turn_line_positive() {
        let mut macd = Macd::new(3, 6, 3).unwrap();
        let mut last = None;
        for bar in 0..16 {
            last = Some(macd.step(bar, Decimal::from(bar as i64 + 1)).unwrap());
        }
        let out = last.unwrap();
        assert!(out.macd > Decimal::ZERO);
        assert_eq!(out.histogram, out.macd - out.signal);
    }

    #[test]
    fn parameter_changes_keep_other_periods() {
        let mut macd: Macd = Macd::new(12, 26, 9).unwrap();
        macd.set_parameter("slow", ParamValue::Period(30)).unwrap();
        assert_eq!(macd.periods(), (12, 30, 9));
        assert!(macd.set_parameter("fast", ParamValue::Period(0)).is_err());
        assert_eq!(macd.periods(), (12, 30, 9));
    }
}
