//! Simple Moving Average (SMA).

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    decimal_from_usize, period_param, Calculable, IndicatorError, IndicatorResult, Input,
    ParamValue, Parameter, Parameterized,
};
use crate::rolling::RollingSum;

/// Arithmetic mean over a trailing window.
///
/// Emits from bar 0: while fewer than `period` bars exist the mean covers
/// the bars seen so far.
#[derive(Debug, Clone)]
pub struct Sma<I = Decimal> {
    sum: RollingSum,
    marker: PhantomData<I>,
}

impl<I> Sma<I>
where
    I: Input,
{
    /// Creates a new SMA with the provided period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("SMA", period));
        }
        Ok(Self {
            sum: RollingSum::new(period)?,
            marker: PhantomData,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.sum.period()
    }
}

impl<I> Calculable for Sma<I>
where
    I: Input,
{
    type Input = I;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let sum = self.sum.step(bar, input.value())?;
        // count is at least one after a successful step
        Ok(sum / decimal_from_usize(self.sum.count()))
    }

    fn reset(&mut self) {
        self.sum.reset();
    }
}

impl<I> Parameterized for Sma<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "SMA"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period())]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param("SMA", "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("SMA", other)),
        }
    }
}
