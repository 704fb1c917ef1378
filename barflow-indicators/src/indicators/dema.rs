//! Double and triple exponential moving averages.

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    period_param, Calculable, IndicatorError, IndicatorResult, Input, ParamValue, Parameter,
    Parameterized,
};
use crate::indicators::ema::Ema;

/// `2 * EMA(x) - EMA(EMA(x))`.
#[derive(Debug, Clone)]
pub struct Dema<I = Decimal> {
    first: Ema,
    second: Ema,
    marker: PhantomData<I>,
}

impl<I> Dema<I>
where
    I: Input,
{
    /// Creates a new DEMA with the provided period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("DEMA", period));
        }
        Ok(Self {
            first: Ema::new(period)?,
            second: Ema::new(period)?,
            marker: PhantomData,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.first.period()
    }
}

impl<I> Calculable for Dema<I>
where
    I: Input,
{
    type Input = I;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let first = self.first.step(bar, input.value())?;
        let second = self.second.step(bar, first)?;
        Ok(Decimal::TWO * first - second)
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }
}

impl<I> Parameterized for Dema<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "DEMA"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period())]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param("DEMA", "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("DEMA", other)),
        }
    }
}

/// `3 * e1 - 3 * e2 + e3` where each `e` smooths the previous one.
#[derive(Debug, Clone)]
pub struct Tema<I = Decimal> {
    first: Ema,
    second: Ema,
    third: Ema,
    marker: PhantomData<I>,
}

impl<I> Tema<I>
where
    I: Input,
{
    /// Creates a new TEMA with the provided period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("TEMA", period));
        }
        Ok(Self {
            first: Ema::new(period)?,
            second: Ema::new(period)?,
            third: Ema::new(period)?,
            marker: PhantomData,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.first.period()
    }
}

impl<I> Calculable for Tema<I>
where
    I: Input,
{
    type Input = I;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let first = self.first.step(bar, input.value())?;
        let second = self.second.step(bar, first)?;
        let third = self.third.step(bar, second)?;
        let three = Decimal::from(3);
        Ok(three * first - three * second + third)
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
        self.third.reset();
    }
}

impl<I> Parameterized for Tema<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "TEMA"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period())]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param("TEMA", "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("TEMA", other)),
        }
    }
}
