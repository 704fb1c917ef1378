//! Relative Strength Index (RSI).

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    period_param, Calculable, IndicatorError, IndicatorResult, Input, ParamValue, Parameter,
    Parameterized,
};
use crate::indicators::smma::Smma;
use crate::rolling::Recurrence;

/// Computes Wilder's RSI oscillator scaled between 0 and 100.
///
/// Gains and losses are smoothed with an SMMA of the configured period.
/// Bar 0 has no change and reads 50.
#[derive(Debug, Clone)]
pub struct Rsi<I = Decimal> {
    period: usize,
    closes: Recurrence,
    gains: Smma,
    losses: Smma,
    marker: PhantomData<I>,
}

impl<I> Rsi<I>
where
    I: Input,
{
    /// Creates a new RSI with the provided period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("RSI", period));
        }

        Ok(Self {
            period,
            closes: Recurrence::new(),
            gains: Smma::new(period)?,
            losses: Smma::new(period)?,
            marker: PhantomData,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.period
    }

    fn compute_rsi(avg_gain: Decimal, avg_loss: Decimal) -> Decimal {
        let hundred = Decimal::ONE_HUNDRED;
        if avg_loss.is_zero() && avg_gain.is_zero() {
            hundred / Decimal::TWO
        } else if avg_loss.is_zero() {
            hundred
        } else if avg_gain.is_zero() {
            Decimal::ZERO
        } else {
            let rs = avg_gain / avg_loss;
            hundred - (hundred / (rs + Decimal::ONE))
        }
    }
}

impl<I> Calculable for Rsi<I>
where
    I: Input,
{
    type Input = I;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let value = input.value();
        self.closes.step(bar, |_| value)?;
        let change = self
            .closes
            .previous()
            .map_or(Decimal::ZERO, |prev| value - prev);

        let gain = change.max(Decimal::ZERO);
        let loss = (-change).max(Decimal::ZERO);
        let avg_gain = self.gains.step(bar, gain)?;
        let avg_loss = self.losses.step(bar, loss)?;
        Ok(Self::compute_rsi(avg_gain, avg_loss))
    }

    fn reset(&mut self) {
        self.closes.reset();
        self.gains.reset();
        self.losses.reset();
    }
}

impl<I> Parameterized for Rsi<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "RSI"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period)]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param("RSI", "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("RSI", other)),
        }
    }
}
