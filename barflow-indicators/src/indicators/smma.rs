//! Smoothed Moving Average (SMMA), also known as Wilder's moving average.

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    decimal_from_usize, period_param, Calculable, IndicatorError, IndicatorResult, Input,
    ParamValue, Parameter, Parameterized,
};
use crate::rolling::Recurrence;

/// `smma[b] = (smma[b - 1] * (period - 1) + input) / period`, seeded with the first input.
#[derive(Debug, Clone)]
pub struct Smma<I = Decimal> {
    period: usize,
    recurrence: Recurrence,
    marker: PhantomData<I>,
}

impl<I> Smma<I>
where
    I: Input,
{
    /// Creates a new SMMA with the provided period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("SMMA", period));
        }
        Ok(Self {
            period,
            recurrence: Recurrence::new(),
            marker: PhantomData,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.period
    }
}

impl<I> Calculable for Smma<I>
where
    I: Input,
{
    type Input = I;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let value = input.value();
        let period = decimal_from_usize(self.period);
        self.recurrence.step(bar, |prev| match prev {
            Some(prev) => (prev * (period - Decimal::ONE) + value) / period,
            None => value,
        })
    }

    fn reset(&mut self) {
        self.recurrence.reset();
    }
}

impl<I> Parameterized for Smma<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "SMMA"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period)]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param("SMMA", "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("SMMA", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn smooths_with_wilder_weights() {
        let mut smma = Smma::new(4).unwrap();
        assert_eq!(smma.step(0, dec!(8)).unwrap(), dec!(8));
        // (8 * 3 + 4) / 4
        assert_eq!(smma.step(1, dec!(4)).unwrap(), dec!(7));
        // (7 * 3 + 11) / 4
        assert_eq!(smma.step(2, dec!(11)).unwrap(), dec!(8));
    }

    #[test]
    fn period_one_echoes_input() {
        let mut smma = Smma::new(1).unwrap();
        for (bar, value) in [dec!(3), dec!(-1), dec!(6)].into_iter().enumerate() {
            assert_eq!(smma.step(bar, value).unwrap(), value);
        }
    }
}
