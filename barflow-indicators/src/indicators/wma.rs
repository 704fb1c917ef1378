//! Weighted Moving Average (WMA).

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    period_param, Calculable, IndicatorError, IndicatorResult, Input, ParamValue, Parameter,
    Parameterized,
};
use crate::rolling::RollingWeightedSum;

/// Linearly weighted average; the newest bar has weight `n`, the oldest `1`.
#[derive(Debug, Clone)]
pub struct Wma<I = Decimal> {
    sum: RollingWeightedSum,
    marker: PhantomData<I>,
}

impl<I> Wma<I>
where
    I: Input,
{
    /// Creates a new WMA with the provided period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("WMA", period));
        }
        Ok(Self {
            sum: RollingWeightedSum::new(period)?,
            marker: PhantomData,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.sum.period()
    }
}

impl<I> Calculable for Wma<I>
where
    I: Input,
{
    type Input = I;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let weighted = self.sum.step(bar, input.value())?;
        Ok(weighted / self.sum.weight_total())
    }

    fn reset(&mut self) {
        self.sum.reset();
    }
}

impl<I> Parameterized for Wma<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "WMA"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period())]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param("WMA", "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("WMA", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn weights_recent_bars_more() {
        let mut wma = Wma::new(3).unwrap();
        assert_eq!(wma.step(0, dec!(3)).unwrap(), dec!(3));
        // (3 + 2 * 6) / 3
        assert_eq!(wma.step(1, dec!(6)).unwrap(), dec!(5));
        // (3 + 12 + 27) / 6
        assert_eq!(wma.step(2, dec!(9)).unwrap(), dec!(7));
        // (6 + 18 + 9) / 6
        assert_eq!(wma.step(3, dec!(3)).unwrap(), dec!(5.5));
    }
}
