//! Exponential Moving Average (EMA).

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    decimal_from_usize, period_param, Calculable, IndicatorError, IndicatorResult, Input,
    ParamValue, Parameter, Parameterized,
};
use crate::rolling::Recurrence;

/// Exponentially weighted average with `alpha = 2 / (period + 1)`.
///
/// Seeded with the first input, so bar 0 returns its input unchanged.
#[derive(Debug, Clone)]
pub struct Ema<I = Decimal> {
    period: usize,
    alpha: Decimal,
    recurrence: Recurrence,
    marker: PhantomData<I>,
}

impl<I> Ema<I>
where
    I: Input,
{
    /// Creates a new EMA with the provided period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("EMA", period));
        }

        Ok(Self {
            period,
            alpha: Decimal::TWO / decimal_from_usize(period + 1),
            recurrence: Recurrence::new(),
            marker: PhantomData,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Returns the value produced by the last step, if any.
    pub fn value(&self) -> Option<Decimal> {
        self.recurrence.current()
    }
}

impl<I> Calculable for Ema<I>
where
    I: Input,
{
    type Input = I;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let value = input.value();
        let alpha = self.alpha;
        self.recurrence.step(bar, |prev| match prev {
            Some(prev) => (value - prev) * alpha + prev,
            None => value,
        })
    }

    fn reset(&mut self) {
        self.recurrence.reset();
    }
}

impl<I> Parameterized for Ema<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "EMA"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period)]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param("EMA", "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("EMA", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::Ema;
    use crate::core::Calculable;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn first_bar_seeds_with_input() {
        let mut ema = Ema::new(10).unwrap();
        assert_eq!(ema.step(0, dec("42.5")).unwrap(), dec("42.5"));
    }

    #[test]
    fn follows_recursive_formula() {
        // alpha = 0.5 for period 3
        let mut ema = Ema::new(3).unwrap();
        let outputs: Vec<_> = ["1", "2", "3", "4"]
            .iter()
            .enumerate()
            .map(|(bar, v)| ema.step(bar, dec(v)).unwrap())
            .collect();
        assert_eq!(
            outputs,
            vec![dec("1"), dec("1.5"), dec("2.25"), dec("3.125")]
        );
    }

    #[test]
    fn revisions_do_not_compound() {
        let mut ema = Ema::new(3).unwrap();
        ema.step(0, dec("1")).unwrap();
        for value in ["9", "0", "5", "2"] {
            ema.step(1, dec(value)).unwrap();
        }
        assert_eq!(ema.value(), Some(dec("1.5")));
        assert_eq!(ema.step(2, dec("3")).unwrap(), dec("2.25"));
    }
}
