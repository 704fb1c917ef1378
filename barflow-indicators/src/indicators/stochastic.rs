//! Stochastic oscillator.

use barflow_core::Candle;
use rust_decimal::Decimal;

use crate::core::{
    period_param, Calculable, IndicatorError, IndicatorResult, ParamValue, Parameter,
    Parameterized,
};
use crate::indicators::sma::Sma;
use crate::rolling::{Highest, Lowest, Recurrence};

/// Stochastic %K and %D lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StochasticOutput {
    /// Position of the close inside the recent high/low range, 0 to 100.
    pub k: Decimal,
    /// SMA of %K.
    pub d: Decimal,
}

/// Stochastic oscillator over candles.
///
/// When the high/low range is empty, %K repeats the previous bar's final
/// %K, or zero on the first bar.
#[derive(Debug, Clone)]
pub struct Stochastic {
    highs: Highest,
    lows: Lowest,
    k: Recurrence,
    d: Sma,
}

impl Stochastic {
    /// Create an oscillator with `k_period` lookback and `d_period` smoothing.
    pub fn new(k_period: usize, d_period: usize) -> Result<Self, IndicatorError> {
        for period in [k_period, d_period] {
            if period == 0 {
                return Err(IndicatorError::invalid_period("Stochastic", period));
            }
        }
        Ok(Self {
            highs: Highest::new(k_period)?,
            lows: Lowest::new(k_period)?,
            k: Recurrence::new(),
            d: Sma::new(d_period)?,
        })
    }

    /// Periods as `(k, d)`.
    pub fn periods(&self) -> (usize, usize) {
        (self.highs.period(), self.d.period())
    }
}

impl Calculable for Stochastic {
    type Input = Candle;
    type Output = StochasticOutput;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let highest = self.highs.step(bar, input.high)?;
        let lowest = self.lows.step(bar, input.low)?;
        let range = highest - lowest;
        let k = self.k.step(bar, |prev| {
            if range.is_zero() {
                prev.unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ONE_HUNDRED * (input.close - lowest) / range
            }
        })?;
        let d = self.d.step(bar, k)?;
        Ok(StochasticOutput { k, d })
    }

    fn reset(&mut self) {
        self.highs.reset();
        self.lows.reset();
        self.k.reset();
        self.d.reset();
    }
}

impl Parameterized for Stochastic {
    fn name(&self) -> &'static str {
        "Stochastic"
    }

    fn parameters(&self) -> Vec<Parameter> {
        let (k, d) = self.periods();
        vec![Parameter::new("k_period", k), Parameter::new("d_period", d)]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        let (k, d) = self.periods();
        let rebuilt = match name {
            "k_period" => Self::new(period_param("Stochastic", "k_period", &value)?, d)?,
            "d_period" => Self::new(k, period_param("Stochastic", "d_period", &value)?)?,
            other => return Err(IndicatorError::unknown_parameter("Stochastic", other)),
        };
        *self = rebuilt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use barflow_test_utils::candle;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn locates_close_within_range() {
        let mut stoch = Stochastic::new(2, 2).unwrap();
        let first = stoch
            .step(0, candle(0, dec!(5), dec!(10), dec!(0), dec!(5), dec!(1)))
            .unwrap();
        assert_eq!(first, StochasticOutput { k: dec!(50), d: dec!(50) });
        let second = stoch
            .step(1, candle(1, dec!(5), dec!(20), dec!(5), dec!(20), dec!(1)))
            .unwrap();
        assert_eq!(second.k, dec!(100));
        assert_eq!(second.d, dec!(75));
    }

    #[test]
    fn empty_range_repeats_previous_k() {
        let mut stoch = Stochastic::new(1, 2).unwrap();
        stoch
            .step(0, candle(0, dec!(5), dec!(10), dec!(0), dec!(2.5), dec!(1)))
            .unwrap();
        let flat = stoch
            .step(1, candle(1, dec!(7), dec!(7), dec!(7), dec!(7), dec!(1)))
            .unwrap();
        assert_eq!(flat.k, dec!(25));
        assert_eq!(flat.d, dec!(25));
    }

    #[test]
    fn first_flat_bar_reads_zero() {
        let mut stoch = Stochastic::new(3, 3).unwrap();
        let out = stoch
            .step(0, candle(0, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1)))
            .unwrap();
        assert_eq!(out.k, Decimal::ZERO);
    }
}
