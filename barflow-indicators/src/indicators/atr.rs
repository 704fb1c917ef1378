//! Average True Range indicator implementation.

use barflow_core::Candle;
use rust_decimal::Decimal;

use crate::core::{
    period_param, Calculable, IndicatorError, IndicatorResult, ParamValue, Parameter,
    Parameterized,
};
use crate::indicators::smma::Smma;
use crate::rolling::Recurrence;

/// Average True Range: SMMA of the true range.
///
/// The first bar has no previous close, so its true range is `high - low`.
#[derive(Debug, Clone)]
pub struct Atr {
    closes: Recurrence,
    smoother: Smma,
}

impl Atr {
    /// Create a new ATR indicator with the provided period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("ATR", period));
        }
        Ok(Self {
            closes: Recurrence::new(),
            smoother: Smma::new(period)?,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.smoother.period()
    }

    fn true_range(candle: &Candle, prev_close: Option<Decimal>) -> Decimal {
        let high_low = candle.range();
        match prev_close {
            Some(prev) => {
                let high_close = (candle.high - prev).abs();
                let low_close = (candle.low - prev).abs();
                high_low.max(high_close).max(low_close)
            }
            None => high_low,
        }
    }
}

impl Calculable for Atr {
    type Input = Candle;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let close = input.close;
        self.closes.step(bar, |_| close)?;
        let tr = Self::true_range(&input, self.closes.previous());
        self.smoother.step(bar, tr)
    }

    fn reset(&mut self) {
        self.closes.reset();
        self.smoother.reset();
    }
}

impl Parameterized for Atr {
    fn name(&self) -> &'static str {
        "ATR"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("period", self.period())]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "period" => {
                *self = Self::new(period_param("ATR", "period", &value)?)?;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("ATR", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use barflow_test_utils::candle;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn gap_widens_true_range() {
        let mut atr = Atr::new(2).unwrap();
        let bars = [
            candle(0, dec!(10), dec!(12), dec!(10), dec!(11), dec!(1)),
            candle(1, dec!(11), dec!(13), dec!(11), dec!(12), dec!(1)),
            candle(2, dec!(19), dec!(20), dec!(19), dec!(19.5), dec!(1)),
        ];
        let outputs: Vec<_> = bars
            .into_iter()
            .enumerate()
            .map(|(bar, c)| atr.step(bar, c).unwrap())
            .collect();
        // true ranges 2, 2, 8
        assert_eq!(outputs, vec![dec!(2), dec!(2), dec!(5)]);
    }

    #[test]
    fn flat_candles_have_zero_range() {
        let mut atr = Atr::new(14).unwrap();
        for bar in 0..5 {
            let flat = candle(bar, dec!(3), dec!(3), dec!(3), dec!(3), dec!(0));
            assert_eq!(atr.step(bar, flat).unwrap(), Decimal::ZERO);
        }
    }
}
